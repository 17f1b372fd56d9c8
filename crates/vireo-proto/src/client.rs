//! Client-to-server protocol messages.
//!
//! One closed sum covers everything a client can send. The wire form is a
//! `u8` variant tag followed by the variant's fields in order; tags are
//! frozen by the server and must never be renumbered.

use crate::ids::QueryId;
use vireo_atn::AtnDecode;
use vireo_atn::AtnEncode;
use vireo_atn::DecodeError;
use vireo_atn::EncodeError;
use vireo_atn::Reader;
use vireo_atn::Writer;

/// Delivery behavior requested for a reducer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallReducerFlags {
    /// Wait for the full transaction update (the default).
    #[default]
    FullUpdate,
    /// Skip the success notification unless subscribed rows are touched.
    NoSuccessNotify,
}

impl CallReducerFlags {
    /// The wire byte.
    pub fn to_u8(self) -> u8 {
        match self {
            CallReducerFlags::FullUpdate => 0,
            CallReducerFlags::NoSuccessNotify => 1,
        }
    }

    /// Parse the wire byte.
    pub fn from_u8(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(CallReducerFlags::FullUpdate),
            1 => Ok(CallReducerFlags::NoSuccessNotify),
            tag => Err(DecodeError::InvalidEnumTag {
                tag,
                ty: "CallReducerFlags",
            }),
        }
    }
}

/// Every message a client can send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Tag 0: invoke a reducer by name with ATN-encoded arguments.
    CallReducer {
        /// Reducer name as registered in the module.
        name: String,
        /// ATN-encoded argument product.
        args: Vec<u8>,
        /// Correlates the eventual transaction update.
        request_id: u32,
        /// Delivery behavior for the result.
        flags: CallReducerFlags,
    },

    /// Tag 1: replace the session's batch subscription set.
    Subscribe {
        /// SQL queries defining the subscribed rows.
        queries: Vec<String>,
        /// Correlates the initial subscription response.
        request_id: u32,
    },

    /// Tag 2: run a standalone query outside any subscription.
    OneOffQuery {
        /// Caller-chosen id correlating the response.
        message_id: Vec<u8>,
        /// The SQL text.
        query: String,
    },

    /// Tag 3: add a single query to the subscription set.
    SubscribeSingle {
        /// The SQL text.
        query: String,
        /// Correlates the applied response.
        request_id: u32,
        /// Client-allocated id naming this query set.
        query_id: QueryId,
    },

    /// Tag 4: add a group of queries to the subscription set.
    SubscribeMulti {
        /// SQL queries added together.
        queries: Vec<String>,
        /// Correlates the applied response.
        request_id: u32,
        /// Client-allocated id naming this query set.
        query_id: QueryId,
    },

    /// Tag 5: remove a single-query subscription.
    Unsubscribe {
        /// Correlates the applied response.
        request_id: u32,
        /// The query set to drop.
        query_id: QueryId,
    },

    /// Tag 6: remove a multi-query subscription.
    UnsubscribeMulti {
        /// Correlates the applied response.
        request_id: u32,
        /// The query set to drop.
        query_id: QueryId,
    },

    /// Tag 7: invoke a procedure by name with ATN-encoded arguments.
    CallProcedure {
        /// Procedure name as registered in the module.
        name: String,
        /// ATN-encoded argument product.
        args: Vec<u8>,
        /// Correlates the procedure result.
        request_id: u32,
        /// Reserved delivery flags; the same domain as reducer flags.
        flags: CallReducerFlags,
    },
}

impl AtnEncode for ClientMessage {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        match self {
            ClientMessage::CallReducer {
                name,
                args,
                request_id,
                flags,
            } => {
                w.put_u8(0);
                w.put_str(name)?;
                w.put_bytes(args)?;
                w.put_u32(*request_id);
                w.put_u8(flags.to_u8());
                Ok(())
            }
            ClientMessage::Subscribe { queries, request_id } => {
                w.put_u8(1);
                queries.encode(w)?;
                w.put_u32(*request_id);
                Ok(())
            }
            ClientMessage::OneOffQuery { message_id, query } => {
                w.put_u8(2);
                w.put_bytes(message_id)?;
                w.put_str(query)
            }
            ClientMessage::SubscribeSingle {
                query,
                request_id,
                query_id,
            } => {
                w.put_u8(3);
                w.put_str(query)?;
                w.put_u32(*request_id);
                query_id.encode(w)
            }
            ClientMessage::SubscribeMulti {
                queries,
                request_id,
                query_id,
            } => {
                w.put_u8(4);
                queries.encode(w)?;
                w.put_u32(*request_id);
                query_id.encode(w)
            }
            ClientMessage::Unsubscribe { request_id, query_id } => {
                w.put_u8(5);
                w.put_u32(*request_id);
                query_id.encode(w)
            }
            ClientMessage::UnsubscribeMulti { request_id, query_id } => {
                w.put_u8(6);
                w.put_u32(*request_id);
                query_id.encode(w)
            }
            ClientMessage::CallProcedure {
                name,
                args,
                request_id,
                flags,
            } => {
                w.put_u8(7);
                w.put_str(name)?;
                w.put_bytes(args)?;
                w.put_u32(*request_id);
                w.put_u8(flags.to_u8());
                Ok(())
            }
        }
    }
}

impl AtnDecode for ClientMessage {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(ClientMessage::CallReducer {
                name: String::decode(r)?,
                args: r.get_bytes()?.to_vec(),
                request_id: r.get_u32()?,
                flags: CallReducerFlags::from_u8(r.get_u8()?)?,
            }),
            1 => Ok(ClientMessage::Subscribe {
                queries: Vec::decode(r)?,
                request_id: r.get_u32()?,
            }),
            2 => Ok(ClientMessage::OneOffQuery {
                message_id: r.get_bytes()?.to_vec(),
                query: String::decode(r)?,
            }),
            3 => Ok(ClientMessage::SubscribeSingle {
                query: String::decode(r)?,
                request_id: r.get_u32()?,
                query_id: QueryId::decode(r)?,
            }),
            4 => Ok(ClientMessage::SubscribeMulti {
                queries: Vec::decode(r)?,
                request_id: r.get_u32()?,
                query_id: QueryId::decode(r)?,
            }),
            5 => Ok(ClientMessage::Unsubscribe {
                request_id: r.get_u32()?,
                query_id: QueryId::decode(r)?,
            }),
            6 => Ok(ClientMessage::UnsubscribeMulti {
                request_id: r.get_u32()?,
                query_id: QueryId::decode(r)?,
            }),
            7 => Ok(ClientMessage::CallProcedure {
                name: String::decode(r)?,
                args: r.get_bytes()?.to_vec(),
                request_id: r.get_u32()?,
                flags: CallReducerFlags::from_u8(r.get_u8()?)?,
            }),
            tag => Err(DecodeError::InvalidEnumTag {
                tag,
                ty: "ClientMessage",
            }),
        }
    }
}
