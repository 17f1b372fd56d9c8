//! Server-to-client protocol messages.
//!
//! The server speaks one closed sum. Frames arrive with a compression tag
//! (see [`crate::compress`]); once decompressed, the body decodes here.
//! Unknown variant tags are typed decode errors and terminate the session's
//! receive loop rather than being skipped.

use crate::ids::QueryId;
use crate::ids::TableId;
use crate::row_list::RowList;
use crate::update::DatabaseUpdate;
use crate::update::EnergyQuanta;
use crate::update::ProcedureStatus;
use crate::update::ReducerCallInfo;
use crate::update::TableUpdate;
use crate::update::UpdateStatus;
use vireo_atn::AtnDecode;
use vireo_atn::AtnEncode;
use vireo_atn::ConnectionId;
use vireo_atn::DecodeError;
use vireo_atn::EncodeError;
use vireo_atn::Identity;
use vireo_atn::Reader;
use vireo_atn::TimeDuration;
use vireo_atn::Timestamp;
use vireo_atn::Writer;

/// Snapshot completing a batch subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialSubscription {
    /// The full result set of every subscribed query.
    pub database_update: DatabaseUpdate,
    /// Correlates the `Subscribe` request.
    pub request_id: u32,
    /// Host-side execution time for planning and evaluation.
    pub total_host_execution_duration: TimeDuration,
}

/// Deltas and metadata for one reducer transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdate {
    /// Commit outcome, with deltas when committed.
    pub status: UpdateStatus,
    /// Server-side commit time.
    pub timestamp: Timestamp,
    /// Principal that invoked the reducer.
    pub caller_identity: Identity,
    /// Connection the invocation arrived on.
    pub caller_connection_id: ConnectionId,
    /// Which reducer ran and with what arguments.
    pub reducer_call: ReducerCallInfo,
    /// Energy spent executing the reducer.
    pub energy_quanta_used: EnergyQuanta,
    /// Host-side execution time.
    pub total_host_execution_duration: TimeDuration,
}

/// Reduced-size transaction update for callers that asked for light delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdateLight {
    /// Correlates the reducer call.
    pub request_id: u32,
    /// The committed deltas.
    pub update: DatabaseUpdate,
}

/// First frame of every session; carries the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToken {
    /// The principal the server authenticated (or minted).
    pub identity: Identity,
    /// Bearer token to present on reconnection.
    pub token: String,
    /// Id of this connection.
    pub connection_id: ConnectionId,
}

/// One table of rows answering a one-off query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOffTable {
    /// Table the rows belong to.
    pub table_name: String,
    /// The result rows.
    pub rows: RowList,
}

impl AtnEncode for OneOffTable {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_str(&self.table_name)?;
        self.rows.encode(w)
    }
}

impl AtnDecode for OneOffTable {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            table_name: String::decode(r)?,
            rows: RowList::decode(r)?,
        })
    }
}

/// Response to a one-off query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOffQueryResponse {
    /// Echo of the caller-chosen message id.
    pub message_id: Vec<u8>,
    /// Planner or execution error, when the query failed.
    pub error: Option<String>,
    /// Result tables, empty on error.
    pub tables: Vec<OneOffTable>,
    /// Host-side execution time.
    pub total_host_execution_duration: TimeDuration,
}

/// Rows delivered when a single-query subscription is applied or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRows {
    /// Table the rows belong to.
    pub table_id: TableId,
    /// Table name, the key used by the client cache.
    pub table_name: String,
    /// The rows entering (or leaving) the subscription.
    pub table_rows: TableUpdate,
}

impl AtnEncode for SubscribeRows {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        self.table_id.encode(w)?;
        w.put_str(&self.table_name)?;
        self.table_rows.encode(w)
    }
}

impl AtnDecode for SubscribeRows {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            table_id: TableId::decode(r)?,
            table_name: String::decode(r)?,
            table_rows: TableUpdate::decode(r)?,
        })
    }
}

/// A single-query subscription took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeApplied {
    /// Correlates the `SubscribeSingle` request.
    pub request_id: u32,
    /// Host-side execution time in microseconds.
    pub total_host_execution_duration_micros: u64,
    /// The query set this applies to.
    pub query_id: QueryId,
    /// Initial rows of the query.
    pub rows: SubscribeRows,
}

/// A single-query subscription was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeApplied {
    /// Correlates the `Unsubscribe` request.
    pub request_id: u32,
    /// Host-side execution time in microseconds.
    pub total_host_execution_duration_micros: u64,
    /// The query set this applies to.
    pub query_id: QueryId,
    /// Rows leaving the client's view.
    pub rows: SubscribeRows,
}

/// A subscription failed, or the whole subscription set was torn down.
///
/// An absent `request_id` is the server-initiated form: every active
/// subscription on the session is invalid from this point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionError {
    /// Host-side execution time in microseconds.
    pub total_host_execution_duration_micros: u64,
    /// The failed request, absent when the server drops all subscriptions.
    pub request_id: Option<u32>,
    /// The affected query set, when known.
    pub query_id: Option<u32>,
    /// The affected table, when the failure was table-scoped.
    pub table_id: Option<u32>,
    /// Human-readable cause.
    pub error: String,
}

/// A multi-query subscription took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeMultiApplied {
    /// Correlates the `SubscribeMulti` request.
    pub request_id: u32,
    /// Host-side execution time in microseconds.
    pub total_host_execution_duration_micros: u64,
    /// The query set this applies to.
    pub query_id: QueryId,
    /// Initial rows of the query group.
    pub update: DatabaseUpdate,
}

/// A multi-query subscription was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeMultiApplied {
    /// Correlates the `UnsubscribeMulti` request.
    pub request_id: u32,
    /// Host-side execution time in microseconds.
    pub total_host_execution_duration_micros: u64,
    /// The query set this applies to.
    pub query_id: QueryId,
    /// Rows leaving the client's view.
    pub update: DatabaseUpdate,
}

/// Outcome of a procedure call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureResult {
    /// The procedure outcome.
    pub status: ProcedureStatus,
    /// Server-side completion time.
    pub timestamp: Timestamp,
    /// Correlates the `CallProcedure` request.
    pub request_id: u32,
    /// Host-side execution time.
    pub total_host_execution_duration: TimeDuration,
}

/// Every message the server can send to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Tag 0: snapshot completing a batch subscribe.
    InitialSubscription(InitialSubscription),
    /// Tag 1: full transaction update.
    TransactionUpdate(TransactionUpdate),
    /// Tag 2: light transaction update.
    TransactionUpdateLight(TransactionUpdateLight),
    /// Tag 3: session handshake; always the first frame.
    IdentityToken(IdentityToken),
    /// Tag 4: one-off query response.
    OneOffQueryResponse(OneOffQueryResponse),
    /// Tag 5: single-query subscription applied.
    SubscribeApplied(SubscribeApplied),
    /// Tag 6: single-query subscription removed.
    UnsubscribeApplied(UnsubscribeApplied),
    /// Tag 7: subscription failure or server-initiated teardown.
    SubscriptionError(SubscriptionError),
    /// Tag 8: multi-query subscription applied.
    SubscribeMultiApplied(SubscribeMultiApplied),
    /// Tag 9: multi-query subscription removed.
    UnsubscribeMultiApplied(UnsubscribeMultiApplied),
    /// Tag 10: procedure outcome.
    ProcedureResult(ProcedureResult),
}

impl AtnEncode for ServerMessage {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        match self {
            ServerMessage::InitialSubscription(m) => {
                w.put_u8(0);
                m.database_update.encode(w)?;
                w.put_u32(m.request_id);
                m.total_host_execution_duration.encode(w)
            }
            ServerMessage::TransactionUpdate(m) => {
                w.put_u8(1);
                m.status.encode(w)?;
                m.timestamp.encode(w)?;
                m.caller_identity.encode(w)?;
                m.caller_connection_id.encode(w)?;
                m.reducer_call.encode(w)?;
                m.energy_quanta_used.encode(w)?;
                m.total_host_execution_duration.encode(w)
            }
            ServerMessage::TransactionUpdateLight(m) => {
                w.put_u8(2);
                w.put_u32(m.request_id);
                m.update.encode(w)
            }
            ServerMessage::IdentityToken(m) => {
                w.put_u8(3);
                m.identity.encode(w)?;
                w.put_str(&m.token)?;
                m.connection_id.encode(w)
            }
            ServerMessage::OneOffQueryResponse(m) => {
                w.put_u8(4);
                w.put_bytes(&m.message_id)?;
                m.error.encode(w)?;
                m.tables.encode(w)?;
                m.total_host_execution_duration.encode(w)
            }
            ServerMessage::SubscribeApplied(m) => {
                w.put_u8(5);
                w.put_u32(m.request_id);
                w.put_u64(m.total_host_execution_duration_micros);
                m.query_id.encode(w)?;
                m.rows.encode(w)
            }
            ServerMessage::UnsubscribeApplied(m) => {
                w.put_u8(6);
                w.put_u32(m.request_id);
                w.put_u64(m.total_host_execution_duration_micros);
                m.query_id.encode(w)?;
                m.rows.encode(w)
            }
            ServerMessage::SubscriptionError(m) => {
                w.put_u8(7);
                w.put_u64(m.total_host_execution_duration_micros);
                m.request_id.encode(w)?;
                m.query_id.encode(w)?;
                m.table_id.encode(w)?;
                w.put_str(&m.error)
            }
            ServerMessage::SubscribeMultiApplied(m) => {
                w.put_u8(8);
                w.put_u32(m.request_id);
                w.put_u64(m.total_host_execution_duration_micros);
                m.query_id.encode(w)?;
                m.update.encode(w)
            }
            ServerMessage::UnsubscribeMultiApplied(m) => {
                w.put_u8(9);
                w.put_u32(m.request_id);
                w.put_u64(m.total_host_execution_duration_micros);
                m.query_id.encode(w)?;
                m.update.encode(w)
            }
            ServerMessage::ProcedureResult(m) => {
                w.put_u8(10);
                m.status.encode(w)?;
                m.timestamp.encode(w)?;
                w.put_u32(m.request_id);
                m.total_host_execution_duration.encode(w)
            }
        }
    }
}

impl AtnDecode for ServerMessage {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(ServerMessage::InitialSubscription(InitialSubscription {
                database_update: DatabaseUpdate::decode(r)?,
                request_id: r.get_u32()?,
                total_host_execution_duration: TimeDuration::decode(r)?,
            })),
            1 => Ok(ServerMessage::TransactionUpdate(TransactionUpdate {
                status: UpdateStatus::decode(r)?,
                timestamp: Timestamp::decode(r)?,
                caller_identity: Identity::decode(r)?,
                caller_connection_id: ConnectionId::decode(r)?,
                reducer_call: ReducerCallInfo::decode(r)?,
                energy_quanta_used: EnergyQuanta::decode(r)?,
                total_host_execution_duration: TimeDuration::decode(r)?,
            })),
            2 => Ok(ServerMessage::TransactionUpdateLight(TransactionUpdateLight {
                request_id: r.get_u32()?,
                update: DatabaseUpdate::decode(r)?,
            })),
            3 => Ok(ServerMessage::IdentityToken(IdentityToken {
                identity: Identity::decode(r)?,
                token: String::decode(r)?,
                connection_id: ConnectionId::decode(r)?,
            })),
            4 => Ok(ServerMessage::OneOffQueryResponse(OneOffQueryResponse {
                message_id: r.get_bytes()?.to_vec(),
                error: Option::decode(r)?,
                tables: Vec::decode(r)?,
                total_host_execution_duration: TimeDuration::decode(r)?,
            })),
            5 => Ok(ServerMessage::SubscribeApplied(SubscribeApplied {
                request_id: r.get_u32()?,
                total_host_execution_duration_micros: r.get_u64()?,
                query_id: QueryId::decode(r)?,
                rows: SubscribeRows::decode(r)?,
            })),
            6 => Ok(ServerMessage::UnsubscribeApplied(UnsubscribeApplied {
                request_id: r.get_u32()?,
                total_host_execution_duration_micros: r.get_u64()?,
                query_id: QueryId::decode(r)?,
                rows: SubscribeRows::decode(r)?,
            })),
            7 => Ok(ServerMessage::SubscriptionError(SubscriptionError {
                total_host_execution_duration_micros: r.get_u64()?,
                request_id: Option::decode(r)?,
                query_id: Option::decode(r)?,
                table_id: Option::decode(r)?,
                error: String::decode(r)?,
            })),
            8 => Ok(ServerMessage::SubscribeMultiApplied(SubscribeMultiApplied {
                request_id: r.get_u32()?,
                total_host_execution_duration_micros: r.get_u64()?,
                query_id: QueryId::decode(r)?,
                update: DatabaseUpdate::decode(r)?,
            })),
            9 => Ok(ServerMessage::UnsubscribeMultiApplied(UnsubscribeMultiApplied {
                request_id: r.get_u32()?,
                total_host_execution_duration_micros: r.get_u64()?,
                query_id: QueryId::decode(r)?,
                update: DatabaseUpdate::decode(r)?,
            })),
            10 => Ok(ServerMessage::ProcedureResult(ProcedureResult {
                status: ProcedureStatus::decode(r)?,
                timestamp: Timestamp::decode(r)?,
                request_id: r.get_u32()?,
                total_host_execution_duration: TimeDuration::decode(r)?,
            })),
            tag => Err(DecodeError::InvalidEnumTag {
                tag,
                ty: "ServerMessage",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress;
    use crate::compress::Compression;
    use crate::row_list::RowList;
    use crate::update::CompressableQueryUpdate;
    use crate::update::QueryUpdate;

    fn sample_identity() -> Identity {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xC2;
        bytes[31] = 0x03;
        Identity::from_bytes_le(bytes)
    }

    fn all_variants() -> Vec<ServerMessage> {
        let database_update = DatabaseUpdate {
            tables: vec![TableUpdate {
                table_id: TableId(1),
                table_name: "t".to_string(),
                num_rows: 1,
                updates: vec![CompressableQueryUpdate::Uncompressed(QueryUpdate {
                    deletes: RowList::empty(),
                    inserts: RowList::from_fixed_size(4, vec![1, 0, 0, 0]),
                })],
            }],
        };
        vec![
            ServerMessage::InitialSubscription(InitialSubscription {
                database_update: database_update.clone(),
                request_id: 1,
                total_host_execution_duration: TimeDuration::ZERO,
            }),
            ServerMessage::TransactionUpdate(TransactionUpdate {
                status: UpdateStatus::Committed(database_update.clone()),
                timestamp: Timestamp::from_micros_since_epoch(1_700_000_000_000_000),
                caller_identity: sample_identity(),
                caller_connection_id: ConnectionId::from_u64(123),
                reducer_call: ReducerCallInfo {
                    reducer_name: "add".to_string(),
                    reducer_id: 0,
                    args: vec![],
                    request_id: 7,
                },
                energy_quanta_used: EnergyQuanta { quanta: 55 },
                total_host_execution_duration: TimeDuration::from_micros(10),
            }),
            ServerMessage::TransactionUpdateLight(TransactionUpdateLight {
                request_id: 9,
                update: database_update.clone(),
            }),
            ServerMessage::IdentityToken(IdentityToken {
                identity: sample_identity(),
                token: "T".to_string(),
                connection_id: ConnectionId::from_u64(123),
            }),
            ServerMessage::OneOffQueryResponse(OneOffQueryResponse {
                message_id: vec![1, 2],
                error: None,
                tables: vec![OneOffTable {
                    table_name: "t".to_string(),
                    rows: RowList::from_rows(&[&[1u8][..]]),
                }],
                total_host_execution_duration: TimeDuration::ZERO,
            }),
            ServerMessage::SubscribeApplied(SubscribeApplied {
                request_id: 2,
                total_host_execution_duration_micros: 5,
                query_id: QueryId(1),
                rows: SubscribeRows {
                    table_id: TableId(1),
                    table_name: "t".to_string(),
                    table_rows: database_update.tables[0].clone(),
                },
            }),
            ServerMessage::UnsubscribeApplied(UnsubscribeApplied {
                request_id: 3,
                total_host_execution_duration_micros: 5,
                query_id: QueryId(1),
                rows: SubscribeRows {
                    table_id: TableId(1),
                    table_name: "t".to_string(),
                    table_rows: database_update.tables[0].clone(),
                },
            }),
            ServerMessage::SubscriptionError(SubscriptionError {
                total_host_execution_duration_micros: 0,
                request_id: None,
                query_id: Some(4),
                table_id: None,
                error: "fatal".to_string(),
            }),
            ServerMessage::SubscribeMultiApplied(SubscribeMultiApplied {
                request_id: 4,
                total_host_execution_duration_micros: 6,
                query_id: QueryId(2),
                update: database_update.clone(),
            }),
            ServerMessage::UnsubscribeMultiApplied(UnsubscribeMultiApplied {
                request_id: 5,
                total_host_execution_duration_micros: 6,
                query_id: QueryId(2),
                update: database_update,
            }),
            ServerMessage::ProcedureResult(ProcedureResult {
                status: ProcedureStatus::Returned(vec![42]),
                timestamp: Timestamp::from_micros_since_epoch(1),
                request_id: 6,
                total_host_execution_duration: TimeDuration::from_nanos(100),
            }),
        ]
    }

    #[test]
    fn every_variant_roundtrips() {
        for message in all_variants() {
            let bytes = message.to_atn_vec().unwrap();
            assert_eq!(ServerMessage::from_atn_slice(&bytes).unwrap(), message, "variant {bytes:?}");
        }
    }

    #[test]
    fn every_variant_roundtrips_through_every_compression() {
        for message in all_variants() {
            let raw = message.to_atn_vec().unwrap();
            for compression in Compression::ALL {
                let frame = compress::compress_frame(&raw, compression).unwrap();
                let unpacked = compress::decompress_frame(&frame).unwrap();
                assert_eq!(ServerMessage::from_atn_slice(&unpacked).unwrap(), message);
            }
        }
    }

    #[test]
    fn identity_token_layout_is_stable() {
        let message = ServerMessage::IdentityToken(IdentityToken {
            identity: Identity::ZERO,
            token: "T".to_string(),
            connection_id: ConnectionId::from_u64(1),
        });
        let bytes = message.to_atn_vec().unwrap();
        assert_eq!(bytes[0], 3);
        assert_eq!(bytes.len(), 1 + 32 + 4 + 1 + 8);
        assert_eq!(&bytes[33..38], &[1, 0, 0, 0, b'T']);
    }

    #[test]
    fn unknown_tag_is_a_typed_error() {
        let err = ServerMessage::from_atn_slice(&[11]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEnumTag { tag: 11, ty: "ServerMessage" }));
    }

    #[test]
    fn truncated_transaction_update_fails_cleanly() {
        let message = all_variants().remove(1);
        let bytes = message.to_atn_vec().unwrap();
        let err = ServerMessage::from_atn_slice(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEndOfData { .. }));
    }
}
