//! Session-scoped opaque identifiers.

use vireo_atn::AtnDecode;
use vireo_atn::AtnEncode;
use vireo_atn::DecodeError;
use vireo_atn::EncodeError;
use vireo_atn::Reader;
use vireo_atn::Writer;

/// Server-assigned table identifier, scoped to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TableId(pub u32);

impl AtnEncode for TableId {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_u32(self.0);
        Ok(())
    }
}

impl AtnDecode for TableId {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self(r.get_u32()?))
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-allocated query set identifier for single and multi subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub u32);

impl AtnEncode for QueryId {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_u32(self.0);
        Ok(())
    }
}

impl AtnDecode for QueryId {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self(r.get_u32()?))
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
