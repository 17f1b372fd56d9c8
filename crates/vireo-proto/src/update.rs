//! Row deltas and transaction update payloads.
//!
//! A query update is the `(deletes, inserts)` pair of row lists for one
//! query, possibly carried compressed. Table updates group query updates
//! per table; a database update is the ordered list of table updates a
//! transaction produced, applied atomically by the cache.

use crate::compress;
use crate::compress::CompressionError;
use crate::ids::TableId;
use crate::row_list::RowList;
use snafu::Snafu;
use vireo_atn::AtnDecode;
use vireo_atn::AtnEncode;
use vireo_atn::DecodeError;
use vireo_atn::EncodeError;
use vireo_atn::Reader;
use vireo_atn::Writer;

/// The `(deletes, inserts)` row lists for one query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryUpdate {
    /// Rows that left the query's result set.
    pub deletes: RowList,
    /// Rows that entered the query's result set.
    pub inserts: RowList,
}

impl AtnEncode for QueryUpdate {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        self.deletes.encode(w)?;
        self.inserts.encode(w)
    }
}

impl AtnDecode for QueryUpdate {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            deletes: RowList::decode(r)?,
            inserts: RowList::decode(r)?,
        })
    }
}

/// Failure to unpack a [`CompressableQueryUpdate`] into a [`QueryUpdate`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueryUpdateError {
    /// The compressed payload would not decompress.
    #[snafu(display("query update decompression failed: {source}"))]
    Decompress {
        /// Underlying compression error.
        source: CompressionError,
    },

    /// The decompressed payload was not a valid query update.
    #[snafu(display("query update decode failed: {source}"))]
    Decode {
        /// Underlying decode error.
        source: DecodeError,
    },
}

/// A query update, possibly compressed at the ATN level.
///
/// The compressed variants hold the compressed bytes of an ATN-encoded
/// [`QueryUpdate`]; [`CompressableQueryUpdate::into_query_update`] unpacks
/// either form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressableQueryUpdate {
    /// Tag 0: the update inline.
    Uncompressed(QueryUpdate),
    /// Tag 1: brotli-compressed update bytes.
    Brotli(Vec<u8>),
    /// Tag 2: gzip-compressed update bytes.
    Gzip(Vec<u8>),
}

impl CompressableQueryUpdate {
    /// Unpack into a plain [`QueryUpdate`], decompressing when necessary.
    pub fn into_query_update(self) -> Result<QueryUpdate, QueryUpdateError> {
        match self {
            CompressableQueryUpdate::Uncompressed(update) => Ok(update),
            CompressableQueryUpdate::Brotli(bytes) => {
                let raw = compress::decompress_brotli(&bytes).map_err(|source| QueryUpdateError::Decompress { source })?;
                QueryUpdate::from_atn_slice(&raw).map_err(|source| QueryUpdateError::Decode { source })
            }
            CompressableQueryUpdate::Gzip(bytes) => {
                let raw = compress::decompress_gzip(&bytes).map_err(|source| QueryUpdateError::Decompress { source })?;
                QueryUpdate::from_atn_slice(&raw).map_err(|source| QueryUpdateError::Decode { source })
            }
        }
    }
}

impl AtnEncode for CompressableQueryUpdate {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        match self {
            CompressableQueryUpdate::Uncompressed(update) => {
                w.put_u8(0);
                update.encode(w)
            }
            CompressableQueryUpdate::Brotli(bytes) => {
                w.put_u8(1);
                w.put_bytes(bytes)
            }
            CompressableQueryUpdate::Gzip(bytes) => {
                w.put_u8(2);
                w.put_bytes(bytes)
            }
        }
    }
}

impl AtnDecode for CompressableQueryUpdate {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(CompressableQueryUpdate::Uncompressed(QueryUpdate::decode(r)?)),
            1 => Ok(CompressableQueryUpdate::Brotli(r.get_bytes()?.to_vec())),
            2 => Ok(CompressableQueryUpdate::Gzip(r.get_bytes()?.to_vec())),
            tag => Err(DecodeError::InvalidEnumTag {
                tag,
                ty: "CompressableQueryUpdate",
            }),
        }
    }
}

/// All deltas a transaction produced for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUpdate {
    /// Server-assigned table id.
    pub table_id: TableId,
    /// Table name, the key used by the client cache.
    pub table_name: String,
    /// Server-side row-count hint; not authoritative for the cache.
    pub num_rows: u64,
    /// One entry per query touching this table.
    pub updates: Vec<CompressableQueryUpdate>,
}

impl AtnEncode for TableUpdate {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        self.table_id.encode(w)?;
        w.put_str(&self.table_name)?;
        w.put_u64(self.num_rows);
        self.updates.encode(w)
    }
}

impl AtnDecode for TableUpdate {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            table_id: TableId::decode(r)?,
            table_name: String::decode(r)?,
            num_rows: r.get_u64()?,
            updates: Vec::decode(r)?,
        })
    }
}

/// The ordered table updates of one committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatabaseUpdate {
    /// Updates in server commit order.
    pub tables: Vec<TableUpdate>,
}

impl DatabaseUpdate {
    /// An update carrying no table changes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any table is touched.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl AtnEncode for DatabaseUpdate {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        self.tables.encode(w)
    }
}

impl AtnDecode for DatabaseUpdate {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            tables: Vec::decode(r)?,
        })
    }
}

/// Energy accounting value attached to reducer executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EnergyQuanta {
    /// Quanta consumed by the call.
    pub quanta: u128,
}

impl AtnEncode for EnergyQuanta {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_u128(self.quanta);
        Ok(())
    }
}

impl AtnDecode for EnergyQuanta {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { quanta: r.get_u128()? })
    }
}

/// Outcome of a reducer transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Tag 0: committed, with the resulting deltas.
    Committed(DatabaseUpdate),
    /// Tag 1: rejected by the reducer, with its message.
    Failed(String),
    /// Tag 2: aborted because the energy budget ran out.
    OutOfEnergy,
}

impl AtnEncode for UpdateStatus {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        match self {
            UpdateStatus::Committed(update) => {
                w.put_u8(0);
                update.encode(w)
            }
            UpdateStatus::Failed(message) => {
                w.put_u8(1);
                w.put_str(message)
            }
            UpdateStatus::OutOfEnergy => {
                w.put_u8(2);
                Ok(())
            }
        }
    }
}

impl AtnDecode for UpdateStatus {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(UpdateStatus::Committed(DatabaseUpdate::decode(r)?)),
            1 => Ok(UpdateStatus::Failed(String::decode(r)?)),
            2 => Ok(UpdateStatus::OutOfEnergy),
            tag => Err(DecodeError::InvalidEnumTag {
                tag,
                ty: "UpdateStatus",
            }),
        }
    }
}

/// Outcome of a procedure call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureStatus {
    /// Tag 0: the procedure returned a value, ATN-encoded.
    Returned(Vec<u8>),
    /// Tag 1: the host failed to run the procedure.
    InternalError(String),
    /// Tag 2: aborted because the energy budget ran out.
    OutOfEnergy,
}

impl AtnEncode for ProcedureStatus {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        match self {
            ProcedureStatus::Returned(bytes) => {
                w.put_u8(0);
                w.put_bytes(bytes)
            }
            ProcedureStatus::InternalError(message) => {
                w.put_u8(1);
                w.put_str(message)
            }
            ProcedureStatus::OutOfEnergy => {
                w.put_u8(2);
                Ok(())
            }
        }
    }
}

impl AtnDecode for ProcedureStatus {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(ProcedureStatus::Returned(r.get_bytes()?.to_vec())),
            1 => Ok(ProcedureStatus::InternalError(String::decode(r)?)),
            2 => Ok(ProcedureStatus::OutOfEnergy),
            tag => Err(DecodeError::InvalidEnumTag {
                tag,
                ty: "ProcedureStatus",
            }),
        }
    }
}

/// Identifies the reducer invocation a transaction update reports on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReducerCallInfo {
    /// Reducer name as registered in the module.
    pub reducer_name: String,
    /// Numeric reducer id within the module.
    pub reducer_id: u32,
    /// ATN-encoded argument product.
    pub args: Vec<u8>,
    /// The caller's request id, zero when the caller was another client.
    pub request_id: u32,
}

impl AtnEncode for ReducerCallInfo {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_str(&self.reducer_name)?;
        w.put_u32(self.reducer_id);
        w.put_bytes(&self.args)?;
        w.put_u32(self.request_id);
        Ok(())
    }
}

impl AtnDecode for ReducerCallInfo {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            reducer_name: String::decode(r)?,
            reducer_id: r.get_u32()?,
            args: r.get_bytes()?.to_vec(),
            request_id: r.get_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table_update() -> TableUpdate {
        TableUpdate {
            table_id: TableId(1),
            table_name: "t".to_string(),
            num_rows: 1,
            updates: vec![CompressableQueryUpdate::Uncompressed(QueryUpdate {
                deletes: RowList::empty(),
                inserts: RowList::from_fixed_size(4, vec![1, 0, 0, 0]),
            })],
        }
    }

    #[test]
    fn database_update_roundtrip() {
        let update = DatabaseUpdate {
            tables: vec![sample_table_update()],
        };
        let bytes = update.to_atn_vec().unwrap();
        assert_eq!(DatabaseUpdate::from_atn_slice(&bytes).unwrap(), update);
    }

    #[test]
    fn update_status_roundtrip_all_variants() {
        for status in [
            UpdateStatus::Committed(DatabaseUpdate::empty()),
            UpdateStatus::Failed("nope".to_string()),
            UpdateStatus::OutOfEnergy,
        ] {
            let bytes = status.to_atn_vec().unwrap();
            assert_eq!(UpdateStatus::from_atn_slice(&bytes).unwrap(), status);
        }
    }

    #[test]
    fn update_status_unknown_tag() {
        let err = UpdateStatus::from_atn_slice(&[3]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEnumTag { tag: 3, ty: "UpdateStatus" }));
    }

    #[test]
    fn compressed_query_update_unpacks_brotli() {
        let update = QueryUpdate {
            deletes: RowList::from_rows(&[&[9u8, 9][..]]),
            inserts: RowList::from_rows(&[&[1u8, 2, 3][..]]),
        };
        let raw = update.to_atn_vec().unwrap();
        let packed = CompressableQueryUpdate::Brotli(crate::compress::compress_brotli(&raw).unwrap());
        assert_eq!(packed.into_query_update().unwrap(), update);
    }

    #[test]
    fn compressed_query_update_unpacks_gzip() {
        let update = QueryUpdate {
            deletes: RowList::empty(),
            inserts: RowList::from_fixed_size(2, vec![5, 6, 7, 8]),
        };
        let raw = update.to_atn_vec().unwrap();
        let packed = CompressableQueryUpdate::Gzip(crate::compress::compress_gzip(&raw).unwrap());
        assert_eq!(packed.into_query_update().unwrap(), update);
    }

    #[test]
    fn corrupt_compressed_update_reports_decompress_failure() {
        let packed = CompressableQueryUpdate::Gzip(vec![0xFF; 8]);
        let err = packed.into_query_update().unwrap_err();
        assert!(matches!(err, QueryUpdateError::Decompress { .. }));
    }

    #[test]
    fn reducer_call_info_roundtrip() {
        let info = ReducerCallInfo {
            reducer_name: "add".to_string(),
            reducer_id: 3,
            args: vec![1, 2],
            request_id: 7,
        };
        let bytes = info.to_atn_vec().unwrap();
        assert_eq!(ReducerCallInfo::from_atn_slice(&bytes).unwrap(), info);
    }
}
