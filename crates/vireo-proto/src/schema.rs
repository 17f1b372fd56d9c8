//! Module schema descriptor types.
//!
//! The host serves a JSON module descriptor at
//! `/v1/database/<module>/schema?version=9` with three top-level keys:
//! `typespace`, `tables`, and `reducers`. The runtime client never fetches
//! it; these types exist for the external code generator and for tests
//! that fabricate schemas. The enums here are closed sums on the wire and
//! in JSON alike.

use serde::Deserialize;
use serde::Serialize;
use vireo_atn::AtnDecode;
use vireo_atn::AtnEncode;
use vireo_atn::DecodeError;
use vireo_atn::EncodeError;
use vireo_atn::Reader;
use vireo_atn::TimeDuration;
use vireo_atn::Timestamp;
use vireo_atn::Writer;

/// Complete module descriptor as served by the schema endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDef {
    /// Type definitions referenced by tables and reducers; interpreted by
    /// the generator, carried opaquely here.
    pub typespace: serde_json::Value,
    /// Table definitions.
    pub tables: Vec<TableDef>,
    /// Reducer definitions.
    pub reducers: Vec<ReducerDef>,
}

/// One table of the module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Index of the row product type within the typespace.
    pub product_type_ref: u32,
    /// Column positions forming the primary key, empty when keyless.
    #[serde(default)]
    pub primary_key: Vec<u16>,
    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
    /// Column constraints.
    #[serde(default)]
    pub constraints: Vec<ConstraintDef>,
    /// Whether the table is system- or user-defined.
    pub table_type: TableType,
    /// Row visibility to other identities.
    pub table_access: TableAccess,
}

/// A secondary index on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed column positions.
    pub columns: Vec<u16>,
    /// Index structure.
    pub index_type: IndexType,
}

/// A constraint on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDef {
    /// Constraint name.
    pub name: String,
    /// Constrained column positions.
    pub columns: Vec<u16>,
    /// Constraint kind.
    pub constraint_type: ConstraintType,
}

/// One reducer of the module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerDef {
    /// Reducer name.
    pub name: String,
    /// Parameter product type; interpreted by the generator.
    pub params: serde_json::Value,
    /// Lifecycle hook binding, absent for ordinary reducers.
    #[serde(default)]
    pub lifecycle: Option<ReducerLifecycle>,
}

/// Index structures the host supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// Ordered B-tree index.
    BTree,
    /// Hash index.
    Hash,
    /// Direct (dense integer key) index.
    Direct,
}

/// Constraint kinds the host supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    /// Values must be unique across rows.
    Unique,
}

/// Whether a table is maintained by the host or by the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    /// Host-maintained system table.
    System,
    /// Module-defined table.
    User,
}

/// Row visibility of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableAccess {
    /// Rows are visible to every identity.
    Public,
    /// Rows are visible only to their owner and the module.
    Private,
}

/// Lifecycle hooks a reducer can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReducerLifecycle {
    /// Runs once when the module is first published.
    Init,
    /// Runs when a client connects.
    OnConnect,
    /// Runs when a client disconnects.
    OnDisconnect,
}

/// Schedule column value for scheduled-reducer tables.
///
/// Unlike the other schema enums this one also appears inside row bytes,
/// so it carries an ATN form: tag 0 is an interval, tag 1 an absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOption {
    /// Fire repeatedly with this period.
    Interval(TimeDuration),
    /// Fire once at this time.
    At(Timestamp),
}

impl AtnEncode for ScheduleOption {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        match self {
            ScheduleOption::Interval(duration) => {
                w.put_u8(0);
                duration.encode(w)
            }
            ScheduleOption::At(timestamp) => {
                w.put_u8(1);
                timestamp.encode(w)
            }
        }
    }
}

impl AtnDecode for ScheduleOption {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(ScheduleOption::Interval(TimeDuration::decode(r)?)),
            1 => Ok(ScheduleOption::At(Timestamp::decode(r)?)),
            tag => Err(DecodeError::InvalidEnumTag {
                tag,
                ty: "ScheduleOption",
            }),
        }
    }
}

/// Build the schema endpoint path for a module.
pub fn schema_path(module: &str) -> String {
    format!("/v1/database/{module}/schema?version=9")
}
