//! Client runtime for Vireo real-time databases.
//!
//! Maintains one persistent binary WebSocket session per database module:
//! applications subscribe to SQL queries, receive an initial snapshot plus
//! row-level deltas into a coherent local cache, and invoke server-side
//! reducers whose effects flow back as deltas.
//!
//! # Key Components
//!
//! - [`DbConnection`]: clonable handle onto one session; connect,
//!   subscribe, call reducers, disconnect
//! - [`DbConnectionBuilder`]: target, credentials, tuning, callbacks
//! - [`ClientCache`]: per-table keyed row storage with change events
//! - [`PrimaryKeyExtractor`]: pure row-bytes to key-bytes function,
//!   registered per table by generated bindings
//! - [`ClientError`]: the complete user-visible error taxonomy
//!
//! # Concurrency
//!
//! One spawned session task is the single logical writer: frames are
//! processed in arrival order and all cache mutation and observer dispatch
//! for a frame completes before the next frame. Observer callbacks run
//! synchronously on the ingest task and must not call back into blocking
//! connection APIs.

mod backoff;
mod cache;
mod config;
mod connection;
mod error;
mod events;
mod metrics;
mod pending;
mod pk;
mod session;
mod socket;
mod subscription;
mod table;

pub use backoff::delay_for_attempt;
pub use cache::CacheStats;
pub use cache::ClientCache;
pub use cache::PrimaryKey;
pub use cache::TableCache;
pub use config::ConnectionConfig;
pub use config::DEFAULT_CONNECTION_TIMEOUT;
pub use config::DEFAULT_MAX_FRAME_SIZE;
pub use config::DEFAULT_MAX_RECONNECT_ATTEMPTS;
pub use config::DEFAULT_MAX_RECONNECT_DELAY;
pub use config::DEFAULT_PING_INTERVAL;
pub use config::DEFAULT_RECONNECT_DELAY;
pub use config::DEFAULT_REDUCER_CALL_TIMEOUT;
pub use connection::DbConnection;
pub use connection::DbConnectionBuilder;
pub use error::ClientError;
pub use error::Result;
pub use events::EventKind;
pub use events::ObserverHandle;
pub use events::Row;
pub use events::RowEvent;
pub use metrics::SessionStats;
pub use pending::ProcedureOutcome;
pub use pending::ReducerOutcome;
pub use pk::PrimaryKeyExtractor;
pub use session::ConnectionState;
pub use socket::session_url;
pub use subscription::SubscriptionHandle;
pub use subscription::SubscriptionKind;
pub use table::TableHandle;
// Protocol types that appear in the public API surface.
pub use vireo_proto::CallReducerFlags;
pub use vireo_proto::OneOffQueryResponse;
pub use vireo_proto::OneOffTable;
pub use vireo_proto::QueryId;
pub use vireo_proto::TableId;
