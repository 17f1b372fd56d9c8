//! Client SDK for Vireo real-time relational databases.
//!
//! Vireo delivers row-level subscription updates over a persistent binary
//! WebSocket session: subscribe to SQL queries, receive an initial
//! snapshot plus deltas into a local row cache, and invoke server-side
//! reducers whose effects flow back as deltas.
//!
//! This crate is a facade over the runtime pieces:
//!
//! - [`atn`]: the Algebraic Type Notation binary codec and primitive wire
//!   types
//! - [`proto`]: the wire-protocol message set, row lists, and frame
//!   compression
//! - [`client`]: the session manager, row cache, and connection builder
//!
//! The most common entry points are re-exported at the root.
//!
//! # Example
//!
//! ```rust,ignore
//! use vireo::DbConnection;
//!
//! #[tokio::main]
//! async fn main() -> vireo::Result<()> {
//!     let conn = DbConnection::builder()
//!         .with_uri("ws://localhost:3000")
//!         .with_module_name("chat")
//!         .build()
//!         .await?;
//!
//!     conn.cache().on_insert("message", |event| {
//!         println!("new row: {event:?}");
//!     });
//!     conn.subscribe(vec!["SELECT * FROM message".to_string()]).await?;
//!     conn.call_reducer("send_message", args, Default::default()).await?;
//!     Ok(())
//! }
//! ```

pub use vireo_atn as atn;
pub use vireo_client as client;
pub use vireo_proto as proto;

pub use vireo_atn::ConnectionId;
pub use vireo_atn::Identity;
pub use vireo_atn::TimeDuration;
pub use vireo_atn::Timestamp;
pub use vireo_client::CallReducerFlags;
pub use vireo_client::ClientCache;
pub use vireo_client::ClientError;
pub use vireo_client::ConnectionConfig;
pub use vireo_client::ConnectionState;
pub use vireo_client::DbConnection;
pub use vireo_client::DbConnectionBuilder;
pub use vireo_client::PrimaryKeyExtractor;
pub use vireo_client::Result;
pub use vireo_client::RowEvent;
pub use vireo_client::SubscriptionHandle;
