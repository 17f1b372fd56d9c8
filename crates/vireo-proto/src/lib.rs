//! Wire protocol for Vireo sessions.
//!
//! Defines the closed message sums exchanged over a session's WebSocket,
//! the packed row lists they carry, and the frame/row-delta compression
//! layer. Everything here is a value type: the session manager in
//! `vireo-client` owns the socket and the state; this crate only encodes,
//! decodes, and (de)compresses.
//!
//! # Framing
//!
//! - Inbound: `[u8 compression tag][possibly compressed ATN server message]`
//! - Server message body: `[u8 variant tag][variant fields]`
//! - Row delta payload: deletes then inserts, each
//!   `[RowSizeHint][u32 bytes-length][bytes]`
//!
//! Outbound client messages are sent uncompressed.

mod client;
mod compress;
mod ids;
mod row_list;
mod server;
mod update;

pub mod schema;

pub use client::CallReducerFlags;
pub use client::ClientMessage;
pub use compress::Compression;
pub use compress::CompressionError;
pub use compress::compress_brotli;
pub use compress::compress_frame;
pub use compress::compress_gzip;
pub use compress::decompress_brotli;
pub use compress::decompress_frame;
pub use compress::decompress_gzip;
pub use compress::decompress_zlib;
pub use ids::QueryId;
pub use ids::TableId;
pub use row_list::RowList;
pub use row_list::RowListIter;
pub use row_list::RowSizeHint;
pub use server::IdentityToken;
pub use server::InitialSubscription;
pub use server::OneOffQueryResponse;
pub use server::OneOffTable;
pub use server::ProcedureResult;
pub use server::ServerMessage;
pub use server::SubscribeApplied;
pub use server::SubscribeMultiApplied;
pub use server::SubscribeRows;
pub use server::SubscriptionError;
pub use server::TransactionUpdate;
pub use server::TransactionUpdateLight;
pub use server::UnsubscribeApplied;
pub use server::UnsubscribeMultiApplied;
pub use update::CompressableQueryUpdate;
pub use update::DatabaseUpdate;
pub use update::EnergyQuanta;
pub use update::ProcedureStatus;
pub use update::QueryUpdate;
pub use update::QueryUpdateError;
pub use update::ReducerCallInfo;
pub use update::TableUpdate;
pub use update::UpdateStatus;

/// WebSocket subprotocol advertised during the upgrade handshake.
pub const BIN_PROTOCOL: &str = "v1.atn.vireo";
