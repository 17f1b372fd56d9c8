//! Algebraic Type Notation (ATN) binary codec.
//!
//! ATN is the schema-agnostic wire encoding used between Vireo clients and
//! the database host. Values are encoded positionally: products are the
//! concatenation of their fields, sums are a `u8` tag plus payload, and
//! containers carry a `u32` length prefix. All integers are little-endian.
//!
//! The codec itself knows nothing about schemas. Generated table and
//! reducer bindings (or the protocol crate) supply structure by calling
//! primitive operations in order through the [`AtnEncode`] and
//! [`AtnDecode`] traits.
//!
//! # Key Components
//!
//! - [`Writer`]: streaming encoder over a growable buffer
//! - [`Reader`]: streaming decoder over a borrowed slice with a cursor
//! - [`AtnEncode`] / [`AtnDecode`]: trait pair implemented by every wire type
//! - [`Identity`], [`ConnectionId`], [`Timestamp`], [`TimeDuration`],
//!   [`U256`]: primitive wire value types
//! - [`AlgebraicType`] / [`AlgebraicValue`]: the runtime-typespace path,
//!   decoding the same bytes into dynamic value trees for tooling

mod error;
mod identity;
mod reader;
mod ser;
mod time;
mod u256;
mod value;
mod writer;

pub use error::DecodeError;
pub use error::EncodeError;
pub use identity::ConnectionId;
pub use identity::Identity;
pub use identity::ParseIdentityError;
pub use reader::Reader;
pub use ser::AtnDecode;
pub use ser::AtnEncode;
pub use time::TimeDuration;
pub use time::Timestamp;
pub use u256::U256;
pub use value::AlgebraicType;
pub use value::AlgebraicValue;
pub use value::ProductField;
pub use value::SumVariant;
pub use writer::Writer;
