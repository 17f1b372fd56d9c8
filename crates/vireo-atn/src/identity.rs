//! Principal and session identifiers.
//!
//! An [`Identity`] is a 256-bit opaque principal. On the wire it travels as
//! 32 little-endian bytes; in logs, URLs, and tokens it is rendered as 64
//! big-endian hex characters. The two orderings round-trip losslessly.

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::reader::Reader;
use crate::ser::AtnDecode;
use crate::ser::AtnEncode;
use crate::u256::U256;
use crate::writer::Writer;
use snafu::ResultExt;
use snafu::Snafu;

/// Errors parsing an identity from its hex display form.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParseIdentityError {
    /// The string was not exactly 64 hex characters.
    #[snafu(display("identity hex must be 64 characters, got {len}"))]
    InvalidLength {
        /// Length of the rejected input.
        len: usize,
    },

    /// The string contained a non-hex character.
    #[snafu(display("identity hex is malformed: {source}"))]
    InvalidHex {
        /// Underlying hex error.
        source: hex::FromHexError,
    },
}

/// 256-bit opaque principal identifier.
///
/// Stored in wire order (little-endian). Display and `FromStr` use the
/// big-endian 64-character hex form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Identity {
    bytes_le: [u8; 32],
}

impl Identity {
    /// The all-zero identity, used before the server has issued one.
    pub const ZERO: Self = Self { bytes_le: [0u8; 32] };

    /// Build from 32 wire-order (little-endian) bytes.
    pub const fn from_bytes_le(bytes_le: [u8; 32]) -> Self {
        Self { bytes_le }
    }

    /// The 32 wire-order bytes.
    pub const fn to_bytes_le(self) -> [u8; 32] {
        self.bytes_le
    }

    /// Build from 32 display-order (big-endian) bytes.
    pub fn from_bytes_be(bytes_be: [u8; 32]) -> Self {
        let mut bytes_le = bytes_be;
        bytes_le.reverse();
        Self { bytes_le }
    }

    /// The 32 display-order bytes.
    pub fn to_bytes_be(self) -> [u8; 32] {
        let mut bytes_be = self.bytes_le;
        bytes_be.reverse();
        bytes_be
    }

    /// Parse the 64-character big-endian hex form.
    pub fn from_hex(hex_str: &str) -> Result<Self, ParseIdentityError> {
        if hex_str.len() != 64 {
            return Err(ParseIdentityError::InvalidLength { len: hex_str.len() });
        }
        let mut bytes_be = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes_be).context(InvalidHexSnafu)?;
        Ok(Self::from_bytes_be(bytes_be))
    }

    /// The 64-character big-endian hex form.
    pub fn to_hex(self) -> String {
        hex::encode(self.to_bytes_be())
    }

    /// View as a 256-bit integer.
    pub fn to_u256(self) -> U256 {
        U256::from_le_bytes(self.bytes_le)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity({})", self.to_hex())
    }
}

impl std::str::FromStr for Identity {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AtnEncode for Identity {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_raw(&self.bytes_le);
        Ok(())
    }
}

impl AtnDecode for Identity {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let slice = r.take(32)?;
        let mut bytes_le = [0u8; 32];
        bytes_le.copy_from_slice(slice);
        Ok(Self { bytes_le })
    }
}

impl serde::Serialize for Identity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Identity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        Self::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}

/// 64-bit session-scoped connection identifier.
///
/// Wire form is 8 little-endian bytes; display form is 16 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// The zero id, used before the server has assigned one.
    pub const ZERO: Self = Self(0);

    /// Build from the raw 64-bit value.
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// The raw 64-bit value.
    pub const fn to_u64(self) -> u64 {
        self.0
    }

    /// Build from 8 wire-order (little-endian) bytes.
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// The 8 wire-order bytes.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl AtnEncode for ConnectionId {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_u64(self.0);
        Ok(())
    }
}

impl AtnDecode for ConnectionId {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self(r.get_u64()?))
    }
}

impl serde::Serialize for ConnectionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ConnectionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(&hex_str, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}
