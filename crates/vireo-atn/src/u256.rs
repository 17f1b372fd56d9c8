//! Fixed-width 256-bit unsigned integer.
//!
//! Wire form is 32 bytes with the least-significant 128-bit limb first,
//! matching the little-endian layout of every other ATN integer.

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::reader::Reader;
use crate::ser::AtnDecode;
use crate::ser::AtnEncode;
use crate::writer::Writer;

/// 256-bit unsigned integer as a pair of `u128` limbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct U256 {
    hi: u128,
    lo: u128,
}

impl U256 {
    /// The value zero.
    pub const ZERO: Self = Self { hi: 0, lo: 0 };

    /// The largest representable value.
    pub const MAX: Self = Self {
        hi: u128::MAX,
        lo: u128::MAX,
    };

    /// Build from high and low 128-bit limbs.
    pub const fn from_limbs(hi: u128, lo: u128) -> Self {
        Self { hi, lo }
    }

    /// High 128-bit limb.
    pub const fn high(self) -> u128 {
        self.hi
    }

    /// Low 128-bit limb.
    pub const fn low(self) -> u128 {
        self.lo
    }

    /// Parse from 32 little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        let mut lo = [0u8; 16];
        let mut hi = [0u8; 16];
        lo.copy_from_slice(&bytes[..16]);
        hi.copy_from_slice(&bytes[16..]);
        Self {
            hi: u128::from_le_bytes(hi),
            lo: u128::from_le_bytes(lo),
        }
    }

    /// Serialize to 32 little-endian bytes.
    pub fn to_le_bytes(self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&self.lo.to_le_bytes());
        bytes[16..].copy_from_slice(&self.hi.to_le_bytes());
        bytes
    }

    /// Parse from 32 big-endian bytes.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut reversed = bytes;
        reversed.reverse();
        Self::from_le_bytes(reversed)
    }

    /// Serialize to 32 big-endian bytes.
    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut bytes = self.to_le_bytes();
        bytes.reverse();
        bytes
    }
}

impl From<u128> for U256 {
    fn from(lo: u128) -> Self {
        Self { hi: 0, lo }
    }
}

impl From<u64> for U256 {
    fn from(lo: u64) -> Self {
        Self::from(lo as u128)
    }
}

impl std::fmt::Display for U256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.hi == 0 {
            write!(f, "{:#x}", self.lo)
        } else {
            write!(f, "{:#x}{:032x}", self.hi, self.lo)
        }
    }
}

impl AtnEncode for U256 {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_u128(self.lo);
        w.put_u128(self.hi);
        Ok(())
    }
}

impl AtnDecode for U256 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let lo = r.get_u128()?;
        let hi = r.get_u128()?;
        Ok(Self { hi, lo })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_low_limb_first() {
        let value = U256::from_limbs(2, 1);
        let bytes = value.to_atn_vec().unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[16], 2);
        assert_eq!(U256::from_atn_slice(&bytes).unwrap(), value);
    }

    #[test]
    fn le_and_be_byte_forms_are_mirrors() {
        let value = U256::from_limbs(0x0102, 0x0304);
        let mut le = value.to_le_bytes();
        le.reverse();
        assert_eq!(le, value.to_be_bytes());
        assert_eq!(U256::from_be_bytes(value.to_be_bytes()), value);
    }

    #[test]
    fn ordering_compares_high_limb_first() {
        assert!(U256::from_limbs(1, 0) > U256::from_limbs(0, u128::MAX));
        assert!(U256::from(5u128) > U256::from(4u128));
    }

    #[test]
    fn truncated_decode_fails() {
        let err = U256::from_atn_slice(&[0u8; 31]).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEndOfData { .. }));
    }
}
