//! Encode/decode traits tying value types to the streaming codec.
//!
//! The codec is schema-agnostic: products are the concatenation of their
//! fields in declaration order, sums are a `u8` tag followed by the variant
//! payload, and containers carry a `u32` prefix. Higher layers supply the
//! structure by implementing these traits.

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::reader::Reader;
use crate::writer::Writer;

/// A value that can be appended to an ATN [`Writer`].
pub trait AtnEncode {
    /// Append this value's encoding.
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError>;

    /// Encode into a fresh byte vector.
    fn to_atn_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut w = Writer::new();
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }
}

/// A value that can be decoded from an ATN [`Reader`].
pub trait AtnDecode: Sized {
    /// Decode one value, advancing the reader.
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError>;

    /// Decode a value from the start of `bytes`.
    ///
    /// Trailing bytes are permitted; callers that require full consumption
    /// check [`Reader::is_at_end`] themselves.
    fn from_atn_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);
        Self::decode(&mut r)
    }
}

macro_rules! impl_primitive {
    ($($ty:ty => $put:ident / $get:ident),* $(,)?) => {
        $(
            impl AtnEncode for $ty {
                fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
                    w.$put(*self);
                    Ok(())
                }
            }

            impl AtnDecode for $ty {
                fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
                    r.$get()
                }
            }
        )*
    };
}

impl_primitive! {
    bool => put_bool / get_bool,
    u8 => put_u8 / get_u8,
    u16 => put_u16 / get_u16,
    u32 => put_u32 / get_u32,
    u64 => put_u64 / get_u64,
    u128 => put_u128 / get_u128,
    i8 => put_i8 / get_i8,
    i16 => put_i16 / get_i16,
    i32 => put_i32 / get_i32,
    i64 => put_i64 / get_i64,
    i128 => put_i128 / get_i128,
    f32 => put_f32 / get_f32,
    f64 => put_f64 / get_f64,
}

impl AtnEncode for str {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_str(self)
    }
}

impl AtnEncode for String {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_str(self)
    }
}

impl AtnDecode for String {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(r.get_str()?.to_owned())
    }
}

/// Optionals are a `u8` tag, 0 absent and 1 present.
impl<T: AtnEncode> AtnEncode for Option<T> {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        match self {
            None => {
                w.put_u8(0);
                Ok(())
            }
            Some(value) => {
                w.put_u8(1);
                value.encode(w)
            }
        }
    }
}

impl<T: AtnDecode> AtnDecode for Option<T> {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let offset = r.position();
        match r.get_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(r)?)),
            value => Err(DecodeError::InvalidData {
                what: "option tag",
                value,
                offset,
            }),
        }
    }
}

/// Sequences are a `u32` count followed by that many elements.
///
/// `Vec<u8>` goes through the same path; element-wise `u8` encoding is
/// byte-identical to a length-prefixed byte string.
impl<T: AtnEncode> AtnEncode for Vec<T> {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        self.as_slice().encode(w)
    }
}

impl<T: AtnEncode> AtnEncode for [T] {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        w.put_len("sequence", self.len())?;
        for element in self {
            element.encode(w)?;
        }
        Ok(())
    }
}

impl<T: AtnDecode> AtnDecode for Vec<T> {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let count = r.get_len()?;
        // Cap the pre-allocation by what the buffer could possibly hold so a
        // hostile count cannot balloon memory before the reads fail.
        let mut elements = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            elements.push(T::decode(r)?);
        }
        Ok(elements)
    }
}

impl<T: AtnEncode + ?Sized> AtnEncode for &T {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        (**self).encode(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip<T: AtnEncode + AtnDecode + PartialEq + std::fmt::Debug>(value: T) {
        let bytes = value.to_atn_vec().unwrap();
        let decoded = T::from_atn_slice(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn option_layouts_are_bit_exact() {
        assert_eq!(Some(42i32).to_atn_vec().unwrap(), [0x01, 0x2A, 0x00, 0x00, 0x00]);
        assert_eq!(None::<i32>.to_atn_vec().unwrap(), [0x00]);
    }

    #[test]
    fn option_tag_above_one_is_invalid() {
        let err = Option::<u8>::from_atn_slice(&[2, 0]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidData { what: "option tag", value: 2, .. }));
    }

    #[test]
    fn vec_u8_matches_byte_string_layout() {
        let via_elements = vec![0xAAu8, 0xBB].to_atn_vec().unwrap();
        let mut w = Writer::new();
        w.put_bytes(&[0xAA, 0xBB]).unwrap();
        assert_eq!(via_elements, w.into_bytes());
    }

    #[test]
    fn nested_composites_roundtrip() {
        roundtrip(vec![Some("ab".to_string()), None, Some(String::new())]);
        roundtrip(vec![vec![1u32, 2], vec![], vec![3]]);
    }

    #[test]
    fn hostile_sequence_count_fails_without_allocating() {
        // count = u32::MAX but only two bytes of payload
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 1, 2];
        let err = Vec::<u8>::from_atn_slice(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEndOfData { .. }));
    }

    proptest! {
        #[test]
        fn roundtrip_u64(v in any::<u64>()) {
            roundtrip(v);
        }

        #[test]
        fn roundtrip_i64(v in any::<i64>()) {
            roundtrip(v);
        }

        #[test]
        fn roundtrip_u128(v in any::<u128>()) {
            roundtrip(v);
        }

        #[test]
        fn roundtrip_f64_bits(v in any::<u64>()) {
            // Compare bit patterns so NaN payloads count as equal.
            let bytes = f64::from_bits(v).to_atn_vec().unwrap();
            let decoded = f64::from_atn_slice(&bytes).unwrap();
            prop_assert_eq!(decoded.to_bits(), v);
        }

        #[test]
        fn roundtrip_string(s in ".{0,64}") {
            roundtrip(s);
        }

        #[test]
        fn roundtrip_bytes(b in proptest::collection::vec(any::<u8>(), 0..256)) {
            roundtrip(b);
        }

        #[test]
        fn roundtrip_optional(v in proptest::option::of(any::<u32>())) {
            roundtrip(v);
        }

        #[test]
        fn truncated_input_never_panics(b in proptest::collection::vec(any::<u8>(), 0..64)) {
            // Whatever the bytes, decoding must fail cleanly or succeed.
            let _ = String::from_atn_slice(&b);
            let _ = Vec::<u64>::from_atn_slice(&b);
            let _ = Option::<u16>::from_atn_slice(&b);
        }
    }
}
