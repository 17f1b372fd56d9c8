//! Dynamic types and values.
//!
//! The streaming codec is schema-agnostic; structure comes from callers.
//! Generated bindings hard-code that structure, but tooling (the code
//! generator, row inspectors, test fixtures) works against a typespace it
//! loads at runtime. [`AlgebraicType`] is that runtime description, and
//! driving the codec through one yields [`AlgebraicValue`] trees instead
//! of typed structs.
//!
//! The dynamic path and the generated path read the same bytes the same
//! way; only the destination differs.

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::identity::ConnectionId;
use crate::identity::Identity;
use crate::reader::Reader;
use crate::ser::AtnDecode;
use crate::ser::AtnEncode;
use crate::time::TimeDuration;
use crate::time::Timestamp;
use crate::u256::U256;
use crate::writer::Writer;

/// One field of a product type.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductField {
    /// Field name, absent in positional products.
    pub name: Option<String>,
    /// Field type.
    pub ty: AlgebraicType,
}

/// One variant of a sum type.
#[derive(Debug, Clone, PartialEq)]
pub struct SumVariant {
    /// Variant name, absent in positional sums.
    pub name: Option<String>,
    /// Payload type; unit variants use an empty product.
    pub ty: AlgebraicType,
}

/// Runtime description of an ATN-encodable type.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgebraicType {
    /// 1-byte bool.
    Bool,
    /// Unsigned integers, fixed-width little-endian.
    U8,
    /// 16-bit unsigned.
    U16,
    /// 32-bit unsigned.
    U32,
    /// 64-bit unsigned.
    U64,
    /// 128-bit unsigned.
    U128,
    /// 256-bit unsigned, low limb first.
    U256,
    /// Signed integers, fixed-width little-endian.
    I8,
    /// 16-bit signed.
    I16,
    /// 32-bit signed.
    I32,
    /// 64-bit signed.
    I64,
    /// 128-bit signed.
    I128,
    /// IEEE-754 single, little-endian bit pattern.
    F32,
    /// IEEE-754 double, little-endian bit pattern.
    F64,
    /// `u32`-prefixed UTF-8.
    String,
    /// 256-bit principal, 32 raw little-endian bytes.
    Identity,
    /// 64-bit connection id.
    ConnectionId,
    /// Microseconds since the epoch.
    Timestamp,
    /// Signed nanosecond duration.
    TimeDuration,
    /// `u32`-counted homogeneous sequence.
    Array(Box<AlgebraicType>),
    /// Optional with a `u8` presence tag.
    Option(Box<AlgebraicType>),
    /// Fields back to back, declaration order.
    Product(Vec<ProductField>),
    /// `u8` tag followed by the variant payload.
    Sum(Vec<SumVariant>),
}

impl AlgebraicType {
    /// Convenience constructor for `Array`.
    pub fn array(element: AlgebraicType) -> Self {
        AlgebraicType::Array(Box::new(element))
    }

    /// Convenience constructor for `Option`.
    pub fn option(inner: AlgebraicType) -> Self {
        AlgebraicType::Option(Box::new(inner))
    }

    /// A positional product from field types alone.
    pub fn product(fields: impl IntoIterator<Item = AlgebraicType>) -> Self {
        AlgebraicType::Product(fields.into_iter().map(|ty| ProductField { name: None, ty }).collect())
    }

    /// The raw-bytes type (`Array(U8)`), byte-identical to a byte string.
    pub fn bytes() -> Self {
        Self::array(AlgebraicType::U8)
    }

    /// Decode one value of this type, advancing the reader.
    pub fn decode_value(&self, r: &mut Reader<'_>) -> Result<AlgebraicValue, DecodeError> {
        Ok(match self {
            AlgebraicType::Bool => AlgebraicValue::Bool(r.get_bool()?),
            AlgebraicType::U8 => AlgebraicValue::U8(r.get_u8()?),
            AlgebraicType::U16 => AlgebraicValue::U16(r.get_u16()?),
            AlgebraicType::U32 => AlgebraicValue::U32(r.get_u32()?),
            AlgebraicType::U64 => AlgebraicValue::U64(r.get_u64()?),
            AlgebraicType::U128 => AlgebraicValue::U128(r.get_u128()?),
            AlgebraicType::U256 => AlgebraicValue::U256(U256::decode(r)?),
            AlgebraicType::I8 => AlgebraicValue::I8(r.get_i8()?),
            AlgebraicType::I16 => AlgebraicValue::I16(r.get_i16()?),
            AlgebraicType::I32 => AlgebraicValue::I32(r.get_i32()?),
            AlgebraicType::I64 => AlgebraicValue::I64(r.get_i64()?),
            AlgebraicType::I128 => AlgebraicValue::I128(r.get_i128()?),
            AlgebraicType::F32 => AlgebraicValue::F32(r.get_f32()?),
            AlgebraicType::F64 => AlgebraicValue::F64(r.get_f64()?),
            AlgebraicType::String => AlgebraicValue::String(r.get_str()?.to_owned()),
            AlgebraicType::Identity => AlgebraicValue::Identity(Identity::decode(r)?),
            AlgebraicType::ConnectionId => AlgebraicValue::ConnectionId(ConnectionId::decode(r)?),
            AlgebraicType::Timestamp => AlgebraicValue::Timestamp(Timestamp::decode(r)?),
            AlgebraicType::TimeDuration => AlgebraicValue::TimeDuration(TimeDuration::decode(r)?),
            AlgebraicType::Array(element) => {
                let count = r.get_len()?;
                let mut values = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    values.push(element.decode_value(r)?);
                }
                AlgebraicValue::Array(values)
            }
            AlgebraicType::Option(inner) => {
                let offset = r.position();
                match r.get_u8()? {
                    0 => AlgebraicValue::OptionNone,
                    1 => AlgebraicValue::OptionSome(Box::new(inner.decode_value(r)?)),
                    value => {
                        return Err(DecodeError::InvalidData {
                            what: "option tag",
                            value,
                            offset,
                        });
                    }
                }
            }
            AlgebraicType::Product(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    values.push(field.ty.decode_value(r)?);
                }
                AlgebraicValue::Product(values)
            }
            AlgebraicType::Sum(variants) => {
                let tag = r.get_u8()?;
                let variant = variants.get(usize::from(tag)).ok_or(DecodeError::InvalidEnumTag {
                    tag,
                    ty: "sum value",
                })?;
                AlgebraicValue::Sum {
                    tag,
                    value: Box::new(variant.ty.decode_value(r)?),
                }
            }
        })
    }

    /// Encode a value against this type.
    ///
    /// Fails with [`EncodeError::TypeMismatch`] when the value's shape
    /// does not belong to this type.
    pub fn encode_value(&self, value: &AlgebraicValue, w: &mut Writer) -> Result<(), EncodeError> {
        match (self, value) {
            (AlgebraicType::Bool, AlgebraicValue::Bool(v)) => {
                w.put_bool(*v);
                Ok(())
            }
            (AlgebraicType::U8, AlgebraicValue::U8(v)) => {
                w.put_u8(*v);
                Ok(())
            }
            (AlgebraicType::U16, AlgebraicValue::U16(v)) => {
                w.put_u16(*v);
                Ok(())
            }
            (AlgebraicType::U32, AlgebraicValue::U32(v)) => {
                w.put_u32(*v);
                Ok(())
            }
            (AlgebraicType::U64, AlgebraicValue::U64(v)) => {
                w.put_u64(*v);
                Ok(())
            }
            (AlgebraicType::U128, AlgebraicValue::U128(v)) => {
                w.put_u128(*v);
                Ok(())
            }
            (AlgebraicType::U256, AlgebraicValue::U256(v)) => v.encode(w),
            (AlgebraicType::I8, AlgebraicValue::I8(v)) => {
                w.put_i8(*v);
                Ok(())
            }
            (AlgebraicType::I16, AlgebraicValue::I16(v)) => {
                w.put_i16(*v);
                Ok(())
            }
            (AlgebraicType::I32, AlgebraicValue::I32(v)) => {
                w.put_i32(*v);
                Ok(())
            }
            (AlgebraicType::I64, AlgebraicValue::I64(v)) => {
                w.put_i64(*v);
                Ok(())
            }
            (AlgebraicType::I128, AlgebraicValue::I128(v)) => {
                w.put_i128(*v);
                Ok(())
            }
            (AlgebraicType::F32, AlgebraicValue::F32(v)) => {
                w.put_f32(*v);
                Ok(())
            }
            (AlgebraicType::F64, AlgebraicValue::F64(v)) => {
                w.put_f64(*v);
                Ok(())
            }
            (AlgebraicType::String, AlgebraicValue::String(v)) => w.put_str(v),
            (AlgebraicType::Identity, AlgebraicValue::Identity(v)) => v.encode(w),
            (AlgebraicType::ConnectionId, AlgebraicValue::ConnectionId(v)) => v.encode(w),
            (AlgebraicType::Timestamp, AlgebraicValue::Timestamp(v)) => v.encode(w),
            (AlgebraicType::TimeDuration, AlgebraicValue::TimeDuration(v)) => v.encode(w),
            (AlgebraicType::Array(element), AlgebraicValue::Array(values)) => {
                w.put_len("sequence", values.len())?;
                for value in values {
                    element.encode_value(value, w)?;
                }
                Ok(())
            }
            (AlgebraicType::Option(_), AlgebraicValue::OptionNone) => {
                w.put_u8(0);
                Ok(())
            }
            (AlgebraicType::Option(inner), AlgebraicValue::OptionSome(value)) => {
                w.put_u8(1);
                inner.encode_value(value, w)
            }
            (AlgebraicType::Product(fields), AlgebraicValue::Product(values)) => {
                if fields.len() != values.len() {
                    return Err(EncodeError::TypeMismatch { expected: "product" });
                }
                for (field, value) in fields.iter().zip(values) {
                    field.ty.encode_value(value, w)?;
                }
                Ok(())
            }
            (AlgebraicType::Sum(variants), AlgebraicValue::Sum { tag, value }) => {
                let variant = variants
                    .get(usize::from(*tag))
                    .ok_or(EncodeError::TypeMismatch { expected: "sum" })?;
                w.put_u8(*tag);
                variant.ty.encode_value(value, w)
            }
            _ => Err(EncodeError::TypeMismatch {
                expected: self.name(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AlgebraicType::Bool => "bool",
            AlgebraicType::U8 => "u8",
            AlgebraicType::U16 => "u16",
            AlgebraicType::U32 => "u32",
            AlgebraicType::U64 => "u64",
            AlgebraicType::U128 => "u128",
            AlgebraicType::U256 => "u256",
            AlgebraicType::I8 => "i8",
            AlgebraicType::I16 => "i16",
            AlgebraicType::I32 => "i32",
            AlgebraicType::I64 => "i64",
            AlgebraicType::I128 => "i128",
            AlgebraicType::F32 => "f32",
            AlgebraicType::F64 => "f64",
            AlgebraicType::String => "string",
            AlgebraicType::Identity => "identity",
            AlgebraicType::ConnectionId => "connection id",
            AlgebraicType::Timestamp => "timestamp",
            AlgebraicType::TimeDuration => "time duration",
            AlgebraicType::Array(_) => "array",
            AlgebraicType::Option(_) => "option",
            AlgebraicType::Product(_) => "product",
            AlgebraicType::Sum(_) => "sum",
        }
    }
}

/// A decoded value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgebraicValue {
    /// Bool value.
    Bool(bool),
    /// u8 value.
    U8(u8),
    /// u16 value.
    U16(u16),
    /// u32 value.
    U32(u32),
    /// u64 value.
    U64(u64),
    /// u128 value.
    U128(u128),
    /// u256 value.
    U256(U256),
    /// i8 value.
    I8(i8),
    /// i16 value.
    I16(i16),
    /// i32 value.
    I32(i32),
    /// i64 value.
    I64(i64),
    /// i128 value.
    I128(i128),
    /// f32 value.
    F32(f32),
    /// f64 value.
    F64(f64),
    /// String value.
    String(String),
    /// Identity value.
    Identity(Identity),
    /// Connection id value.
    ConnectionId(ConnectionId),
    /// Timestamp value.
    Timestamp(Timestamp),
    /// Duration value.
    TimeDuration(TimeDuration),
    /// Homogeneous sequence.
    Array(Vec<AlgebraicValue>),
    /// Absent optional.
    OptionNone,
    /// Present optional.
    OptionSome(Box<AlgebraicValue>),
    /// Product fields in declaration order.
    Product(Vec<AlgebraicValue>),
    /// Sum with its wire tag and payload.
    Sum {
        /// The variant tag as carried on the wire.
        tag: u8,
        /// The variant payload.
        value: Box<AlgebraicValue>,
    },
}

impl AlgebraicValue {
    /// A unit value (empty product), the payload of unit sum variants.
    pub fn unit() -> Self {
        AlgebraicValue::Product(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::AtnEncode;

    fn player_row_type() -> AlgebraicType {
        AlgebraicType::Product(vec![
            ProductField {
                name: Some("id".to_string()),
                ty: AlgebraicType::U32,
            },
            ProductField {
                name: Some("name".to_string()),
                ty: AlgebraicType::String,
            },
            ProductField {
                name: Some("score".to_string()),
                ty: AlgebraicType::option(AlgebraicType::I64),
            },
        ])
    }

    /// Bytes produced by the generated-binding path for the same row.
    fn player_row_bytes() -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(7);
        w.put_str("ada").unwrap();
        Some(99i64).encode(&mut w).unwrap();
        w.into_bytes()
    }

    #[test]
    fn dynamic_decode_matches_the_static_layout() {
        let bytes = player_row_bytes();
        let mut r = Reader::new(&bytes);
        let value = player_row_type().decode_value(&mut r).unwrap();
        assert!(r.is_at_end());
        assert_eq!(
            value,
            AlgebraicValue::Product(vec![
                AlgebraicValue::U32(7),
                AlgebraicValue::String("ada".to_string()),
                AlgebraicValue::OptionSome(Box::new(AlgebraicValue::I64(99))),
            ])
        );
    }

    #[test]
    fn dynamic_encode_reproduces_the_same_bytes() {
        let ty = player_row_type();
        let bytes = player_row_bytes();
        let value = ty.decode_value(&mut Reader::new(&bytes)).unwrap();
        let mut w = Writer::new();
        ty.encode_value(&value, &mut w).unwrap();
        assert_eq!(w.into_bytes(), bytes);
    }

    #[test]
    fn sum_roundtrip_with_unit_and_payload_variants() {
        // Mirrors a status sum: Active | Banned(reason).
        let ty = AlgebraicType::Sum(vec![
            SumVariant {
                name: Some("active".to_string()),
                ty: AlgebraicType::product([]),
            },
            SumVariant {
                name: Some("banned".to_string()),
                ty: AlgebraicType::String,
            },
        ]);

        for value in [
            AlgebraicValue::Sum {
                tag: 0,
                value: Box::new(AlgebraicValue::unit()),
            },
            AlgebraicValue::Sum {
                tag: 1,
                value: Box::new(AlgebraicValue::String("gold farming".to_string())),
            },
        ] {
            let mut w = Writer::new();
            ty.encode_value(&value, &mut w).unwrap();
            let bytes = w.into_bytes();
            assert_eq!(ty.decode_value(&mut Reader::new(&bytes)).unwrap(), value);
        }
    }

    #[test]
    fn unknown_sum_tag_is_a_typed_error() {
        let ty = AlgebraicType::Sum(vec![SumVariant {
            name: None,
            ty: AlgebraicType::product([]),
        }]);
        let err = ty.decode_value(&mut Reader::new(&[5])).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEnumTag { tag: 5, ty: "sum value" }));
    }

    #[test]
    fn bytes_type_matches_byte_string_layout() {
        let ty = AlgebraicType::bytes();
        let mut w = Writer::new();
        w.put_bytes(&[0xAA, 0xBB]).unwrap();
        let bytes = w.into_bytes();
        let value = ty.decode_value(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(
            value,
            AlgebraicValue::Array(vec![AlgebraicValue::U8(0xAA), AlgebraicValue::U8(0xBB)])
        );
    }

    #[test]
    fn encode_rejects_mismatched_shapes() {
        let mut w = Writer::new();
        let err = AlgebraicType::U32.encode_value(&AlgebraicValue::Bool(true), &mut w).unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { expected: "u32" }));

        let product = AlgebraicType::product([AlgebraicType::U8, AlgebraicType::U8]);
        let err = product
            .encode_value(&AlgebraicValue::Product(vec![AlgebraicValue::U8(1)]), &mut w)
            .unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { expected: "product" }));
    }

    #[test]
    fn special_leaf_types_roundtrip() {
        let ty = AlgebraicType::product([
            AlgebraicType::Identity,
            AlgebraicType::ConnectionId,
            AlgebraicType::Timestamp,
            AlgebraicType::TimeDuration,
        ]);
        let value = AlgebraicValue::Product(vec![
            AlgebraicValue::Identity(Identity::from_bytes_le([3u8; 32])),
            AlgebraicValue::ConnectionId(ConnectionId::from_u64(12)),
            AlgebraicValue::Timestamp(Timestamp::from_micros_since_epoch(55)),
            AlgebraicValue::TimeDuration(TimeDuration::from_nanos(-1)),
        ]);
        let mut w = Writer::new();
        ty.encode_value(&value, &mut w).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 32 + 8 + 8 + 8);
        assert_eq!(ty.decode_value(&mut Reader::new(&bytes)).unwrap(), value);
    }

    #[test]
    fn truncated_dynamic_decode_fails_cleanly() {
        let ty = player_row_type();
        let bytes = player_row_bytes();
        let err = ty.decode_value(&mut Reader::new(&bytes[..bytes.len() - 5])).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEndOfData { .. }));
    }
}
