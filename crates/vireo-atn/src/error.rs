//! Error types for ATN encoding and decoding.
//!
//! Decode errors carry the buffer offset at which decoding failed so that
//! frame-level diagnostics can point at the exact byte.

use snafu::Snafu;

/// Errors produced while decoding ATN-encoded bytes.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// The input ended before the value was complete.
    #[snafu(display("unexpected end of input at offset {offset}: wanted {wanted} bytes, {available} available"))]
    UnexpectedEndOfData {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Number of bytes the decoder needed.
        wanted: usize,
        /// Number of bytes remaining in the buffer.
        available: usize,
    },

    /// A byte held a value outside the encoding's domain (bool or option tag).
    #[snafu(display("invalid byte {value:#04x} for {what} at offset {offset}"))]
    InvalidData {
        /// What was being decoded.
        what: &'static str,
        /// The offending byte.
        value: u8,
        /// Offset of the offending byte.
        offset: usize,
    },

    /// A string payload was not valid UTF-8.
    #[snafu(display("string at offset {offset} is not valid UTF-8: {source}"))]
    InvalidEncoding {
        /// Offset of the string payload.
        offset: usize,
        /// Underlying UTF-8 error.
        source: std::str::Utf8Error,
    },

    /// A sum value carried a tag no variant is declared for.
    #[snafu(display("unknown tag {tag} for {ty}"))]
    InvalidEnumTag {
        /// The tag read from the wire.
        tag: u8,
        /// Name of the sum type being decoded.
        ty: &'static str,
    },

    /// A decoded value violated a structural invariant of its type.
    #[snafu(display("malformed {what} at offset {offset}"))]
    Malformed {
        /// What was being decoded.
        what: &'static str,
        /// Offset of the malformed value.
        offset: usize,
    },
}

/// Errors produced while encoding values to ATN bytes.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EncodeError {
    /// A length-prefixed container was too long for its `u32` prefix.
    #[snafu(display("{what} length {len} does not fit in a u32 prefix"))]
    Overflow {
        /// What was being encoded.
        what: &'static str,
        /// The container length.
        len: usize,
    },

    /// A dynamic value did not match the type it was encoded against.
    #[snafu(display("value does not match type: expected {expected}"))]
    TypeMismatch {
        /// The type the encoder expected.
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_end_display_carries_counts() {
        let err = DecodeError::UnexpectedEndOfData {
            offset: 7,
            wanted: 4,
            available: 1,
        };
        assert_eq!(err.to_string(), "unexpected end of input at offset 7: wanted 4 bytes, 1 available");
    }

    #[test]
    fn invalid_enum_tag_display_names_type() {
        let err = DecodeError::InvalidEnumTag {
            tag: 9,
            ty: "ServerMessage",
        };
        assert_eq!(err.to_string(), "unknown tag 9 for ServerMessage");
    }

    #[test]
    fn overflow_display() {
        let err = EncodeError::Overflow {
            what: "string",
            len: 5_000_000_000,
        };
        assert_eq!(err.to_string(), "string length 5000000000 does not fit in a u32 prefix");
    }
}
