//! Streaming ATN decoder.
//!
//! A [`Reader`] borrows a byte slice and advances a cursor as values are
//! decoded. Every read is bounds-checked up front; a read past the end of
//! the buffer fails with [`DecodeError::UnexpectedEndOfData`] carrying the
//! current offset.

use crate::error::DecodeError;
use crate::error::InvalidEncodingSnafu;
use snafu::ResultExt;

/// Streaming decoder over a borrowed byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to decode.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether the cursor has reached the end of the buffer.
    pub fn is_at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Take `count` bytes, advancing the cursor.
    pub fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.remaining();
        if count > available {
            return Err(DecodeError::UnexpectedEndOfData {
                offset: self.pos,
                wanted: count,
                available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.take(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(slice);
        Ok(array)
    }

    /// Read a single byte.
    pub fn get_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Read a bool, accepting only 0x00 and 0x01.
    pub fn get_bool(&mut self) -> Result<bool, DecodeError> {
        let offset = self.pos;
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidData {
                what: "bool",
                value,
                offset,
            }),
        }
    }

    /// Read a `u16` little-endian.
    pub fn get_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// Read a `u32` little-endian.
    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Read a `u64` little-endian.
    pub fn get_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Read a `u128` little-endian.
    pub fn get_u128(&mut self) -> Result<u128, DecodeError> {
        Ok(u128::from_le_bytes(self.take_array()?))
    }

    /// Read an `i8`.
    pub fn get_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(i8::from_le_bytes(self.take_array()?))
    }

    /// Read an `i16` little-endian.
    pub fn get_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    /// Read an `i32` little-endian.
    pub fn get_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Read an `i64` little-endian.
    pub fn get_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Read an `i128` little-endian.
    pub fn get_i128(&mut self) -> Result<i128, DecodeError> {
        Ok(i128::from_le_bytes(self.take_array()?))
    }

    /// Read an `f32` from its little-endian bit pattern.
    pub fn get_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    /// Read an `f64` from its little-endian bit pattern.
    pub fn get_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Read a `u32` length prefix.
    pub fn get_len(&mut self) -> Result<usize, DecodeError> {
        Ok(self.get_u32()? as usize)
    }

    /// Read a length-prefixed byte string, borrowing from the buffer.
    pub fn get_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.get_len()?;
        self.take(len)
    }

    /// Read a length-prefixed UTF-8 string, borrowing from the buffer.
    pub fn get_str(&mut self) -> Result<&'a str, DecodeError> {
        let len = self.get_len()?;
        let offset = self.pos;
        let payload = self.take(len)?;
        std::str::from_utf8(payload).context(InvalidEncodingSnafu { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_the_cursor() {
        let mut r = Reader::new(&[0x34, 0x12, 0x07]);
        assert_eq!(r.get_u16().unwrap(), 0x1234);
        assert_eq!(r.position(), 2);
        assert_eq!(r.get_u8().unwrap(), 7);
        assert!(r.is_at_end());
    }

    #[test]
    fn truncated_read_reports_offset_and_counts() {
        let mut r = Reader::new(&[1, 2]);
        r.get_u8().unwrap();
        let err = r.get_u32().unwrap_err();
        match err {
            DecodeError::UnexpectedEndOfData {
                offset,
                wanted,
                available,
            } => {
                assert_eq!(offset, 1);
                assert_eq!(wanted, 4);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bool_rejects_values_above_one() {
        let mut r = Reader::new(&[2]);
        let err = r.get_bool().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidData { what: "bool", value: 2, .. }));
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        // length 2, payload = lone continuation bytes
        let mut r = Reader::new(&[2, 0, 0, 0, 0x80, 0x80]);
        let err = r.get_str().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding { offset: 4, .. }));
    }

    #[test]
    fn bytes_shorter_than_prefix_fail() {
        let mut r = Reader::new(&[5, 0, 0, 0, 1, 2]);
        let err = r.get_bytes().unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEndOfData { wanted: 5, available: 2, .. }));
    }
}
