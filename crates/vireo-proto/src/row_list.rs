//! Packed row lists.
//!
//! Rows travel as one contiguous byte buffer plus a size hint describing
//! where each row starts. The client never interprets row bytes; it slices
//! them out and hands them to the cache or to generated bindings.
//!
//! Wire form: `[RowSizeHint][u32 bytes-length][bytes]` where the hint is a
//! sum of `FixedSize(u16)` (tag 0) and `RowOffsets([u64])` (tag 1).

use vireo_atn::AtnDecode;
use vireo_atn::AtnEncode;
use vireo_atn::DecodeError;
use vireo_atn::EncodeError;
use vireo_atn::Reader;
use vireo_atn::Writer;

/// Describes how rows are packed inside a [`RowList`] buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSizeHint {
    /// Every row occupies exactly this many bytes.
    FixedSize(u16),
    /// Row `i` starts at `offsets[i]` and ends at `offsets[i + 1]` (or the
    /// end of the buffer for the last row).
    RowOffsets(Vec<u64>),
}

impl AtnEncode for RowSizeHint {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        match self {
            RowSizeHint::FixedSize(size) => {
                w.put_u8(0);
                w.put_u16(*size);
                Ok(())
            }
            RowSizeHint::RowOffsets(offsets) => {
                w.put_u8(1);
                offsets.encode(w)
            }
        }
    }
}

impl AtnDecode for RowSizeHint {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(RowSizeHint::FixedSize(r.get_u16()?)),
            1 => Ok(RowSizeHint::RowOffsets(Vec::decode(r)?)),
            tag => Err(DecodeError::InvalidEnumTag {
                tag,
                ty: "RowSizeHint",
            }),
        }
    }
}

impl Default for RowSizeHint {
    fn default() -> Self {
        RowSizeHint::RowOffsets(Vec::new())
    }
}

/// A packed sequence of ATN-encoded rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowList {
    size_hint: RowSizeHint,
    rows_data: Vec<u8>,
}

impl RowList {
    /// An empty row list.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a fixed row width and a packed buffer.
    ///
    /// Callers guarantee `rows_data.len()` is a multiple of `size` (decode
    /// enforces the same invariant on inbound data).
    pub fn from_fixed_size(size: u16, rows_data: Vec<u8>) -> Self {
        Self {
            size_hint: RowSizeHint::FixedSize(size),
            rows_data,
        }
    }

    /// Build from individual row byte strings, packing them with offsets.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Self {
        let mut offsets = Vec::with_capacity(rows.len());
        let mut rows_data = Vec::new();
        for row in rows {
            offsets.push(rows_data.len() as u64);
            rows_data.extend_from_slice(row.as_ref());
        }
        Self {
            size_hint: RowSizeHint::RowOffsets(offsets),
            rows_data,
        }
    }

    /// The packing hint.
    pub fn size_hint(&self) -> &RowSizeHint {
        &self.size_hint
    }

    /// The packed row bytes.
    pub fn rows_data(&self) -> &[u8] {
        &self.rows_data
    }

    /// Number of rows in the list.
    pub fn len(&self) -> usize {
        match &self.size_hint {
            RowSizeHint::FixedSize(size) => {
                if *size == 0 {
                    0
                } else {
                    self.rows_data.len() / usize::from(*size)
                }
            }
            RowSizeHint::RowOffsets(offsets) => offsets.len(),
        }
    }

    /// Whether the list holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the individual row byte slices.
    pub fn iter(&self) -> RowListIter<'_> {
        RowListIter { list: self, index: 0 }
    }

    /// Validate that the size hint is consistent with the buffer.
    fn check_bounds(&self, offset: usize) -> Result<(), DecodeError> {
        match &self.size_hint {
            RowSizeHint::FixedSize(size) => {
                if self.rows_data.is_empty() {
                    return Ok(());
                }
                if *size == 0 || self.rows_data.len() % usize::from(*size) != 0 {
                    return Err(DecodeError::Malformed {
                        what: "fixed-size row list",
                        offset,
                    });
                }
                Ok(())
            }
            RowSizeHint::RowOffsets(offsets) => {
                let mut previous = 0u64;
                for &start in offsets {
                    if start < previous || start > self.rows_data.len() as u64 {
                        return Err(DecodeError::Malformed {
                            what: "row list offsets",
                            offset,
                        });
                    }
                    previous = start;
                }
                Ok(())
            }
        }
    }
}

impl AtnEncode for RowList {
    fn encode(&self, w: &mut Writer) -> Result<(), EncodeError> {
        self.size_hint.encode(w)?;
        w.put_bytes(&self.rows_data)
    }
}

impl AtnDecode for RowList {
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let offset = r.position();
        let size_hint = RowSizeHint::decode(r)?;
        let rows_data = r.get_bytes()?.to_vec();
        let list = Self { size_hint, rows_data };
        list.check_bounds(offset)?;
        Ok(list)
    }
}

/// Iterator over the row slices of a [`RowList`].
pub struct RowListIter<'a> {
    list: &'a RowList,
    index: usize,
}

impl<'a> Iterator for RowListIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let data = self.list.rows_data.as_slice();
        match &self.list.size_hint {
            RowSizeHint::FixedSize(size) => {
                let size = usize::from(*size);
                let start = self.index.checked_mul(size)?;
                if size == 0 || start >= data.len() {
                    return None;
                }
                self.index += 1;
                Some(&data[start..start + size])
            }
            RowSizeHint::RowOffsets(offsets) => {
                let start = *offsets.get(self.index)? as usize;
                let end = offsets.get(self.index + 1).map_or(data.len(), |&next| next as usize);
                self.index += 1;
                Some(&data[start..end])
            }
        }
    }
}

impl<'a> IntoIterator for &'a RowList {
    type Item = &'a [u8];
    type IntoIter = RowListIter<'a>;

    fn into_iter(self) -> RowListIter<'a> {
        self.iter()
    }
}
