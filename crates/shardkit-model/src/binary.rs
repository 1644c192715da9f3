//! Fixed-layout binary record helpers: a declarative list of fields with
//! primitive C-style widths and a single byte order, supporting pack/unpack
//! against a byte buffer.
//!
//! Mirrors the source's `cstruct` (`snakecord/utils.py`), which wraps
//! Python's `struct.Struct` behind annotated class fields. The gateway
//! frame codec uses this for the two WebSocket header bytes and the
//! extended 16/64-bit length field.

/// Byte order for a [`RecordLayout`]'s multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// A primitive field width, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    U8,
    U16,
    U32,
    U64,
}

impl FieldWidth {
    pub const fn size(self) -> usize {
        match self {
            FieldWidth::U8 => 1,
            FieldWidth::U16 => 2,
            FieldWidth::U32 => 4,
            FieldWidth::U64 => 8,
        }
    }
}

/// One named field in a [`RecordLayout`].
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: FieldWidth,
}

/// An ordered, fixed-layout list of primitive fields sharing one byte
/// order — the Rust analog of a declared `cstruct` subclass.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    pub order: ByteOrder,
    pub fields: &'static [FieldSpec],
}

impl RecordLayout {
    /// Total byte size of the record.
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.width.size()).sum()
    }

    /// Unpack `buffer` into `(field name, value)` pairs in declaration
    /// order. `buffer` must be at least [`RecordLayout::size`] bytes.
    pub fn unpack(&self, buffer: &[u8]) -> Result<Vec<(&'static str, u64)>, BinaryError> {
        let needed = self.size();
        if buffer.len() < needed {
            return Err(BinaryError::ShortBuffer {
                needed,
                got: buffer.len(),
            });
        }
        let mut out = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for field in self.fields {
            let width = field.width.size();
            out.push((field.name, read_uint(&buffer[offset..offset + width], self.order)));
            offset += width;
        }
        Ok(out)
    }

    /// Pack `values`, given in declaration order, into a fresh buffer.
    pub fn pack(&self, values: &[u64]) -> Result<Vec<u8>, BinaryError> {
        if values.len() != self.fields.len() {
            return Err(BinaryError::FieldCountMismatch {
                expected: self.fields.len(),
                got: values.len(),
            });
        }
        let mut buffer = Vec::with_capacity(self.size());
        for (field, &value) in self.fields.iter().zip(values) {
            write_uint(&mut buffer, value, field.width, self.order);
        }
        Ok(buffer)
    }
}

/// Read an unsigned integer from a 1, 2, 4, or 8 byte buffer in `order`.
pub fn read_uint(buf: &[u8], order: ByteOrder) -> u64 {
    let mut value: u64 = 0;
    match order {
        ByteOrder::Big => {
            for &byte in buf {
                value = (value << 8) | u64::from(byte);
            }
        }
        ByteOrder::Little => {
            for &byte in buf.iter().rev() {
                value = (value << 8) | u64::from(byte);
            }
        }
    }
    value
}

fn write_uint(out: &mut Vec<u8>, value: u64, width: FieldWidth, order: ByteOrder) {
    let size = width.size();
    let be = value.to_be_bytes();
    let be_slice = &be[8 - size..];
    match order {
        ByteOrder::Big => out.extend_from_slice(be_slice),
        ByteOrder::Little => out.extend(be_slice.iter().rev()),
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BinaryError {
    #[error("buffer too short: needed {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },
    #[error("field count mismatch: expected {expected}, got {got}")]
    FieldCountMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: RecordLayout = RecordLayout {
        order: ByteOrder::Big,
        fields: &[
            FieldSpec { name: "fbyte", width: FieldWidth::U8 },
            FieldSpec { name: "sbyte", width: FieldWidth::U8 },
        ],
    };

    #[test]
    fn unpacks_two_header_bytes() {
        let fields = HEADER.unpack(&[0x81, 0x05]).unwrap();
        assert_eq!(fields, vec![("fbyte", 0x81), ("sbyte", 0x05)]);
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(
            HEADER.unpack(&[0x81]),
            Err(BinaryError::ShortBuffer { needed: 2, got: 1 })
        );
    }

    #[test]
    fn round_trips_pack_and_unpack() {
        let packed = HEADER.pack(&[0x81, 0x05]).unwrap();
        assert_eq!(packed, vec![0x81, 0x05]);
        assert_eq!(HEADER.unpack(&packed).unwrap(), vec![("fbyte", 0x81), ("sbyte", 0x05)]);
    }

    #[test]
    fn reads_big_and_little_endian_extended_lengths() {
        let be = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_uint(&be, ByteOrder::Big), 0x0102_0304_0506_0708);
        assert_eq!(read_uint(&be, ByteOrder::Little), 0x0807_0605_0403_0201);
    }

    #[test]
    fn pack_rejects_field_count_mismatch() {
        assert_eq!(
            HEADER.pack(&[1]),
            Err(BinaryError::FieldCountMismatch { expected: 2, got: 1 })
        );
    }
}
