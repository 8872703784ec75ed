//! Little-endian byte primitives shared by the header, asset and signature
//! codecs.
//!
//! Every read is bounds-checked. Running off the end of the buffer is a
//! [`TransactionError::TruncatedBuffer`], never a panic and never a silent
//! zero.

use super::verification::TransactionError;

/// Append-only little-endian writer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a borrowed buffer.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Borrows the next `n` bytes and advances past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], TransactionError> {
        if self.remaining() < n {
            return Err(TransactionError::TruncatedBuffer {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Borrows everything left, leaving the reader exhausted.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, TransactionError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, TransactionError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, TransactionError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, TransactionError> {
        self.read_array().map(u64::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        let mut w = ByteWriter::default();
        w.write_u16(0x0102);
        w.write_u32(0x0304_0506);
        w.write_u64(1);
        assert_eq!(
            w.into_inner(),
            vec![0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 1, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn reader_tracks_position() {
        let bytes = [0xff, 0x01, 0x00, 0xaa, 0xbb];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xff);
        assert_eq!(r.read_u16().unwrap(), 1);
        assert_eq!(r.position(), 3);
        assert_eq!(r.rest(), &[0xaa, 0xbb]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn reading_past_the_end_is_truncation() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert_eq!(
            r.read_u32().unwrap_err(),
            TransactionError::TruncatedBuffer {
                needed: 4,
                remaining: 3
            }
        );
        // A failed read does not move the cursor.
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_array::<3>().unwrap(), [1, 2, 3]);
    }
}
