//! Bounded cursor over an in-memory byte slice.
//!
//! Header blocks and field descriptors are read into memory first and then
//! picked apart with this cursor, so every fixed-width read is bounds-checked
//! and fails with [`DbfError::TruncatedData`] instead of panicking.

use byteorder::{ByteOrder, LittleEndian};

use super::error::{DbfError, Result};

/// Sequential reader over a byte slice with typed fixed-width extraction.
///
/// Stateless beyond the cursor position; never interprets field semantics.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Cursor<'a> {
    /// Create a cursor over `buf`. `context` names the structure being read
    /// and is included in truncation errors.
    pub fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self {
            buf,
            pos: 0,
            context,
        }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read exactly `n` bytes, advancing the cursor.
    pub fn read_fixed(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DbfError::TruncatedData {
                context: self.context,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_fixed(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_fixed(4)?))
    }

    /// Skip `n` bytes (reserved regions).
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_fixed(n)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fixed_width_integers() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut cur = Cursor::new(&data, "test");
        assert_eq!(cur.read_u8().unwrap(), 0x01);
        assert_eq!(cur.read_u16_le().unwrap(), 0x1234);
        assert_eq!(cur.read_u32_le().unwrap(), 0x12345678);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn truncation_is_an_error_not_a_panic() {
        let data = [0xAA, 0xBB];
        let mut cur = Cursor::new(&data, "test");
        let err = cur.read_u32_le().unwrap_err();
        match err {
            DbfError::TruncatedData { context, needed } => {
                assert_eq!(context, "test");
                assert_eq!(needed, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The failed read must not have consumed anything.
        assert_eq!(cur.read_u16_le().unwrap(), 0xBBAA);
    }

    #[test]
    fn skip_advances_past_reserved_bytes() {
        let data = [0u8; 8];
        let mut cur = Cursor::new(&data, "test");
        cur.skip(6).unwrap();
        assert_eq!(cur.remaining(), 2);
        assert!(cur.skip(3).is_err());
    }
}
