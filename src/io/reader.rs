//! Little-endian random-access reader over a byte slice.

use crate::errors::{EngineError, Result};

/// Cursor-style reader with explicit little-endian decoding.
///
/// Every read is bounds-checked and reports a [`EngineError::TruncatedRead`]
/// with the caller-supplied context string on failure, so container
/// validation errors name the field being parsed.
pub struct BinaryReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    /// Wraps a byte slice; the cursor starts at offset 0.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current cursor offset.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the backing slice.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the backing slice is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes remaining after the cursor.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    /// Moves the cursor to an absolute offset.
    pub fn seek(&mut self, offset: usize, context: &'static str) -> Result<()> {
        if offset > self.bytes.len() {
            return Err(EngineError::TruncatedRead {
                context,
                wanted: 0,
                offset,
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Reads `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize, context: &'static str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(count).ok_or(EngineError::TruncatedRead {
            context,
            wanted: count,
            offset: self.pos,
        })?;
        if end > self.bytes.len() {
            return Err(EngineError::TruncatedRead {
                context,
                wanted: count,
                offset: self.pos,
            });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Reads a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let slice = self.read_bytes(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Reads a little-endian `u8`.
    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.read_array::<1>(context)?[0])
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self, context: &'static str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian `f32`.
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array(context)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_mixed_fields_in_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xAABB_u16.to_le_bytes());
        bytes.extend_from_slice(&0xDEAD_BEEF_u32.to_le_bytes());
        bytes.extend_from_slice(&7_u64.to_le_bytes());
        let mut r = BinaryReader::new(&bytes);
        assert_eq!(r.read_u16("a").unwrap(), 0xAABB);
        assert_eq!(r.read_u32("b").unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_u64("c").unwrap(), 7);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_read_reports_context() {
        let mut r = BinaryReader::new(&[1, 2]);
        let err = r.read_u32("header.version").unwrap_err();
        match err {
            EngineError::TruncatedRead { context, .. } => {
                assert_eq!(context, "header.version");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn seek_past_end_rejected() {
        let mut r = BinaryReader::new(&[0u8; 4]);
        assert!(r.seek(4, "end").is_ok());
        assert!(r.seek(5, "past-end").is_err());
    }
}
