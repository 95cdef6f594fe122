//! Checked binary reading and writing
//!
//! CITP is little-endian throughout. Reads go through a bounds-checked
//! cursor and fail with [`Error::TruncatedData`] on underrun; writes grow
//! the buffer.
//!
//! Strings are length-prefixed by a 2-byte character count, followed by
//! the UTF-8 bytes and a required NUL terminator. Collections carry a
//! one- or two-byte element count chosen per field by the caller.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::fourcc::FourCC;

/// Count-prefix width for length-prefixed collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountWidth {
    One,
    Two,
}

/// Bounds-checked cursor over a received buffer
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::TruncatedData {
                needed: n,
                have: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn fourcc(&mut self) -> Result<FourCC> {
        let b = self.take(4)?;
        Ok(FourCC([b[0], b[1], b[2], b[3]]))
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Reads a CITP string: u16 character count, UTF-8 data, NUL.
    pub fn string(&mut self) -> Result<String> {
        let char_count = self.u16()? as usize;
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::MalformedString("missing NUL terminator".into()))?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|e| Error::MalformedString(e.to_string()))?;
        if s.chars().count() != char_count {
            return Err(Error::MalformedString(format!(
                "declared {} characters, payload has {}",
                char_count,
                s.chars().count()
            )));
        }
        self.pos += nul + 1;
        Ok(s.to_owned())
    }

    fn count(&mut self, width: CountWidth) -> Result<usize> {
        Ok(match width {
            CountWidth::One => self.u8()? as usize,
            CountWidth::Two => self.u16()? as usize,
        })
    }

    /// Reads a count-prefixed homogeneous collection.
    pub fn collection<T>(
        &mut self,
        width: CountWidth,
        mut read: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = self.count(width)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }
}

/// Growable little-endian writer
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
        }
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn fourcc(&mut self, id: FourCC) {
        self.buf.put_slice(&id.0);
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Writes a CITP string: u16 character count, UTF-8 data, NUL.
    pub fn string(&mut self, s: &str) -> Result<()> {
        let chars = s.chars().count();
        if chars > u16::MAX as usize {
            return Err(Error::PayloadTooLarge(chars));
        }
        self.buf.put_u16_le(chars as u16);
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
        Ok(())
    }

    /// Writes a count-prefixed homogeneous collection.
    pub fn collection<T>(
        &mut self,
        width: CountWidth,
        items: &[T],
        mut write: impl FnMut(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        match width {
            CountWidth::One => {
                if items.len() > u8::MAX as usize {
                    return Err(Error::PayloadTooLarge(items.len()));
                }
                self.buf.put_u8(items.len() as u8);
            }
            CountWidth::Two => {
                if items.len() > u16::MAX as usize {
                    return Err(Error::PayloadTooLarge(items.len()));
                }
                self.buf.put_u16_le(items.len() as u16);
            }
        }
        for item in items {
            write(self, item)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
