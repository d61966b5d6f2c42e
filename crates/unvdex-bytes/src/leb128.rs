//! Unsigned LEB128 decoding and a forward-only read cursor.

use crate::{access, BoundsError, BoundsResult, Span};

/// Longest legal encoding of a 32-bit value.
const MAX_U32_LEB128_LEN: usize = 5;

/// Decode an unsigned LEB128 value at `*offset`, advancing `*offset` past it.
///
/// On error `*offset` is left unchanged.
pub fn read_uleb128_u32(bytes: &[u8], offset: &mut usize) -> BoundsResult<u32> {
    let mut pos = *offset;
    let mut result: u32 = 0;
    for i in 0..MAX_U32_LEB128_LEN {
        let byte = access::load_u8(bytes, pos)?;
        pos += 1;
        let payload = u32::from(byte & 0x7f);
        let shift = 7 * i as u32;
        // The fifth byte may only carry the top four bits.
        if i == MAX_U32_LEB128_LEN - 1 && payload > 0x0f {
            return Err(BoundsError::MalformedLeb128);
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            *offset = pos;
            return Ok(result);
        }
    }
    Err(BoundsError::MalformedLeb128)
}

/// A read position inside a fixed [`Span`] of a borrowed buffer.
///
/// Every read is checked against the span's end, not just the buffer's end,
/// so a cursor can never wander out of the region it was created for.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    limit: Span,
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor over `limit` within `bytes`, positioned at `limit.start`.
    pub fn new(bytes: &'a [u8], limit: Span) -> BoundsResult<Self> {
        limit.check_within(bytes.len())?;
        Ok(Self {
            bytes,
            limit,
            pos: limit.start,
        })
    }

    /// Create a cursor over `limit`, positioned at the absolute offset `pos`.
    pub fn at(bytes: &'a [u8], limit: Span, pos: usize) -> BoundsResult<Self> {
        let mut cursor = Self::new(bytes, limit)?;
        if pos < limit.start || pos > limit.end() {
            return Err(BoundsError::OutOfBounds);
        }
        cursor.pos = pos;
        Ok(cursor)
    }

    /// Absolute position in the underlying buffer.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the end of the span.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.limit.end() - self.pos
    }

    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos == self.limit.end()
    }

    /// Bytes between the current position and the end of the span.
    #[inline(always)]
    fn window(&self) -> &'a [u8] {
        // Invariant: limit.start <= pos <= limit.end() <= bytes.len().
        &self.bytes[..self.limit.end()]
    }

    pub fn read_u32_le(&mut self) -> BoundsResult<u32> {
        let v = access::load_u32(self.window(), self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_uleb128_u32(&mut self) -> BoundsResult<u32> {
        read_uleb128_u32(self.window(), &mut self.pos)
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> BoundsResult<&'a [u8]> {
        let span = Span::new(self.pos, len)?;
        let bytes = access::slice(self.window(), span)?;
        self.pos = span.end();
        Ok(bytes)
    }
}
