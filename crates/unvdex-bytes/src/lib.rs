//! `unvdex-bytes` — bounds-checked access over a borrowed byte buffer.
//!
//! This crate is `#![no_std]`. It provides:
//! - [`Span`], a `(start, len)` byte range that is checked against its parent
//!   before any dereference
//! - little-endian loads/stores that return [`BoundsError`] instead of panicking
//! - ULEB128 decoding and a forward-only [`Cursor`]

#![no_std]

mod access;
pub use access::{
    load_u16, load_u32, load_u8, slice, slice_mut, store_u16, store_u32, store_u8,
};

mod leb128;
pub use leb128::{read_uleb128_u32, Cursor};

/// Why a byte access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsError {
    /// Access extends past the end of the buffer or span.
    OutOfBounds,
    /// `offset + len` does not fit in `usize`.
    Overflow,
    /// A ULEB128 value is longer than 5 bytes or does not fit in `u32`.
    MalformedLeb128,
}

impl core::fmt::Display for BoundsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "access out of bounds"),
            Self::Overflow => write!(f, "offset arithmetic overflow"),
            Self::MalformedLeb128 => write!(f, "malformed ULEB128 value"),
        }
    }
}

impl core::error::Error for BoundsError {}

/// Result of a checked byte access.
pub type BoundsResult<T> = Result<T, BoundsError>;

/// A byte range `[start, start + len)` inside some parent buffer.
///
/// A `Span` is only a pair of numbers; it says nothing about which buffer it
/// belongs to. Constructors that derive one span from another always verify
/// containment, so a span obtained through [`Span::sub`] is inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    /// Create a span, failing if `start + len` overflows.
    pub fn new(start: usize, len: usize) -> BoundsResult<Self> {
        start.checked_add(len).ok_or(BoundsError::Overflow)?;
        Ok(Self { start, len })
    }

    /// Span covering a whole buffer of `len` bytes.
    #[inline(always)]
    pub const fn whole(len: usize) -> Self {
        Self { start: 0, len }
    }

    /// One past the last byte. Never overflows for spans built via [`Span::new`].
    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `other` lies entirely within `self`.
    pub fn contains(&self, other: &Span) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// Derive the span `[self.start + offset, self.start + offset + len)`,
    /// checking that it lies within `self`.
    pub fn sub(&self, offset: usize, len: usize) -> BoundsResult<Span> {
        let start = self.start.checked_add(offset).ok_or(BoundsError::Overflow)?;
        let span = Span::new(start, len)?;
        if !self.contains(&span) {
            return Err(BoundsError::OutOfBounds);
        }
        Ok(span)
    }

    /// The span that immediately follows this one, with the given length.
    pub fn followed_by(&self, len: usize) -> BoundsResult<Span> {
        Span::new(self.end(), len)
    }

    /// Check that this span fits in a buffer of `buffer_len` bytes.
    pub fn check_within(&self, buffer_len: usize) -> BoundsResult<()> {
        if self.end() > buffer_len {
            return Err(BoundsError::OutOfBounds);
        }
        Ok(())
    }
}
