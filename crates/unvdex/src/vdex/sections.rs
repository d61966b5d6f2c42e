//! Section boundaries derived from the VDEX header.

use super::{VdexHeader, VDEX_HEADER_SIZE};
use crate::error::HeaderError;
use unvdex_bytes::Span;

/// Absolute byte ranges of the four VDEX sections.
///
/// Sections are contiguous and ordered: each one starts where the previous
/// one ends, and the checksum table starts right after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sections {
    pub checksums: Span,
    pub dex: Span,
    pub verifier_deps: Span,
    pub quickening_info: Span,
}

impl Sections {
    /// Compute every section from header fields alone.
    pub fn locate(header: &VdexHeader) -> Result<Self, HeaderError> {
        let overflow = |_| HeaderError::Overflow;
        let checksums_size = header.checksums_size().ok_or(HeaderError::Overflow)?;
        let checksums = Span::new(VDEX_HEADER_SIZE, checksums_size).map_err(overflow)?;
        let dex = checksums
            .followed_by(header.dex_size as usize)
            .map_err(overflow)?;
        let verifier_deps = dex
            .followed_by(header.verifier_deps_size as usize)
            .map_err(overflow)?;
        let quickening_info = verifier_deps
            .followed_by(header.quickening_info_size as usize)
            .map_err(overflow)?;
        Ok(Self {
            checksums,
            dex,
            verifier_deps,
            quickening_info,
        })
    }

    /// Check every section against the real file length.
    pub fn check_within(&self, file_len: usize) -> Result<(), HeaderError> {
        let named = [
            ("checksum", self.checksums),
            ("dex", self.dex),
            ("verifier deps", self.verifier_deps),
            ("quickening info", self.quickening_info),
        ];
        for (section, span) in named {
            if span.check_within(file_len).is_err() {
                return Err(HeaderError::SectionOutOfBounds {
                    section,
                    start: span.start,
                    end: span.end(),
                    file_len,
                });
            }
        }
        Ok(())
    }
}
