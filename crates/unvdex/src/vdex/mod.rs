//! VDEX container model.
//!
//! A VDEX file is a fixed 24-byte header, a table of per-DEX location
//! checksums, the concatenated DEX files, the verifier dependencies and the
//! quickening info, laid out back to back in that order.

mod dex_files;
mod sections;

pub use dex_files::{DexFileRef, DexFiles, DexPosition, ModuleCursor};
pub use sections::Sections;

use crate::error::HeaderError;
use unvdex_bytes::load_u32;

pub const VDEX_MAGIC: [u8; 4] = *b"vdex";
pub const VDEX_VERSION: [u8; 4] = *b"006\0";
pub const VDEX_HEADER_SIZE: usize = 24;
/// One location checksum per embedded DEX file.
pub const CHECKSUM_ENTRY_SIZE: usize = 4;

/// The fixed header at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VdexHeader {
    pub magic: [u8; 4],
    pub version: [u8; 4],
    pub number_of_dex_files: u32,
    pub dex_size: u32,
    pub verifier_deps_size: u32,
    pub quickening_info_size: u32,
}

impl VdexHeader {
    /// Read the raw header fields. Only fails if the buffer is too short;
    /// magic and version are not checked here.
    pub fn read(bytes: &[u8]) -> Result<Self, HeaderError> {
        let truncated = |_| HeaderError::Truncated { len: bytes.len() };
        let head = bytes
            .get(..VDEX_HEADER_SIZE)
            .ok_or(HeaderError::Truncated { len: bytes.len() })?;
        let mut magic = [0u8; 4];
        let mut version = [0u8; 4];
        magic.copy_from_slice(&head[0..4]);
        version.copy_from_slice(&head[4..8]);
        Ok(Self {
            magic,
            version,
            number_of_dex_files: load_u32(head, 8).map_err(truncated)?,
            dex_size: load_u32(head, 12).map_err(truncated)?,
            verifier_deps_size: load_u32(head, 16).map_err(truncated)?,
            quickening_info_size: load_u32(head, 20).map_err(truncated)?,
        })
    }

    pub fn is_magic_valid(&self) -> bool {
        self.magic == VDEX_MAGIC
    }

    pub fn is_version_valid(&self) -> bool {
        self.version == VDEX_VERSION
    }

    pub fn is_valid(&self) -> bool {
        self.is_magic_valid() && self.is_version_valid()
    }

    pub fn has_dex_section(&self) -> bool {
        self.dex_size != 0
    }

    /// Size of the location checksum table, `None` if it does not fit in
    /// `usize`.
    pub fn checksums_size(&self) -> Option<usize> {
        CHECKSUM_ENTRY_SIZE.checked_mul(self.number_of_dex_files as usize)
    }
}

/// A validated VDEX header together with its derived section layout.
///
/// `Container` holds no reference to the buffer it was parsed from, so the
/// same value can be used while the buffer is later borrowed mutably.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container {
    pub header: VdexHeader,
    pub sections: Sections,
}

impl Container {
    /// Parse and validate the header of `bytes`.
    ///
    /// Magic and version are checked before any size field is used, and every
    /// derived section must fit inside `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        let header = VdexHeader::read(bytes)?;
        if !header.is_magic_valid() {
            return Err(HeaderError::BadMagic {
                found: header.magic,
            });
        }
        if !header.is_version_valid() {
            return Err(HeaderError::BadVersion {
                found: header.version,
            });
        }
        let sections = Sections::locate(&header)?;
        sections.check_within(bytes.len())?;
        Ok(Self { header, sections })
    }

    /// Location checksum recorded for DEX file `index`.
    pub fn location_checksum(&self, bytes: &[u8], index: usize) -> Option<u32> {
        if index >= self.header.number_of_dex_files as usize {
            return None;
        }
        let offset = self
            .sections
            .checksums
            .start
            .checked_add(index.checked_mul(CHECKSUM_ENTRY_SIZE)?)?;
        load_u32(bytes, offset).ok()
    }

    /// Raw verifier dependency data.
    pub fn verifier_deps<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        unvdex_bytes::slice(bytes, self.sections.verifier_deps).ok()
    }

    /// Raw quickening info.
    pub fn quickening_info<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        unvdex_bytes::slice(bytes, self.sections.quickening_info).ok()
    }

    /// Iterate over the embedded DEX files of `bytes`.
    pub fn dex_files<'a>(&self, bytes: &'a [u8]) -> DexFiles<'a> {
        DexFiles::new(*self, bytes)
    }
}

/// Conventional file name of DEX file `index` (`classes.dex`, `classes2.dex`, …).
pub fn dex_file_name(index: usize) -> String {
    if index == 0 {
        "classes.dex".to_string()
    } else {
        format!("classes{}.dex", index + 1)
    }
}
