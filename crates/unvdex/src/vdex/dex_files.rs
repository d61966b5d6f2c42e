//! Locating the DEX files packed into the dex section.
//!
//! DEX files carry no index of their own: the only way to find file `n + 1`
//! is to read the `file_size` field of file `n`. [`ModuleCursor`] holds that
//! running offset as explicit state, so the caller can interleave cursor
//! steps with mutable access to the buffer.

use super::Container;
use crate::dex::{DEX_FILE_SIZE_OFFSET, DEX_HEADER_SIZE};
use crate::error::ModuleError;
use log::{debug, warn};
use unvdex_bytes::{load_u32, Span};

/// Where a DEX file ends relative to the dex section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DexPosition {
    /// Ends strictly before the section end.
    Intermediate,
    /// Ends exactly at the section end.
    Last,
}

/// One embedded DEX file, located but not yet validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DexFileRef {
    pub index: usize,
    /// Absolute range in the VDEX buffer.
    pub span: Span,
    pub position: DexPosition,
}

/// Resumable position in the dex section.
#[derive(Debug, Clone)]
pub struct ModuleCursor {
    next_offset: usize,
    index: usize,
    poisoned: bool,
}

impl ModuleCursor {
    pub fn new(container: &Container) -> Self {
        Self {
            next_offset: container.sections.dex.start,
            index: 0,
            poisoned: false,
        }
    }

    /// Index of the DEX file the next call will return.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Locate the next DEX file.
    ///
    /// Returns `None` once `number_of_dex_files` entries have been produced, or
    /// immediately if the container has no dex section. An `Err` means the
    /// container is corrupt at this entry; the cursor keeps counting, but every
    /// later entry is reported as [`ModuleError::Unreachable`] since its offset
    /// can no longer be derived.
    pub fn next_module(
        &mut self,
        container: &Container,
        bytes: &[u8],
    ) -> Option<Result<DexFileRef, ModuleError>> {
        if !container.header.has_dex_section()
            || self.index >= container.header.number_of_dex_files as usize
        {
            return None;
        }
        let index = self.index;
        self.index += 1;
        if self.poisoned {
            return Some(Err(ModuleError::Unreachable { index }));
        }
        let result = self.locate(container, bytes, index);
        if result.is_err() {
            self.poisoned = true;
        }
        Some(result)
    }

    fn locate(
        &mut self,
        container: &Container,
        bytes: &[u8],
        index: usize,
    ) -> Result<DexFileRef, ModuleError> {
        let section = container.sections.dex;
        let offset = self.next_offset;
        let truncated = ModuleError::HeaderTruncated { index, offset };

        let header = Span::new(offset, DEX_HEADER_SIZE).map_err(|_| truncated.clone())?;
        if !section.contains(&header) {
            return Err(truncated);
        }
        let declared_size =
            load_u32(bytes, offset + DEX_FILE_SIZE_OFFSET).map_err(|_| truncated.clone())?;
        if (declared_size as usize) < DEX_HEADER_SIZE {
            return Err(ModuleError::TooSmall {
                index,
                offset,
                declared_size,
            });
        }

        let exceeds = ModuleError::ExceedsSection {
            index,
            offset,
            declared_size,
            section_end: section.end(),
        };
        let span = Span::new(offset, declared_size as usize).map_err(|_| exceeds.clone())?;
        let position = if span.end() == section.end() {
            debug!("processing last dex file at offset {offset:#x}");
            DexPosition::Last
        } else if span.end() < section.end() {
            debug!("processing dex file at offset {offset:#x}");
            DexPosition::Intermediate
        } else {
            return Err(exceeds);
        };

        let is_final_entry = index + 1 == container.header.number_of_dex_files as usize;
        if is_final_entry && position == DexPosition::Intermediate {
            warn!(
                "dex file #{index} is the final entry but leaves {:#x} trailing bytes in the dex section",
                section.end() - span.end()
            );
        }

        self.next_offset = span.end();
        Ok(DexFileRef {
            index,
            span,
            position,
        })
    }
}

/// Borrowing iterator over the DEX files of a container.
pub struct DexFiles<'a> {
    container: Container,
    bytes: &'a [u8],
    cursor: ModuleCursor,
}

impl<'a> DexFiles<'a> {
    pub fn new(container: Container, bytes: &'a [u8]) -> Self {
        Self {
            cursor: ModuleCursor::new(&container),
            container,
            bytes,
        }
    }
}

impl Iterator for DexFiles<'_> {
    type Item = Result<DexFileRef, ModuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_module(&self.container, self.bytes)
    }
}
