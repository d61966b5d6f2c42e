//! Error types for container parsing and unquickening.
//!
//! Module-level errors ([`ModuleError`]) are recoverable: the driver logs them
//! and moves on to the next DEX file. Everything wrapped in [`UnquickenError`]
//! aborts the whole pass.

use thiserror::Error;
use unvdex_bytes::BoundsError;

/// The VDEX header cannot be trusted; nothing else in the file is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("file is {len} bytes, too small for a vdex header")]
    Truncated { len: usize },

    #[error("bad vdex magic {found:02x?}")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported vdex version {found:02x?}")]
    BadVersion { found: [u8; 4] },

    #[error("{section} section {start:#x}..{end:#x} exceeds file size {file_len:#x}")]
    SectionOutOfBounds {
        section: &'static str,
        start: usize,
        end: usize,
        file_len: usize,
    },

    #[error("section layout overflows the address space")]
    Overflow,
}

/// A single embedded DEX file could not be located or walked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("dex file #{index} at {offset:#x}: header does not fit in the dex section")]
    HeaderTruncated { index: usize, offset: usize },

    #[error("dex file #{index} at {offset:#x}: declared size {declared_size:#x} is smaller than a dex header")]
    TooSmall {
        index: usize,
        offset: usize,
        declared_size: u32,
    },

    #[error("dex file #{index} at {offset:#x}: declared size {declared_size:#x} runs past the dex section end {section_end:#x}")]
    ExceedsSection {
        index: usize,
        offset: usize,
        declared_size: u32,
        section_end: usize,
    },

    #[error("dex file #{index} cannot be located after an earlier corrupt entry")]
    Unreachable { index: usize },

    #[error("dex file #{index}: invalid dex magic")]
    BadMagic { index: usize },

    #[error("dex file #{index}: {source}")]
    Structure {
        index: usize,
        #[source]
        source: WalkError,
    },
}

/// Structural problems found while walking one DEX file's class table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("dex header: {0}")]
    Header(BoundsError),

    #[error("class_defs table ({count} entries at {offset:#x}) does not fit in the file")]
    ClassDefsOutOfBounds { count: u32, offset: u32 },

    #[error("class_def #{class_def_index}: {source}")]
    ClassData {
        class_def_index: u32,
        #[source]
        source: ClassDataError,
    },

    #[error("method #{method_idx}: code item at {code_off:#x} does not fit in the file")]
    CodeItemOutOfBounds { method_idx: u32, code_off: u32 },
}

/// Failure decoding a class-data record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassDataError {
    #[error("class data offset {offset:#x} is outside the file")]
    BadOffset { offset: u32 },

    #[error("record at {position:#x}: {source}")]
    Record {
        position: usize,
        #[source]
        source: BoundsError,
    },
}

/// The instruction-revert transform could not process a method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevertError {
    #[error("quickening info names pc {found:#x}, expected {expected:#x}")]
    PcMismatch { expected: usize, found: u32 },

    #[error("quickening info exhausted at pc {pc:#x}")]
    InfoExhausted { pc: usize },

    #[error("index {index} at pc {pc:#x} does not fit the operand")]
    IndexOverflow { pc: usize, index: u32 },

    #[error("instruction at pc {pc:#x} runs past the end of the code item")]
    TruncatedInstruction { pc: usize },

    #[error("{remaining} bytes of quickening info left unused")]
    UnusedInfo { remaining: usize },

    #[error("malformed quickening info: {0}")]
    Malformed(BoundsError),
}

/// Fatal failures of the unquickening pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnquickenError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("quickening record at {offset:#x} needs {needed} bytes but only {remaining} remain")]
    RecordOverrun {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("failed to revert method #{method_idx} of dex file #{module} (code item {code_off:#x}): {source}")]
    Revert {
        module: usize,
        method_idx: u32,
        code_off: u32,
        #[source]
        source: RevertError,
    },

    #[error("consumed {consumed} of {declared} quickening info bytes")]
    UnconsumedQuickeningInfo { consumed: usize, declared: usize },
}

impl UnquickenError {
    /// Whether the quickening-info stream and the method traversal disagree.
    pub fn is_stream_desync(&self) -> bool {
        matches!(
            self,
            Self::RecordOverrun { .. } | Self::UnconsumedQuickeningInfo { .. }
        )
    }
}
