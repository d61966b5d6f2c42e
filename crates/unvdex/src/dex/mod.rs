//! DEX file structures needed to reach method code.
//!
//! Only the parts of the format on the path from the file header to a
//! method's instructions are modelled: the header, the `class_defs` table,
//! class-data records and code item headers.

mod checksum;
mod class_data;
mod walker;

pub use checksum::{adler32, compute_checksum, repair_checksum, verify_checksum};
pub use class_data::{
    ClassDataHeader, ClassDataReader, FieldEntry, Leb128ClassDataReader, MethodEntry,
};
pub use walker::{walk_code_items, CodeItemRef, MethodKind, CODE_ITEM_HEADER_SIZE};

use log::debug;
use unvdex_bytes::{load_u32, BoundsError};

pub const DEX_MAGIC_PREFIX: [u8; 4] = *b"dex\n";
pub const DEX_VERSIONS: [[u8; 3]; 4] = [*b"035", *b"037", *b"038", *b"039"];
pub const DEX_HEADER_SIZE: usize = 0x70;
pub const DEX_CHECKSUM_OFFSET: usize = 0x08;
pub const DEX_SIGNATURE_OFFSET: usize = 0x0c;
pub const DEX_FILE_SIZE_OFFSET: usize = 0x20;
pub const CLASS_DEF_ITEM_SIZE: usize = 0x20;
pub const CLASS_DATA_OFF_IN_CLASS_DEF: usize = 0x18;

/// Check `"dex\n"`, a known three-digit version and the trailing NUL.
pub fn is_magic_valid(dex: &[u8]) -> bool {
    match dex.get(..8) {
        Some(magic) => {
            magic[..4] == DEX_MAGIC_PREFIX
                && DEX_VERSIONS.iter().any(|v| magic[4..7] == v[..])
                && magic[7] == 0
        }
        None => false,
    }
}

/// Fixed-offset fields of a DEX header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DexHeader {
    pub version: [u8; 3],
    pub checksum: u32,
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub string_ids_size: u32,
    pub type_ids_size: u32,
    pub proto_ids_size: u32,
    pub field_ids_size: u32,
    pub method_ids_size: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
    pub data_size: u32,
    pub data_off: u32,
}

impl DexHeader {
    pub fn read(dex: &[u8]) -> Result<Self, BoundsError> {
        if dex.len() < DEX_HEADER_SIZE {
            return Err(BoundsError::OutOfBounds);
        }
        let mut version = [0u8; 3];
        version.copy_from_slice(&dex[4..7]);
        Ok(Self {
            version,
            checksum: load_u32(dex, DEX_CHECKSUM_OFFSET)?,
            file_size: load_u32(dex, DEX_FILE_SIZE_OFFSET)?,
            header_size: load_u32(dex, 0x24)?,
            endian_tag: load_u32(dex, 0x28)?,
            string_ids_size: load_u32(dex, 0x38)?,
            type_ids_size: load_u32(dex, 0x40)?,
            proto_ids_size: load_u32(dex, 0x48)?,
            field_ids_size: load_u32(dex, 0x50)?,
            method_ids_size: load_u32(dex, 0x58)?,
            class_defs_size: load_u32(dex, 0x60)?,
            class_defs_off: load_u32(dex, 0x64)?,
            data_size: load_u32(dex, 0x68)?,
            data_off: load_u32(dex, 0x6c)?,
        })
    }

    /// Log the header at debug level.
    pub fn dump(&self, index: usize) {
        debug!(
            "dex file #{index}: version={} checksum={:#010x} file_size={:#x} header_size={:#x} endian_tag={:#010x}",
            String::from_utf8_lossy(&self.version),
            self.checksum,
            self.file_size,
            self.header_size,
            self.endian_tag,
        );
        debug!(
            "dex file #{index}: strings={} types={} protos={} fields={} methods={} classes={} (at {:#x}) data={:#x}@{:#x}",
            self.string_ids_size,
            self.type_ids_size,
            self.proto_ids_size,
            self.field_ids_size,
            self.method_ids_size,
            self.class_defs_size,
            self.class_defs_off,
            self.data_size,
            self.data_off,
        );
    }
}
