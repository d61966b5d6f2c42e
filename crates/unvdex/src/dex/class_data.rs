//! Class-data records.
//!
//! The walker only needs the record counts and each method's code offset, and
//! it reads them through [`ClassDataReader`] so the encoding can be swapped.
//! [`Leb128ClassDataReader`] decodes the standard `class_data_item` layout.

use crate::error::ClassDataError;
use unvdex_bytes::Cursor;

/// Record counts at the start of a `class_data_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassDataHeader {
    pub static_fields_size: u32,
    pub instance_fields_size: u32,
    pub direct_methods_size: u32,
    pub virtual_methods_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntry {
    pub field_idx_diff: u32,
    pub access_flags: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodEntry {
    pub method_idx_diff: u32,
    pub access_flags: u32,
    /// Offset of the code item from the start of the DEX file; 0 for native
    /// and abstract methods.
    pub code_off: u32,
}

/// Decoder for class-data records.
///
/// Each method consumes exactly one record at the cursor and leaves the
/// cursor on the next one.
pub trait ClassDataReader {
    fn read_header(&self, cursor: &mut Cursor<'_>) -> Result<ClassDataHeader, ClassDataError>;

    fn read_field(&self, cursor: &mut Cursor<'_>) -> Result<FieldEntry, ClassDataError>;

    fn read_method(&self, cursor: &mut Cursor<'_>) -> Result<MethodEntry, ClassDataError>;
}

/// The `class_data_item` encoding used by every DEX version: all values ULEB128.
#[derive(Debug, Clone, Copy, Default)]
pub struct Leb128ClassDataReader;

fn uleb(cursor: &mut Cursor<'_>) -> Result<u32, ClassDataError> {
    let position = cursor.position();
    cursor
        .read_uleb128_u32()
        .map_err(|source| ClassDataError::Record { position, source })
}

impl ClassDataReader for Leb128ClassDataReader {
    fn read_header(&self, cursor: &mut Cursor<'_>) -> Result<ClassDataHeader, ClassDataError> {
        Ok(ClassDataHeader {
            static_fields_size: uleb(cursor)?,
            instance_fields_size: uleb(cursor)?,
            direct_methods_size: uleb(cursor)?,
            virtual_methods_size: uleb(cursor)?,
        })
    }

    fn read_field(&self, cursor: &mut Cursor<'_>) -> Result<FieldEntry, ClassDataError> {
        Ok(FieldEntry {
            field_idx_diff: uleb(cursor)?,
            access_flags: uleb(cursor)?,
        })
    }

    fn read_method(&self, cursor: &mut Cursor<'_>) -> Result<MethodEntry, ClassDataError> {
        Ok(MethodEntry {
            method_idx_diff: uleb(cursor)?,
            access_flags: uleb(cursor)?,
            code_off: uleb(cursor)?,
        })
    }
}
