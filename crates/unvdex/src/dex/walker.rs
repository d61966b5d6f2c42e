//! Structural walk from the class table down to method code items.
//!
//! The order in which code items are produced is the order the quickening
//! info was written in: class_defs in table order, then per class its direct
//! methods followed by its virtual methods. Classes without class data and
//! methods without code produce nothing.

use super::{
    ClassDataReader, DexHeader, CLASS_DATA_OFF_IN_CLASS_DEF, CLASS_DEF_ITEM_SIZE,
};
use crate::error::{ClassDataError, WalkError};
use log::{debug, trace};
use unvdex_bytes::{load_u32, Cursor, Span};

/// `registers_size`, `ins_size`, `outs_size`, `tries_size`, `debug_info_off`,
/// `insns_size`.
pub const CODE_ITEM_HEADER_SIZE: usize = 16;
const INSNS_SIZE_OFFSET: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Direct,
    Virtual,
}

/// A method with code, located inside its DEX file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeItemRef {
    pub class_def_index: u32,
    pub method_idx: u32,
    pub kind: MethodKind,
    pub code_off: u32,
    /// The instruction array, relative to the start of the DEX file.
    pub insns: Span,
}

/// Collect every method code item of `dex` in traversal order.
///
/// `dex` must be exactly one DEX file; all offsets are relative to its start
/// and are checked against its length.
pub fn walk_code_items<R: ClassDataReader + ?Sized>(
    dex: &[u8],
    reader: &R,
) -> Result<Vec<CodeItemRef>, WalkError> {
    let header = DexHeader::read(dex).map_err(WalkError::Header)?;
    let file = Span::whole(dex.len());
    let class_defs_out_of_bounds = || WalkError::ClassDefsOutOfBounds {
        count: header.class_defs_size,
        offset: header.class_defs_off,
    };
    let table_len = (header.class_defs_size as usize)
        .checked_mul(CLASS_DEF_ITEM_SIZE)
        .ok_or_else(class_defs_out_of_bounds)?;
    let class_defs = file
        .sub(header.class_defs_off as usize, table_len)
        .map_err(|_| class_defs_out_of_bounds())?;

    debug!("number of classes: {}", header.class_defs_size);

    let mut code_items = Vec::new();
    for class_def_index in 0..header.class_defs_size {
        let entry = class_defs.start + class_def_index as usize * CLASS_DEF_ITEM_SIZE;
        let class_data_off = load_u32(dex, entry + CLASS_DATA_OFF_IN_CLASS_DEF)
            .map_err(|_| class_defs_out_of_bounds())?;
        trace!("class #{class_def_index}: class_data_off={class_data_off:#x}");
        if class_data_off == 0 {
            continue;
        }
        walk_class(dex, reader, class_def_index, class_data_off, &mut code_items)?;
    }
    Ok(code_items)
}

fn walk_class<R: ClassDataReader + ?Sized>(
    dex: &[u8],
    reader: &R,
    class_def_index: u32,
    class_data_off: u32,
    out: &mut Vec<CodeItemRef>,
) -> Result<(), WalkError> {
    let in_class = |source: ClassDataError| WalkError::ClassData {
        class_def_index,
        source,
    };
    let file = Span::whole(dex.len());
    let mut cursor = Cursor::at(dex, file, class_data_off as usize).map_err(|_| {
        in_class(ClassDataError::BadOffset {
            offset: class_data_off,
        })
    })?;

    let counts = reader.read_header(&mut cursor).map_err(in_class)?;
    debug!(
        "class #{class_def_index}: static_fields={} instance_fields={} direct_methods={} virtual_methods={}",
        counts.static_fields_size,
        counts.instance_fields_size,
        counts.direct_methods_size,
        counts.virtual_methods_size,
    );

    // Fields carry no code; decode them only to move past them.
    for _ in 0..counts.static_fields_size {
        reader.read_field(&mut cursor).map_err(in_class)?;
    }
    for _ in 0..counts.instance_fields_size {
        reader.read_field(&mut cursor).map_err(in_class)?;
    }

    for (kind, count) in [
        (MethodKind::Direct, counts.direct_methods_size),
        (MethodKind::Virtual, counts.virtual_methods_size),
    ] {
        // Method indices are delta-encoded and restart with each list.
        let mut method_idx: u32 = 0;
        for _ in 0..count {
            let method = reader.read_method(&mut cursor).map_err(in_class)?;
            method_idx = method_idx.wrapping_add(method.method_idx_diff);
            if method.code_off == 0 {
                continue;
            }
            let insns = locate_insns(dex, method.code_off).ok_or(
                WalkError::CodeItemOutOfBounds {
                    method_idx,
                    code_off: method.code_off,
                },
            )?;
            out.push(CodeItemRef {
                class_def_index,
                method_idx,
                kind,
                code_off: method.code_off,
                insns,
            });
        }
    }
    Ok(())
}

/// The `insns` span of the code item at `code_off`, if it fits in the file.
fn locate_insns(dex: &[u8], code_off: u32) -> Option<Span> {
    let file = Span::whole(dex.len());
    let header = file.sub(code_off as usize, CODE_ITEM_HEADER_SIZE).ok()?;
    let insns_size = load_u32(dex, header.start + INSNS_SIZE_OFFSET).ok()?;
    let insns_len = (insns_size as usize).checked_mul(2)?;
    file.sub(header.end(), insns_len).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::Leb128ClassDataReader;
    use crate::testing::{ClassSpec, DexImage};

    #[test]
    fn order_is_class_then_direct_then_virtual() {
        let image = DexImage::new()
            .class(
                ClassSpec::new()
                    .fields(2, 1)
                    .virtual_method(vec![0x000e])
                    .direct_method(vec![0x000e, 0x0000])
                    .native_direct_method()
                    .direct_method(vec![0x000e]),
            )
            .class(ClassSpec::without_data())
            .class(ClassSpec::new().virtual_method(vec![0x000e]))
            .build();

        let items = walk_code_items(&image.bytes, &Leb128ClassDataReader).unwrap();
        let summary: Vec<_> = items
            .iter()
            .map(|item| (item.class_def_index, item.kind, item.method_idx))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, MethodKind::Direct, 0),
                (0, MethodKind::Direct, 2),
                (0, MethodKind::Virtual, 0),
                (2, MethodKind::Virtual, 0),
            ]
        );
        let insns: Vec<_> = items.iter().map(|item| item.insns.start).collect();
        assert_eq!(insns, image.insns_offsets);
        assert_eq!(items[0].insns.len, 4);
        assert_eq!(items[1].insns.len, 2);
    }

    #[test]
    fn class_without_methods_yields_nothing() {
        let image = DexImage::new()
            .class(ClassSpec::new().fields(3, 3))
            .class(ClassSpec::new().native_direct_method())
            .build();
        let items = walk_code_items(&image.bytes, &Leb128ClassDataReader).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn class_defs_out_of_bounds() {
        let mut image = DexImage::new().class(ClassSpec::new()).build();
        image.bytes[0x60..0x64].copy_from_slice(&1000u32.to_le_bytes());
        assert_eq!(
            walk_code_items(&image.bytes, &Leb128ClassDataReader),
            Err(WalkError::ClassDefsOutOfBounds {
                count: 1000,
                offset: 0x70
            })
        );
    }

    #[test]
    fn class_data_offset_past_end() {
        let mut image = DexImage::new().class(ClassSpec::new()).build();
        let bogus = image.bytes.len() as u32 + 4;
        image.bytes[0x70 + 0x18..0x70 + 0x1c].copy_from_slice(&bogus.to_le_bytes());
        assert!(matches!(
            walk_code_items(&image.bytes, &Leb128ClassDataReader),
            Err(WalkError::ClassData {
                class_def_index: 0,
                source: ClassDataError::BadOffset { .. }
            })
        ));
    }

    #[test]
    fn code_item_past_end() {
        let mut image = DexImage::new()
            .class(ClassSpec::new().direct_method(vec![0x000e]))
            .build();
        // Inflate insns_size of the only code item.
        let insns_size_at = image.insns_offsets[0] - CODE_ITEM_HEADER_SIZE + 12;
        image.bytes[insns_size_at..insns_size_at + 4].copy_from_slice(&0x10000u32.to_le_bytes());
        assert!(matches!(
            walk_code_items(&image.bytes, &Leb128ClassDataReader),
            Err(WalkError::CodeItemOutOfBounds { method_idx: 0, .. })
        ));
    }
}
