//! Dalvik opcode numbers and instruction widths.

use unvdex_bytes::{load_u16, load_u32, BoundsError};

pub const NOP: u8 = 0x00;
pub const RETURN_VOID: u8 = 0x0e;
pub const CHECK_CAST: u8 = 0x1f;
pub const IGET: u8 = 0x52;
pub const IGET_WIDE: u8 = 0x53;
pub const IGET_OBJECT: u8 = 0x54;
pub const IGET_BOOLEAN: u8 = 0x55;
pub const IGET_BYTE: u8 = 0x56;
pub const IGET_CHAR: u8 = 0x57;
pub const IGET_SHORT: u8 = 0x58;
pub const IPUT: u8 = 0x59;
pub const IPUT_WIDE: u8 = 0x5a;
pub const IPUT_OBJECT: u8 = 0x5b;
pub const IPUT_BOOLEAN: u8 = 0x5c;
pub const IPUT_BYTE: u8 = 0x5d;
pub const IPUT_CHAR: u8 = 0x5e;
pub const IPUT_SHORT: u8 = 0x5f;
pub const INVOKE_VIRTUAL: u8 = 0x6e;
pub const RETURN_VOID_NO_BARRIER: u8 = 0x73;
pub const INVOKE_VIRTUAL_RANGE: u8 = 0x74;
pub const IGET_QUICK: u8 = 0xe3;
pub const IGET_WIDE_QUICK: u8 = 0xe4;
pub const IGET_OBJECT_QUICK: u8 = 0xe5;
pub const IPUT_QUICK: u8 = 0xe6;
pub const IPUT_WIDE_QUICK: u8 = 0xe7;
pub const IPUT_OBJECT_QUICK: u8 = 0xe8;
pub const INVOKE_VIRTUAL_QUICK: u8 = 0xe9;
pub const INVOKE_VIRTUAL_RANGE_QUICK: u8 = 0xea;
pub const IPUT_BOOLEAN_QUICK: u8 = 0xeb;
pub const IPUT_BYTE_QUICK: u8 = 0xec;
pub const IPUT_CHAR_QUICK: u8 = 0xed;
pub const IPUT_SHORT_QUICK: u8 = 0xee;
pub const IGET_BOOLEAN_QUICK: u8 = 0xef;
pub const IGET_BYTE_QUICK: u8 = 0xf0;
pub const IGET_CHAR_QUICK: u8 = 0xf1;
pub const IGET_SHORT_QUICK: u8 = 0xf2;

/// First code unit of the data-carrying pseudo-instructions.
pub const PACKED_SWITCH_PAYLOAD: u16 = 0x0100;
pub const SPARSE_SWITCH_PAYLOAD: u16 = 0x0200;
pub const FILL_ARRAY_DATA_PAYLOAD: u16 = 0x0300;

/// The original opcode of a quickened field access or virtual invoke.
///
/// In every one of these formats (22c, 35c, 3rc) the index being restored is
/// the whole second code unit.
pub fn unquickened(opcode: u8) -> Option<u8> {
    let original = match opcode {
        IGET_QUICK => IGET,
        IGET_WIDE_QUICK => IGET_WIDE,
        IGET_OBJECT_QUICK => IGET_OBJECT,
        IGET_BOOLEAN_QUICK => IGET_BOOLEAN,
        IGET_BYTE_QUICK => IGET_BYTE,
        IGET_CHAR_QUICK => IGET_CHAR,
        IGET_SHORT_QUICK => IGET_SHORT,
        IPUT_QUICK => IPUT,
        IPUT_WIDE_QUICK => IPUT_WIDE,
        IPUT_OBJECT_QUICK => IPUT_OBJECT,
        IPUT_BOOLEAN_QUICK => IPUT_BOOLEAN,
        IPUT_BYTE_QUICK => IPUT_BYTE,
        IPUT_CHAR_QUICK => IPUT_CHAR,
        IPUT_SHORT_QUICK => IPUT_SHORT,
        INVOKE_VIRTUAL_QUICK => INVOKE_VIRTUAL,
        INVOKE_VIRTUAL_RANGE_QUICK => INVOKE_VIRTUAL_RANGE,
        _ => return None,
    };
    Some(original)
}

/// Width in code units of an ordinary (non-payload) instruction.
pub const fn width(opcode: u8) -> usize {
    match opcode {
        0x00 => 1,
        0x01 | 0x04 | 0x07 => 1,
        0x02 | 0x05 | 0x08 => 2,
        0x03 | 0x06 | 0x09 => 3,
        0x0a..=0x12 => 1,
        0x13 => 2,
        0x14 => 3,
        0x15 | 0x16 => 2,
        0x17 => 3,
        0x18 => 5,
        0x19 | 0x1a => 2,
        0x1b => 3,
        0x1c => 2,
        0x1d | 0x1e => 1,
        0x1f | 0x20 => 2,
        0x21 => 1,
        0x22 | 0x23 => 2,
        0x24..=0x26 => 3,
        0x27 | 0x28 => 1,
        0x29 => 2,
        0x2a..=0x2c => 3,
        0x2d..=0x3d => 2,
        0x3e..=0x43 => 1,
        0x44..=0x6d => 2,
        0x6e..=0x72 => 3,
        0x73 => 1,
        0x74..=0x78 => 3,
        0x79..=0x8f => 1,
        0x90..=0xaf => 2,
        0xb0..=0xcf => 1,
        0xd0..=0xe8 => 2,
        0xe9 | 0xea => 3,
        0xeb..=0xf2 => 2,
        0xf3..=0xf9 => 1,
        0xfa | 0xfb => 4,
        0xfc | 0xfd => 3,
        0xfe | 0xff => 2,
    }
}

/// Width in code units of the instruction at code unit `pc` of `insns`,
/// including the variable-length payload pseudo-instructions.
pub fn width_at(insns: &[u8], pc: usize) -> Result<usize, BoundsError> {
    let byte_at = |unit: usize| {
        pc.checked_add(unit)
            .and_then(|u| u.checked_mul(2))
            .ok_or(BoundsError::Overflow)
    };
    let first = load_u16(insns, byte_at(0)?)?;
    let units = match first {
        PACKED_SWITCH_PAYLOAD => {
            let size = load_u16(insns, byte_at(1)?)? as usize;
            4 + size * 2
        }
        SPARSE_SWITCH_PAYLOAD => {
            let size = load_u16(insns, byte_at(1)?)? as usize;
            2 + size * 4
        }
        FILL_ARRAY_DATA_PAYLOAD => {
            let element_width = load_u16(insns, byte_at(1)?)? as usize;
            let size = load_u32(insns, byte_at(2)?)? as usize;
            let data_bytes = element_width
                .checked_mul(size)
                .ok_or(BoundsError::Overflow)?;
            4 + data_bytes.div_ceil(2)
        }
        _ => width((first & 0xff) as u8),
    };
    Ok(units)
}
