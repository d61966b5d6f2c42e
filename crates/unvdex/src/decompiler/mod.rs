//! Reverting quickened instructions.
//!
//! The driver hands every method's instruction array, together with that
//! method's quickening-info record, to a [`QuickeningReverter`].
//! [`DexDecompiler`] implements the record format written by the ART
//! dex-to-dex compiler: a ULEB128 `(dex_pc, index)` pair for every quickened
//! instruction, in instruction order.

pub mod opcodes;

use crate::error::RevertError;
use log::trace;
use unvdex_bytes::{load_u16, store_u16, store_u8, Cursor, Span};

/// Rewrites one method's instructions in place using its quickening record.
pub trait QuickeningReverter {
    fn revert(&mut self, insns: &mut [u8], quickening_info: &[u8]) -> Result<(), RevertError>;
}

/// Options for [`DexDecompiler`].
#[derive(Debug, Clone, Copy)]
pub struct DexDecompiler {
    /// Turn `return-void-no-barrier` back into `return-void`.
    pub decompile_return_instruction: bool,
}

impl Default for DexDecompiler {
    fn default() -> Self {
        Self {
            decompile_return_instruction: true,
        }
    }
}

impl DexDecompiler {
    pub fn new(decompile_return_instruction: bool) -> Self {
        Self {
            decompile_return_instruction,
        }
    }
}

/// Read position in one method's quickening record.
struct QuickeningInfo<'a> {
    cursor: Cursor<'a>,
}

impl<'a> QuickeningInfo<'a> {
    fn new(info: &'a [u8]) -> Result<Self, RevertError> {
        let cursor =
            Cursor::new(info, Span::whole(info.len())).map_err(RevertError::Malformed)?;
        Ok(Self { cursor })
    }

    /// The pc of the next entry, without consuming it.
    fn peek_pc(&self) -> Result<Option<u32>, RevertError> {
        if self.cursor.is_at_end() {
            return Ok(None);
        }
        let mut lookahead = self.cursor.clone();
        let pc = lookahead
            .read_uleb128_u32()
            .map_err(RevertError::Malformed)?;
        Ok(Some(pc))
    }

    /// Consume the entry for `pc` and return its index.
    fn index_at(&mut self, pc: usize) -> Result<u16, RevertError> {
        if self.cursor.is_at_end() {
            return Err(RevertError::InfoExhausted { pc });
        }
        let found = self.read()?;
        if found as usize != pc {
            return Err(RevertError::PcMismatch {
                expected: pc,
                found,
            });
        }
        let index = self.read()?;
        u16::try_from(index).map_err(|_| RevertError::IndexOverflow { pc, index })
    }

    fn read(&mut self) -> Result<u32, RevertError> {
        self.cursor.read_uleb128_u32().map_err(RevertError::Malformed)
    }
}

impl QuickeningReverter for DexDecompiler {
    fn revert(&mut self, insns: &mut [u8], quickening_info: &[u8]) -> Result<(), RevertError> {
        let mut info = QuickeningInfo::new(quickening_info)?;
        let units = insns.len() / 2;
        let mut pc = 0usize;

        while pc < units {
            let at = pc * 2;
            let first = load_u16(insns, at).map_err(RevertError::Malformed)?;
            let opcode = (first & 0xff) as u8;

            match opcode {
                opcodes::RETURN_VOID_NO_BARRIER if self.decompile_return_instruction => {
                    trace!("pc {pc:#x}: return-void-no-barrier -> return-void");
                    set_opcode(insns, at, opcodes::RETURN_VOID)?;
                }
                // A check-cast the compiler proved redundant is two plain nops;
                // only a bare 0x0000 unit can be one (payloads share opcode 0).
                opcodes::NOP if first == 0 => {
                    if info.peek_pc()? == Some(pc as u32) {
                        let register = info.index_at(pc)?;
                        let type_index = info.index_at(pc)?;
                        let register =
                            u8::try_from(register).map_err(|_| RevertError::IndexOverflow {
                                pc,
                                index: u32::from(register),
                            })?;
                        if pc + 1 >= units {
                            return Err(RevertError::TruncatedInstruction { pc });
                        }
                        trace!("pc {pc:#x}: nop -> check-cast v{register}, type@{type_index}");
                        set_opcode(insns, at, opcodes::CHECK_CAST)?;
                        store_u8(insns, at + 1, register).map_err(RevertError::Malformed)?;
                        store_u16(insns, at + 2, type_index).map_err(RevertError::Malformed)?;
                    }
                }
                op => {
                    if let Some(original) = opcodes::unquickened(op) {
                        let index = info.index_at(pc)?;
                        if pc + 1 >= units {
                            return Err(RevertError::TruncatedInstruction { pc });
                        }
                        trace!("pc {pc:#x}: {op:#04x} -> {original:#04x}, index {index}");
                        set_opcode(insns, at, original)?;
                        store_u16(insns, at + 2, index).map_err(RevertError::Malformed)?;
                    }
                }
            }

            // Width is taken after the rewrite: a restored check-cast spans
            // both of the nops it replaced.
            let width = opcodes::width_at(insns, pc).map_err(RevertError::Malformed)?;
            let next = pc.checked_add(width).ok_or(RevertError::TruncatedInstruction { pc })?;
            if next > units {
                return Err(RevertError::TruncatedInstruction { pc });
            }
            pc = next;
        }

        if !info.cursor.is_at_end() {
            return Err(RevertError::UnusedInfo {
                remaining: info.cursor.remaining(),
            });
        }
        Ok(())
    }
}

fn set_opcode(insns: &mut [u8], at: usize, opcode: u8) -> Result<(), RevertError> {
    store_u8(insns, at, opcode).map_err(RevertError::Malformed)
}
