//! The unquickening pass.
//!
//! The quickening-info section is a flat run of records, one per method that
//! has code, in the order [`walk_code_items`] visits methods across all DEX
//! files. Each record is a little-endian `u32` length followed by that many
//! payload bytes. Nothing in a record says which method it belongs to, so the
//! traversal here must match the writer's exactly, and the records must use
//! up the section with nothing left over.

use crate::decompiler::QuickeningReverter;
use crate::dex::{self, walk_code_items, ClassDataReader, DexHeader};
use crate::error::{ModuleError, UnquickenError};
use crate::vdex::{Container, ModuleCursor};
use log::{debug, error, info};
use unvdex_bytes::{Cursor, Span};

/// What a successful pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnquickenReport {
    /// DEX files that were walked and had their records applied.
    pub dex_files_processed: usize,
    /// DEX files skipped because they could not be located or walked.
    pub skipped: Vec<ModuleError>,
    /// Methods handed to the reverter.
    pub methods_reverted: usize,
    /// Bytes of quickening info consumed; equals the section size on success.
    pub quickening_info_consumed: usize,
}

/// Read position in the quickening-info section.
struct QuickeningCursor<'a> {
    cursor: Cursor<'a>,
}

impl<'a> QuickeningCursor<'a> {
    /// Cursor over the first `len` bytes of `section`.
    fn new(section: &'a [u8], len: usize) -> Result<Self, UnquickenError> {
        let cursor = Cursor::new(section, Span { start: 0, len }).map_err(|_| {
            UnquickenError::RecordOverrun {
                offset: 0,
                needed: len,
                remaining: section.len(),
            }
        })?;
        Ok(Self { cursor })
    }

    fn consumed(&self) -> usize {
        self.cursor.position()
    }

    fn overrun(&self, needed: usize) -> UnquickenError {
        UnquickenError::RecordOverrun {
            offset: self.cursor.position(),
            needed,
            remaining: self.cursor.remaining(),
        }
    }

    /// Read the next length-prefixed record. A failed read leaves the
    /// position on the record that did not fit.
    fn next_record(&mut self) -> Result<&'a [u8], UnquickenError> {
        let length = self.cursor.read_u32_le().map_err(|_| self.overrun(4))? as usize;
        self.cursor
            .read_bytes(length)
            .map_err(|_| self.overrun(length))
    }
}

/// Revert quickened instructions in every DEX file of `vdex`, in place.
///
/// DEX files that cannot be located or walked are logged and skipped. A
/// reverter failure, a record running past the section, or records that do
/// not add up to the section size abort the pass; the buffer may then be
/// partially rewritten.
pub fn unquicken<R, Q>(
    vdex: &mut [u8],
    reader: &R,
    reverter: &mut Q,
) -> Result<UnquickenReport, UnquickenError>
where
    R: ClassDataReader + ?Sized,
    Q: QuickeningReverter + ?Sized,
{
    let container = Container::parse(vdex)?;
    let mut report = UnquickenReport::default();

    let declared = container.sections.quickening_info.len;
    if declared == 0 {
        // Every method with code needs a record, so an empty section means
        // the file was never quickened.
        debug!("no quickening info, nothing to revert");
        return Ok(report);
    }

    // DEX files all lie before the quickening info, so the two halves can be
    // borrowed independently.
    let (head, tail) = vdex.split_at_mut(container.sections.quickening_info.start);
    let mut records = QuickeningCursor::new(tail, declared)?;
    let mut modules = ModuleCursor::new(&container);

    while let Some(located) = modules.next_module(&container, head) {
        let file = match located {
            Ok(file) => file,
            Err(err) => {
                error!("failed to unquicken {err} - skipping");
                report.skipped.push(err);
                continue;
            }
        };
        let index = file.index;
        let dex_bytes = &mut head[file.span.start..file.span.end()];

        if !dex::is_magic_valid(dex_bytes) {
            let err = ModuleError::BadMagic { index };
            error!("failed to unquicken {err} - skipping");
            report.skipped.push(err);
            continue;
        }
        match DexHeader::read(dex_bytes) {
            Ok(header) => header.dump(index),
            Err(err) => debug!("dex file #{index}: header not readable ({err})"),
        }

        let code_items = match walk_code_items(dex_bytes, reader) {
            Ok(items) => items,
            Err(source) => {
                let err = ModuleError::Structure { index, source };
                error!("failed to unquicken {err} - skipping");
                report.skipped.push(err);
                continue;
            }
        };

        for item in &code_items {
            let record = records.next_record()?;
            let insns = &mut dex_bytes[item.insns.start..item.insns.end()];
            reverter
                .revert(insns, record)
                .map_err(|source| UnquickenError::Revert {
                    module: index,
                    method_idx: item.method_idx,
                    code_off: item.code_off,
                    source,
                })?;
        }
        debug!("dex file #{index}: reverted {} methods", code_items.len());
        report.methods_reverted += code_items.len();
        report.dex_files_processed += 1;
    }

    report.quickening_info_consumed = records.consumed();
    if report.quickening_info_consumed != declared {
        error!("failed to process all quickening info");
        return Err(UnquickenError::UnconsumedQuickeningInfo {
            consumed: report.quickening_info_consumed,
            declared,
        });
    }

    info!(
        "reverted {} methods in {} dex files",
        report.methods_reverted, report.dex_files_processed
    );
    Ok(report)
}
