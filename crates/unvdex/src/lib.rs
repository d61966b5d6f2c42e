//! unvdex — extract DEX files from Android VDEX containers.
//!
//! A VDEX file packs one or more DEX files whose instructions may have been
//! "quickened" by the ART dex-to-dex compiler. This crate locates the DEX
//! files, reverts the quickened instructions using the container's
//! quickening info, repairs the DEX checksums and hands back standalone DEX
//! images.

pub mod decompiler;
pub mod dex;
pub mod error;
pub mod unquicken;
pub mod vdex;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use decompiler::{DexDecompiler, QuickeningReverter};
pub use error::{HeaderError, ModuleError, RevertError, UnquickenError};
pub use unquicken::{unquicken, UnquickenReport};
pub use vdex::{dex_file_name, Container};

use dex::Leb128ClassDataReader;
use log::{error, info, warn};
use unvdex_bytes::Span;

/// Configuration options for extraction
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Revert quickened instructions before extracting.
    pub unquicken: bool,
    /// Turn `return-void-no-barrier` back into `return-void` while unquickening.
    pub decompile_return_instruction: bool,
    /// Recompute the header checksum of every extracted DEX file.
    pub repair_checksums: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            unquicken: true,
            decompile_return_instruction: true,
            repair_checksums: true,
        }
    }
}

/// One DEX file recovered from the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedDex {
    pub index: usize,
    /// Absolute range in [`Extraction::bytes`].
    pub range: Span,
    /// The container's location checksum for this file.
    pub location_checksum: Option<u32>,
    pub checksum_repaired: bool,
}

/// Result of [`extract`]: the rewritten container and where its DEX files are.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub bytes: Vec<u8>,
    pub dex_files: Vec<ExtractedDex>,
    /// DEX files that could not be extracted.
    pub skipped: Vec<ModuleError>,
    /// Present when unquickening ran.
    pub unquicken_report: Option<UnquickenReport>,
}

impl Extraction {
    /// Bytes of the `i`-th extracted DEX file.
    pub fn dex_bytes(&self, i: usize) -> Option<&[u8]> {
        let dex = self.dex_files.get(i)?;
        unvdex_bytes::slice(&self.bytes, dex.range).ok()
    }
}

/// Extract every DEX file of a VDEX container.
///
/// This is the main entry point. It takes ownership of the container bytes
/// because unquickening and checksum repair rewrite them in place.
///
/// # Example
/// ```no_run
/// use unvdex::{extract, ExtractOptions};
///
/// let vdex = std::fs::read("base.vdex").unwrap();
/// let extraction = extract(vdex, &ExtractOptions::default()).unwrap();
/// for i in 0..extraction.dex_files.len() {
///     std::fs::write(format!("classes{i}.dex"), extraction.dex_bytes(i).unwrap()).unwrap();
/// }
/// ```
pub fn extract(mut bytes: Vec<u8>, options: &ExtractOptions) -> Result<Extraction> {
    let container = Container::parse(&bytes).context("failed to parse vdex header")?;
    info!(
        "vdex version {}, {} dex files ({:#x} bytes), {:#x} bytes of quickening info",
        String::from_utf8_lossy(&container.header.version[..3]),
        container.header.number_of_dex_files,
        container.header.dex_size,
        container.header.quickening_info_size,
    );

    let unquicken_report = if options.unquicken {
        let mut decompiler = DexDecompiler::new(options.decompile_return_instruction);
        let report = unquicken(&mut bytes, &Leb128ClassDataReader, &mut decompiler)
            .context("failed to unquicken dex files")?;
        Some(report)
    } else {
        None
    };

    // Locate everything first; checksum repair needs the buffer mutably.
    let located: Vec<_> = container.dex_files(&bytes).collect();

    let mut dex_files = Vec::new();
    let mut skipped = Vec::new();
    for entry in located {
        let file = match entry {
            Ok(file) => file,
            Err(err) => {
                warn!("skipping {err}");
                skipped.push(err);
                continue;
            }
        };
        let dex = unvdex_bytes::slice_mut(&mut bytes, file.span)
            .context("dex file range escaped the container")?;
        if !dex::is_magic_valid(dex) {
            let err = ModuleError::BadMagic { index: file.index };
            error!("skipping {err}");
            skipped.push(err);
            continue;
        }

        let checksum_repaired = if options.repair_checksums {
            dex::repair_checksum(dex)
                .with_context(|| format!("failed to repair checksum of dex file #{}", file.index))?
        } else {
            false
        };
        if checksum_repaired {
            info!("dex file #{}: repaired checksum", file.index);
        }

        dex_files.push(ExtractedDex {
            index: file.index,
            range: file.span,
            location_checksum: container.location_checksum(&bytes, file.index),
            checksum_repaired,
        });
    }

    info!(
        "extracted {} of {} dex files",
        dex_files.len(),
        container.header.number_of_dex_files
    );
    Ok(Extraction {
        bytes,
        dex_files,
        skipped,
        unquicken_report,
    })
}
