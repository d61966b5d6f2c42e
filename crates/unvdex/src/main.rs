use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use unvdex::{dex_file_name, extract, ExtractOptions};

/// unvdex — extract DEX files from an Android VDEX container, reverting
/// quickened instructions.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input VDEX file
    input: PathBuf,

    /// Directory for the extracted DEX files (defaults to the input's directory)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Extract the DEX files as they are, without reverting quickened instructions
    #[arg(long)]
    no_unquicken: bool,

    /// Leave return-void-no-barrier instructions in place
    #[arg(long)]
    keep_return_barrier: bool,

    /// Do not recompute the DEX header checksums
    #[arg(long)]
    no_checksum_repair: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> ExtractOptions {
        ExtractOptions {
            unquicken: !self.no_unquicken,
            decompile_return_instruction: !self.keep_return_barrier,
            repair_checksums: !self.no_checksum_repair,
        }
    }

    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn output_dir(&self) -> PathBuf {
        match &self.output {
            Some(dir) => dir.clone(),
            None => self
                .input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}

/// `<input-stem>_classes.dex`, `<input-stem>_classes2.dex`, ...
fn output_path(dir: &Path, input: &Path, index: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vdex".to_string());
    dir.join(format!("{stem}_{}", dex_file_name(index)))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(cli.log_filter()));

    info!("processing {}", cli.input.display());

    let vdex_bytes =
        fs::read(&cli.input).with_context(|| format!("failed to read {}", cli.input.display()))?;

    let extraction = extract(vdex_bytes, &cli.options())
        .with_context(|| format!("failed to extract {}", cli.input.display()))?;

    let dir = cli.output_dir();
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    for (i, dex) in extraction.dex_files.iter().enumerate() {
        let bytes = extraction
            .dex_bytes(i)
            .with_context(|| format!("dex file #{} is out of range", dex.index))?;
        let path = output_path(&dir, &cli.input, dex.index);
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {} ({:#x} bytes)", path.display(), bytes.len());
    }

    info!(
        "{} dex files extracted, {} skipped",
        extraction.dex_files.len(),
        extraction.skipped.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["unvdex", "base.vdex"]);
        assert_eq!(cli.input, PathBuf::from("base.vdex"));
        assert!(cli.output.is_none());
        let options = cli.options();
        assert!(options.unquicken);
        assert!(options.decompile_return_instruction);
        assert!(options.repair_checksums);
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn cli_maps_flags_onto_options() {
        let cli = Cli::parse_from([
            "unvdex",
            "in/base.vdex",
            "-o",
            "out",
            "--no-unquicken",
            "--keep-return-barrier",
            "--no-checksum-repair",
            "-vv",
        ]);
        let options = cli.options();
        assert!(!options.unquicken);
        assert!(!options.decompile_return_instruction);
        assert!(!options.repair_checksums);
        assert_eq!(cli.log_filter(), "trace");
        assert_eq!(cli.output_dir(), PathBuf::from("out"));
    }

    #[test]
    fn output_defaults_next_to_input() {
        let cli = Cli::parse_from(["unvdex", "in/base.vdex"]);
        assert_eq!(cli.output_dir(), PathBuf::from("in"));
        assert_eq!(
            output_path(&cli.output_dir(), &cli.input, 0),
            PathBuf::from("in/base_classes.dex")
        );
        assert_eq!(
            output_path(&cli.output_dir(), &cli.input, 1),
            PathBuf::from("in/base_classes2.dex")
        );
    }
}
