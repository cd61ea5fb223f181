#![forbid(unsafe_code)]

use std::{
    path::{Path, PathBuf},
    process::exit,
};

use clap::{CommandFactory, Parser};
use env_logger::Env;
use path_absolutize::Absolutize;

use crate::{
    errors::ConfigError,
    run::DemuxPaths,
    splitter::DEFAULT_SPLITTER_PROGRAM,
    utils::{built_info, DEFAULT_INTERMEDIATE_DIR},
};

pub static TOOL_NAME: &str = "bcdemux";

static SHORT_USAGE: &str =
    "Demultiplexes FASTQs by leading (bol) and trailing (eol) barcode pairs.";

static LONG_USAGE: &str = "
Demultiplexes FASTQs by leading (bol) and trailing (eol) barcode pairs.

Each sample FASTQ is split twice with the FASTX toolkit barcode splitter: first by the barcode
at the beginning of each read, then each of the resulting files by the barcode at the end of
each read.  The splitter (`fastx_barcode_splitter.pl` by default) must be on the PATH.

FASTQs in the FASTQ directory must have a `.fastq` suffix and be named after the `sample_name`
values in the barcodes file.

The barcodes file must be tab separated, with a header, and have at least these four columns
(matched case-insensitively):

  sample_name  barcode_bol  barcode_eol  demuxed_name

`sample_name` and `demuxed_name` must be alphanumeric (avoid &, $, @, -, %, * and spaces) as
they are used in file names.  One `<demuxed_name>.fastq` is written per barcode pair to the
output directory, along with the splitter log (`fastx_splitter.log`) and a per-unit summary
(`demux_summary.tsv`).

Exits with 0 if every split succeeded, 2 if some splits failed, and 1 on a configuration or
I/O error.

Example invocation:

bcdemux \\
  --fastq-dir fastqs/ \\
  --barcodes-file barcodes.tsv \\
  --out-dir demuxed-fastqs/

Reference for the FASTX toolkit: http://hannonlab.cshl.edu/fastx_toolkit/commandline.html
";

static MISSING_FASTQ_DIR: &str =
    "Please provide a fastq directory using [--fastq-dir PATH_TO_FASTQ_DIR] or [-i PATH_TO_FASTQ_DIR].";

static MISSING_BARCODES_FILE: &str = "Please provide a barcode_info file using [--barcodes-file PATH_TO_BARCODES_FILE] or [-f PATH_TO_BARCODES_FILE].";

static MISSING_OUT_DIR: &str = "Please provide a path to a directory for saving the outputs using [--out-dir PATH_TO_DIR] or [-o PATH_TO_OUT_DIR].";

#[derive(Parser, Debug, Clone)]
#[clap(name = TOOL_NAME, version = built_info::VERSION.as_str(), about=SHORT_USAGE, long_about=LONG_USAGE, term_width=0)]
pub struct Opts {
    /// Path to the directory of input FASTQs, one `<sample_name>.fastq` per sample.
    #[clap(long, short = 'i', display_order = 1)]
    pub fastq_dir: Option<PathBuf>,

    /// Path to the tab-separated barcodes file.
    #[clap(long, short = 'f', display_order = 2)]
    pub barcodes_file: Option<PathBuf>,

    /// The directory to write outputs, created if it does not exist.
    ///
    /// This tool will overwrite existing FASTQs and append to an existing splitter log.
    #[clap(long, short = 'o', display_order = 3)]
    pub out_dir: Option<PathBuf>,

    /// The barcode splitter executable.
    #[clap(long, default_value = DEFAULT_SPLITTER_PROGRAM, display_order = 11)]
    pub splitter: PathBuf,

    /// The directory for lookup files and intermediate FASTQs.
    ///
    /// Removed at the end of a run in which every split succeeded, so it must not overlap the
    /// FASTQ or output directory.
    #[clap(long, default_value = DEFAULT_INTERMEDIATE_DIR, display_order = 11)]
    pub intermediate_dir: PathBuf,

    /// Keep the intermediate directory even if every split succeeded.
    #[clap(long, display_order = 11)]
    pub keep_intermediate_dir: bool,
}

/// The validated configuration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxConfig {
    pub barcodes_file: PathBuf,
    /// Absolute input, intermediate, and output directories.
    pub paths: DemuxPaths,
    pub splitter: PathBuf,
    pub keep_intermediate_dir: bool,
}

/// Resolves a path against the current working directory.
fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    path.absolutize()
        .map(|p| p.to_path_buf())
        .map_err(|source| ConfigError::InvalidPath { path: path.to_path_buf(), source })
}

impl Opts {
    /// Builds the [`DemuxConfig`] for a run, resolving all directories to absolute paths.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingOption`] for the first of `--fastq-dir`, `--barcodes-file`, and
    ///   `--out-dir` that was not given
    /// - [`ConfigError::InvalidPath`] if a directory cannot be made absolute
    /// - [`ConfigError::OverlappingDirectories`] if the intermediate directory overlaps the
    ///   FASTQ or output directory
    pub fn validate(&self) -> Result<DemuxConfig, ConfigError> {
        let fastq_dir = self.fastq_dir.as_ref().ok_or(ConfigError::MissingOption {
            flag: "--fastq-dir",
            message: MISSING_FASTQ_DIR,
        })?;
        let barcodes_file = self.barcodes_file.as_ref().ok_or(ConfigError::MissingOption {
            flag: "--barcodes-file",
            message: MISSING_BARCODES_FILE,
        })?;
        let out_dir = self
            .out_dir
            .as_ref()
            .ok_or(ConfigError::MissingOption { flag: "--out-dir", message: MISSING_OUT_DIR })?;

        let paths = DemuxPaths {
            fastq_dir: absolute(fastq_dir)?,
            intermediate_dir: absolute(&self.intermediate_dir)?,
            output_dir: absolute(out_dir)?,
        };
        paths.check_intermediate_dir()?;

        Ok(DemuxConfig {
            barcodes_file: barcodes_file.clone(),
            paths,
            splitter: self.splitter.clone(),
            keep_intermediate_dir: self.keep_intermediate_dir,
        })
    }
}

/// Implement defaults that match the CLI options to allow for easier testing.
///
/// Note that these defaults exist only within test code.
#[cfg(test)]
impl Default for Opts {
    fn default() -> Self {
        Self {
            fastq_dir: None,
            barcodes_file: None,
            out_dir: None,
            splitter: PathBuf::from(DEFAULT_SPLITTER_PROGRAM),
            intermediate_dir: PathBuf::from(DEFAULT_INTERMEDIATE_DIR),
            keep_intermediate_dir: false,
        }
    }
}

/// Parse args and set up logging / tracing
///
/// Without any arguments the long usage is printed and the process exits with status 1.
pub fn setup() -> Opts {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if std::env::args_os().len() <= 1 {
        let _ = Opts::command().print_long_help();
        exit(1);
    }

    Opts::parse()
}
