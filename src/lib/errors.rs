//! The errors raised while demultiplexing.
//!
//! - [`ConfigError`] is fatal and raised before any FASTQ is touched.
//! - [`UnitSplitError`] is raised by a single splitter invocation and is recorded, never fatal.
//! - [`IoError`] is fatal and always names the path that could not be written.
#![forbid(unsafe_code)]

use std::{fmt::Display, path::PathBuf, process::ExitStatus};

use itertools::Itertools;
use thiserror::Error;

/// The optional line number from the barcodes file where an error ocurred.
#[derive(Debug)]
pub struct ErrorLine(pub Option<usize>);

impl Display for ErrorLine {
    /// Writes the line number if present, nothing if it is not None.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(number) => write!(f, "Line {}", number),
            None => Ok(()),
        }
    }
}

/// The error that may occur when validating the command line or reading the barcodes file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{message}")]
    MissingOption { flag: &'static str, message: &'static str },

    #[error("Unable to resolve the absolute path of {}", .path.to_string_lossy())]
    InvalidPath { path: PathBuf, source: std::io::Error },

    #[error(
        "The intermediate directory '{}' overlaps the {role} directory '{}' and would be removed after the run.",
        .intermediate_dir.to_string_lossy(),
        .other.to_string_lossy()
    )]
    OverlappingDirectories { intermediate_dir: PathBuf, role: &'static str, other: PathBuf },

    #[error("Input file '{}' not found.", .0.to_string_lossy())]
    FileNotFound(PathBuf),

    #[error("Input file is missing the following required columns: {}", .0.iter().join(", "))]
    MissingColumns(Vec<String>),

    #[error("The barcodes file '{}' was empty", .0.to_string_lossy())]
    Empty(PathBuf),

    #[error("Unable to parse the barcodes file. {line}: {source}")]
    InvalidRecord { source: csv::Error, line: ErrorLine },

    #[error(transparent)]
    Read(#[from] csv::Error),
}

/// The error raised when a single invocation of the barcode splitter fails.
///
/// A unit is either a sample (leading barcode pass) or a sample and leading barcode group
/// (trailing barcode pass).
#[derive(Error, Debug)]
pub enum UnitSplitError {
    #[error("Input FASTQ does not exist: {}", .0.to_string_lossy())]
    MissingInput(PathBuf),

    #[error("Unable to launch the barcode splitter '{program}'")]
    Spawn { program: String, source: std::io::Error },

    #[error("The barcode splitter exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("Unable to pipe reads through the barcode splitter: {reason}")]
    Io { reason: String, source: std::io::Error },
}

/// An I/O failure while writing one of the artifacts of a run.
#[derive(Error, Debug)]
#[error("I/O error on {}", .path.to_string_lossy())]
pub struct IoError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl IoError {
    /// Returns a closure that wraps an [`std::io::Error`] with the given path, for `map_err`.
    pub fn with_path<P: Into<PathBuf>>(path: P) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self { path, source }
    }
}
