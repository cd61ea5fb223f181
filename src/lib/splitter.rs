//! The barcode splitter: routes the reads of one FASTQ into one file per lookup label.
//!
//! The matching itself is delegated to an external program (by default
//! `fastx_barcode_splitter.pl` from the FASTX toolkit) that reads FASTQ records on standard input
//! and prints a tab-separated count table on standard output.  The [`BarcodeSplitter`] trait is
//! the seam that lets the orchestration be driven without that program.
#![forbid(unsafe_code)]

use std::{
    ffi::OsString,
    fs::File,
    path::{Path, PathBuf, MAIN_SEPARATOR},
    process::{Command, Stdio},
};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::errors::UnitSplitError;

/// The default barcode splitter executable, looked up on the `PATH`.
pub const DEFAULT_SPLITTER_PROGRAM: &str = "fastx_barcode_splitter.pl";

/// The label the splitter uses for reads that matched no barcode.
pub const UNMATCHED_LABEL: &str = "unmatched";

/// The label the splitter uses for the total number of reads.
pub const TOTAL_LABEL: &str = "total";

lazy_static! {
    /// <label>\t<count>[\t<location>]
    static ref COUNT_LINE_REGEX: Regex = Regex::new(r"^(\S+)\t(\d+)(?:\t(.*))?$").unwrap();
}

/// Where in the read the barcode is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Beginning of line: the barcode is matched against the start of each read.
    Bol,
    /// End of line: the barcode is matched against the end of each read.
    Eol,
}

impl SplitMode {
    /// The command line flag that selects this mode on the splitter.
    pub fn flag(self) -> &'static str {
        match self {
            SplitMode::Bol => "--bol",
            SplitMode::Eol => "--eol",
        }
    }
}

/// A single invocation of the barcode splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRequest {
    /// The name of the unit being split (a sample, or a sample and leading barcode group).
    pub unit: String,
    /// The FASTQ whose reads are streamed into the splitter.
    pub input: PathBuf,
    /// The lookup file of `<label>\t<barcode>` lines.
    pub lookup: PathBuf,
    pub mode: SplitMode,
    /// The directory the per-label FASTQs are written to.
    pub output_dir: PathBuf,
    /// Appended to each label to build the output file name.
    pub suffix: String,
}

impl SplitRequest {
    /// The output path prefix given to the splitter: the output directory with a trailing
    /// separator, so that `<prefix><label><suffix>` lands inside the directory.
    pub fn output_prefix(&self) -> OsString {
        let mut prefix = self.output_dir.clone().into_os_string();
        if !prefix.to_string_lossy().ends_with(MAIN_SEPARATOR) {
            prefix.push(MAIN_SEPARATOR.to_string());
        }
        prefix
    }

    /// The path the splitter writes reads with the given label to.
    pub fn output_path(&self, label: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}", label, self.suffix))
    }
}

/// One row of the count table printed by the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeCount {
    pub label: String,
    pub count: usize,
    pub location: Option<PathBuf>,
}

/// The outcome of a successful split: the raw report printed by the splitter and the counts
/// that could be parsed out of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSummary {
    pub report: String,
    pub counts: Vec<BarcodeCount>,
}

impl SplitSummary {
    /// Parses the count table out of the splitter's report.  Lines that are not
    /// `<label>\t<count>[\t<location>]` (e.g. the header) are ignored.
    pub fn parse<S: Into<String>>(report: S) -> Self {
        let report = report.into();
        let counts = report
            .lines()
            .filter_map(|line| COUNT_LINE_REGEX.captures(line.trim_end_matches('\r')))
            .filter_map(|captures| {
                let label = captures.get(1)?.as_str().to_string();
                let count = captures.get(2)?.as_str().parse::<usize>().ok()?;
                let location = captures
                    .get(3)
                    .map(|m| m.as_str().trim())
                    .filter(|l| !l.is_empty())
                    .map(PathBuf::from);
                Some(BarcodeCount { label, count, location })
            })
            .collect();
        Self { report, counts }
    }

    /// The count for the given label, if reported.
    pub fn count(&self, label: &str) -> Option<usize> {
        self.counts.iter().find(|c| c.label == label).map(|c| c.count)
    }

    /// The number of reads routed to any barcode label.
    pub fn matched(&self) -> usize {
        self.counts
            .iter()
            .filter(|c| c.label != UNMATCHED_LABEL && c.label != TOTAL_LABEL)
            .map(|c| c.count)
            .sum()
    }

    /// The number of reads that matched no barcode, if reported.
    pub fn unmatched(&self) -> Option<usize> {
        self.count(UNMATCHED_LABEL)
    }

    /// The total number of reads seen, if reported.
    pub fn total(&self) -> Option<usize> {
        self.count(TOTAL_LABEL)
    }
}

/// Splits the reads of a FASTQ into one file per label of a lookup file.
pub trait BarcodeSplitter {
    /// Performs the split described by `request`, blocking until it is complete.
    ///
    /// # Errors
    ///
    /// - [`UnitSplitError`] if the split could not be performed; the caller records it and moves
    ///   on to the next unit.
    fn split(&self, request: &SplitRequest) -> Result<SplitSummary, UnitSplitError>;
}

/// A [`BarcodeSplitter`] that runs the FASTX toolkit `fastx_barcode_splitter.pl` (or a program
/// with the same command line) as a child process.
///
/// The input FASTQ becomes the child's standard input and its standard output is the report.
/// The allowed number of mismatches is left to the program's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastxBarcodeSplitter {
    pub program: PathBuf,
}

impl FastxBarcodeSplitter {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self { program: program.as_ref().to_path_buf() }
    }

    fn command(&self, request: &SplitRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--bcfile")
            .arg(&request.lookup)
            .arg("--prefix")
            .arg(request.output_prefix())
            .arg("--suffix")
            .arg(&request.suffix)
            .arg(request.mode.flag());
        command
    }
}

impl Default for FastxBarcodeSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_SPLITTER_PROGRAM)
    }
}

impl BarcodeSplitter for FastxBarcodeSplitter {
    fn split(&self, request: &SplitRequest) -> Result<SplitSummary, UnitSplitError> {
        if !request.input.is_file() {
            return Err(UnitSplitError::MissingInput(request.input.clone()));
        }
        let input = File::open(&request.input).map_err(|source| UnitSplitError::Io {
            reason: format!("failed to open {}", request.input.to_string_lossy()),
            source,
        })?;

        let mut command = self.command(request);
        debug!("Running {:?}", command);
        let output = command
            .stdin(Stdio::from(input))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| UnitSplitError::Spawn {
                program: self.program.to_string_lossy().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(UnitSplitError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(SplitSummary::parse(String::from_utf8_lossy(&output.stdout)))
    }
}
