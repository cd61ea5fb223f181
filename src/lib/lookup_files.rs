//! Derivation of the barcode lookup files consumed by the barcode splitter.
//!
//! Two families of files are written into the intermediate directory:
//!
//! - one `<sample_name>_bol_barcodes.txt` per sample, with one `<sample_name>_<barcode_bol>`
//!   label per distinct leading barcode of that sample.
//! - one `<sample_bol>_eol_barcodes.txt` per sample and leading barcode group, with one
//!   `<demuxed_name>` label per distinct trailing barcode of that group.
//!
//! All groupings keep the order in which values are first seen in the barcodes table.  When the
//! same trailing barcode appears more than once within a group, the `demuxed_name` of the first
//! row wins.
#![forbid(unsafe_code)]

use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use bstr::BString;
use itertools::Itertools;
use log::{debug, warn};

use crate::{
    barcode_table::{BarcodeTable, SampleBarcodeRecord},
    errors::IoError,
    utils::{bol_lookup_filename, eol_lookup_filename},
};

/// A [`SampleBarcodeRecord`] together with the keys derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedRecord {
    pub record: SampleBarcodeRecord,
    /// `<sample_name>_<barcode_bol>`, names the intermediate FASTQ of the leading barcode pass.
    pub sample_bol: String,
    /// `<sample_bol>_<barcode_eol>`, unique per final output.
    pub sample_bol_eol: String,
}

impl From<SampleBarcodeRecord> for AugmentedRecord {
    fn from(record: SampleBarcodeRecord) -> Self {
        let sample_bol = format!("{}_{}", record.sample_name, record.barcode_bol);
        let sample_bol_eol = format!("{}_{}", sample_bol, record.barcode_eol);
        Self { record, sample_bol, sample_bol_eol }
    }
}

/// One line of a lookup file: the output label and the barcode routed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub label: String,
    pub barcode: BString,
}

impl LookupEntry {
    pub fn new<S: Into<String>, B: Into<BString>>(label: S, barcode: B) -> Self {
        Self { label: label.into(), barcode: barcode.into() }
    }
}

impl Display for LookupEntry {
    /// Writes the entry as `<label>\t<barcode>`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}", self.label, self.barcode)
    }
}

/// The barcodes table with the derived join keys attached to every row.
///
/// This is built once from a [`BarcodeTable`] and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedTable {
    pub records: Vec<AugmentedRecord>,
}

impl From<BarcodeTable> for AugmentedTable {
    fn from(table: BarcodeTable) -> Self {
        Self { records: table.records.into_iter().map(AugmentedRecord::from).collect() }
    }
}

impl AugmentedTable {
    /// The distinct sample names, in the order they are first seen.
    pub fn sample_names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.record.sample_name.as_str()).unique().collect()
    }

    /// The distinct `sample_bol` keys of the given sample, in the order they are first seen.
    pub fn sample_bols(&self, sample_name: &str) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.record.sample_name == sample_name)
            .map(|r| r.sample_bol.as_str())
            .unique()
            .collect()
    }

    /// The distinct `sample_bol` keys across all samples, in the order they are first seen.
    pub fn all_sample_bols(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.sample_bol.as_str()).unique().collect()
    }

    /// The entries of the leading barcode lookup file for the given sample.
    pub fn bol_entries(&self, sample_name: &str) -> Vec<LookupEntry> {
        self.records
            .iter()
            .filter(|r| r.record.sample_name == sample_name)
            .unique_by(|r| r.record.barcode_bol.clone())
            .map(|r| LookupEntry::new(r.sample_bol.clone(), r.record.barcode_bol.clone()))
            .collect()
    }

    /// The entries of the trailing barcode lookup file for the given `sample_bol` group.  The
    /// first row wins when a trailing barcode is repeated within the group.
    pub fn eol_entries(&self, sample_bol: &str) -> Vec<LookupEntry> {
        self.records
            .iter()
            .filter(|r| r.sample_bol == sample_bol)
            .unique_by(|r| r.record.barcode_eol.clone())
            .map(|r| LookupEntry::new(r.record.demuxed_name.clone(), r.record.barcode_eol.clone()))
            .collect()
    }
}

/// The lookup files written for a run, in the order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupFiles {
    /// `(sample_name, path)` per sample.
    pub bol: Vec<(String, PathBuf)>,
    /// `(sample_bol, path)` per sample and leading barcode group.
    pub eol: Vec<(String, PathBuf)>,
}

/// Writes the given entries, one per line, to a new file at `path`.  An existing file is
/// overwritten.
fn write_entries(path: &Path, entries: &[LookupEntry]) -> Result<(), IoError> {
    let file = File::create(path).map_err(IoError::with_path(path))?;
    let mut writer = BufWriter::new(file);
    for entry in entries {
        writeln!(writer, "{}", entry).map_err(IoError::with_path(path))?;
    }
    writer.flush().map_err(IoError::with_path(path))
}

/// The `demuxed_name`s that more than one `sample_bol` group writes to, sorted by name, each
/// with its groups in table order.
pub fn shared_outputs(table: &AugmentedTable) -> Vec<(&str, Vec<&str>)> {
    let mut groups_per_name: AHashMap<&str, Vec<&str>> = AHashMap::new();
    for record in &table.records {
        let groups = groups_per_name.entry(record.record.demuxed_name.as_str()).or_default();
        if !groups.contains(&record.sample_bol.as_str()) {
            groups.push(record.sample_bol.as_str());
        }
    }
    groups_per_name.into_iter().filter(|(_, groups)| groups.len() > 1).sorted().collect()
}

/// The trailing barcode pass of the later group overwrites the output of the earlier one.
fn warn_on_shared_outputs(table: &AugmentedTable) {
    for (name, groups) in shared_outputs(table) {
        warn!(
            "Output '{}' is produced by multiple groups ({}); later groups overwrite it",
            name,
            groups.join(", ")
        );
    }
}

/// Writes the leading and trailing barcode lookup files for every sample and group into `dir`,
/// creating `dir` if needed.  Re-running on the same table overwrites the files with identical
/// content.
///
/// # Errors
///
/// - [`IoError`] naming the directory or file that could not be written
pub fn write_lookup_files<P: AsRef<Path>>(
    table: &AugmentedTable,
    dir: P,
) -> Result<LookupFiles, IoError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(IoError::with_path(dir))?;

    let mut files = LookupFiles::default();
    for sample_name in table.sample_names() {
        let path = dir.join(bol_lookup_filename(sample_name));
        let entries = table.bol_entries(sample_name);
        debug!("Writing {} leading barcodes to {}", entries.len(), path.to_string_lossy());
        write_entries(&path, &entries)?;
        files.bol.push((sample_name.to_string(), path));
    }

    for sample_bol in table.all_sample_bols() {
        let path = dir.join(eol_lookup_filename(sample_bol));
        let entries = table.eol_entries(sample_bol);
        debug!("Writing {} trailing barcodes to {}", entries.len(), path.to_string_lossy());
        write_entries(&path, &entries)?;
        files.eol.push((sample_bol.to_string(), path));
    }

    warn_on_shared_outputs(table);
    Ok(files)
}
