#![forbid(unsafe_code)]
//! Loading of the tab-separated table that maps samples and barcode pairs to output names.

use std::path::Path;

use bstr::BString;
use csv::{ReaderBuilder, StringRecord};
use log::debug;

use crate::errors::{ConfigError, ErrorLine};

/// The column holding the name of the input FASTQ (without the `.fastq` suffix).
pub const SAMPLE_NAME_COLUMN: &str = "sample_name";
/// The column holding the barcode matched at the beginning of each read.
pub const BARCODE_BOL_COLUMN: &str = "barcode_bol";
/// The column holding the barcode matched at the end of each read.
pub const BARCODE_EOL_COLUMN: &str = "barcode_eol";
/// The column holding the name of the final output FASTQ.
pub const DEMUXED_NAME_COLUMN: &str = "demuxed_name";

/// The columns that must be present in the barcodes file, in the order they are reported.
pub const REQUIRED_COLUMNS: [&str; 4] =
    [SAMPLE_NAME_COLUMN, BARCODE_BOL_COLUMN, BARCODE_EOL_COLUMN, DEMUXED_NAME_COLUMN];

/// One row of the barcodes file.
///
/// Names are taken verbatim; they are expected to be alphanumeric since they become file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleBarcodeRecord {
    /// The sample name, `<sample_name>.fastq` must exist in the FASTQ directory.
    pub sample_name: String,
    /// The upper-cased leading (beginning-of-line) barcode.
    pub barcode_bol: BString,
    /// The upper-cased trailing (end-of-line) barcode.
    pub barcode_eol: BString,
    /// The name of the output FASTQ for this leading and trailing barcode combination.
    pub demuxed_name: String,
}

impl SampleBarcodeRecord {
    /// Create a new [`SampleBarcodeRecord`], upper-casing the barcodes.
    pub fn new<S: Into<String>, B: AsRef<[u8]>>(
        sample_name: S,
        barcode_bol: B,
        barcode_eol: B,
        demuxed_name: S,
    ) -> Self {
        Self {
            sample_name: sample_name.into(),
            barcode_bol: BString::from(barcode_bol.as_ref().to_ascii_uppercase()),
            barcode_eol: BString::from(barcode_eol.as_ref().to_ascii_uppercase()),
            demuxed_name: demuxed_name.into(),
        }
    }
}

/// The positions of the required columns within a row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    sample_name: usize,
    barcode_bol: usize,
    barcode_eol: usize,
    demuxed_name: usize,
}

impl ColumnIndices {
    /// Locates the required columns in the header, matching case-insensitively.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingColumns`] listing every required column that is absent
    fn from_header(header: &StringRecord) -> Result<Self, ConfigError> {
        let columns: Vec<String> = header.iter().map(str::to_lowercase).collect();
        let find = |name: &str| columns.iter().position(|c| c == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingColumns(missing));
        }

        // All four were found above
        let index = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            sample_name: index(SAMPLE_NAME_COLUMN),
            barcode_bol: index(BARCODE_BOL_COLUMN),
            barcode_eol: index(BARCODE_EOL_COLUMN),
            demuxed_name: index(DEMUXED_NAME_COLUMN),
        })
    }

    fn to_record(self, row: &StringRecord) -> SampleBarcodeRecord {
        let field = |i: usize| row.get(i).unwrap_or("");
        SampleBarcodeRecord::new(
            field(self.sample_name),
            field(self.barcode_bol),
            field(self.barcode_eol),
            field(self.demuxed_name),
        )
    }
}

/// The normalized barcodes table, rows kept in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeTable {
    pub records: Vec<SampleBarcodeRecord>,
}

impl BarcodeTable {
    /// Builds a [`BarcodeTable`] from the tab-separated file at the given path.
    ///
    /// The header is required and columns are matched case-insensitively; extra columns are
    /// ignored.  Barcodes are upper-cased.  No validation is performed on the values themselves.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::FileNotFound`] if the path is not an existing file
    /// - [`ConfigError::Empty`] if the file has no header line
    /// - [`ConfigError::MissingColumns`] if any of the required columns are absent
    /// - [`ConfigError::InvalidRecord`] if a row cannot be parsed
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let mut reader = ReaderBuilder::new().delimiter(b'\t').has_headers(true).from_path(path)?;

        let header = reader.headers()?.clone();
        if header.is_empty() {
            return Err(ConfigError::Empty(path.to_path_buf()));
        }
        let indices = ColumnIndices::from_header(&header)?;

        let mut records = vec![];
        for row in reader.records() {
            let row = row.map_err(|e| {
                let line = e.position().map(|p| p.line() as usize);
                ConfigError::InvalidRecord { source: e, line: ErrorLine(line) }
            })?;
            records.push(indices.to_record(&row));
        }
        debug!("Read {} rows from {}", records.len(), path.to_string_lossy());

        Ok(Self { records })
    }
}
