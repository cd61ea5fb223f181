//! A library for demultiplexing FASTQ files by pairs of leading and trailing barcodes.
//!
//! # Overview
//!
//! The flow of data is as follows:
//!
//! - The [`barcode_table::BarcodeTable`] reads and normalizes the tab-separated barcodes file.
//! - The [`lookup_files::AugmentedTable`] derives the leading barcode groups of each sample, and
//!   [`lookup_files::write_lookup_files`] writes the lookup files consumed by the splitter.
//! - The [`run::TwoPassDemultiplexer`] invokes a [`splitter::BarcodeSplitter`] once per sample
//!   on the leading barcode, then once per leading barcode group on the trailing barcode.
//! - [`metrics`] are collected per invocation and written as a summary once all splits are done.
#![deny(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
pub mod barcode_table;
pub mod errors;
pub mod lookup_files;
pub mod metrics;
pub mod opts;
pub mod run;
pub mod splitter;
pub mod utils;
