//! Utility functions.

/// The suffix of input, intermediate, and output FASTQs.
pub static FASTQ_SUFFIX: &str = ".fastq";

/// The name of the cumulative splitter log written to the output directory.
pub static LOG_FILE_NAME: &str = "fastx_splitter.log";

/// The name of the per-unit summary written to the output directory.
pub static SUMMARY_FILE_NAME: &str = "demux_summary.tsv";

/// The default scratch directory, relative to the working directory.
pub static DEFAULT_INTERMEDIATE_DIR: &str = "bcdemux_intermediate_dir";

pub mod built_info {
    use lazy_static::lazy_static;
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    /// Get a software version string including
    ///   - Git commit hash
    ///   - Git dirty info (whether the repo had uncommitted changes)
    ///   - Cargo package version if no git info found
    fn get_software_version() -> String {
        let prefix = if let Some(s) = GIT_COMMIT_HASH {
            format!("{}-{}", PKG_VERSION, s[0..8].to_owned())
        } else {
            PKG_VERSION.to_string()
        };
        let suffix = match GIT_DIRTY {
            Some(true) => "-dirty",
            _ => "",
        };
        format!("{}{}", prefix, suffix)
    }

    lazy_static! {
        /// Version of the software with git hash
        pub static ref VERSION: String = get_software_version();
    }
}

/// The FASTQ file name for the given sample, intermediate, or output name.
pub fn fastq_filename(name: &str) -> String {
    format!("{}{}", name, FASTQ_SUFFIX)
}

/// The leading barcode lookup file name for a sample.
pub fn bol_lookup_filename(sample_name: &str) -> String {
    format!("{}_bol_barcodes.txt", sample_name)
}

/// The trailing barcode lookup file name for a `sample_bol` group.
pub fn eol_lookup_filename(sample_bol: &str) -> String {
    format!("{}_eol_barcodes.txt", sample_bol)
}
