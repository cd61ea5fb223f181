use std::{
    error::Error,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    barcode_table::BarcodeTable,
    errors::{ConfigError, IoError},
    lookup_files::{write_lookup_files, AugmentedTable},
    metrics::{RunReport, UnitOutcome, UnitStatus},
    opts::DemuxConfig,
    splitter::{BarcodeSplitter, FastxBarcodeSplitter, SplitMode, SplitRequest},
    utils::{bol_lookup_filename, eol_lookup_filename, fastq_filename, FASTQ_SUFFIX, LOG_FILE_NAME},
};

/// The directories used by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxPaths {
    /// Holds one `<sample_name>.fastq` per sample.
    pub fastq_dir: PathBuf,
    /// Holds the lookup files and the output of the leading barcode pass.
    pub intermediate_dir: PathBuf,
    /// Receives the final FASTQs, the splitter log, and the summary.
    pub output_dir: PathBuf,
}

impl DemuxPaths {
    /// Checks that the intermediate directory does not overlap the FASTQ or output directory,
    /// as it is removed after a fully successful run.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::OverlappingDirectories`] naming the first directory that overlaps
    pub fn check_intermediate_dir(&self) -> Result<(), ConfigError> {
        let scratch = &self.intermediate_dir;
        for (role, other) in [("FASTQ", &self.fastq_dir), ("output", &self.output_dir)] {
            if scratch.starts_with(other) || other.starts_with(scratch) {
                return Err(ConfigError::OverlappingDirectories {
                    intermediate_dir: scratch.clone(),
                    role,
                    other: other.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The cumulative, append-only log of the splitter reports written to the output directory.
pub struct SplitterLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SplitterLog {
    /// Opens `fastx_splitter.log` in the given directory for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(output_dir: P) -> Result<Self, IoError> {
        let path = output_dir.as_ref().join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(IoError::with_path(&path))?;
        Ok(Self { path, writer: BufWriter::new(file) })
    }

    /// Appends the splitter report of a successful unit, or a one line marker otherwise.
    pub fn record(&mut self, outcome: &UnitOutcome) -> Result<(), IoError> {
        let entry = match (outcome.status, &outcome.summary) {
            (UnitStatus::Succeeded, Some(summary)) => format!("\n{}\n", summary.report),
            (UnitStatus::Succeeded, None) => format!("\n{} : succeeded\n", outcome.unit),
            (UnitStatus::Failed, _) => format!("{} : failed!\n", outcome.unit),
            (UnitStatus::Skipped, _) => format!(
                "{} : skipped ({})\n",
                outcome.unit,
                outcome.detail.as_deref().unwrap_or("no detail")
            ),
        };
        self.writer.write_all(entry.as_bytes()).map_err(IoError::with_path(&self.path))?;
        self.writer.flush().map_err(IoError::with_path(&self.path))
    }
}

/// Formats an error along with its source, if any.
fn describe_error(err: &dyn Error) -> String {
    match err.source() {
        Some(source) => format!("{}: {}", err, source),
        None => err.to_string(),
    }
}

/// Creates an empty file at each path that does not exist yet.
fn touch_missing<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Result<(), IoError> {
    for path in paths {
        if !path.exists() {
            debug!("Creating empty {}", path.to_string_lossy());
            File::create(path).map_err(IoError::with_path(path))?;
        }
    }
    Ok(())
}

/// Drives the two passes of the barcode splitter over every sample in the table.
///
/// For each sample, in the order samples are first seen in the table:
///
/// 1. `<sample_name>.fastq` is split by leading barcode into `<sample_bol>.fastq` files in the
///    intermediate directory.
/// 2. each `<sample_bol>.fastq` of the sample, in table order, is split by trailing barcode into
///    `<demuxed_name>.fastq` files in the output directory.
///
/// A failed split is recorded and processing continues with the next unit.  When the leading
/// pass of a sample fails, its trailing passes are skipped rather than run on a missing or partial
/// intermediate file.  After a successful split, any expected output the splitter did not create
/// (no reads matched) is created empty.
pub struct TwoPassDemultiplexer<'a, S: BarcodeSplitter> {
    table: &'a AugmentedTable,
    paths: &'a DemuxPaths,
    splitter: &'a S,
}

impl<'a, S: BarcodeSplitter> TwoPassDemultiplexer<'a, S> {
    pub fn new(table: &'a AugmentedTable, paths: &'a DemuxPaths, splitter: &'a S) -> Self {
        Self { table, paths, splitter }
    }

    /// The leading barcode split of a sample.
    fn bol_request(&self, sample_name: &str) -> SplitRequest {
        SplitRequest {
            unit: sample_name.to_string(),
            input: self.paths.fastq_dir.join(fastq_filename(sample_name)),
            lookup: self.paths.intermediate_dir.join(bol_lookup_filename(sample_name)),
            mode: SplitMode::Bol,
            output_dir: self.paths.intermediate_dir.clone(),
            suffix: FASTQ_SUFFIX.to_string(),
        }
    }

    /// The trailing barcode split of a `sample_bol` group.
    fn eol_request(&self, sample_bol: &str) -> SplitRequest {
        SplitRequest {
            unit: sample_bol.to_string(),
            input: self.paths.intermediate_dir.join(fastq_filename(sample_bol)),
            lookup: self.paths.intermediate_dir.join(eol_lookup_filename(sample_bol)),
            mode: SplitMode::Eol,
            output_dir: self.paths.output_dir.clone(),
            suffix: FASTQ_SUFFIX.to_string(),
        }
    }

    /// Runs one split, creating any of the `labels` outputs that were not written on success.
    fn split_unit(&self, request: &SplitRequest, labels: &[String]) -> Result<UnitOutcome, IoError> {
        info!("Splitting {} barcodes for {} ...", request.mode, request.unit);
        match self.splitter.split(request) {
            Ok(summary) => {
                let outputs: Vec<PathBuf> = labels.iter().map(|l| request.output_path(l)).collect();
                touch_missing(&outputs)?;
                info!("\n{}\n", summary.report);
                Ok(UnitOutcome::succeeded(request.unit.clone(), request.mode, summary))
            }
            Err(err) => {
                let detail = describe_error(&err);
                warn!("{} : failed! {}", request.unit, detail);
                Ok(UnitOutcome::failed(request.unit.clone(), request.mode, detail))
            }
        }
    }

    /// Splits every sample and group, appending each outcome to `log` as it completes.
    ///
    /// # Errors
    ///
    /// - [`IoError`] if the log cannot be written or an empty output cannot be created
    pub fn demultiplex(&self, log: &mut SplitterLog) -> Result<RunReport, IoError> {
        let mut report = RunReport::default();
        for sample_name in self.table.sample_names() {
            let labels: Vec<String> =
                self.table.bol_entries(sample_name).into_iter().map(|e| e.label).collect();
            let outcome = self.split_unit(&self.bol_request(sample_name), &labels)?;
            log.record(&outcome)?;
            let bol_succeeded = outcome.status == UnitStatus::Succeeded;
            report.push(outcome);

            for sample_bol in self.table.sample_bols(sample_name) {
                let outcome = if bol_succeeded {
                    let labels: Vec<String> =
                        self.table.eol_entries(sample_bol).into_iter().map(|e| e.label).collect();
                    self.split_unit(&self.eol_request(sample_bol), &labels)?
                } else {
                    warn!("Skipping {}: the {} split of {} failed", sample_bol, SplitMode::Bol, sample_name);
                    UnitOutcome::skipped(
                        sample_bol,
                        SplitMode::Eol,
                        format!("{} split of {} failed", SplitMode::Bol, sample_name),
                    )
                };
                log.record(&outcome)?;
                report.push(outcome);
            }
        }
        Ok(report)
    }
}

/// Creates the output directory, opens the splitter log, and runs both splitting passes.
///
/// # Errors
///
/// - [`IoError`] if the output directory, log, or an empty output cannot be written
pub fn demultiplex<S: BarcodeSplitter>(
    table: &AugmentedTable,
    paths: &DemuxPaths,
    splitter: &S,
) -> Result<RunReport, IoError> {
    std::fs::create_dir_all(&paths.output_dir).map_err(IoError::with_path(&paths.output_dir))?;
    let mut log = SplitterLog::open(&paths.output_dir)?;
    TwoPassDemultiplexer::new(table, paths, splitter).demultiplex(&mut log)
}

/// Runs the full pipeline with the configured FASTX barcode splitter.
pub fn run(config: DemuxConfig) -> Result<RunReport> {
    let splitter = FastxBarcodeSplitter::new(&config.splitter);
    run_with_splitter(&config, &splitter)
}

/// Runs the full pipeline with the given splitter:
///
/// 1. reads and normalizes the barcodes file
/// 2. writes the lookup files to the intermediate directory
/// 3. splits every sample by leading, then trailing, barcode
/// 4. writes the per-unit summary
/// 5. removes the intermediate directory if every split succeeded
pub fn run_with_splitter<S: BarcodeSplitter>(
    config: &DemuxConfig,
    splitter: &S,
) -> Result<RunReport> {
    let paths = &config.paths;
    paths.check_intermediate_dir()?;

    info!("Reading barcodes from {}", config.barcodes_file.to_string_lossy());
    let table = AugmentedTable::from(BarcodeTable::from_path(&config.barcodes_file)?);

    let lookup_files = write_lookup_files(&table, &paths.intermediate_dir)
        .context("Failed to write the barcode lookup files")?;
    info!(
        "Wrote {} leading and {} trailing barcode lookup files to {}",
        lookup_files.bol.len(),
        lookup_files.eol.len(),
        paths.intermediate_dir.to_string_lossy()
    );

    let report = demultiplex(&table, paths, splitter).context("Failed to demultiplex")?;

    info!("Writing summary");
    report.write_summary(&paths.output_dir).context("Failed to write the summary")?;

    if !report.all_succeeded() {
        warn!(
            "Keeping the intermediate directory after unsuccessful splits: {}",
            paths.intermediate_dir.to_string_lossy()
        );
    } else if config.keep_intermediate_dir {
        info!("Keeping the intermediate directory: {}", paths.intermediate_dir.to_string_lossy());
    } else {
        std::fs::remove_dir_all(&paths.intermediate_dir)
            .map_err(IoError::with_path(&paths.intermediate_dir))
            .context("Failed to remove the intermediate directory")?;
    }

    info!("Demultiplexing complete: {}", report.describe());
    Ok(report)
}

#[cfg(test)]
mod test {
    use std::{fs, path::Path};

    use fgoxide::io::DelimFile;
    use matches::assert_matches;
    use rstest::rstest;
    use seq_io::fastq::OwnedRecord;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        errors::ConfigError,
        metrics::UnitMetrics,
        utils::{
            test_commons::{fq, slurp_fastq, write_barcodes_file, write_reads_to_file, ExactMatchSplitter},
            SUMMARY_FILE_NAME,
        },
    };

    /// Sets up the FASTQ directory and barcodes file for a run inside a temporary directory.
    struct Fixture {
        dir: TempDir,
        config: DemuxConfig,
    }

    impl Fixture {
        fn new(rows: &[(&str, &str, &str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let fastq_dir = dir.path().join("fastqs");
            fs::create_dir(&fastq_dir).unwrap();
            let barcodes_file = write_barcodes_file(dir.path(), rows);
            let config = DemuxConfig {
                barcodes_file,
                paths: DemuxPaths {
                    fastq_dir,
                    intermediate_dir: dir.path().join("scratch"),
                    output_dir: dir.path().join("output"),
                },
                splitter: PathBuf::from("unused"),
                keep_intermediate_dir: false,
            };
            Self { dir, config }
        }

        fn write_sample(&self, sample_name: &str, reads: Vec<OwnedRecord>) {
            let path = self.config.paths.fastq_dir.join(fastq_filename(sample_name));
            write_reads_to_file(reads, path);
        }

        fn output(&self, name: &str) -> PathBuf {
            self.config.paths.output_dir.join(fastq_filename(name))
        }

        fn log(&self) -> String {
            fs::read_to_string(self.config.paths.output_dir.join(LOG_FILE_NAME)).unwrap()
        }

        fn summary(&self) -> Vec<UnitMetrics> {
            DelimFile::default()
                .read_tsv(&self.config.paths.output_dir.join(SUMMARY_FILE_NAME))
                .unwrap()
        }
    }

    fn names(records: &[OwnedRecord]) -> Vec<String> {
        records.iter().map(|r| String::from_utf8_lossy(&r.head).to_string()).collect()
    }

    #[test]
    fn test_end_to_end_two_outputs_from_one_leading_barcode() {
        let fixture = Fixture::new(&[("S1", "AAA", "TTT", "Out1"), ("S1", "AAA", "GGG", "Out2")]);
        fixture.write_sample(
            "S1",
            vec![
                fq("r1", "AAACCCCTTT"),
                fq("r2", "AAAGGGGGGG"),
                fq("r3", "CCCCCCCTTT"),
                fq("r4", "AAACACACTTT"),
            ],
        );
        let splitter = ExactMatchSplitter::default();

        let report = run_with_splitter(&fixture.config, &splitter).unwrap();

        assert!(report.all_succeeded());
        assert_eq!(
            splitter.calls(),
            vec![(String::from("S1"), SplitMode::Bol), (String::from("S1_AAA"), SplitMode::Eol)]
        );
        assert_eq!(names(&slurp_fastq(fixture.output("Out1"))), vec!["r1", "r4"]);
        assert_eq!(names(&slurp_fastq(fixture.output("Out2"))), vec!["r2"]);

        // the lookup files were consumed then removed along with the intermediate directory
        let requests = splitter.requests.borrow();
        assert_eq!(requests[0].lookup, fixture.config.paths.intermediate_dir.join("S1_bol_barcodes.txt"));
        assert_eq!(requests[1].input, fixture.config.paths.intermediate_dir.join("S1_AAA.fastq"));
        assert_eq!(requests[1].output_dir, fixture.config.paths.output_dir);
        assert!(!fixture.config.paths.intermediate_dir.exists());

        let log = fixture.log();
        assert!(log.contains("S1_AAA\t3\t"));
        assert!(log.contains("Out1\t2\t"));
        assert!(!log.contains("failed!"));

        let summary = fixture.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].unit, "S1");
        assert_eq!(summary[0].matched_reads, Some(3));
        assert_eq!(summary[0].total_reads, Some(4));
        assert_eq!(summary[1].unit, "S1_AAA");
        assert_eq!(summary[1].matched_reads, Some(3));
    }

    #[rstest]
    #[case(1)]
    #[case(25)]
    fn test_all_matching_reads_end_up_in_one_output(#[case] num_reads: usize) {
        let fixture = Fixture::new(&[("S1", "acgt", "ttgg", "Only")]);
        let reads: Vec<OwnedRecord> =
            (0..num_reads).map(|i| fq(&format!("read{}", i), "ACGTNNNNNNTTGG")).collect();
        fixture.write_sample("S1", reads);

        let report = run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap();

        assert!(report.all_succeeded());
        assert_eq!(slurp_fastq(fixture.output("Only")).len(), num_reads);
        let fastqs: Vec<String> = fs::read_dir(&fixture.config.paths.output_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(FASTQ_SUFFIX) && name != "unmatched.fastq")
            .collect();
        assert_eq!(fastqs, vec!["Only.fastq"]);
    }

    #[test]
    fn test_no_matching_reads_produces_empty_outputs() {
        let fixture = Fixture::new(&[("S1", "AAA", "TTT", "Out1"), ("S1", "CCC", "GGG", "Out2")]);
        fixture.write_sample("S1", vec![fq("r1", "GGGGGGGGG"), fq("r2", "TTTTTTTTT")]);

        let report = run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.outcomes.len(), 3);
        for name in ["Out1", "Out2"] {
            let path = fixture.output(name);
            assert!(path.is_file(), "{} was not created", name);
            assert_eq!(fs::metadata(path).unwrap().len(), 0);
        }
    }

    /// Reports success without writing any output.
    struct SilentSplitter;

    impl BarcodeSplitter for SilentSplitter {
        fn split(
            &self,
            _request: &SplitRequest,
        ) -> Result<crate::splitter::SplitSummary, crate::errors::UnitSplitError> {
            Ok(crate::splitter::SplitSummary::parse("Barcode\tCount\tLocation\ntotal\t0\n"))
        }
    }

    #[test]
    fn test_outputs_not_written_by_the_splitter_are_created_empty() {
        let fixture = Fixture::new(&[("S1", "AAA", "TTT", "Out1"), ("S1", "CCC", "GGG", "Out2")]);

        let report = run_with_splitter(&fixture.config, &SilentSplitter).unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.outcomes.len(), 3);
        for name in ["Out1", "Out2"] {
            assert_eq!(fs::metadata(fixture.output(name)).unwrap().len(), 0);
        }
        assert!(!fixture.config.paths.intermediate_dir.exists());
    }

    #[test]
    fn test_samples_and_groups_processed_in_table_order() {
        let fixture = Fixture::new(&[
            ("S2", "CCC", "TTT", "A"),
            ("S1", "AAA", "TTT", "B"),
            ("S2", "GGG", "TTT", "C"),
            ("S2", "CCC", "AAA", "D"),
            ("S1", "TTT", "TTT", "E"),
        ]);
        fixture.write_sample("S1", vec![]);
        fixture.write_sample("S2", vec![]);
        let splitter = ExactMatchSplitter::default();

        run_with_splitter(&fixture.config, &splitter).unwrap();

        let expected: Vec<(String, SplitMode)> = vec![
            ("S2", SplitMode::Bol),
            ("S2_CCC", SplitMode::Eol),
            ("S2_GGG", SplitMode::Eol),
            ("S1", SplitMode::Bol),
            ("S1_AAA", SplitMode::Eol),
            ("S1_TTT", SplitMode::Eol),
        ]
        .into_iter()
        .map(|(u, m)| (u.to_string(), m))
        .collect();
        assert_eq!(splitter.calls(), expected);
    }

    #[test]
    fn test_failed_leading_split_skips_its_groups_only() {
        let fixture = Fixture::new(&[
            ("S1", "AAA", "TTT", "Out1"),
            ("S2", "CCC", "TTT", "Out2"),
            ("S2", "GGG", "TTT", "Out3"),
            ("S3", "AAA", "TTT", "Out4"),
        ]);
        fixture.write_sample("S1", vec![fq("r1", "AAACCTTT")]);
        // no FASTQ for S2
        fixture.write_sample("S3", vec![fq("r2", "AAAGGTTT")]);
        let splitter = ExactMatchSplitter::default();

        let report = run_with_splitter(&fixture.config, &splitter).unwrap();

        assert!(!report.all_succeeded());
        assert_eq!(report.count(UnitStatus::Failed), 1);
        assert_eq!(report.count(UnitStatus::Skipped), 2);
        assert_eq!(report.unsuccessful_units(), vec!["S2", "S2_CCC", "S2_GGG"]);
        assert!(!splitter.calls().contains(&(String::from("S2_CCC"), SplitMode::Eol)));
        assert_eq!(slurp_fastq(fixture.output("Out1")).len(), 1);
        assert_eq!(slurp_fastq(fixture.output("Out4")).len(), 1);
        assert!(!fixture.output("Out2").exists());

        let log = fixture.log();
        assert!(log.contains("S2 : failed!\n"));
        assert!(log.contains("S2_CCC : skipped (bol split of S2 failed)\n"));
        assert!(log.contains("S2_GGG : skipped (bol split of S2 failed)\n"));

        // kept for inspection
        assert!(fixture.config.paths.intermediate_dir.exists());

        let summary = fixture.summary();
        let s2 = summary.iter().find(|m| m.unit == "S2").unwrap();
        assert_eq!(s2.status, UnitStatus::Failed);
        assert!(s2.detail.contains("S2.fastq"));
    }

    #[test]
    fn test_failed_trailing_split_does_not_stop_the_run() {
        let fixture = Fixture::new(&[
            ("S1", "AAA", "TTT", "Out1"),
            ("S1", "CCC", "TTT", "Out2"),
            ("S2", "AAA", "TTT", "Out3"),
        ]);
        fixture.write_sample("S1", vec![fq("r1", "AAAGTTT"), fq("r2", "CCCGTTT")]);
        fixture.write_sample("S2", vec![fq("r3", "AAAGTTT")]);
        let splitter = ExactMatchSplitter::failing(&["S1_AAA"]);

        let report = run_with_splitter(&fixture.config, &splitter).unwrap();

        assert_eq!(report.unsuccessful_units(), vec!["S1_AAA"]);
        assert_eq!(splitter.calls().len(), 5);
        assert!(!fixture.output("Out1").exists());
        assert_eq!(slurp_fastq(fixture.output("Out2")).len(), 1);
        assert_eq!(slurp_fastq(fixture.output("Out3")).len(), 1);
        assert!(fixture.log().contains("S1_AAA : failed!\n"));
    }

    #[test]
    fn test_log_is_appended_across_runs() {
        let mut fixture = Fixture::new(&[("S1", "AAA", "TTT", "Out1")]);
        fixture.config.keep_intermediate_dir = true;
        fixture.write_sample("S1", vec![fq("r1", "AAACTTT")]);

        run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap();
        let first = fixture.log();
        run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap();
        let second = fixture.log();

        assert_eq!(second, format!("{}{}", first, first));
        assert!(fixture.config.paths.intermediate_dir.join("S1_AAA.fastq").is_file());
        assert_eq!(slurp_fastq(fixture.output("Out1")).len(), 1);
    }

    #[test]
    fn test_missing_column_aborts_before_splitting() {
        let fixture = Fixture::new(&[]);
        fs::write(&fixture.config.barcodes_file, "sample_name\tbarcode_bol\tbarcode_eol\nS1\tA\tC\n")
            .unwrap();
        let splitter = ExactMatchSplitter::default();

        let err = run_with_splitter(&fixture.config, &splitter).unwrap_err();

        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::MissingColumns(missing)) => {
                assert_eq!(missing, &vec![String::from("demuxed_name")]);
            }
            other => panic!("Wrong error returned: {:?}", other),
        }
        assert!(splitter.calls().is_empty());
        assert!(!fixture.config.paths.output_dir.exists());
    }

    #[test]
    fn test_missing_barcodes_file_aborts() {
        let fixture = Fixture::new(&[]);
        fs::remove_file(&fixture.config.barcodes_file).unwrap();

        let err = run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap_err();
        assert_matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_intermediate_dir_shared_with_output_dir_is_rejected() {
        let mut fixture = Fixture::new(&[("S1", "AAA", "TTT", "Out1")]);
        fixture.write_sample("S1", vec![fq("r1", "AAACTTT")]);
        fixture.config.paths.intermediate_dir = fixture.config.paths.output_dir.clone();
        fs::create_dir(&fixture.config.paths.output_dir).unwrap();
        let previous = fixture.output("Previous");
        write_reads_to_file(vec![fq("old", "ACGT")], &previous);
        let splitter = ExactMatchSplitter::default();

        let err = run_with_splitter(&fixture.config, &splitter).unwrap_err();

        assert_matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::OverlappingDirectories { role: "output", .. })
        );
        assert!(splitter.calls().is_empty());
        assert_eq!(slurp_fastq(previous).len(), 1);
    }

    #[test]
    fn test_intermediate_dir_containing_fastq_dir_is_rejected() {
        let mut fixture = Fixture::new(&[("S1", "AAA", "TTT", "Out1")]);
        fixture.write_sample("S1", vec![fq("r1", "AAACTTT")]);
        fixture.config.paths.intermediate_dir = fixture.dir.path().to_path_buf();

        let err = run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap_err();

        assert_matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::OverlappingDirectories { role: "FASTQ", .. })
        );
        assert_eq!(slurp_fastq(fixture.config.paths.fastq_dir.join("S1.fastq")).len(), 1);
    }

    #[test]
    fn test_rerun_empties_outputs_that_no_longer_match() {
        let fixture = Fixture::new(&[("S1", "AAA", "TTT", "Out1"), ("S1", "AAA", "GGG", "Out2")]);
        fixture.write_sample("S1", vec![fq("r1", "AAACTTT"), fq("r2", "AAACGGG")]);
        run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap();
        assert_eq!(slurp_fastq(fixture.output("Out1")).len(), 1);

        fixture.write_sample("S1", vec![fq("r2", "AAACGGG")]);
        run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap();

        assert!(slurp_fastq(fixture.output("Out1")).is_empty());
        assert_eq!(names(&slurp_fastq(fixture.output("Out2"))), vec!["r2"]);
    }

    #[test]
    fn test_unwritable_output_dir_is_an_io_error() {
        let fixture = Fixture::new(&[("S1", "AAA", "TTT", "Out1")]);
        fixture.write_sample("S1", vec![]);
        // a regular file where the output directory should be
        fs::write(&fixture.config.paths.output_dir, "").unwrap();

        let err = run_with_splitter(&fixture.config, &ExactMatchSplitter::default()).unwrap_err();
        let io_error = err.downcast_ref::<IoError>().unwrap();
        assert_eq!(io_error.path, fixture.config.paths.output_dir);
    }

    #[test]
    fn test_splitter_log_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SplitterLog::open(dir.path()).unwrap();
        log.record(&UnitOutcome::succeeded(
            "S1",
            SplitMode::Bol,
            crate::splitter::SplitSummary::parse("Barcode\tCount\tLocation\ntotal\t0\n"),
        ))
        .unwrap();
        log.record(&UnitOutcome::failed("S2", SplitMode::Bol, "boom")).unwrap();
        log.record(&UnitOutcome::skipped("S2_AAA", SplitMode::Eol, "bol split of S2 failed"))
            .unwrap();

        let contents = fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        assert_eq!(
            contents,
            "\nBarcode\tCount\tLocation\ntotal\t0\n\n\
             S2 : failed!\n\
             S2_AAA : skipped (bol split of S2 failed)\n"
        );
    }

    #[test]
    fn test_two_pass_demultiplexer_requests() {
        let fixture = Fixture::new(&[]);
        let table = AugmentedTable { records: vec![] };
        let splitter = ExactMatchSplitter::default();
        let paths = &fixture.config.paths;
        let demuxer = TwoPassDemultiplexer::new(&table, paths, &splitter);

        let bol = demuxer.bol_request("S1");
        assert_eq!(bol.input, paths.fastq_dir.join("S1.fastq"));
        assert_eq!(bol.lookup, paths.intermediate_dir.join("S1_bol_barcodes.txt"));
        assert_eq!(bol.output_dir, paths.intermediate_dir);
        assert_eq!(bol.mode, SplitMode::Bol);

        let eol = demuxer.eol_request("S1_AAA");
        assert_eq!(eol.input, paths.intermediate_dir.join("S1_AAA.fastq"));
        assert_eq!(eol.lookup, paths.intermediate_dir.join("S1_AAA_eol_barcodes.txt"));
        assert_eq!(eol.output_dir, paths.output_dir);
        assert_eq!(eol.mode, SplitMode::Eol);
        assert_eq!(eol.suffix, ".fastq");
        assert!(splitter.calls().is_empty());
        assert!(!Path::new(&paths.output_dir).exists());
        assert!(fixture.dir.path().join("barcodes.tsv").is_file());
    }
}
