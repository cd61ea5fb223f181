//! The per-unit outcomes of a run and the summary file built from them.
//!
//! Every invocation of the barcode splitter yields one [`UnitOutcome`]: a success with the
//! counts reported by the splitter, a failure, or a skip (a trailing barcode group whose sample
//! failed the leading barcode pass).  The outcomes are collected into a [`RunReport`], which
//! decides whether the run fully succeeded and is written as `demux_summary.tsv`.

use std::path::Path;

use anyhow::Result;
use fgoxide::io::DelimFile;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
    splitter::{SplitMode, SplitSummary},
    utils::SUMMARY_FILE_NAME,
};

/// What happened to a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// The outcome of splitting a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    /// The sample (leading pass) or `sample_bol` group (trailing pass).
    pub unit: String,
    pub mode: SplitMode,
    pub status: UnitStatus,
    /// The splitter's report when the split succeeded.
    pub summary: Option<SplitSummary>,
    /// Why the unit failed or was skipped.
    pub detail: Option<String>,
}

impl UnitOutcome {
    pub fn succeeded<S: Into<String>>(unit: S, mode: SplitMode, summary: SplitSummary) -> Self {
        Self {
            unit: unit.into(),
            mode,
            status: UnitStatus::Succeeded,
            summary: Some(summary),
            detail: None,
        }
    }

    pub fn failed<S: Into<String>, D: Into<String>>(unit: S, mode: SplitMode, detail: D) -> Self {
        Self {
            unit: unit.into(),
            mode,
            status: UnitStatus::Failed,
            summary: None,
            detail: Some(detail.into()),
        }
    }

    pub fn skipped<S: Into<String>, D: Into<String>>(unit: S, mode: SplitMode, detail: D) -> Self {
        Self {
            unit: unit.into(),
            mode,
            status: UnitStatus::Skipped,
            summary: None,
            detail: Some(detail.into()),
        }
    }

    fn as_metrics(&self) -> UnitMetrics {
        let summary = self.summary.as_ref();
        UnitMetrics {
            unit: self.unit.clone(),
            pass: self.mode,
            status: self.status,
            matched_reads: summary.map(SplitSummary::matched),
            unmatched_reads: summary.and_then(SplitSummary::unmatched),
            total_reads: summary.and_then(SplitSummary::total),
            detail: self.detail.clone().unwrap_or_default(),
        }
    }
}

/// One row of `demux_summary.tsv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMetrics {
    /// The sample or `sample_bol` group.
    pub(crate) unit: String,
    /// `bol` for the leading barcode pass, `eol` for the trailing barcode pass.
    pub(crate) pass: SplitMode,
    pub(crate) status: UnitStatus,
    /// Reads routed to any barcode, empty unless the split succeeded.
    pub(crate) matched_reads: Option<usize>,
    /// Reads matching no barcode, empty if not reported by the splitter.
    pub(crate) unmatched_reads: Option<usize>,
    /// All reads seen, empty if not reported by the splitter.
    pub(crate) total_reads: Option<usize>,
    /// The failure or skip reason.
    pub(crate) detail: String,
}

/// All unit outcomes of a run, in the order the units were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<UnitOutcome>,
}

impl RunReport {
    pub fn push(&mut self, outcome: UnitOutcome) {
        self.outcomes.push(outcome);
    }

    /// The number of units with the given status.
    pub fn count(&self, status: UnitStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// True if every unit was split successfully.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == UnitStatus::Succeeded)
    }

    /// The names of the units that did not succeed.
    pub fn unsuccessful_units(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status != UnitStatus::Succeeded)
            .map(|o| o.unit.as_str())
            .collect()
    }

    /// Write the outcomes to a `demux_summary.tsv` file in the specified directory.
    pub fn write_summary<P: AsRef<Path>>(&self, output_dir: P) -> Result<()> {
        let output_path = output_dir.as_ref().join(SUMMARY_FILE_NAME);
        let delim = DelimFile::default();
        delim.write_tsv(&output_path, self.outcomes.iter().map(UnitOutcome::as_metrics))?;
        Ok(())
    }

    /// A one line description of the run, e.g. `3 succeeded, 1 failed, 2 skipped`.
    pub fn describe(&self) -> String {
        [UnitStatus::Succeeded, UnitStatus::Failed, UnitStatus::Skipped]
            .iter()
            .map(|status| format!("{} {}", self.count(*status), status))
            .join(", ")
    }
}
