//! Plain-text coverage reports.
//!
//! Layout of a rendered report:
//!
//! ```text
//! ==================================================
//! Parameters that were not covered:
//! ==================================================
//! beta
//! ==================================================
//! Coverage: 50.00%
//! Total number of parameters: 2
//! Number of parameters covered: 1
//! Number of parameters not covered: 1
//! ```
//!
//! The nonspecific variant adds the count of ignored run-specific parameters.
//! Runs dropped by the `exclude` malformed-dump policy are listed last.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::coverage::aggregator::{CoverageFractions, CoverageState};

const RULE: &str = "==================================================";

/// Which slice of the suite a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportVariant {
    /// Every observed parameter.
    Full,
    /// Run-specific parameters filtered out first.
    Nonspecific,
}

/// A run that was left out of the fold because its dump was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedRun {
    pub label: String,
    pub reason: String,
}

/// One report body plus the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub variant: ReportVariant,
    pub not_covered: Vec<String>,
    pub covered_count: usize,
    pub not_covered_count: usize,
    pub fractions: CoverageFractions,
    /// Count of run-specific parameters ignored; set for the nonspecific variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_specific: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_runs: Vec<ExcludedRun>,
}

impl CoverageReport {
    /// Report over every observed parameter.
    #[must_use]
    pub fn full(state: &CoverageState) -> Self {
        Self::from_sets(
            ReportVariant::Full,
            &state.covered,
            &state.not_covered,
            None,
        )
    }

    /// Report over the parameters shared by at least two runs.
    #[must_use]
    pub fn nonspecific(state: &CoverageState) -> Self {
        let (covered, not_covered) = state.without_specific();
        Self::from_sets(
            ReportVariant::Nonspecific,
            &covered,
            &not_covered,
            Some(state.specific.len()),
        )
    }

    fn from_sets(
        variant: ReportVariant,
        covered: &BTreeSet<String>,
        not_covered: &BTreeSet<String>,
        ignored_specific: Option<usize>,
    ) -> Self {
        Self {
            variant,
            not_covered: not_covered.iter().cloned().collect(),
            covered_count: covered.len(),
            not_covered_count: not_covered.len(),
            fractions: CoverageFractions::from_counts(covered.len(), not_covered.len()),
            ignored_specific,
            excluded_runs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_excluded_runs(mut self, excluded: &[ExcludedRun]) -> Self {
        self.excluded_runs = excluded.to_vec();
        self
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.covered_count + self.not_covered_count
    }

    /// Render the report body written to disk.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Parameters that were not covered:");
        let _ = writeln!(out, "{RULE}");
        for name in &self.not_covered {
            let _ = writeln!(out, "{name}");
        }
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Coverage: {:.2}%", self.fractions.covered_percent());
        let _ = writeln!(out, "Total number of parameters: {}", self.total());
        let _ = writeln!(out, "Number of parameters covered: {}", self.covered_count);
        let _ = writeln!(
            out,
            "Number of parameters not covered: {}",
            self.not_covered_count
        );
        if let Some(ignored) = self.ignored_specific {
            let _ = writeln!(
                out,
                "Number of ignored problem specific parameters: {ignored}"
            );
        }
        if !self.excluded_runs.is_empty() {
            let _ = writeln!(
                out,
                "Number of runs excluded (malformed dumps): {}",
                self.excluded_runs.len()
            );
            for run in &self.excluded_runs {
                let _ = writeln!(out, "  {}: {}", run.label, run.reason);
            }
        }
        out
    }
}
