//! Suite-wide fold of per-run classifications.
//!
//! Rules applied per run:
//! - a covered name joins `covered` and leaves `not_covered` (covered
//!   observations dominate, whatever order runs arrive in);
//! - a not-covered name joins `not_covered` unless it is already covered;
//! - every name joins `all_params`;
//! - every distinct name bumps its occurrence count once.
//!
//! After the fold, a name is run-specific iff its occurrence count is exactly 1.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::dump::classifier::RunClassification;

/// Mutable fold state. Create one per batch.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    covered: BTreeSet<String>,
    not_covered: BTreeSet<String>,
    all_params: BTreeSet<String>,
    occurrences: BTreeMap<String, usize>,
    runs_folded: usize,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one run's classification into the suite-wide state.
    pub fn fold_run(&mut self, run: &RunClassification) {
        for name in run.covered.iter().filter_map(|n| param_name(n)) {
            self.not_covered.remove(name);
            self.covered.insert(name.to_string());
            self.all_params.insert(name.to_string());
        }

        for name in run.not_covered.iter().filter_map(|n| param_name(n)) {
            if !self.covered.contains(name) {
                self.not_covered.insert(name.to_string());
            }
            self.all_params.insert(name.to_string());
        }

        for name in run.distinct_names().filter_map(param_name) {
            *self.occurrences.entry(name.to_string()).or_insert(0) += 1;
        }

        self.runs_folded += 1;
    }

    #[must_use]
    pub fn runs_folded(&self) -> usize {
        self.runs_folded
    }

    /// Freeze the fold into its final, read-only state.
    #[must_use]
    pub fn finish(self) -> CoverageState {
        let specific = self
            .occurrences
            .into_iter()
            .filter(|(_, count)| *count == 1)
            .map(|(name, _)| name)
            .collect();

        CoverageState {
            covered: self.covered,
            not_covered: self.not_covered,
            all_params: self.all_params,
            specific,
            runs_folded: self.runs_folded,
        }
    }
}

/// Fold a whole batch in order.
#[must_use]
pub fn aggregate<'a, I>(runs: I) -> CoverageState
where
    I: IntoIterator<Item = &'a RunClassification>,
{
    let mut aggregator = Aggregator::new();
    for run in runs {
        aggregator.fold_run(run);
    }
    aggregator.finish()
}

/// Blank-line artifacts are not parameter names.
fn param_name(raw: &str) -> Option<&str> {
    let name = raw.trim();
    (!name.is_empty()).then_some(name)
}

/// Final suite-wide classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageState {
    pub covered: BTreeSet<String>,
    pub not_covered: BTreeSet<String>,
    pub all_params: BTreeSet<String>,
    /// Names referenced by exactly one run.
    pub specific: BTreeSet<String>,
    pub runs_folded: usize,
}

impl CoverageState {
    #[must_use]
    pub fn total(&self) -> usize {
        self.covered.len() + self.not_covered.len()
    }

    #[must_use]
    pub fn fractions(&self) -> CoverageFractions {
        CoverageFractions::from_counts(self.covered.len(), self.not_covered.len())
    }

    /// Covered and not-covered sets with every run-specific name removed.
    #[must_use]
    pub fn without_specific(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        let keep = |name: &&String| !self.specific.contains(*name);
        (
            self.covered.iter().filter(keep).cloned().collect(),
            self.not_covered.iter().filter(keep).cloned().collect(),
        )
    }
}

/// Covered / not-covered shares of the observed parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoverageFractions {
    pub covered: f64,
    pub not_covered: f64,
}

impl CoverageFractions {
    /// Shares for the given counts; both are 0.0 when nothing was observed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_counts(covered: usize, not_covered: usize) -> Self {
        let total = covered + not_covered;
        if total == 0 {
            return Self::default();
        }
        let total = total as f64;
        Self {
            covered: covered as f64 / total,
            not_covered: not_covered as f64 / total,
        }
    }

    #[must_use]
    pub fn covered_percent(&self) -> f64 {
        self.covered * 100.0
    }
}
