//! Per-run classification of parsed dump rows.

#![allow(missing_docs)]

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::dump::parser::RunDump;

/// Covered / not-covered names of one run, each deduplicated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunClassification {
    pub label: String,
    pub covered: Vec<String>,
    pub not_covered: Vec<String>,
}

impl RunClassification {
    /// Distinct names the run references, covered first.
    pub fn distinct_names(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::new();
        self.covered
            .iter()
            .chain(&self.not_covered)
            .map(String::as_str)
            .filter(move |name| seen.insert(*name))
    }

    #[must_use]
    pub fn param_count(&self) -> usize {
        self.distinct_names().count()
    }
}

/// Partition one run's rows into covered and not-covered names.
#[must_use]
pub fn classify(dump: &RunDump) -> RunClassification {
    let mut covered = Vec::new();
    let mut not_covered = Vec::new();
    let mut seen_covered = HashSet::new();
    let mut seen_not_covered = HashSet::new();

    for line in &dump.lines {
        let (list, seen) = if line.overridden {
            (&mut covered, &mut seen_covered)
        } else {
            (&mut not_covered, &mut seen_not_covered)
        };
        if seen.insert(line.name.as_str()) {
            list.push(line.name.clone());
        }
    }

    RunClassification {
        label: dump.label.clone(),
        covered,
        not_covered,
    }
}
