//! Property-based tests for the coverage fold.
//!
//! Uses `proptest` to check that arbitrary batches keep the classification
//! invariants: disjoint covered / not-covered sets, a consistent total,
//! covered dominance, exactly-one-run specificity, and run-order independence.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use super::aggregator::{CoverageState, aggregate};
use super::report::CoverageReport;
use crate::dump::classifier::{RunClassification, classify};
use crate::dump::parser::{ParamLine, RunDump};

// ──────────────────── strategies ────────────────────

fn arb_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("cfl"),
        Just("max_levels"),
        Just("stop_time"),
        Just("do_burning"),
        Just("plot_int"),
        Just("verbose"),
        Just("use_tfromp"),
        Just("max_step"),
    ]
    .prop_map(str::to_string)
}

fn arb_run() -> impl Strategy<Value = RunDump> {
    prop::collection::vec((arb_name(), any::<bool>()), 0..12).prop_map(|rows| RunDump {
        label: "run".to_string(),
        lines: rows
            .into_iter()
            .map(|(name, overridden)| ParamLine { name, overridden })
            .collect(),
    })
}

fn arb_batch() -> impl Strategy<Value = Vec<RunClassification>> {
    prop::collection::vec(arb_run(), 0..8)
        .prop_map(|dumps| dumps.iter().map(classify).collect::<Vec<_>>())
}

fn arb_batch_and_shuffle()
-> impl Strategy<Value = (Vec<RunClassification>, Vec<RunClassification>)> {
    arb_batch().prop_flat_map(|runs| (Just(runs.clone()), Just(runs).prop_shuffle()))
}

// ──────────────────── oracles ────────────────────

fn runs_per_name(runs: &[RunClassification]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for run in runs {
        let names: BTreeSet<&str> = run.distinct_names().collect();
        for name in names {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn fold(runs: &[RunClassification]) -> CoverageState {
    aggregate(runs)
}

// ──────────────────── properties ────────────────────

proptest! {
    #[test]
    fn covered_and_not_covered_are_disjoint(runs in arb_batch()) {
        let state = fold(&runs);
        prop_assert!(state.covered.is_disjoint(&state.not_covered));
    }

    #[test]
    fn partition_accounts_for_every_param(runs in arb_batch()) {
        let state = fold(&runs);
        prop_assert_eq!(state.covered.len() + state.not_covered.len(), state.all_params.len());
        let union: BTreeSet<String> = state.covered.union(&state.not_covered).cloned().collect();
        prop_assert_eq!(union, state.all_params.clone());
    }

    #[test]
    fn any_override_means_covered(runs in arb_batch()) {
        let state = fold(&runs);
        for run in &runs {
            for name in &run.covered {
                prop_assert!(state.covered.contains(name), "{} should be covered", name);
            }
        }
    }

    #[test]
    fn specific_means_exactly_one_run(runs in arb_batch()) {
        let state = fold(&runs);
        let expected: BTreeSet<String> = runs_per_name(&runs)
            .into_iter()
            .filter(|(_, count)| *count == 1)
            .map(|(name, _)| name)
            .collect();
        prop_assert_eq!(state.specific, expected);
    }

    #[test]
    fn result_is_independent_of_run_order((runs, shuffled) in arb_batch_and_shuffle()) {
        prop_assert_eq!(fold(&runs), fold(&shuffled));
    }

    #[test]
    fn fractions_stay_in_range(runs in arb_batch()) {
        let state = fold(&runs);
        for report in [CoverageReport::full(&state), CoverageReport::nonspecific(&state)] {
            let f = report.fractions;
            prop_assert!((0.0..=1.0).contains(&f.covered));
            prop_assert!((0.0..=1.0).contains(&f.not_covered));
            if report.total() > 0 {
                prop_assert!((f.covered + f.not_covered - 1.0).abs() < 1e-9);
            } else {
                prop_assert!(f.covered.abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn nonspecific_report_never_lists_specific_names(runs in arb_batch()) {
        let state = fold(&runs);
        let report = CoverageReport::nonspecific(&state);
        for name in &report.not_covered {
            prop_assert!(!state.specific.contains(name));
        }
        prop_assert!(report.total() <= state.total());
    }
}
