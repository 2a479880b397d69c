#![forbid(unsafe_code)]

//! Parameter coverage analyzer (pcov) for simulation regression suites.
//!
//! Each run of a suite leaves a plain-text dump of its runtime parameters,
//! with overridden parameters flagged. Folding every dump together answers
//! which parameters the suite never exercises away from their defaults:
//! 1. **Dump parser**: locate the parameter table and read one row per parameter
//! 2. **Classifier**: split a run's parameters into covered and not covered
//! 3. **Aggregator**: fold runs into suite-wide sets and find run-specific names
//! 4. **Reports**: render the full and the run-specific-excluded reports
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use param_coverage::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use param_coverage::batch::pipeline::{AnalysisOptions, RunInput, analyze};
//! use param_coverage::logger::jsonl::JsonlWriter;
//!
//! let runs = [RunInput::new("run_a", "Parameter\n---\n[*] cfl = 0.5\n")];
//! let outcome = analyze(&runs, &AnalysisOptions::default(), &mut JsonlWriter::discard());
//! ```

pub mod prelude;

pub mod batch;
pub mod core;
pub mod coverage;
pub mod dump;
pub mod logger;
