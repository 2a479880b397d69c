//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use param_coverage::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, MalformedPolicy};
pub use crate::core::errors::{PcovError, Result};

// Dump
pub use crate::dump::classifier::{RunClassification, classify};
pub use crate::dump::parser::{DumpFormat, ParamLine, RunDump, parse_dump};

// Coverage
pub use crate::coverage::aggregator::{Aggregator, CoverageFractions, CoverageState, aggregate};
pub use crate::coverage::report::{CoverageReport, ExcludedRun, ReportVariant};

// Batch
pub use crate::batch::discovery::{RunArchive, discover_runs};
pub use crate::batch::extract::{CleanupStatus, Extractor};
pub use crate::batch::pipeline::{
    AnalysisOptions, BatchOutcome, BatchRun, ReportPaths, RunInput, analyze, run_batch, run_files,
    write_reports,
};

// Logging
pub use crate::logger::jsonl::JsonlWriter;
