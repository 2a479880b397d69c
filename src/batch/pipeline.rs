//! Batch pipeline: raw dump texts in, two coverage reports out.
//!
//! [`analyze`] is the pure core entry point. [`run_batch`] and [`run_files`]
//! wrap it with discovery, extraction, report writing, cleanup, and activity
//! logging.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use crossbeam_channel as channel;
use serde::Serialize;

use crate::batch::discovery::discover_runs;
use crate::batch::extract::{CleanupStatus, Extractor};
use crate::core::config::{AnalysisConfig, Config, MalformedPolicy, ReportConfig};
use crate::core::errors::{PcovError, Result};
use crate::coverage::aggregator::{Aggregator, CoverageFractions, CoverageState};
use crate::coverage::report::{CoverageReport, ExcludedRun};
use crate::dump::classifier::{RunClassification, classify};
use crate::dump::parser::{DumpFormat, parse_dump};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};

/// One run's raw dump text, labelled for reports and errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInput {
    pub label: String,
    pub text: String,
}

impl RunInput {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }

    /// Read a dump file; non-UTF-8 bytes are replaced rather than rejected.
    pub fn read(label: impl Into<String>, path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| PcovError::io(path, source))?;
        Ok(Self::new(label, String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// Knobs for [`analyze`].
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub format: DumpFormat,
    pub on_malformed: MalformedPolicy,
    /// Worker threads used for per-run parsing.
    pub parallelism: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for AnalysisOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            format: config.dump_format(),
            on_malformed: config.on_malformed,
            parallelism: config.parallelism,
        }
    }
}

/// Everything one batch produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub full: CoverageReport,
    pub nonspecific: CoverageReport,
    pub runs_folded: usize,
    /// Parameters seen in exactly one run.
    pub specific: Vec<String>,
    pub excluded_runs: Vec<ExcludedRun>,
}

impl BatchOutcome {
    fn from_state(state: &CoverageState, excluded_runs: Vec<ExcludedRun>) -> Self {
        Self {
            full: CoverageReport::full(state).with_excluded_runs(&excluded_runs),
            nonspecific: CoverageReport::nonspecific(state).with_excluded_runs(&excluded_runs),
            runs_folded: state.runs_folded,
            specific: state.specific.iter().cloned().collect(),
            excluded_runs,
        }
    }

    #[must_use]
    pub fn full_fractions(&self) -> CoverageFractions {
        self.full.fractions
    }

    #[must_use]
    pub fn nonspecific_fractions(&self) -> CoverageFractions {
        self.nonspecific.fractions
    }

    #[must_use]
    pub fn full_total(&self) -> usize {
        self.full.total()
    }

    #[must_use]
    pub fn nonspecific_total(&self) -> usize {
        self.nonspecific.total()
    }
}

/// Where the two reports landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPaths {
    pub full: PathBuf,
    pub nonspecific: PathBuf,
}

/// A completed batch with its on-disk side effects.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub outcome: BatchOutcome,
    pub reports: ReportPaths,
    pub cleanup: CleanupStatus,
}

/// Parse, classify, and fold an ordered collection of raw dumps.
///
/// Parsing fans out over `options.parallelism` workers; the fold itself is
/// sequential and in input order.
pub fn analyze(
    inputs: &[RunInput],
    options: &AnalysisOptions,
    log: &mut JsonlWriter,
) -> Result<BatchOutcome> {
    let results = classify_all(inputs, options)?;

    let mut aggregator = Aggregator::new();
    let mut excluded_runs = Vec::new();
    for (input, result) in inputs.iter().zip(results) {
        match result {
            Ok(run) => {
                let mut entry =
                    LogEntry::new(EventType::RunParsed, Severity::Info).with_run(&input.label);
                entry.params = Some(run.param_count());
                entry.covered = Some(run.covered.len());
                entry.not_covered = Some(run.not_covered.len());
                log.write_entry(&entry);
                aggregator.fold_run(&run);
            }
            Err(PcovError::MalformedDump { artifact, reason })
                if options.on_malformed == MalformedPolicy::Exclude =>
            {
                log.write_entry(
                    &LogEntry::new(EventType::RunExcluded, Severity::Warning)
                        .with_run(&artifact)
                        .with_details(&reason),
                );
                excluded_runs.push(ExcludedRun {
                    label: artifact,
                    reason,
                });
            }
            Err(err) => {
                log.write_entry(&LogEntry::error(&err).with_run(&input.label));
                return Err(err);
            }
        }
    }

    let state = aggregator.finish();
    Ok(BatchOutcome::from_state(&state, excluded_runs))
}

fn parse_one(input: &RunInput, format: &DumpFormat) -> Result<RunClassification> {
    parse_dump(&input.label, &input.text, format).map(|dump| classify(&dump))
}

/// Classify every input, returning results in input order.
fn classify_all(
    inputs: &[RunInput],
    options: &AnalysisOptions,
) -> Result<Vec<Result<RunClassification>>> {
    let workers = options.parallelism.clamp(1, inputs.len().max(1));
    if workers == 1 {
        return Ok(inputs
            .iter()
            .map(|input| parse_one(input, &options.format))
            .collect());
    }

    let (work_tx, work_rx) = channel::unbounded::<usize>();
    let (result_tx, result_rx) = channel::unbounded::<(usize, Result<RunClassification>)>();
    for index in 0..inputs.len() {
        work_tx
            .send(index)
            .map_err(|_| PcovError::ChannelClosed {
                component: "run parser queue",
            })?;
    }
    drop(work_tx);

    let format = &options.format;
    thread::scope(|scope| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for index in work_rx.iter() {
                    let result = parse_one(&inputs[index], format);
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<Result<RunClassification>>> =
        std::iter::repeat_with(|| None).take(inputs.len()).collect();
    for (index, result) in result_rx.iter() {
        slots[index] = Some(result);
    }
    slots
        .into_iter()
        .map(|slot| {
            slot.ok_or_else(|| PcovError::ChannelClosed {
                component: "run parser results",
            })
        })
        .collect()
}

/// Write both report bodies, creating the output directory if needed.
///
/// Without an explicit `output_dir` the reports land in `work_root`.
pub fn write_reports(
    outcome: &BatchOutcome,
    config: &ReportConfig,
    work_root: &Path,
) -> Result<ReportPaths> {
    let dir = config.output_dir_for(work_root);
    fs::create_dir_all(&dir).map_err(|source| PcovError::io(&dir, source))?;

    let paths = ReportPaths {
        full: config.full_report_path(work_root),
        nonspecific: config.nonspecific_report_path(work_root),
    };
    fs::write(&paths.full, outcome.full.render())
        .map_err(|source| PcovError::io(&paths.full, source))?;
    fs::write(&paths.nonspecific, outcome.nonspecific.render())
        .map_err(|source| PcovError::io(&paths.nonspecific, source))?;
    Ok(paths)
}

/// Discover, extract, analyze, and report on every run under the work root.
///
/// The staging directory is removed on success and on failure unless
/// `discovery.keep_extracted` is set.
pub fn run_batch(config: &Config, log: &mut JsonlWriter) -> Result<BatchRun> {
    let started = Instant::now();
    let root = config.discovery.work_root.as_path();
    log_batch_start(config, root, log);

    let extractor = Extractor::new(root, &config.discovery);
    let result = extract_and_report(config, &extractor, log);

    let cleanup = if config.discovery.keep_extracted {
        CleanupStatus::Kept
    } else {
        extractor.cleanup()
    };
    log_cleanup(&cleanup, extractor.staging_root(), log);

    let (outcome, reports) = result?;
    log_batch_complete(&outcome, started, log);
    Ok(BatchRun {
        outcome,
        reports,
        cleanup,
    })
}

fn extract_and_report(
    config: &Config,
    extractor: &Extractor,
    log: &mut JsonlWriter,
) -> Result<(BatchOutcome, ReportPaths)> {
    let staged = discover_runs(&config.discovery.work_root, &config.discovery)
        .and_then(|runs| {
            runs.iter()
                .map(|run| {
                    let path = extractor.extract(run)?;
                    RunInput::read(run.label(), &path)
                })
                .collect::<Result<Vec<_>>>()
        });
    let inputs = match staged {
        Ok(inputs) => inputs,
        Err(err) => {
            log.write_entry(&LogEntry::error(&err));
            return Err(err);
        }
    };
    analyze_and_write(&inputs, config, log)
}

/// Analyze dump files given directly, skipping discovery and extraction.
pub fn run_files(paths: &[PathBuf], config: &Config, log: &mut JsonlWriter) -> Result<BatchRun> {
    let started = Instant::now();
    log_batch_start(config, &config.discovery.work_root, log);

    let inputs = paths
        .iter()
        .map(|path| RunInput::read(path.display().to_string(), path))
        .collect::<Result<Vec<_>>>()
        .inspect_err(|err| log.write_entry(&LogEntry::error(err)))?;
    let (outcome, reports) = analyze_and_write(&inputs, config, log)?;

    log_batch_complete(&outcome, started, log);
    Ok(BatchRun {
        outcome,
        reports,
        cleanup: CleanupStatus::NothingToRemove,
    })
}

fn analyze_and_write(
    inputs: &[RunInput],
    config: &Config,
    log: &mut JsonlWriter,
) -> Result<(BatchOutcome, ReportPaths)> {
    let options = AnalysisOptions::from(&config.analysis);
    let outcome = analyze(inputs, &options, log)?;
    let reports = write_reports(&outcome, &config.report, &config.discovery.work_root)
        .inspect_err(|err| log.write_entry(&LogEntry::error(err)))?;
    for (path, report) in [
        (&reports.full, &outcome.full),
        (&reports.nonspecific, &outcome.nonspecific),
    ] {
        let mut entry = LogEntry::new(EventType::ReportWritten, Severity::Info).with_path(path);
        entry.params = Some(report.total());
        entry.covered = Some(report.covered_count);
        entry.not_covered = Some(report.not_covered_count);
        entry.coverage_pct = Some(report.fractions.covered_percent());
        log.write_entry(&entry);
    }
    Ok((outcome, reports))
}

fn log_batch_start(config: &Config, root: &Path, log: &mut JsonlWriter) {
    let hash = config
        .stable_hash()
        .unwrap_or_else(|_| "unavailable".to_string());
    log.write_entry(
        &LogEntry::new(EventType::BatchStart, Severity::Info)
            .with_path(root)
            .with_details(format!("config_hash={hash}")),
    );
}

fn log_cleanup(status: &CleanupStatus, staging: &Path, log: &mut JsonlWriter) {
    let severity = match status {
        CleanupStatus::Failed(_) => Severity::Warning,
        _ => Severity::Info,
    };
    let mut entry = LogEntry::new(EventType::Cleanup, severity)
        .with_path(staging)
        .with_details(status.as_str());
    if let CleanupStatus::Failed(message) = status {
        entry.ok = Some(false);
        entry.error_message = Some(message.clone());
    }
    log.write_entry(&entry);
}

fn log_batch_complete(outcome: &BatchOutcome, started: Instant, log: &mut JsonlWriter) {
    let mut entry = LogEntry::new(EventType::BatchComplete, Severity::Info);
    entry.runs = Some(outcome.runs_folded);
    entry.params = Some(outcome.full_total());
    entry.covered = Some(outcome.full.covered_count);
    entry.not_covered = Some(outcome.full.not_covered_count);
    entry.coverage_pct = Some(outcome.full.fractions.covered_percent());
    entry.duration_ms = Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
    entry.ok = Some(true);
    log.write_entry(&entry);
    log.flush();
}
