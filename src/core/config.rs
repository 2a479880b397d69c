//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PcovError, Result};
use crate::dump::parser::DumpFormat;

/// Full analyzer configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub analysis: AnalysisConfig,
    pub report: ReportConfig,
    pub paths: PathsConfig,
}

/// Where runs live and how their dumps are pulled out of the run archives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory whose immediate subdirectories are the test runs.
    pub work_root: PathBuf,
    /// Archive extension (without the leading dot) marking one run's output.
    pub archive_extension: String,
    /// Dump file name inside `<archive-stem>/` in each archive.
    pub dump_member: String,
    /// Optional regex; only run directories whose name matches are analyzed.
    pub run_filter: Option<String>,
    /// Staging directory (relative to `work_root`) that receives extracted dumps.
    pub staging_dir: String,
    /// Keep extracted dumps after the reports are written.
    pub keep_extracted: bool,
    /// Program used to extract archive members.
    pub tar_program: String,
}

/// Dump-format spellings and per-run policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub header_marker: String,
    pub override_marker: String,
    pub assignment_separator: String,
    pub reserved_names: Vec<String>,
    pub on_malformed: MalformedPolicy,
    pub parallelism: usize,
}

/// What a batch does with a run whose dump cannot be parsed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Abort the whole batch on the first malformed dump.
    #[default]
    Fail,
    /// Drop the run and list it as excluded in the summary and reports.
    Exclude,
}

impl MalformedPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Exclude => "exclude",
        }
    }

    fn parse(name: &str, raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "exclude" => Ok(Self::Exclude),
            other => Err(PcovError::ConfigParse {
                context: "env",
                details: format!("{name}={other:?}: expected \"fail\" or \"exclude\""),
            }),
        }
    }
}

/// Report file placement and names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Where both reports land; unset means the work root, next to the runs.
    pub output_dir: Option<PathBuf>,
    pub full_report_name: String,
    pub nonspecific_report_name: String,
}

/// Filesystem paths used by pcov itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("."),
            archive_extension: "tgz".to_string(),
            dump_member: "job_info".to_string(),
            run_filter: None,
            staging_dir: ".pcov-staging".to_string(),
            keep_extracted: false,
            tar_program: "tar".to_string(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let format = DumpFormat::default();
        Self {
            header_marker: format.header_marker,
            override_marker: format.override_marker,
            assignment_separator: format.assignment_separator,
            reserved_names: format.reserved_names,
            on_malformed: MalformedPolicy::Fail,
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
        }
    }
}

impl AnalysisConfig {
    /// Dump format described by this section.
    #[must_use]
    pub fn dump_format(&self) -> DumpFormat {
        DumpFormat {
            header_marker: self.header_marker.clone(),
            override_marker: self.override_marker.clone(),
            assignment_separator: self.assignment_separator.clone(),
            reserved_names: self.reserved_names.clone(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            full_report_name: "coverage.out".to_string(),
            nonspecific_report_name: "coverage_nonspecific.out".to_string(),
        }
    }
}

impl ReportConfig {
    /// Report directory for a batch rooted at `work_root`.
    #[must_use]
    pub fn output_dir_for(&self, work_root: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| work_root.to_path_buf())
    }

    #[must_use]
    pub fn full_report_path(&self, work_root: &Path) -> PathBuf {
        self.output_dir_for(work_root).join(&self.full_report_name)
    }

    #[must_use]
    pub fn nonspecific_report_path(&self, work_root: &Path) -> PathBuf {
        self.output_dir_for(work_root)
            .join(&self.nonspecific_report_name)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[PCOV-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("pcov").join("config.toml");
        let data = home_dir.join(".local").join("share").join("pcov");
        Self {
            config_file: cfg,
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| PcovError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(PcovError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // discovery
        if let Some(raw) = lookup("PCOV_WORK_ROOT") {
            self.discovery.work_root = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("PCOV_ARCHIVE_EXTENSION") {
            self.discovery.archive_extension = raw;
        }
        if let Some(raw) = lookup("PCOV_DUMP_MEMBER") {
            self.discovery.dump_member = raw;
        }
        if let Some(raw) = lookup("PCOV_RUN_FILTER") {
            self.discovery.run_filter = Some(raw);
        }
        if let Some(raw) = lookup("PCOV_KEEP_EXTRACTED") {
            self.discovery.keep_extracted = parse_env_bool("PCOV_KEEP_EXTRACTED", &raw)?;
        }
        if let Some(raw) = lookup("PCOV_TAR_PROGRAM") {
            self.discovery.tar_program = raw;
        }

        // analysis
        if let Some(raw) = lookup("PCOV_ON_MALFORMED") {
            self.analysis.on_malformed = MalformedPolicy::parse("PCOV_ON_MALFORMED", &raw)?;
        }
        if let Some(raw) = lookup("PCOV_PARALLELISM") {
            self.analysis.parallelism = parse_env_usize("PCOV_PARALLELISM", &raw)?;
        }

        // report
        if let Some(raw) = lookup("PCOV_OUTPUT_DIR") {
            self.report.output_dir = Some(PathBuf::from(raw));
        }

        // paths
        if let Some(raw) = lookup("PCOV_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn normalize(&mut self) {
        let ext = self.discovery.archive_extension.trim();
        self.discovery.archive_extension = ext.strip_prefix('.').unwrap_or(ext).to_string();

        let report_dir = self.report.output_dir.as_mut();
        for path in std::iter::once(&mut self.discovery.work_root).chain(report_dir) {
            let s = path.to_string_lossy();
            if s.len() > 1
                && let Some(stripped) = s.strip_suffix('/')
            {
                *path = PathBuf::from(stripped);
            }
        }

        if self
            .discovery
            .run_filter
            .as_deref()
            .is_some_and(|f| f.trim().is_empty())
        {
            self.discovery.run_filter = None;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.analysis.parallelism == 0 {
            return Err(PcovError::InvalidConfig {
                details: "analysis.parallelism must be >= 1".to_string(),
            });
        }

        for (name, val) in [
            ("analysis.header_marker", &self.analysis.header_marker),
            ("analysis.override_marker", &self.analysis.override_marker),
            (
                "analysis.assignment_separator",
                &self.analysis.assignment_separator,
            ),
            (
                "discovery.archive_extension",
                &self.discovery.archive_extension,
            ),
            ("discovery.tar_program", &self.discovery.tar_program),
        ] {
            if val.trim().is_empty() {
                return Err(PcovError::InvalidConfig {
                    details: format!("{name} must not be empty"),
                });
            }
        }

        validate_relative_component("discovery.dump_member", &self.discovery.dump_member, true)?;
        validate_relative_component("discovery.staging_dir", &self.discovery.staging_dir, false)?;
        validate_relative_component(
            "report.full_report_name",
            &self.report.full_report_name,
            false,
        )?;
        validate_relative_component(
            "report.nonspecific_report_name",
            &self.report.nonspecific_report_name,
            false,
        )?;

        if self.report.full_report_name == self.report.nonspecific_report_name {
            return Err(PcovError::InvalidConfig {
                details: "report.full_report_name and report.nonspecific_report_name must differ"
                    .to_string(),
            });
        }

        if let Some(pattern) = &self.discovery.run_filter {
            regex::Regex::new(pattern).map_err(|error| PcovError::InvalidConfig {
                details: format!("discovery.run_filter {pattern:?} is not a valid regex: {error}"),
            })?;
        }

        Ok(())
    }
}

/// Names that are joined onto another directory must stay inside it.
fn validate_relative_component(name: &str, value: &str, allow_nested: bool) -> Result<()> {
    let path = Path::new(value);
    let invalid = value.trim().is_empty()
        || path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        || (!allow_nested && path.components().count() != 1);
    if invalid {
        return Err(PcovError::InvalidConfig {
            details: format!("{name} must be a plain relative name, got {value:?}"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|error| PcovError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| PcovError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
