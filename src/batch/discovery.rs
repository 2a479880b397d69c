//! Run discovery: one archive per run under the working root.
//!
//! Layout expected under the root:
//!
//! ```text
//! <root>/<run_dir>/<stem>.<ext>     archive holding <stem>/<dump_member>
//! ```

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::core::config::DiscoveryConfig;
use crate::core::errors::{PcovError, Result};

/// One run archive found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArchive {
    /// Name of the run directory the archive lives in.
    pub run_name: String,
    pub archive: PathBuf,
    /// Archive file name without the archive extension.
    pub stem: String,
}

impl RunArchive {
    /// Label used in reports and errors: `<run_dir>/<archive file name>`.
    #[must_use]
    pub fn label(&self) -> String {
        let file = self
            .archive
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        format!("{}/{file}", self.run_name)
    }
}

/// Enumerate run archives under `root`, sorted by run directory then file name.
pub fn discover_runs(root: &Path, config: &DiscoveryConfig) -> Result<Vec<RunArchive>> {
    let filter = config
        .run_filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|error| PcovError::InvalidConfig {
            details: format!("discovery.run_filter is not a valid regex: {error}"),
        })?;

    let mut run_dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(|source| PcovError::io(root, source))? {
        let entry = entry.map_err(|source| PcovError::io(root, source))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == config.staging_dir {
            continue;
        }
        if filter.as_ref().is_some_and(|re| !re.is_match(&name)) {
            continue;
        }
        run_dirs.push((name, path));
    }
    run_dirs.sort();

    let suffix = format!(".{}", config.archive_extension);
    let mut runs = Vec::new();
    for (run_name, dir) in run_dirs {
        let mut archives = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|source| PcovError::io(&dir, source))? {
            let entry = entry.map_err(|source| PcovError::io(&dir, source))?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = file_name.strip_suffix(&suffix) else {
                continue;
            };
            if stem.is_empty() || !path.is_file() {
                continue;
            }
            archives.push(RunArchive {
                run_name: run_name.clone(),
                stem: stem.to_string(),
                archive: path,
            });
        }
        archives.sort_by(|a, b| a.archive.cmp(&b.archive));
        runs.extend(archives);
    }

    Ok(runs)
}
