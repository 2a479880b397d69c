//! Pull the parameter dump out of each run archive into a staging directory.
//!
//! The archive is handed to the configured `tar` program; compression is
//! detected by tar itself. Each run extracts into its own subdirectory so
//! identically named members from different runs never collide.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::batch::discovery::RunArchive;
use crate::core::config::DiscoveryConfig;
use crate::core::errors::{PcovError, Result};

/// Outcome of removing the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStatus {
    /// Staging directory removed.
    Removed,
    /// Nothing was staged.
    NothingToRemove,
    /// `keep_extracted` is set.
    Kept,
    /// Removal failed; the coverage result still stands.
    Failed(String),
}

impl CleanupStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::NothingToRemove => "nothing_to_remove",
            Self::Kept => "kept",
            Self::Failed(_) => "failed",
        }
    }
}

/// Drives `tar` for every run archive.
#[derive(Debug, Clone)]
pub struct Extractor {
    tar_program: String,
    dump_member: String,
    staging_root: PathBuf,
}

impl Extractor {
    /// Staging lives at `<work_root>/<staging_dir>`.
    #[must_use]
    pub fn new(work_root: &Path, config: &DiscoveryConfig) -> Self {
        Self {
            tar_program: config.tar_program.clone(),
            dump_member: config.dump_member.clone(),
            staging_root: work_root.join(&config.staging_dir),
        }
    }

    #[must_use]
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Member path inside the archive: `<stem>/<dump_member>`.
    #[must_use]
    pub fn member_path(&self, run: &RunArchive) -> String {
        format!("{}/{}", run.stem, self.dump_member)
    }

    /// Extract the dump member of `run` and return the path of the extracted file.
    pub fn extract(&self, run: &RunArchive) -> Result<PathBuf> {
        let dest = self.staging_root.join(&run.run_name);
        fs::create_dir_all(&dest).map_err(|source| PcovError::io(&dest, source))?;

        let member = self.member_path(run);
        let output = Command::new(&self.tar_program)
            .arg("-xf")
            .arg(&run.archive)
            .arg("-C")
            .arg(&dest)
            .arg(&member)
            .output()
            .map_err(|error| PcovError::Extraction {
                archive: run.archive.clone(),
                details: format!("cannot run {}: {error}", self.tar_program),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PcovError::Extraction {
                archive: run.archive.clone(),
                details: format!(
                    "{} -xf failed (exit {}): {}",
                    self.tar_program,
                    output
                        .status
                        .code()
                        .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    stderr.trim()
                ),
            });
        }

        let extracted = dest.join(&member);
        if !extracted.is_file() {
            return Err(PcovError::Extraction {
                archive: run.archive.clone(),
                details: format!("member {member} missing after extraction"),
            });
        }
        Ok(extracted)
    }

    /// Remove the staging directory and everything extracted into it.
    pub fn cleanup(&self) -> CleanupStatus {
        if !self.staging_root.exists() {
            return CleanupStatus::NothingToRemove;
        }
        match fs::remove_dir_all(&self.staging_root) {
            Ok(()) => CleanupStatus::Removed,
            Err(source) => {
                CleanupStatus::Failed(PcovError::io(&self.staging_root, source).to_string())
            }
        }
    }
}
