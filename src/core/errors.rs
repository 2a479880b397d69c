//! PCOV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PcovError>;

/// Top-level error type for the coverage analyzer.
#[derive(Debug, Error)]
pub enum PcovError {
    #[error("[PCOV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[PCOV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[PCOV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[PCOV-2001] malformed parameter dump {artifact}: {reason}")]
    MalformedDump { artifact: String, reason: String },

    #[error("[PCOV-2002] archive extraction failed for {archive}: {details}")]
    Extraction { archive: PathBuf, details: String },

    #[error("[PCOV-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[PCOV-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PCOV-3002] channel closed in component {component}")]
    ChannelClosed { component: &'static str },
}

impl PcovError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "PCOV-1001",
            Self::MissingConfig { .. } => "PCOV-1002",
            Self::ConfigParse { .. } => "PCOV-1003",
            Self::MalformedDump { .. } => "PCOV-2001",
            Self::Extraction { .. } => "PCOV-2002",
            Self::Serialization { .. } => "PCOV-2101",
            Self::Io { .. } => "PCOV-3001",
            Self::ChannelClosed { .. } => "PCOV-3002",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a malformed dump.
    #[must_use]
    pub fn malformed(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDump {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PcovError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for PcovError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for PcovError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
