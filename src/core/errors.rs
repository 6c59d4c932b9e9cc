//! ASW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::scanner::manifest::ManifestError;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SweepError>;

/// Top-level error type for appsweep.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("[ASW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ASW-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ASW-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ASW-1101] invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("[ASW-2001] manifest parse failure for {path}: {details}")]
    ManifestParse { path: PathBuf, details: String },

    #[error("[ASW-2002] cannot access {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ASW-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ASW-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ASW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SweepError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ASW-1001",
            Self::MissingConfig { .. } => "ASW-1002",
            Self::ConfigParse { .. } => "ASW-1003",
            Self::InvalidArgument { .. } => "ASW-1101",
            Self::ManifestParse { .. } => "ASW-2001",
            Self::Access { .. } => "ASW-2002",
            Self::Serialization { .. } => "ASW-2101",
            Self::Io { .. } => "ASW-3002",
            Self::Runtime { .. } => "ASW-3900",
        }
    }

    /// Whether retrying might resolve the failure (resource busy, transient IO).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Runtime { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    ///
    /// Permission failures are reported as [`SweepError::Access`] so callers
    /// can tell "not allowed" apart from other IO trouble.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::Access { path, source }
        } else {
            Self::Io { path, source }
        }
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SweepError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<ManifestError> for SweepError {
    fn from(value: ManifestError) -> Self {
        Self::ManifestParse {
            path: value.manifest_path().to_path_buf(),
            details: value.to_string(),
        }
    }
}
