// src/error.rs

//! Error types for dependency collection and lock reconciliation
//!
//! Every variant here aborts the audit run. Optional and dev edges that fail
//! to resolve never produce an error; they are skipped by the reconciler.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing info for '{module}' path: '{}' in {project} project", path.display())]
    MissingMetadata {
        module: String,
        path: PathBuf,
        project: String,
    },

    #[error("Information was not collected for module '{module}' at {}", path.display())]
    MissingManifestName { module: String, path: PathBuf },

    #[error("Cannot find mandatory dependency in the file system: '{name}' ({requested})")]
    MissingDependency { name: String, requested: String },

    #[error("Cannot find an installed version of dependency '{name}' matching {requested} (installed: {})", installed.join(", "))]
    MissingVersion {
        name: String,
        requested: String,
        installed: Vec<String>,
    },

    #[error("Lock file has no resolution for mandatory dependency '{name}@{range}'")]
    UnresolvedRange { name: String, range: String },

    #[error("No usable lock file found for project at {}", .0.display())]
    LockfileNotFound(PathBuf),

    #[error("Invalid lock file {}: {reason}", path.display())]
    InvalidLockfile { path: PathBuf, reason: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for audit operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Name of the package this error is about, if any
    pub fn package_name(&self) -> Option<&str> {
        match self {
            Self::MissingMetadata { module, .. } | Self::MissingManifestName { module, .. } => {
                Some(module)
            }
            Self::MissingDependency { name, .. }
            | Self::MissingVersion { name, .. }
            | Self::UnresolvedRange { name, .. } => Some(name),
            _ => None,
        }
    }
}
