//! Error types for depshift-deps

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using depshift-deps Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in depshift-deps
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error outside of a manifest
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The path is neither a yarn.lock nor a package-lock.json
    #[error("Unsupported lockfile format: {0}")]
    UnsupportedLockfileFormat(PathBuf),

    /// A manifest is not valid JSON (or not a JSON object)
    #[error("Malformed manifest {path}: {reason}")]
    MalformedManifest {
        /// Manifest path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A value expected to be a semantic version (or range) is not one
    #[error("Invalid version '{0}': {1}")]
    InvalidVersion(String, String),

    /// Registry query failed for a package
    #[error("Registry query for '{name}' failed: {reason}")]
    RegistryQueryFailed {
        /// Package name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Files changed that no rewrite accounts for
    #[error("Working tree has unexpected changes: {0:?}")]
    DirtyWorkingTree(Vec<PathBuf>),

    /// Writing a rewritten manifest failed
    #[error("Failed to write manifest {path}: {source}")]
    ManifestWrite {
        /// Manifest path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// An `updated` schema entry has no `current` counterpart
    #[error("Updated entry '{0}' has no current counterpart")]
    OrphanedUpdate(String),

    /// Invalid file format
    #[error("Invalid file format for {0}: {1}")]
    InvalidFormat(PathBuf, String),

    /// Workspace detection error
    #[error("Workspace detection error: {0}")]
    WorkspaceError(String),

    /// An external command exited unsuccessfully
    #[error("Command `{command}` failed: {reason}")]
    CommandFailed {
        /// The command line that was run
        command: String,
        /// Exit status or stderr summary
        reason: String,
    },
}

impl Error {
    pub(crate) fn invalid_version(value: &str, reason: impl ToString) -> Self {
        Self::InvalidVersion(value.to_string(), reason.to_string())
    }
}
