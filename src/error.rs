//! Crate-wide error type and exit-code mapping.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by ams-compose operations.
///
/// Per-library failures (`InvalidUrl`, `RefNotFound`, `Timeout`,
/// `SourceMissing`, `Extraction`) are captured during a batch install and
/// aggregated into `Installation`; configuration and lockfile errors abort
/// immediately.
#[derive(Debug, Error)]
pub enum Error {
    /// Manifest or lockfile is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Repository URL failed validation before any git I/O.
    #[error("invalid repository URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Requested ref could not be resolved, even after fetching.
    #[error("reference `{reference}` not found in {url}")]
    RefNotFound { url: String, reference: String },

    /// A git network or checkout operation exceeded its deadline.
    #[error("git {operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// A library destination resolved outside the project root.
    #[error("path `{path}` escapes the project root")]
    PathEscape { path: PathBuf },

    /// The configured source_path does not exist in the mirror.
    #[error("source path `{path}` not found in repository mirror")]
    SourceMissing { path: PathBuf },

    /// I/O failure while materializing an extraction; the destination has
    /// already been cleaned up when this surfaces.
    #[error("extraction failed at `{path}`: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more libraries failed during a batch install.
    #[error("failed to install {} libraries:\n{}", .failures.len(), format_failures(.failures))]
    Installation { failures: Vec<(String, String)> },

    /// One or more libraries failed validation.
    #[error("{failed} of {total} libraries failed validation")]
    ValidationFailed { failed: usize, total: usize },

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code for this error when it reaches the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Yaml(_) => 1,
            Error::ValidationFailed { .. } => 3,
            _ => 2,
        }
    }

    /// Whether this error indicates potentially malicious input that must
    /// never be retried or recovered in place.
    pub fn is_hard(&self) -> bool {
        matches!(self, Error::InvalidUrl { .. } | Error::PathEscape { .. })
    }
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("  - {name}: {err}"))
        .collect::<Vec<_>>()
        .join("\n")
}
