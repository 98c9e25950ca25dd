//! Error taxonomy for the fetch pipeline
//!
//! Run-level errors (authentication, application listing, configuration) abort
//! the whole pass. Everything else is caught at the per-application boundary
//! and recorded in that application's outcome.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coarse classification of a failure, as reported in outcomes and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Resolution,
    Transient,
    Permanent,
    Io,
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Auth => write!(f, "AuthError"),
            ErrorKind::Resolution => write!(f, "ResolutionError"),
            ErrorKind::Transient => write!(f, "Transient"),
            ErrorKind::Permanent => write!(f, "Permanent"),
            ErrorKind::Io => write!(f, "IOError"),
            ErrorKind::Config => write!(f, "ConfigError"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Credentials rejected, even after re-authenticating once
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The application list could not be obtained
    #[error("could not resolve applications: {0}")]
    Resolution(String),

    /// Network failure, timeout or 5xx that outlived the retry budget
    #[error("{0}")]
    Transient(String),

    /// 4xx other than auth, or a payload that is not what the endpoint promises
    #[error("{0}")]
    Permanent(String),

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A worker thread panicked
    #[error("worker pool failed: {0}")]
    Worker(String),
}

impl FetchError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Auth(_) => ErrorKind::Auth,
            FetchError::Resolution(_) => ErrorKind::Resolution,
            FetchError::Transient(_) => ErrorKind::Transient,
            FetchError::Permanent(_) | FetchError::Worker(_) => ErrorKind::Permanent,
            FetchError::Io { .. } => ErrorKind::Io,
            FetchError::Config(_) => ErrorKind::Config,
        }
    }

    /// Recast a failed listing call as the run-level error it becomes; auth failures keep their kind
    pub fn into_resolution(self) -> Self {
        match self {
            FetchError::Auth(_) | FetchError::Resolution(_) => self,
            other => FetchError::Resolution(other.to_string()),
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
