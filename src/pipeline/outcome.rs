use serde::Serialize;
use std::path::PathBuf;

use crate::error::{ErrorKind, FetchError};
use crate::iq::Application;
use crate::report::ConsolidatedRow;

/// Where an application is in its processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Pending,
    Locating,
    Retrieving,
    Consolidating,
    Writing,
    Done,
    Failed,
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AppState::Pending => "pending",
            AppState::Locating => "locating",
            AppState::Retrieving => "retrieving",
            AppState::Consolidating => "consolidating",
            AppState::Writing => "writing",
            AppState::Done => "done",
            AppState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Final result for one application; never changed once recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success { rows: usize },
    Empty { reason: String },
    Failed { kind: ErrorKind, message: String },
    /// Not processed because the run was cancelled
    Skipped { reason: String },
}

impl FetchOutcome {
    pub fn failed(error: &FetchError, state: AppState) -> Self {
        FetchOutcome::Failed {
            kind: error.kind(),
            message: format!("{error} (while {state})"),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            FetchOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Everything the driver learned about one application
#[derive(Debug, Clone)]
pub struct ApplicationResult {
    pub application: Application,
    pub outcome: FetchOutcome,
    /// CSV (and raw JSON) files written for this application
    pub files: Vec<PathBuf>,
    /// Rows across all of the application's reports, for the consolidated file
    pub rows: Vec<ConsolidatedRow>,
}

impl ApplicationResult {
    pub fn new(application: Application, outcome: FetchOutcome) -> Self {
        Self {
            application,
            outcome,
            files: Vec::new(),
            rows: Vec::new(),
        }
    }
}
