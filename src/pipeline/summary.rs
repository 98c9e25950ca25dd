use serde::Serialize;
use std::path::PathBuf;

use crate::error::ErrorKind;

use super::outcome::{ApplicationResult, FetchOutcome};

/// Per-application line of the end-of-run summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub public_id: String,
    pub name: String,
    pub outcome: FetchOutcome,
    pub files: Vec<PathBuf>,
}

/// The one piece of cross-application state, held for the duration of a run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub empty: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_rows: usize,
    pub cancelled: bool,
    pub consolidated_file: Option<PathBuf>,
    pub applications: Vec<ApplicationSummary>,
}

impl RunSummary {
    /// Counts are order-independent; the application list keeps input order
    pub fn from_results(results: &[ApplicationResult]) -> Self {
        let mut summary = RunSummary {
            total: results.len(),
            ..Default::default()
        };

        for result in results {
            match &result.outcome {
                FetchOutcome::Success { rows } => {
                    summary.succeeded += 1;
                    summary.total_rows += rows;
                }
                FetchOutcome::Empty { .. } => summary.empty += 1,
                FetchOutcome::Failed { .. } => summary.failed += 1,
                FetchOutcome::Skipped { .. } => summary.skipped += 1,
            }
            summary.applications.push(ApplicationSummary {
                public_id: result.application.public_id.clone(),
                name: result.application.name.clone(),
                outcome: result.outcome.clone(),
                files: result.files.clone(),
            });
        }
        summary
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ApplicationSummary, ErrorKind, &str)> {
        self.applications.iter().filter_map(|app| match &app.outcome {
            FetchOutcome::Failed { kind, message } => Some((app, *kind, message.as_str())),
            _ => None,
        })
    }

    pub fn written_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.applications.iter().flat_map(|app| app.files.iter())
    }
}
