//! Discovers which scan reports exist for an application.

use serde_json::Value;
use std::collections::HashSet;

use crate::error::FetchError;
use crate::remote::ApiClient;

use super::fields::Fields;
use super::types::{Application, ReportReference};

pub const REPORTS_PATH: &str = "/api/v2/reports/applications";

/// References found for one application, plus anything that went wrong on the way
#[derive(Debug, Default)]
pub struct Located {
    pub references: Vec<ReportReference>,
    pub issues: Vec<FetchError>,
}

impl Located {
    /// The issue that explains an empty result, preferring authentication failures
    pub fn blocking_issue(&self) -> Option<&FetchError> {
        self.issues
            .iter()
            .find(|issue| matches!(issue, FetchError::Auth(_)))
            .or_else(|| self.issues.first())
    }
}

pub struct ReportLocator<'a, C: ApiClient + ?Sized> {
    client: &'a C,
    stages: &'a [String],
}

impl<'a, C: ApiClient + ?Sized> ReportLocator<'a, C> {
    /// `stages` restricts and orders the stages; empty means every stage the server reports
    pub fn new(client: &'a C, stages: &'a [String]) -> Self {
        Self { client, stages }
    }

    /// Never fails: problems are recorded in [`Located::issues`]
    pub fn locate(&self, app: &Application) -> Located {
        let mut located = Located::default();
        let path = format!("{REPORTS_PATH}/{}", urlencoding::encode(&app.id));

        let entries = match self.client.get_json(&path, &[]) {
            Ok(Value::Array(entries)) => entries,
            Ok(Value::Null) => Vec::new(),
            Ok(other) => {
                located.issues.push(FetchError::Permanent(format!(
                    "report listing for {} is not a list (got {})",
                    app.label(),
                    json_type(&other)
                )));
                return located;
            }
            Err(e) => {
                located.issues.push(e);
                return located;
            }
        };

        // The server lists the most recent evaluation first
        let mut candidates: Vec<ReportReference> = Vec::new();
        let mut seen_stages = HashSet::new();
        for entry in &entries {
            let stage = entry.str_field("stage");
            if !self.wants(&stage) || !seen_stages.insert(stage.clone()) {
                continue;
            }
            match report_id_of(entry) {
                Some(report_id) => candidates.push(ReportReference {
                    application_id: app.id.clone(),
                    stage_id: stage,
                    report_id,
                }),
                None => {
                    seen_stages.remove(&stage);
                    located.issues.push(FetchError::Permanent(format!(
                        "report entry for stage '{stage}' of {} has no report id",
                        app.label()
                    )));
                }
            }
        }

        located.references = if self.stages.is_empty() {
            candidates
        } else {
            self.stages
                .iter()
                .filter_map(|stage| candidates.iter().find(|r| &r.stage_id == stage).cloned())
                .collect()
        };

        tracing::debug!(
            "{}: {} report(s) located across stages [{}]",
            app.label(),
            located.references.len(),
            located
                .references
                .iter()
                .map(|r| r.stage_id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        located
    }

    fn wants(&self, stage: &str) -> bool {
        self.stages.is_empty() || self.stages.iter().any(|s| s == stage)
    }
}

/// Report id from `reportDataUrl` (`.../reports/<id>/...`), else `scanId`, else `reportId`
fn report_id_of(entry: &Value) -> Option<String> {
    let from_url = entry.opt_str("reportDataUrl").and_then(|url| {
        url.split("/reports/")
            .nth(1)
            .and_then(|rest| rest.split(['/', '?']).next())
            .filter(|id| !id.is_empty())
    });

    from_url
        .or_else(|| entry.opt_str("scanId"))
        .or_else(|| entry.opt_str("reportId"))
        .map(str::to_string)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
