use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ErrorKind, FetchError, FetchResult};
use crate::export::OutputWriter;
use crate::iq::{Application, Organization, RawReportRetriever, ReportLocator, ResourceResolver};
use crate::parallel::{ParallelConfig, ParallelProcessor};
use crate::remote::ApiClient;
use crate::report::{Consolidator, Strategy};

use super::outcome::{AppState, ApplicationResult, FetchOutcome};
use super::summary::RunSummary;

const PREVIEW_LIMIT: usize = 5;

/// Knobs for one pass; fixed for the whole run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub organization_id: Option<String>,
    /// Stages to fetch, in order; empty means every stage the server reports
    pub stages: Vec<String>,
    pub strategy: Strategy,
    pub skip_clean_components: bool,
    pub consolidated: bool,
    pub keep_raw_json: bool,
    /// 1 processes applications one at a time; 0 sizes the pool from the CPU count
    pub workers: usize,
    pub page_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            organization_id: None,
            stages: Vec::new(),
            strategy: Strategy::default(),
            skip_clean_components: false,
            consolidated: true,
            keep_raw_json: false,
            workers: 1,
            page_size: 500,
        }
    }
}

/// Drives locate → retrieve → consolidate → write for every application
pub struct PipelineDriver<'a, C: ApiClient + ?Sized> {
    client: &'a C,
    writer: &'a OutputWriter,
    settings: PipelineSettings,
    cancel: Arc<AtomicBool>,
    auth_abort: AtomicBool,
}

impl<'a, C: ApiClient + ?Sized> PipelineDriver<'a, C> {
    pub fn new(client: &'a C, writer: &'a OutputWriter, settings: PipelineSettings) -> Self {
        Self {
            client,
            writer,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
            auth_abort: AtomicBool::new(false),
        }
    }

    /// Share a flag that, once set, stops the run after the in-flight applications
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Organizations and the (filtered) application list; both are run-level preconditions
    pub fn resolve(&self) -> FetchResult<(Vec<Organization>, Vec<Application>)> {
        let resolver = ResourceResolver::new(self.client).with_page_size(self.settings.page_size);

        let organizations = resolver.list_organizations().map_err(FetchError::into_resolution)?;
        if let Some(org) = &self.settings.organization_id {
            if !organizations.iter().any(|o| &o.id == org) {
                tracing::warn!("Organization {org} is not known to the server");
            }
        }

        tracing::info!("Fetching applications from IQ Server...");
        let applications = resolver
            .list_applications(self.settings.organization_id.as_deref())
            .map_err(FetchError::into_resolution)?;
        Ok((organizations, applications))
    }

    /// One batch pass over every application
    pub fn run(&self) -> FetchResult<RunSummary> {
        let (organizations, applications) = self.resolve()?;
        log_preview(&applications);
        self.writer.register(&applications);

        let names: HashMap<String, String> = organizations
            .into_iter()
            .map(|org| (org.id, org.name))
            .collect();
        let consolidator = Consolidator::new(self.settings.strategy, self.settings.skip_clean_components)
            .with_organization_names(names);

        let total = applications.len();
        let results: Vec<ApplicationResult> = if self.settings.workers == 1 {
            applications
                .into_iter()
                .enumerate()
                .map(|(index, app)| self.process_slot(index, total, app, &consolidator))
                .collect()
        } else {
            ParallelProcessor::new(ParallelConfig::with_max_threads(self.settings.workers))
                .process(applications, |index, app| {
                    self.process_slot(index, total, app, &consolidator)
                })
                .map_err(|e| FetchError::Worker(e.to_string()))?
        };

        if self.auth_abort.load(Ordering::SeqCst) {
            let culprit = results
                .iter()
                .find(|r| r.outcome.error_kind() == Some(ErrorKind::Auth))
                .map(|r| r.application.label().to_string())
                .unwrap_or_default();
            return Err(FetchError::Auth(format!(
                "credentials rejected while processing {culprit}, run aborted"
            )));
        }

        let mut summary = RunSummary::from_results(&results);
        summary.cancelled = self.cancel.load(Ordering::SeqCst);

        if self.settings.consolidated && !summary.cancelled {
            let rows: Vec<_> = results.iter().flat_map(|r| r.rows.iter().cloned()).collect();
            match self.writer.write_consolidated(&rows) {
                Ok(path) => {
                    tracing::info!("Consolidated {} row(s) into {}", rows.len(), path.display());
                    summary.consolidated_file = Some(path);
                }
                Err(e) => tracing::error!("Could not write consolidated report: {e}"),
            }
        }

        Ok(summary)
    }

    fn process_slot(
        &self,
        index: usize,
        total: usize,
        app: Application,
        consolidator: &Consolidator,
    ) -> ApplicationResult {
        if self.cancel.load(Ordering::SeqCst) {
            return ApplicationResult::new(app, skipped("run cancelled"));
        }
        if self.auth_abort.load(Ordering::SeqCst) {
            return ApplicationResult::new(app, skipped("run aborted after authentication failure"));
        }

        let position = format!("[{}/{}]", index + 1, total);
        tracing::info!("{position} Processing {}...", app.label());

        let result = self.process(app, consolidator);
        match &result.outcome {
            FetchOutcome::Success { rows } => {
                tracing::info!("{position} {}: {rows} row(s)", result.application.label())
            }
            FetchOutcome::Empty { reason } => {
                tracing::warn!("{position} {}: {reason}", result.application.label())
            }
            FetchOutcome::Failed { kind, message } => {
                if *kind == ErrorKind::Auth {
                    self.auth_abort.store(true, Ordering::SeqCst);
                }
                tracing::error!("{position} {} failed: {kind}: {message}", result.application.label())
            }
            FetchOutcome::Skipped { reason } => {
                tracing::warn!("{position} {}: {reason}", result.application.label())
            }
        }
        result
    }

    /// Per-application state machine; every error stops here
    fn process(&self, application: Application, consolidator: &Consolidator) -> ApplicationResult {
        let mut state = AppState::Pending;
        let mut result = ApplicationResult::new(application.clone(), skipped("not processed"));
        let app = &application;

        transition(app, &mut state, AppState::Locating);
        let located = ReportLocator::new(self.client, &self.settings.stages).locate(app);
        if located.references.is_empty() {
            result.outcome = match located.blocking_issue() {
                Some(issue) => {
                    let outcome = FetchOutcome::failed(issue, state);
                    transition(app, &mut state, AppState::Failed);
                    outcome
                }
                None => {
                    transition(app, &mut state, AppState::Done);
                    FetchOutcome::Empty {
                        reason: "no reports found".to_string(),
                    }
                }
            };
            return result;
        }
        for issue in &located.issues {
            tracing::warn!("{}: {issue}", app.label());
        }

        let retriever = RawReportRetriever::new(self.client);
        for reference in &located.references {
            if self.cancel.load(Ordering::SeqCst) {
                result.rows.clear();
                result.outcome = skipped("cancelled while in flight");
                return result;
            }

            transition(app, &mut state, AppState::Retrieving);
            let raw = match retriever.fetch(app, reference) {
                Ok(raw) => raw,
                Err(e) => return fail(result, &e, &mut state),
            };
            if raw.is_empty() {
                tracing::debug!("{}: {} report {} has no components", app.label(), reference.stage_id, reference.report_id);
            }

            transition(app, &mut state, AppState::Consolidating);
            let rows = consolidator.consolidate(app, reference, &raw.payload);

            transition(app, &mut state, AppState::Writing);
            if self.settings.keep_raw_json {
                match self.writer.write_raw_json(app, reference, &raw.payload) {
                    Ok(path) => result.files.push(path),
                    Err(e) => return fail(result, &e, &mut state),
                }
            }
            match self.writer.write(app, reference, &rows) {
                Ok(path) => result.files.push(path),
                Err(e) => return fail(result, &e, &mut state),
            }
            result.rows.extend(rows);
        }

        transition(app, &mut state, AppState::Done);
        result.outcome = if result.rows.is_empty() {
            FetchOutcome::Empty {
                reason: "reports produced no rows".to_string(),
            }
        } else {
            FetchOutcome::Success {
                rows: result.rows.len(),
            }
        };
        result
    }
}

fn transition(app: &Application, state: &mut AppState, next: AppState) {
    tracing::trace!("{}: {state} -> {next}", app.label());
    *state = next;
}

fn fail(mut result: ApplicationResult, error: &FetchError, state: &mut AppState) -> ApplicationResult {
    result.outcome = FetchOutcome::failed(error, *state);
    result.rows.clear();
    transition(&result.application, state, AppState::Failed);
    result
}

fn skipped(reason: &str) -> FetchOutcome {
    FetchOutcome::Skipped {
        reason: reason.to_string(),
    }
}

fn log_preview(applications: &[Application]) {
    tracing::info!("Found {} applications", applications.len());
    for (i, app) in applications.iter().take(PREVIEW_LIMIT).enumerate() {
        tracing::info!("   {}. {} ({})", i + 1, app.name, app.public_id);
    }
    if applications.len() > PREVIEW_LIMIT {
        tracing::info!("   ... and {} more", applications.len() - PREVIEW_LIMIT);
    }
}
