use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cli::{EXIT_CANCELLED, EXIT_OK, Output};
use crate::config::{ConfigOverrides, FetcherConfig};
use crate::error::FetchResult;
use crate::export::OutputWriter;
use crate::pipeline::{FetchOutcome, PipelineDriver, RunSummary};
use crate::remote::{ReqwestTransport, RemoteSession};
use crate::report::Strategy;

use super::{ConnectionArgs, OutputFormat};

#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Directory for the CSV files (created if missing)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<std::path::PathBuf>,

    /// Applications processed concurrently
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Only fetch these stages, in this order (repeatable)
    #[arg(long = "stage", value_name = "STAGE")]
    pub stages: Vec<String>,

    /// How violations map onto CSV rows
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Leave components without violations out of the CSV
    #[arg(long)]
    pub skip_clean_components: bool,

    /// Do not write the consolidated CSV
    #[arg(long)]
    pub no_consolidated: bool,

    /// Also keep each raw report as JSON next to its CSV
    #[arg(long)]
    pub keep_raw_json: bool,
}

impl FetchArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            output_dir: self.output_dir.clone(),
            workers: self.workers,
            stages: self.stages.clone(),
            strategy: self.strategy,
            skip_clean_components: self.skip_clean_components.then_some(true),
            consolidated: self.no_consolidated.then_some(false),
            keep_raw_json: self.keep_raw_json.then_some(true),
            ..self.connection.overrides()
        }
    }
}

pub async fn execute(
    args: FetchArgs,
    config_file: Option<&Path>,
    format: OutputFormat,
    output: &Output,
) -> Result<u8> {
    let config = FetcherConfig::load(config_file, &args.overrides())?;
    config.validate()?;

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    // The blocking HTTP client must live and die off the async runtime
    let mut task = tokio::task::spawn_blocking(move || run(&config, worker_cancel));

    let summary = tokio::select! {
        joined = &mut task => joined.context("fetch task failed")??,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, finishing in-flight applications and skipping the rest...");
            cancel.store(true, Ordering::SeqCst);
            task.await.context("fetch task failed")??
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_summary(&summary, output),
    }

    Ok(if summary.cancelled { EXIT_CANCELLED } else { EXIT_OK })
}

/// Authenticate before anything touches the disk, then drive the whole pass
fn run(config: &FetcherConfig, cancel: Arc<AtomicBool>) -> FetchResult<RunSummary> {
    let transport = ReqwestTransport::new(config.request_timeout())?;
    let session = RemoteSession::new(
        config.base_url(),
        config.credentials(),
        config.retry_policy(),
        transport,
    );
    tracing::info!("Connecting to IQ Server at {}", session.base_url());
    session.authenticate()?;

    let writer = OutputWriter::create(&config.output_dir)?;
    PipelineDriver::new(&session, &writer, config.pipeline_settings())
        .with_cancel_flag(cancel)
        .run()
}

fn print_summary(summary: &RunSummary, output: &Output) {
    output.header("Fetch summary");
    output.key_value("Applications", &summary.total.to_string(), false);
    output.key_value("Succeeded", &summary.succeeded.to_string(), summary.succeeded > 0);
    output.key_value("Empty", &summary.empty.to_string(), false);
    output.key_value("Failed", &summary.failed.to_string(), false);
    if summary.skipped > 0 {
        output.key_value("Skipped", &summary.skipped.to_string(), false);
    }
    output.key_value("Rows", &summary.total_rows.to_string(), false);
    output.key_value("Files", &summary.written_files().count().to_string(), false);
    if let Some(path) = &summary.consolidated_file {
        output.key_value("Consolidated", &path.display().to_string(), true);
    }

    if summary.failed > 0 {
        output.blank_line();
        for (app, kind, message) in summary.failures() {
            output.status_indicator(&kind.to_string(), &format!("{} ({}): {message}", app.name, app.public_id), false);
        }
    }
    for app in &summary.applications {
        match &app.outcome {
            FetchOutcome::Success { .. } => {
                output.blank_line();
                output.status_indicator("CSV", &format!("{} ({})", app.name, app.public_id), true);
                for file in &app.files {
                    output.list_item(&file.display().to_string());
                }
            }
            FetchOutcome::Empty { reason } => tracing::debug!("{} ({}): {reason}", app.name, app.public_id),
            _ => {}
        }
    }

    output.blank_line();
    if summary.cancelled {
        output.warning("Run cancelled; the consolidated report was not written");
    } else if summary.failed == 0 {
        output.success("All applications processed");
    } else {
        output.warning(&format!("{} application(s) failed", summary.failed));
    }
}
