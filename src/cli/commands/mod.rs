use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{ConfigOverrides, RetryOverrides};

use super::Output;

pub mod apps;
pub mod config;
pub mod fetch;

#[derive(Parser)]
#[command(
    name = "iqfetch",
    version = crate::VERSION,
    about = "Fetch Sonatype IQ Server policy reports and consolidate them into CSV",
    long_about = "iqfetch walks every application visible to the configured IQ Server account, \
                  downloads the latest policy report per stage and writes one CSV per report \
                  plus a consolidated CSV across all applications."
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Use custom configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Result format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch reports for every application (default)
    Fetch(fetch::FetchArgs),
    /// List the applications a fetch would process
    Apps(apps::AppsArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Where and how to reach the server; shared by every networked command
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// IQ Server base URL, e.g. http://localhost:8070
    #[arg(long, value_name = "URL")]
    pub server_url: Option<String>,

    /// IQ Server username
    #[arg(long)]
    pub username: Option<String>,

    /// Restrict to one organization
    #[arg(long, value_name = "ID")]
    pub organization_id: Option<String>,

    /// Attempts per request, including the first
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl ConnectionArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server_url: self.server_url.clone(),
            username: self.username.clone(),
            organization_id: self.organization_id.clone(),
            request_timeout_secs: self.timeout,
            retry: RetryOverrides {
                max_attempts: self.max_attempts,
            },
            ..Default::default()
        }
    }
}

impl Cli {
    /// Run the selected command; `Ok` carries the process exit code
    pub async fn run(self) -> Result<u8> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.quiet);
        let config_file = self.config.as_deref();

        match self.command {
            Some(Commands::Fetch(args)) => fetch::execute(args, config_file, self.format, &output).await,
            Some(Commands::Apps(args)) => apps::execute(args, config_file, self.format, &output).await,
            Some(Commands::Config(args)) => config::execute(args, config_file, self.format, &output),
            None => {
                fetch::execute(fetch::FetchArgs::default(), config_file, self.format, &output).await
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            return tracing_subscriber::EnvFilter::new("warn");
        }
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("info"),
            1 => tracing_subscriber::EnvFilter::new("debug,hyper=info,hyper_util=info,reqwest=info"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
