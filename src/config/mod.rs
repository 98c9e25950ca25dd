//! Configuration for iqfetch
//!
//! Layers, lowest first: built-in defaults, a TOML file, `.env`, the
//! conventional `IQ_*` environment variables, `IQFETCH_*` variables and
//! finally command-line flags. See [`FetcherConfig::load`].

pub mod core;
pub mod overrides;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::pipeline::PipelineSettings;
use crate::remote::{Credentials, RetryPolicy};
use crate::report::Strategy;

pub use overrides::{ConfigOverrides, RetryOverrides};

const MASK: &str = "********";

/// Fully resolved settings for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Used instead of the password when set
    pub token: String,
    pub organization_id: Option<String>,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub page_size: usize,
    pub stages: Vec<String>,
    pub strategy: Strategy,
    pub skip_clean_components: bool,
    pub consolidated: bool,
    pub keep_raw_json: bool,
    pub request_timeout_secs: u64,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            username: String::new(),
            password: String::new(),
            token: String::new(),
            organization_id: None,
            output_dir: PathBuf::from("raw_reports"),
            workers: 1,
            page_size: 500,
            stages: Vec::new(),
            strategy: Strategy::default(),
            skip_clean_components: false,
            consolidated: true,
            keep_raw_json: false,
            request_timeout_secs: 30,
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl FetcherConfig {
    /// Reject anything that would only fail later, before touching the network
    pub fn validate(&self) -> FetchResult<()> {
        let server_url = self.server_url.trim();
        if server_url.is_empty() {
            return Err(FetchError::Config(
                "server_url is required (set IQ_SERVER_URL or --server-url)".into(),
            ));
        }
        let parsed = url::Url::parse(server_url)
            .map_err(|e| FetchError::Config(format!("server_url '{server_url}' is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::Config(format!(
                "server_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if self.username.trim().is_empty() {
            return Err(FetchError::Config(
                "username is required (set IQ_USERNAME or --username)".into(),
            ));
        }
        if self.password.trim().is_empty() && self.token.trim().is_empty() {
            return Err(FetchError::Config(
                "a password or token is required (set IQ_PASSWORD or IQ_TOKEN)".into(),
            ));
        }

        if self.organization_id.as_deref().is_some_and(|org| org.trim().is_empty()) {
            return Err(FetchError::Config("organization_id must not be blank".into()));
        }
        if self.page_size == 0 {
            return Err(FetchError::Config("page_size must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(FetchError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(FetchError::Config("request_timeout_secs must be at least 1".into()));
        }
        if self.stages.iter().any(|s| s.trim().is_empty()) {
            return Err(FetchError::Config("stages must not contain blank names".into()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.server_url.trim().trim_end_matches('/')
    }

    /// A token wins over a password when both are configured
    pub fn credentials(&self) -> Credentials {
        if self.token.trim().is_empty() {
            Credentials::Basic {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        } else {
            Credentials::Bearer {
                token: self.token.clone(),
            }
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            organization_id: self.organization_id.clone(),
            stages: self.stages.clone(),
            strategy: self.strategy,
            skip_clean_components: self.skip_clean_components,
            consolidated: self.consolidated,
            keep_raw_json: self.keep_raw_json,
            workers: self.workers,
            page_size: self.page_size,
        }
    }

    /// Copy that is safe to print
    pub fn masked(&self) -> Self {
        let mask = |secret: &str| {
            if secret.is_empty() { String::new() } else { MASK.to_string() }
        };
        Self {
            password: mask(&self.password),
            token: mask(&self.token),
            ..self.clone()
        }
    }
}
