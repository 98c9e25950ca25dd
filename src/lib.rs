//! # iqfetch - Sonatype IQ Server report fetcher
//!
//! Walks every application visible to an IQ Server account, downloads the
//! latest policy report per stage and flattens it into CSV.
//!
//! ## Layout
//!
//! - [`remote`]: authenticated HTTP session with retry and backoff
//! - [`iq`]: applications, report references and raw reports
//! - [`report`]: turning a raw report into rows
//! - [`export`]: CSV (and raw JSON) files on disk
//! - [`pipeline`]: the batch pass, isolated per application
//! - [`parallel`]: bounded worker pool used by the pipeline
//! - [`config`] and [`cli`]: layered settings and the `iqfetch` binary
//!
//! ## Quick Start
//!
//! ```bash
//! export IQ_SERVER_URL=http://localhost:8070 IQ_USERNAME=admin IQ_PASSWORD=admin123
//! iqfetch fetch --output-dir raw_reports
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod iq;
pub mod parallel;
pub mod pipeline;
pub mod remote;
pub mod report;

pub use cli::{Cli, Output};
pub use config::FetcherConfig;
pub use error::{ErrorKind, FetchError, FetchResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
