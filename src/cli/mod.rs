//! Command-line interface for iqfetch
//!
//! Argument parsing with clap, one module per subcommand under `commands`,
//! and the mapping from run-level errors to process exit codes.

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;

use crate::error::{ErrorKind, FetchError};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_CANCELLED: u8 = 130;

/// Exit code for an error that ended the invocation
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<FetchError>().map(FetchError::kind) {
        Some(ErrorKind::Config) => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        let config = anyhow::Error::new(FetchError::Config("server_url is required".into()));
        assert_eq!(exit_code_for(&config), EXIT_CONFIG);

        let auth = anyhow::Error::new(FetchError::Auth("HTTP 401".into()));
        assert_eq!(exit_code_for(&auth), EXIT_FAILURE);

        let other = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&other), EXIT_FAILURE);
    }

    #[test]
    fn test_exit_code_survives_context() {
        let wrapped: anyhow::Result<()> =
            Err(FetchError::Config("bad".into())).context("loading configuration");
        assert_eq!(exit_code_for(&wrapped.unwrap_err()), EXIT_CONFIG);
    }
}
