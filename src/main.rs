use clap::Parser;
use std::process::ExitCode;

use iqfetch::cli::{self, Cli, Output};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(cli.quiet);
    match cli.run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output.error(&format!("{e:#}"));
            ExitCode::from(cli::exit_code_for(&e))
        }
    }
}
