use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

use crate::cli::{EXIT_OK, Output};
use crate::config::{ConfigOverrides, FetcherConfig};

use super::OutputFormat;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display the merged configuration with secrets masked
    Show,
    /// Check that the merged configuration is usable
    Validate,
}

pub fn execute(
    args: ConfigArgs,
    config_file: Option<&Path>,
    format: OutputFormat,
    output: &Output,
) -> Result<u8> {
    let config = FetcherConfig::load(config_file, &ConfigOverrides::default())?;

    match args.command {
        ConfigCommand::Show => {
            let masked = config.masked();
            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&masked)?,
                OutputFormat::Text => toml::to_string_pretty(&masked)?,
            };
            println!("{}", rendered.trim_end());
        }
        ConfigCommand::Validate => {
            config.validate()?;
            output.success("Configuration is valid");
            output.key_value("Server", config.base_url(), true);
            output.key_value("User", config.credentials().principal(), false);
            output.key_value(
                "Organization",
                config.organization_id.as_deref().unwrap_or("(all)"),
                false,
            );
            output.key_value("Output", &config.output_dir.display().to_string(), false);
            output.key_value("Workers", &config.workers.to_string(), false);
        }
    }

    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_config_renders_as_toml() {
        let config = FetcherConfig {
            server_url: "http://iq:8070".into(),
            username: "admin".into(),
            password: "s3cret".into(),
            ..Default::default()
        };
        let rendered = toml::to_string_pretty(&config.masked()).unwrap();
        assert!(rendered.contains("server_url = \"http://iq:8070\""));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[retry]"));
    }
}
