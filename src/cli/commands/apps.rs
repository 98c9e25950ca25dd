use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::cli::{EXIT_OK, Output};
use crate::config::FetcherConfig;
use crate::error::{FetchError, FetchResult};
use crate::iq::{Application, ResourceResolver};
use crate::remote::{ReqwestTransport, RemoteSession};

use super::{ConnectionArgs, OutputFormat};

#[derive(Args, Debug, Clone, Default)]
pub struct AppsArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListedApplication {
    #[serde(flatten)]
    application: Application,
    organization_name: String,
}

pub async fn execute(
    args: AppsArgs,
    config_file: Option<&Path>,
    format: OutputFormat,
    output: &Output,
) -> Result<u8> {
    let config = FetcherConfig::load(config_file, &args.connection.overrides())?;
    config.validate()?;

    let listed = tokio::task::spawn_blocking(move || list(&config))
        .await
        .context("listing task failed")??;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listed)?),
        OutputFormat::Text => {
            output.header(&format!("{} application(s)", listed.len()));
            let widths = [
                column_width(listed.iter().map(|l| l.application.public_id.as_str()), "PUBLIC ID"),
                column_width(listed.iter().map(|l| l.application.name.as_str()), "NAME"),
            ];
            output.table_row(&["PUBLIC ID", "NAME", "ORGANIZATION"], &widths);
            for entry in &listed {
                let organization = if entry.organization_name.is_empty() {
                    entry.application.organization_id.as_str()
                } else {
                    entry.organization_name.as_str()
                };
                output.table_row(
                    &[
                        entry.application.public_id.as_str(),
                        entry.application.name.as_str(),
                        organization,
                    ],
                    &widths,
                );
            }
        }
    }
    Ok(EXIT_OK)
}

fn list(config: &FetcherConfig) -> FetchResult<Vec<ListedApplication>> {
    let session = RemoteSession::new(
        config.base_url(),
        config.credentials(),
        config.retry_policy(),
        ReqwestTransport::new(config.request_timeout())?,
    );
    session.authenticate()?;

    let resolver = ResourceResolver::new(&session).with_page_size(config.page_size);
    let organizations: HashMap<String, String> = resolver
        .list_organizations()
        .map_err(FetchError::into_resolution)?
        .into_iter()
        .map(|org| (org.id, org.name))
        .collect();
    let applications = resolver
        .list_applications(config.organization_id.as_deref())
        .map_err(FetchError::into_resolution)?;

    Ok(applications
        .into_iter()
        .map(|application| ListedApplication {
            organization_name: organizations
                .get(&application.organization_id)
                .cloned()
                .unwrap_or_default(),
            application,
        })
        .collect())
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values.map(str::len).chain(std::iter::once(header.len())).max().unwrap_or(0)
}
