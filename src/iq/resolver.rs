//! Enumerates organizations and applications.

use crate::error::FetchResult;
use crate::remote::ApiClient;

use super::fields::Fields;
use super::types::{Application, Organization};

pub const ORGANIZATIONS_PATH: &str = "/api/v2/organizations";
pub const APPLICATIONS_PATH: &str = "/api/v2/applications";

const DEFAULT_PAGE_SIZE: usize = 500;

pub struct ResourceResolver<'a, C: ApiClient + ?Sized> {
    client: &'a C,
    page_size: usize,
}

impl<'a, C: ApiClient + ?Sized> ResourceResolver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn list_organizations(&self) -> FetchResult<Vec<Organization>> {
        let body = self.client.get_json(ORGANIZATIONS_PATH, &[])?;
        Ok(body
            .list_field("organizations")
            .iter()
            .filter_map(Organization::from_value)
            .collect())
    }

    /// List applications in server order, concatenating every page
    ///
    /// With a filter, only applications whose `organizationId` matches are
    /// returned, even if the server mixes in other organizations.
    pub fn list_applications(&self, organization: Option<&str>) -> FetchResult<Vec<Application>> {
        let path = match organization {
            Some(org) => format!("{APPLICATIONS_PATH}/organization/{}", urlencoding::encode(org)),
            None => APPLICATIONS_PATH.to_string(),
        };
        let page_size = self.page_size.to_string();

        let mut applications = Vec::new();
        let mut page: u64 = 1;
        loop {
            let page_param = page.to_string();
            let body = self.client.get_json(
                &path,
                &[("page", page_param.as_str()), ("pageSize", page_size.as_str())],
            )?;

            let entries = body.list_field("applications");
            if entries.is_empty() {
                break;
            }

            for entry in entries {
                match Application::from_value(entry) {
                    Some(app) if organization.is_none_or(|org| app.organization_id == org) => {
                        applications.push(app)
                    }
                    Some(app) => tracing::trace!(
                        "Skipping {} from organization {}",
                        app.label(),
                        app.organization_id
                    ),
                    None => tracing::warn!("Skipping application entry without an id: {entry}"),
                }
            }

            if !has_next_page(&body, page) {
                break;
            }
            page += 1;
        }

        Ok(applications)
    }
}

/// Servers either report `pageCount` or a `hasNextPage` flag; neither means one page
fn has_next_page(body: &serde_json::Value, page: u64) -> bool {
    match body.get("pageCount").and_then(serde_json::Value::as_u64) {
        Some(count) => page < count,
        None => body.bool_field("hasNextPage"),
    }
}
