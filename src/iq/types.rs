use serde::Serialize;
use serde_json::Value;

use super::fields::Fields;

/// An application tracked by the IQ server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Internal identifier, the identity key
    pub id: String,
    pub public_id: String,
    pub name: String,
    pub organization_id: String,
}

impl Application {
    /// Read an application entry; entries without an `id` are unusable
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.opt_str("id")?.to_string();
        Some(Self {
            id,
            public_id: value.str_field("publicId"),
            name: value.str_field("name"),
            organization_id: value.str_field("organizationId"),
        })
    }

    /// Best human-readable label for logs
    pub fn label(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.public_id.is_empty() {
            &self.public_id
        } else {
            &self.id
        }
    }
}

/// An administrative grouping of applications
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

impl Organization {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            id: value.opt_str("id")?.to_string(),
            name: value.str_field("name"),
        })
    }
}

/// A scan report located for one application at one evaluation stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportReference {
    pub application_id: String,
    pub stage_id: String,
    pub report_id: String,
}

/// The raw policy report payload, kept untyped
#[derive(Debug, Clone)]
pub struct RawReport {
    pub reference: ReportReference,
    pub payload: Value,
}

impl RawReport {
    pub fn components(&self) -> &[Value] {
        self.payload.list_field("components")
    }

    /// A valid report with no components
    pub fn is_empty(&self) -> bool {
        self.components().is_empty()
    }
}
