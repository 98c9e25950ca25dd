use serde::Serialize;

/// Column headers, in output order
///
/// This is the stable CSV contract: every file of every run carries exactly
/// these columns, whatever the raw payloads contained.
pub const COLUMNS: [&str; 21] = [
    "No.",
    "Application",
    "Application Name",
    "Application ID",
    "Organization",
    "Organization Name",
    "Stage",
    "Report ID",
    "Report Time",
    "Critical (7-10)",
    "Severe (4-6)",
    "Moderate (1-3)",
    "Component",
    "Package URL",
    "Policy",
    "Threat",
    "Policy/Action",
    "Constraint Name",
    "Condition",
    "CVE",
    "Waived",
];

/// One CSV row: a component (or one of its violations) with its report context
///
/// Field order must match [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidatedRow {
    #[serde(rename = "No.")]
    pub number: usize,
    #[serde(rename = "Application")]
    pub application: String,
    #[serde(rename = "Application Name")]
    pub application_name: String,
    #[serde(rename = "Application ID")]
    pub application_id: String,
    #[serde(rename = "Organization")]
    pub organization: String,
    #[serde(rename = "Organization Name")]
    pub organization_name: String,
    #[serde(rename = "Stage")]
    pub stage: String,
    #[serde(rename = "Report ID")]
    pub report_id: String,
    #[serde(rename = "Report Time")]
    pub report_time: String,
    #[serde(rename = "Critical (7-10)")]
    pub critical: usize,
    #[serde(rename = "Severe (4-6)")]
    pub severe: usize,
    #[serde(rename = "Moderate (1-3)")]
    pub moderate: usize,
    #[serde(rename = "Component")]
    pub component: String,
    #[serde(rename = "Package URL")]
    pub package_url: String,
    #[serde(rename = "Policy")]
    pub policy: String,
    #[serde(rename = "Threat")]
    pub threat: Option<i64>,
    #[serde(rename = "Policy/Action")]
    pub policy_action: String,
    #[serde(rename = "Constraint Name")]
    pub constraint_name: String,
    #[serde(rename = "Condition")]
    pub condition: String,
    #[serde(rename = "CVE")]
    pub cve: String,
    #[serde(rename = "Waived")]
    pub waived: Option<bool>,
}

/// Threat level buckets used by IQ policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Severe,
    Moderate,
    Low,
}

impl Severity {
    pub fn from_threat(level: i64) -> Self {
        match level {
            7.. => Severity::Critical,
            4..=6 => Severity::Severe,
            1..=3 => Severity::Moderate,
            _ => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "Critical"),
            Severity::Severe => write!(f, "Severe"),
            Severity::Moderate => write!(f, "Moderate"),
            Severity::Low => write!(f, "Low"),
        }
    }
}

/// Violation counts per severity across one report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub severe: usize,
    pub moderate: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, level: i64) {
        match Severity::from_threat(level) {
            Severity::Critical => self.critical += 1,
            Severity::Severe => self.severe += 1,
            Severity::Moderate => self.moderate += 1,
            Severity::Low => {}
        }
    }
}
