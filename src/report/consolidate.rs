//! Normalizes raw policy reports into [`ConsolidatedRow`]s.

use clap::ValueEnum;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::iq::{Application, Fields, ReportReference};

use super::row::{ConsolidatedRow, Severity, SeverityCounts};

lazy_static! {
    static ref CVE_PATTERN: Regex = Regex::new(r"CVE-\d{4}-\d+").expect("valid CVE regex");
}

const JOIN: &str = " | ";

/// How a component's violation list maps onto rows
///
/// Chosen once per run and applied to every application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One row per violation
    #[default]
    Fanout,
    /// One row per component, violation fields joined
    Flatten,
}

/// What one violation contributes to a row
#[derive(Debug, Clone, Default)]
struct ViolationView {
    policy: String,
    threat: i64,
    action: String,
    constraint_names: Vec<String>,
    conditions: Vec<String>,
    cves: Vec<String>,
    waived: bool,
}

impl ViolationView {
    fn read(violation: &Value) -> Self {
        let threat = violation.int_field("policyThreatLevel");
        let mut view = ViolationView {
            policy: violation.str_field("policyName"),
            threat,
            action: policy_action(&violation.str_field("policyThreatCategory"), threat),
            waived: violation.bool_field("waived"),
            ..Default::default()
        };

        for constraint in violation.list_field("constraints") {
            push_unique(&mut view.constraint_names, constraint.str_field("constraintName"));
            for condition in constraint.list_field("conditions") {
                let summary = condition.str_field("conditionSummary");
                let reason = condition.str_field("conditionReason");
                for cve in CVE_PATTERN.find_iter(&format!("{summary} {reason}")) {
                    push_unique(&mut view.cves, cve.as_str().to_string());
                }
                let text = if reason.is_empty() { summary } else { reason };
                push_unique(&mut view.conditions, text);
            }
        }
        view
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Fixed labels for security violations; other categories keep their text
/// and gain the severity as a suffix
pub fn policy_action(category: &str, threat: i64) -> String {
    if category.eq_ignore_ascii_case("SECURITY") {
        return match threat {
            t if t >= 7 => "Security-Critical",
            t if t >= 4 => "Security-CVSS score than or equals 7",
            _ => "Security-Moderate",
        }
        .to_string();
    }

    let severity = Severity::from_threat(threat);
    if category.is_empty() {
        severity.to_string()
    } else {
        format!("{category}-{severity}")
    }
}

pub struct Consolidator {
    strategy: Strategy,
    skip_clean_components: bool,
    organization_names: HashMap<String, String>,
}

impl Consolidator {
    pub fn new(strategy: Strategy, skip_clean_components: bool) -> Self {
        Self {
            strategy,
            skip_clean_components,
            organization_names: HashMap::new(),
        }
    }

    /// Organization id → display name, used for the `Organization Name` column
    pub fn with_organization_names(mut self, names: HashMap<String, String>) -> Self {
        self.organization_names = names;
        self
    }

    /// Rows for one report, in the payload's component order, numbered from 1
    pub fn consolidate(
        &self,
        app: &Application,
        reference: &ReportReference,
        payload: &Value,
    ) -> Vec<ConsolidatedRow> {
        let components = payload.list_field("components");

        let mut counts = SeverityCounts::default();
        for component in components {
            for violation in component.list_field("violations") {
                counts.record(violation.int_field("policyThreatLevel"));
            }
        }

        let base = ConsolidatedRow {
            number: 0,
            application: app.public_id.clone(),
            application_name: app.name.clone(),
            application_id: app.id.clone(),
            organization: app.organization_id.clone(),
            organization_name: self
                .organization_names
                .get(&app.organization_id)
                .cloned()
                .unwrap_or_default(),
            stage: reference.stage_id.clone(),
            report_id: reference.report_id.clone(),
            report_time: payload.str_field("reportTime"),
            critical: counts.critical,
            severe: counts.severe,
            moderate: counts.moderate,
            component: String::new(),
            package_url: String::new(),
            policy: String::new(),
            threat: None,
            policy_action: String::new(),
            constraint_name: String::new(),
            condition: String::new(),
            cve: String::new(),
            waived: None,
        };

        let mut rows = Vec::new();
        for component in components {
            let violations: Vec<ViolationView> = component
                .list_field("violations")
                .iter()
                .map(ViolationView::read)
                .collect();
            if violations.is_empty() && self.skip_clean_components {
                continue;
            }

            let component_row = ConsolidatedRow {
                component: component.str_field("displayName"),
                package_url: component.str_field("packageUrl"),
                ..base.clone()
            };

            match (self.strategy, violations.as_slice()) {
                (_, []) => rows.push(component_row),
                (Strategy::Fanout, views) => {
                    rows.extend(views.iter().map(|v| with_violation(&component_row, v)))
                }
                (Strategy::Flatten, views) => rows.push(flattened(&component_row, views)),
            }
        }

        for (index, row) in rows.iter_mut().enumerate() {
            row.number = index + 1;
        }
        rows
    }
}

fn with_violation(row: &ConsolidatedRow, view: &ViolationView) -> ConsolidatedRow {
    ConsolidatedRow {
        policy: view.policy.clone(),
        threat: Some(view.threat),
        policy_action: view.action.clone(),
        constraint_name: view.constraint_names.join(JOIN),
        condition: view.conditions.join(JOIN),
        cve: view.cves.join(", "),
        waived: Some(view.waived),
        ..row.clone()
    }
}

fn flattened(row: &ConsolidatedRow, views: &[ViolationView]) -> ConsolidatedRow {
    let mut constraint_names = Vec::new();
    let mut conditions = Vec::new();
    let mut cves = Vec::new();
    for view in views {
        for name in &view.constraint_names {
            push_unique(&mut constraint_names, name.clone());
        }
        for condition in &view.conditions {
            push_unique(&mut conditions, condition.clone());
        }
        for cve in &view.cves {
            push_unique(&mut cves, cve.clone());
        }
    }

    ConsolidatedRow {
        policy: views.iter().map(|v| v.policy.as_str()).collect::<Vec<_>>().join(JOIN),
        threat: views.iter().map(|v| v.threat).max(),
        policy_action: views.iter().map(|v| v.action.as_str()).collect::<Vec<_>>().join(JOIN),
        constraint_name: constraint_names.join(JOIN),
        condition: conditions.join(JOIN),
        cve: cves.join(", "),
        waived: Some(views.iter().all(|v| v.waived)),
        ..row.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app() -> Application {
        Application {
            id: "a-1".into(),
            public_id: "web-portal".into(),
            name: "Web Portal".into(),
            organization_id: "org-42".into(),
        }
    }

    fn reference() -> ReportReference {
        ReportReference {
            application_id: "a-1".into(),
            stage_id: "build".into(),
            report_id: "r-100".into(),
        }
    }

    fn payload() -> Value {
        json!({
            "reportTime": 1700000000000u64,
            "components": [
                {
                    "displayName": "jackson-databind 2.9.8",
                    "packageUrl": "pkg:maven/com.fasterxml.jackson.core/jackson-databind@2.9.8",
                    "violations": [
                        {
                            "policyName": "Security-Critical",
                            "policyThreatCategory": "SECURITY",
                            "policyThreatLevel": 9,
                            "constraints": [{
                                "constraintName": "Critical risk CVSS score",
                                "conditions": [
                                    {"conditionSummary": "Security Vulnerability Severity >= 9",
                                     "conditionReason": "Found security vulnerability CVE-2019-12384 with severity 9.8."},
                                    {"conditionSummary": "Security Vulnerability Severity >= 9",
                                     "conditionReason": "Found security vulnerability CVE-2019-14379 with severity 9.8."}
                                ]
                            }]
                        },
                        {
                            "policyName": "License-Banned",
                            "policyThreatCategory": "license",
                            "policyThreatLevel": "5",
                            "waived": true,
                            "constraints": [{
                                "constraintName": "Banned license",
                                "conditions": [{"conditionSummary": "License is GPL-3.0"}]
                            }]
                        }
                    ]
                },
                {
                    "packageUrl": "pkg:npm/left-pad@1.3.0",
                    "violations": [
                        {"policyName": "Architecture-Quality", "policyThreatLevel": 2}
                    ]
                },
                {
                    "displayName": "clean-lib 1.0.0"
                }
            ]
        })
    }

    #[test]
    fn test_fanout_one_row_per_violation_in_payload_order() {
        let rows = Consolidator::new(Strategy::Fanout, false).consolidate(&app(), &reference(), &payload());
        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.number, r.component.as_str(), r.policy.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "jackson-databind 2.9.8", "Security-Critical"),
                (2, "jackson-databind 2.9.8", "License-Banned"),
                (3, "", "Architecture-Quality"),
                (4, "clean-lib 1.0.0", ""),
            ]
        );
    }

    #[test]
    fn test_row_carries_report_context_and_counts() {
        let rows = Consolidator::new(Strategy::Fanout, false).consolidate(&app(), &reference(), &payload());
        let first = &rows[0];
        assert_eq!(first.application, "web-portal");
        assert_eq!(first.application_id, "a-1");
        assert_eq!(first.organization, "org-42");
        assert_eq!(first.stage, "build");
        assert_eq!(first.report_id, "r-100");
        assert_eq!(first.report_time, "1700000000000");
        assert_eq!((first.critical, first.severe, first.moderate), (1, 1, 1));
        assert!(rows.iter().all(|r| r.critical == 1));
    }

    #[test]
    fn test_violation_details() {
        let rows = Consolidator::new(Strategy::Fanout, false).consolidate(&app(), &reference(), &payload());
        let security = &rows[0];
        assert_eq!(security.threat, Some(9));
        assert_eq!(security.policy_action, "Security-Critical");
        assert_eq!(security.constraint_name, "Critical risk CVSS score");
        assert_eq!(security.cve, "CVE-2019-12384, CVE-2019-14379");
        assert!(security.condition.contains(" | "));
        assert_eq!(security.waived, Some(false));

        let license = &rows[1];
        assert_eq!(license.threat, Some(5));
        assert_eq!(license.policy_action, "license-Severe");
        assert_eq!(license.condition, "License is GPL-3.0");
        assert_eq!(license.cve, "");
        assert_eq!(license.waived, Some(true));

        let uncategorized = &rows[2];
        assert_eq!(uncategorized.policy_action, "Moderate");
    }

    #[test]
    fn test_missing_display_name_yields_empty_string() {
        let rows = Consolidator::new(Strategy::Fanout, false).consolidate(&app(), &reference(), &payload());
        let row = rows.iter().find(|r| r.package_url == "pkg:npm/left-pad@1.3.0").unwrap();
        assert_eq!(row.component, "");
    }

    #[test]
    fn test_clean_component_row_has_empty_policy_columns() {
        let rows = Consolidator::new(Strategy::Fanout, false).consolidate(&app(), &reference(), &payload());
        let clean = rows.last().unwrap();
        assert_eq!(clean.threat, None);
        assert_eq!(clean.waived, None);
        assert_eq!(clean.policy_action, "");
    }

    #[test]
    fn test_skip_clean_components() {
        let rows = Consolidator::new(Strategy::Fanout, true).consolidate(&app(), &reference(), &payload());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.last().unwrap().number, 3);
    }

    #[test]
    fn test_flatten_one_row_per_component() {
        let rows = Consolidator::new(Strategy::Flatten, false).consolidate(&app(), &reference(), &payload());
        assert_eq!(rows.len(), 3);
        let first = &rows[0];
        assert_eq!(first.policy, "Security-Critical | License-Banned");
        assert_eq!(first.threat, Some(9));
        assert_eq!(first.policy_action, "Security-Critical | license-Severe");
        assert_eq!(first.constraint_name, "Critical risk CVSS score | Banned license");
        assert_eq!(first.waived, Some(false));
    }

    #[test]
    fn test_consolidation_is_deterministic() {
        let consolidator = Consolidator::new(Strategy::Fanout, false);
        let p = payload();
        assert_eq!(
            consolidator.consolidate(&app(), &reference(), &p),
            consolidator.consolidate(&app(), &reference(), &p)
        );
    }

    #[test]
    fn test_empty_and_odd_payloads() {
        let consolidator = Consolidator::new(Strategy::Fanout, false);
        assert!(consolidator.consolidate(&app(), &reference(), &json!({})).is_empty());
        assert!(consolidator
            .consolidate(&app(), &reference(), &json!({"components": "nope"}))
            .is_empty());
    }

    #[test]
    fn test_organization_name_lookup() {
        let names = HashMap::from([("org-42".to_string(), "Payments".to_string())]);
        let rows = Consolidator::new(Strategy::Fanout, false)
            .with_organization_names(names)
            .consolidate(&app(), &reference(), &payload());
        assert!(rows.iter().all(|r| r.organization_name == "Payments"));
    }

    #[test]
    fn test_policy_action_labels() {
        assert_eq!(policy_action("SECURITY", 8), "Security-Critical");
        assert_eq!(policy_action("security", 4), "Security-CVSS score than or equals 7");
        assert_eq!(policy_action("SECURITY", 6), "Security-CVSS score than or equals 7");
        assert_eq!(policy_action("SECURITY", 3), "Security-Moderate");
        assert_eq!(policy_action("SECURITY", 0), "Security-Moderate");
        assert_eq!(policy_action("LICENSE", 5), "LICENSE-Severe");
        assert_eq!(policy_action("QUALITY", 1), "QUALITY-Moderate");
        assert_eq!(policy_action("", 0), "Low");
    }
}
