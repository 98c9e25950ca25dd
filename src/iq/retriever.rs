//! Fetches the raw policy report for a located reference.

use serde_json::Value;

use crate::error::{FetchError, FetchResult};
use crate::remote::ApiClient;

use super::types::{Application, RawReport, ReportReference};

pub struct RawReportRetriever<'a, C: ApiClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ApiClient + ?Sized> RawReportRetriever<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// One request per reference; the report is fetched whole
    ///
    /// A report with zero components is a valid, empty result. A body that is
    /// not a JSON object is `Permanent`.
    pub fn fetch(&self, app: &Application, reference: &ReportReference) -> FetchResult<RawReport> {
        let path = report_path(app, reference);
        let payload = self
            .client
            .get_json(&path, &[("includeViolationTimes", "true")])?;

        if !matches!(payload, Value::Object(_)) {
            return Err(FetchError::Permanent(format!(
                "raw report {} for {} is not a JSON object",
                reference.report_id,
                app.label()
            )));
        }

        Ok(RawReport {
            reference: reference.clone(),
            payload,
        })
    }
}

pub fn report_path(app: &Application, reference: &ReportReference) -> String {
    format!(
        "/api/v2/applications/{}/reports/{}/policy",
        urlencoding::encode(&app.public_id),
        urlencoding::encode(&reference.report_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct OneShot {
        body: Value,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ApiClient for OneShot {
        fn get_json(&self, path: &str, params: &[(&str, &str)]) -> FetchResult<Value> {
            self.calls.lock().unwrap().push((
                path.to_string(),
                params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ));
            Ok(self.body.clone())
        }
    }

    fn fixtures() -> (Application, ReportReference) {
        (
            Application {
                id: "app-1".into(),
                public_id: "web".into(),
                name: "Web".into(),
                organization_id: "org".into(),
            },
            ReportReference {
                application_id: "app-1".into(),
                stage_id: "build".into(),
                report_id: "r-9".into(),
            },
        )
    }

    #[test]
    fn test_fetches_policy_endpoint_once() {
        let api = OneShot {
            body: json!({"components": [{"displayName": "a"}]}),
            calls: Mutex::new(Vec::new()),
        };
        let (app, reference) = fixtures();
        let report = RawReportRetriever::new(&api).fetch(&app, &reference).unwrap();
        assert_eq!(report.components().len(), 1);

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "/api/v2/applications/web/reports/r-9/policy");
        assert_eq!(calls[0].1, vec![("includeViolationTimes".to_string(), "true".to_string())]);
    }

    #[test]
    fn test_structurally_empty_report_is_ok() {
        let api = OneShot {
            body: json!({"application": {"publicId": "web"}, "components": []}),
            calls: Mutex::new(Vec::new()),
        };
        let (app, reference) = fixtures();
        let report = RawReportRetriever::new(&api).fetch(&app, &reference).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_non_object_payload_is_permanent() {
        let api = OneShot {
            body: json!(["not", "a", "report"]),
            calls: Mutex::new(Vec::new()),
        };
        let (app, reference) = fixtures();
        let err = RawReportRetriever::new(&api).fetch(&app, &reference).unwrap_err();
        assert!(matches!(err, FetchError::Permanent(_)));
    }
}
