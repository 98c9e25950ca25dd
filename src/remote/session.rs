//! Authenticated access to the IQ server with retry, backoff and re-authentication.

use reqwest::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::transport::{Credentials, HttpRequest, Transport};
use crate::error::{FetchError, FetchResult};

/// Endpoint used to verify credentials; cheap and readable by any IQ user
pub const AUTH_PROBE_PATH: &str = "/api/v2/organizations";

/// Retry configuration for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry (doubles each retry)
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Read access to the remote API, as needed by the resolver, locator and retriever
pub trait ApiClient: Send + Sync {
    fn get_json(&self, path: &str, params: &[(&str, &str)]) -> FetchResult<Value>;
}

/// Result of one retried exchange
enum Exchange {
    Body(Value),
    AuthRejected(u16),
}

/// The single owned session for one run
#[derive(Debug)]
pub struct RemoteSession<T: Transport> {
    base_url: String,
    credentials: Credentials,
    retry: RetryPolicy,
    transport: T,
    auth_failed: AtomicBool,
}

impl<T: Transport> RemoteSession<T> {
    pub fn new(base_url: &str, credentials: Credentials, retry: RetryPolicy, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            retry,
            transport,
            auth_failed: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Verify the credentials before any real work is done
    pub fn authenticate(&self) -> FetchResult<()> {
        tracing::debug!(
            "Authenticating as {} against {}",
            self.credentials.principal(),
            self.base_url
        );
        match self.exchange(Method::GET, AUTH_PROBE_PATH, &[])? {
            Exchange::Body(_) => {
                tracing::info!("Authenticated as {}", self.credentials.principal());
                Ok(())
            }
            Exchange::AuthRejected(status) => Err(self.latch_auth_failure(format!(
                "server rejected credentials for {} (HTTP {status})",
                self.credentials.principal()
            ))),
        }
    }

    /// Perform one API call and return its parsed JSON body
    ///
    /// A 401/403 triggers exactly one re-authentication followed by a single
    /// retry of the call. If that still fails the session is latched as
    /// unauthenticated and every later call fails fast with `Auth`.
    pub fn request(&self, method: Method, path: &str, params: &[(&str, &str)]) -> FetchResult<Value> {
        if self.auth_failed.load(Ordering::SeqCst) {
            return Err(FetchError::Auth(
                "credentials were rejected earlier in this run".to_string(),
            ));
        }

        match self.exchange(method.clone(), path, params)? {
            Exchange::Body(body) => Ok(body),
            Exchange::AuthRejected(status) => {
                tracing::debug!("HTTP {status} on {path}, re-authenticating once");
                self.authenticate()?;
                match self.exchange(method, path, params)? {
                    Exchange::Body(body) => Ok(body),
                    Exchange::AuthRejected(status) => Err(self.latch_auth_failure(format!(
                        "{path} still rejected with HTTP {status} after re-authentication"
                    ))),
                }
            }
        }
    }

    fn latch_auth_failure(&self, message: String) -> FetchError {
        self.auth_failed.store(true, Ordering::SeqCst);
        FetchError::Auth(message)
    }

    /// Send one request, retrying 5xx/429 and transport failures with backoff
    fn exchange(&self, method: Method, path: &str, params: &[(&str, &str)]) -> FetchResult<Exchange> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.retry.delay_for(attempt - 1);
                tracing::debug!(
                    "Retry {}/{} for {} {} after {:?} ({})",
                    attempt - 1,
                    attempts - 1,
                    method,
                    path,
                    delay,
                    last_error
                );
                std::thread::sleep(delay);
            }

            let request = HttpRequest {
                method: method.clone(),
                url: url.clone(),
                query: params,
                credentials: &self.credentials,
            };

            match self.transport.send(&request) {
                Ok(response) => match response.status {
                    200..=299 => return parse_body(&method, path, &response.body).map(Exchange::Body),
                    401 | 403 => return Ok(Exchange::AuthRejected(response.status)),
                    429 | 500..=599 => last_error = format!("HTTP {}", response.status),
                    status => {
                        return Err(FetchError::Permanent(format!(
                            "{method} {path} returned HTTP {status}{}",
                            body_excerpt(&response.body)
                        )));
                    }
                },
                Err(e) => last_error = e.to_string(),
            }
        }

        tracing::warn!("{method} {path} failed after {attempts} attempts: {last_error}");
        Err(FetchError::Transient(format!(
            "{method} {path} failed after {attempts} attempts: {last_error}"
        )))
    }
}

impl<T: Transport> ApiClient for RemoteSession<T> {
    fn get_json(&self, path: &str, params: &[(&str, &str)]) -> FetchResult<Value> {
        self.request(Method::GET, path, params)
    }
}

fn parse_body(method: &Method, path: &str, body: &str) -> FetchResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| FetchError::Permanent(format!("{method} {path} returned malformed JSON: {e}")))
}

fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let excerpt: String = trimmed.chars().take(200).collect();
    format!(": {excerpt}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::transport::{HttpResponse, TransportError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of responses and records requested paths
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.url.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    fn session(script: Vec<Result<HttpResponse, TransportError>>) -> RemoteSession<ScriptedTransport> {
        RemoteSession::new(
            "https://iq.example.com/",
            Credentials::Basic {
                username: "admin".into(),
                password: "secret".into(),
            },
            fast_retry(3),
            ScriptedTransport::new(script),
        )
    }

    fn ok(body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(200, body))
    }

    fn status(code: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(code, ""))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_transient_failures_below_cap_are_invisible() {
        let s = session(vec![
            status(503),
            Err(TransportError::Timeout("slow".into())),
            ok(r#"{"applications": []}"#),
        ]);
        let body = s.get_json("/api/v2/applications", &[]).unwrap();
        assert!(body["applications"].as_array().unwrap().is_empty());
        assert_eq!(s.transport.seen().len(), 3);
    }

    #[test]
    fn test_exhausted_retries_are_transient() {
        let s = session(vec![status(500), status(502), status(504)]);
        let err = s.get_json("/api/v2/applications", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Transient(_)));
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_client_errors_are_permanent_and_not_retried() {
        let s = session(vec![Ok(HttpResponse::new(404, "no such app")), ok("{}")]);
        let err = s.get_json("/api/v2/reports/applications/x", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Permanent(_)));
        assert!(err.to_string().contains("404"));
        assert_eq!(s.transport.seen().len(), 1);
    }

    #[test]
    fn test_malformed_json_is_permanent() {
        let s = session(vec![ok("<html>maintenance</html>")]);
        let err = s.get_json("/api/v2/applications", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Permanent(_)));
    }

    #[test]
    fn test_reauthenticates_once_then_succeeds() {
        let s = session(vec![
            status(401),
            ok(r#"{"organizations": []}"#),
            ok(r#"{"ok": true}"#),
        ]);
        let body = s.get_json("/api/v2/applications", &[]).unwrap();
        assert_eq!(body["ok"], true);

        let seen = s.transport.seen();
        assert_eq!(seen.len(), 3);
        assert!(seen[1].ends_with(AUTH_PROBE_PATH));
    }

    #[test]
    fn test_second_auth_failure_latches_session() {
        let s = session(vec![status(403), ok("{}"), status(403)]);
        let err = s.get_json("/api/v2/applications", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));

        // Fails fast without touching the transport again
        let err = s.get_json("/api/v2/organizations", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));
        assert_eq!(s.transport.seen().len(), 3);
    }

    #[test]
    fn test_authenticate_rejects_bad_credentials() {
        let s = session(vec![status(401)]);
        assert!(matches!(s.authenticate(), Err(FetchError::Auth(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let s = session(vec![ok("{}")]);
        s.get_json("/api/v2/organizations", &[]).unwrap();
        assert_eq!(s.transport.seen()[0], "https://iq.example.com/api/v2/organizations");
        assert_eq!(s.base_url(), "https://iq.example.com");
    }
}
