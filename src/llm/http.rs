//! HTTP transport shared by the network LLM backends.
//!
//! Each backend only describes its request and response bodies. Sending,
//! retrying transient failures and turning HTTP failures into
//! [`SqlGuardError::Llm`] happens here.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, SqlGuardError};

/// Default timeout for hosted APIs.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Settings common to every HTTP backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub base_url: String,
    pub model: String,
    /// Not needed by local backends.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl BackendSettings {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Resolves the model: explicit value, then `model_var`, then `default`.
    pub(crate) fn resolve_model(model: Option<&str>, model_var: &str, default: &str) -> String {
        model
            .map(str::to_string)
            .or_else(|| std::env::var(model_var).ok())
            .unwrap_or_else(|| default.to_string())
    }

    /// Joins `path` onto the base URL.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Returns the API key or an error naming the variable that should hold it.
    pub(crate) fn require_key(&self, key_var: &str) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| missing_key(key_var))
    }
}

/// Error for an unset API key variable.
pub(crate) fn missing_key(key_var: &str) -> SqlGuardError {
    SqlGuardError::llm(format!("No API key configured. Set {}.", key_var))
}

/// Reads an API key from the environment.
pub(crate) fn key_from_env(key_var: &str) -> Result<String> {
    std::env::var(key_var).map_err(|_| missing_key(key_var))
}

/// A JSON endpoint plus what to say when it fails.
#[derive(Debug, Clone)]
pub(crate) struct JsonTransport {
    http: Client,
    provider: &'static str,
    key_var: Option<&'static str>,
    connect_hint: &'static str,
    max_attempts: u32,
}

impl JsonTransport {
    pub(crate) fn new(provider: &'static str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SqlGuardError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            provider,
            key_var: None,
            connect_hint: "Check your network.",
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Names the key variable in authentication failures.
    pub(crate) fn with_key_var(mut self, key_var: &'static str) -> Self {
        self.key_var = Some(key_var);
        self
    }

    pub(crate) fn with_connect_hint(mut self, hint: &'static str) -> Self {
        self.connect_hint = hint;
        self
    }

    pub(crate) fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// POSTs `body` to `url` and decodes a successful response as `T`.
    ///
    /// Rate limiting, server errors, timeouts and refused connections are
    /// retried with exponential backoff.
    pub(crate) async fn post<B, T>(&self, url: &str, headers: &[(&str, &str)], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!(provider = self.provider, attempt, "LLM API request");

            let (error, retryable) = match self.send(url, headers, body).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !retryable || attempt >= self.max_attempts {
                return Err(error);
            }

            warn!(provider = self.provider, attempt, ?delay, error = %error, "LLM API request failed, retrying");
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }

    async fn send<B, T>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> std::result::Result<T, (SqlGuardError, bool)>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.request_failure(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| (SqlGuardError::llm(format!("Failed to read response: {}", e)), false))?;

        if !status.is_success() {
            return Err(self.status_failure(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| (SqlGuardError::llm(format!("Failed to parse response: {}", e)), false))
    }

    fn request_failure(&self, error: &reqwest::Error) -> (SqlGuardError, bool) {
        if error.is_timeout() {
            (SqlGuardError::llm("Request timed out. Try again."), true)
        } else if error.is_connect() {
            (
                SqlGuardError::llm(format!(
                    "Failed to connect to {}. {}",
                    self.provider, self.connect_hint
                )),
                true,
            )
        } else {
            (SqlGuardError::llm(format!("Request failed: {}", error)), false)
        }
    }

    /// Maps a non-success status to an error and whether to retry.
    fn status_failure(&self, status: StatusCode, body: &str) -> (SqlGuardError, bool) {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = match self.key_var {
                Some(var) => format!("Authentication failed. Check your {}.", var),
                None => format!("Authentication failed for {}.", self.provider),
            };
            return (SqlGuardError::llm(message), false);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return (
                SqlGuardError::llm("Rate limited. Please wait and try again."),
                true,
            );
        }

        let message = match api_error_message(body) {
            Some(detail) => format!("{} API error: {}", self.provider, detail),
            None => format!("{} API error ({}): {}", self.provider, status, body),
        };
        (SqlGuardError::llm(message), status.is_server_error())
    }
}

/// Pulls the message out of `{"error": {"message": ..}}` or `{"error": ".."}`.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> JsonTransport {
        JsonTransport::new("OpenAI", 5)
            .unwrap()
            .with_key_var("OPENAI_API_KEY")
    }

    #[test]
    fn test_settings_url_trims_trailing_slash() {
        let settings = BackendSettings::new("http://localhost:11434/", "sqlcoder:15b");
        assert_eq!(settings.url("api/chat"), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_settings_builders() {
        let settings = BackendSettings::new("https://example.test", "m")
            .with_api_key("k")
            .with_timeout(60);
        assert_eq!(settings.api_key.as_deref(), Some("k"));
        assert_eq!(settings.timeout_secs, 60);
        assert_eq!(settings.require_key("X_KEY").unwrap(), "k");
    }

    #[test]
    fn test_require_key_names_variable() {
        let settings = BackendSettings::new("https://example.test", "m");
        let err = settings.require_key("GEMINI_API_KEY").unwrap_err();
        assert!(err.to_string().contains("Set GEMINI_API_KEY"));
    }

    #[test]
    fn test_resolve_model_prefers_explicit_value() {
        let model =
            BackendSettings::resolve_model(Some("gpt-4o-mini"), "SQLGUARD_UNSET_MODEL_VAR", "gpt-4o");
        assert_eq!(model, "gpt-4o-mini");
        let model = BackendSettings::resolve_model(None, "SQLGUARD_UNSET_MODEL_VAR", "gpt-4o");
        assert_eq!(model, "gpt-4o");
    }

    #[test]
    fn test_unauthorized_names_key_variable() {
        let (error, retryable) = transport().status_failure(StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("Check your OPENAI_API_KEY"));
        assert!(!retryable);
    }

    #[test]
    fn test_forbidden_without_key_variable() {
        let transport = JsonTransport::new("Ollama", 5).unwrap();
        let (error, _) = transport.status_failure(StatusCode::FORBIDDEN, "");
        assert!(error.to_string().contains("Authentication failed for Ollama"));
    }

    #[test]
    fn test_rate_limited_is_retryable() {
        let (error, retryable) = transport().status_failure(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(error.to_string().contains("Rate limited"));
        assert!(retryable);
    }

    #[test]
    fn test_server_error_is_retryable() {
        let (_, retryable) = transport().status_failure(StatusCode::BAD_GATEWAY, "");
        assert!(retryable);
        let (_, retryable) = transport().status_failure(StatusCode::BAD_REQUEST, "");
        assert!(!retryable);
    }

    #[test]
    fn test_error_message_shapes() {
        let nested = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        assert_eq!(api_error_message(nested).as_deref(), Some("API key not valid"));

        let flat = r#"{"error":"model 'sqlcoder:15b' not found"}"#;
        assert_eq!(
            api_error_message(flat).as_deref(),
            Some("model 'sqlcoder:15b' not found")
        );

        assert_eq!(api_error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_unparsed_body_is_reported_with_status() {
        let (error, _) = transport().status_failure(StatusCode::BAD_REQUEST, "nope");
        assert!(error.to_string().contains("OpenAI API error (400 Bad Request): nope"));
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        assert_eq!(transport().with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_refused_connection_reports_hint() {
        let transport = JsonTransport::new("Ollama", 2)
            .unwrap()
            .with_connect_hint("Is it running? Try: ollama serve")
            .with_max_attempts(1);

        // Port 9 (discard) is not served on loopback in test environments.
        let err = transport
            .post::<_, serde_json::Value>("http://127.0.0.1:9/api/chat", &[], &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, SqlGuardError::Llm(_)));
    }
}
