//! Error types for apilinker
//!
//! This module defines the error hierarchy for the entire crate, the closed
//! error taxonomy used to label failures, and the structured [`ApiError`]
//! that is raised once retries or reconnects are exhausted.

use crate::types::JsonObject;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of characters of a response body kept in errors
pub const MAX_ERROR_BODY_CHARS: usize = 1000;

/// The main error type for apilinker
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Endpoint '{endpoint}' not found in configuration")]
    EndpointNotFound { endpoint: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Read timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("SSE line of {size} bytes exceeds the {limit} byte limit")]
    BufferOverflow { size: usize, limit: usize },

    // ============================================================================
    // Structured Errors
    // ============================================================================
    #[error("{0}")]
    Api(Box<ApiError>),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an endpoint-not-found error
    pub fn endpoint_not_found(endpoint: impl Into<String>) -> Self {
        Self::EndpointNotFound {
            endpoint: endpoint.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error, truncating the body
    pub fn http_status(status: u16, body: impl AsRef<str>) -> Self {
        Self::HttpStatus {
            status,
            body: truncate_body(body.as_ref()),
        }
    }

    /// Wrap a structured error
    pub fn api(error: ApiError) -> Self {
        Self::Api(Box::new(error))
    }

    /// Configuration errors are fatal and never retried
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::EndpointNotFound { .. }
                | Error::InvalidConfigValue { .. }
                | Error::YamlParse(_)
                | Error::InvalidUrl(_)
        )
    }

    /// The structured error, if this is one
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }

    /// Response body carried by this error, if any
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Error::HttpStatus { body, .. } => Some(body),
            Error::Api(api) => api.response_body.as_deref(),
            _ => None,
        }
    }

    /// Label this error with its category and status code
    pub fn categorize(&self) -> (ErrorCategory, Option<u16>) {
        categorize(self)
    }
}

/// Result type alias for apilinker
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Error Taxonomy
// ============================================================================

/// Closed set of failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Timeout,
    Network,
    Authentication,
    Validation,
    RateLimit,
    Server,
    Client,
    Unknown,
}

impl ErrorCategory {
    /// Category for an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorCategory::Authentication,
            400 | 422 => ErrorCategory::Validation,
            429 => ErrorCategory::RateLimit,
            s if s >= 500 => ErrorCategory::Server,
            s if s >= 400 => ErrorCategory::Client,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Upper-case name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::Authentication => "AUTHENTICATION",
            ErrorCategory::Validation => "VALIDATION",
            ErrorCategory::RateLimit => "RATE_LIMIT",
            ErrorCategory::Server => "SERVER",
            ErrorCategory::Client => "CLIENT",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a failure to its category and status code.
///
/// Timeouts and transport failures report status `0`; HTTP failures report
/// their status; anything unrecognised is `UNKNOWN` with no status. This only
/// labels, it never decides whether to retry.
pub fn categorize(error: &Error) -> (ErrorCategory, Option<u16>) {
    match error {
        Error::Timeout { .. } => (ErrorCategory::Timeout, Some(0)),
        Error::Http(e) if e.is_timeout() => (ErrorCategory::Timeout, Some(0)),
        Error::Http(e) if e.is_status() => match e.status() {
            Some(status) => {
                let code = status.as_u16();
                (ErrorCategory::from_status(code), Some(code))
            }
            None => (ErrorCategory::Unknown, None),
        },
        Error::Http(e) if e.is_connect() || e.is_request() || e.is_body() => {
            (ErrorCategory::Network, Some(0))
        }
        Error::HttpStatus { status, .. } => (ErrorCategory::from_status(*status), Some(*status)),
        Error::Api(api) => (api.category, api.status_code),
        _ => (ErrorCategory::Unknown, None),
    }
}

/// Truncate a response body to [`MAX_ERROR_BODY_CHARS`] characters
pub fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

// ============================================================================
// Structured Error
// ============================================================================

/// Structured error carrying everything needed to diagnose a failed call.
///
/// Serializes to the shape expected by dead-letter and error-reporting sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_method: Option<String>,
    #[serde(default)]
    pub additional_context: JsonObject,
}

impl ApiError {
    /// Create a structured error with no request context
    pub fn new(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            message: message.into(),
            category,
            status_code: None,
            response_body: None,
            request_url: None,
            request_method: None,
            additional_context: JsonObject::new(),
        }
    }

    /// Build a structured error from an underlying failure, labelling it
    pub fn from_error(message: impl Into<String>, source: &Error) -> Self {
        let (category, status_code) = categorize(source);
        Self {
            message: message.into(),
            category,
            status_code,
            response_body: source.response_body().map(truncate_body),
            request_url: None,
            request_method: None,
            additional_context: JsonObject::new(),
        }
    }

    /// Set the status code
    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Set the request URL and method
    #[must_use]
    pub fn with_request(mut self, url: impl Into<String>, method: impl Into<String>) -> Self {
        self.request_url = Some(url.into());
        self.request_method = Some(method.into());
        self
    }

    /// Add an entry to the additional context
    #[must_use]
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.additional_context.insert(key.into(), value.into());
        self
    }

    /// Serialize for forwarding to an error sink
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::json!({ "message": self.message }))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)?;
        if let Some(status) = self.status_code {
            write!(f, " (status {status})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl From<ApiError> for Error {
    fn from(error: ApiError) -> Self {
        Error::api(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::endpoint_not_found("users");
        assert_eq!(
            err.to_string(),
            "Endpoint 'users' not found in configuration"
        );

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");
    }

    #[test_case(401, ErrorCategory::Authentication ; "unauthorized")]
    #[test_case(403, ErrorCategory::Authentication ; "forbidden")]
    #[test_case(400, ErrorCategory::Validation ; "bad request")]
    #[test_case(422, ErrorCategory::Validation ; "unprocessable")]
    #[test_case(429, ErrorCategory::RateLimit ; "too many requests")]
    #[test_case(500, ErrorCategory::Server ; "internal error")]
    #[test_case(503, ErrorCategory::Server ; "unavailable")]
    #[test_case(404, ErrorCategory::Client ; "not found")]
    #[test_case(409, ErrorCategory::Client ; "conflict")]
    #[test_case(302, ErrorCategory::Unknown ; "redirect")]
    fn test_categorize_status(status: u16, expected: ErrorCategory) {
        let (category, code) = categorize(&Error::http_status(status, ""));
        assert_eq!(category, expected);
        assert_eq!(code, Some(status));
    }

    #[test]
    fn test_categorize_timeout_and_unknown() {
        assert_eq!(
            categorize(&Error::Timeout { timeout_ms: 10 }),
            (ErrorCategory::Timeout, Some(0))
        );
        assert_eq!(
            categorize(&Error::Other("boom".into())),
            (ErrorCategory::Unknown, None)
        );
    }

    #[test]
    fn test_categorize_keeps_api_label() {
        let api = ApiError::new("bad payload", ErrorCategory::Validation).with_status(0);
        assert_eq!(
            categorize(&Error::api(api)),
            (ErrorCategory::Validation, Some(0))
        );
    }

    #[test]
    fn test_http_status_body_truncated() {
        let body = "x".repeat(5000);
        let err = Error::http_status(500, &body);
        assert_eq!(err.response_body().unwrap().len(), MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn test_api_error_from_error() {
        let source = Error::http_status(503, "down");
        let api = ApiError::from_error("Failed to fetch", &source)
            .with_request("https://api.example.com/users", "GET")
            .with_context("endpoint", "users");

        assert_eq!(api.category, ErrorCategory::Server);
        assert_eq!(api.status_code, Some(503));
        assert_eq!(api.response_body.as_deref(), Some("down"));

        let value = api.to_value();
        assert_eq!(value["category"], "SERVER");
        assert_eq!(value["request_method"], "GET");
        assert_eq!(value["additional_context"]["endpoint"], "users");
    }

    #[test]
    fn test_is_config() {
        assert!(Error::config("x").is_config());
        assert!(Error::endpoint_not_found("x").is_config());
        assert!(!Error::http_status(500, "").is_config());
    }
}
