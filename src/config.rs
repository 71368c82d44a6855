//! Configuration types for connector definitions
//!
//! This module contains the configuration structures used to describe a
//! connector and its endpoints, either in YAML (see [`crate::loader`]) or
//! programmatically through [`ConnectorConfig::builder`].

use crate::auth::AuthConfig;
use crate::ratelimit::RateLimitSpec;
use crate::types::{JsonValue, Method, StringMap, ValueMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Top-Level Connector Config
// ============================================================================

/// Complete connector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Kind of connector (`rest`, `sse`, ...)
    #[serde(rename = "type", alias = "connector_type", default = "default_connector_type")]
    pub connector_type: String,

    /// Base URL every endpoint path is appended to
    pub base_url: String,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Endpoint definitions keyed by name
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs", alias = "timeout")]
    pub timeout_secs: f64,

    /// Total attempts for a fetch or single send
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base delay between attempts in seconds (multiplied by the attempt number)
    #[serde(default = "default_retry_delay_secs", alias = "retry_delay")]
    pub retry_delay_secs: f64,

    /// Headers sent with every request
    #[serde(default, alias = "headers")]
    pub default_headers: StringMap,
}

fn default_connector_type() -> String {
    "rest".to_string()
}

fn default_timeout_secs() -> f64 {
    30.0
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_secs() -> f64 {
    1.0
}

impl ConnectorConfig {
    /// Create a config with defaults for everything but the base URL
    pub fn new(connector_type: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            connector_type: connector_type.into(),
            base_url: base_url.into(),
            auth: AuthConfig::None,
            endpoints: BTreeMap::new(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay_secs(),
            default_headers: StringMap::new(),
        }
    }

    /// Create a new config builder
    pub fn builder(base_url: impl Into<String>) -> ConnectorConfigBuilder {
        ConnectorConfigBuilder {
            config: Self::new(default_connector_type(), base_url),
        }
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        secs_to_duration(self.timeout_secs)
    }

    /// Base delay between attempts
    pub fn retry_delay(&self) -> Duration {
        secs_to_duration(self.retry_delay_secs)
    }

    /// Look up an endpoint by name
    pub fn endpoint(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints.get(name)
    }
}

/// Builder for connector config
#[derive(Debug, Clone)]
pub struct ConnectorConfigBuilder {
    config: ConnectorConfig,
}

impl ConnectorConfigBuilder {
    /// Set the connector type
    pub fn connector_type(mut self, connector_type: impl Into<String>) -> Self {
        self.config.connector_type = connector_type.into();
        self
    }

    /// Set authentication
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, name: impl Into<String>, endpoint: EndpointConfig) -> Self {
        self.config.endpoints.insert(name.into(), endpoint);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs_f64();
        self
    }

    /// Set the total number of attempts
    pub fn retry_count(mut self, count: u32) -> Self {
        self.config.retry_count = count;
        self
    }

    /// Set the base retry delay
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay_secs = delay.as_secs_f64();
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Build the config
    pub fn build(self) -> ConnectorConfig {
        self.config
    }
}

// ============================================================================
// Endpoint Config
// ============================================================================

/// Static description of one reachable operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Path relative to the connector base URL
    pub path: String,

    /// HTTP method
    #[serde(default)]
    pub method: Method,

    /// Query parameters sent on every call
    #[serde(default)]
    pub params: ValueMap,

    /// Endpoint-specific headers
    #[serde(default)]
    pub headers: StringMap,

    /// JSON body sent with fetches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<JsonValue>,

    /// Pagination rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationSpec>,

    /// Dotted path to the payload inside the response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_path: Option<String>,

    /// Schema outgoing payloads must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_schema: Option<JsonValue>,

    /// Schema responses are checked against (diagnostic only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<JsonValue>,

    /// Per-endpoint rate limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSpec>,

    /// Streaming and consumption policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse: Option<SseSettings>,
}

impl EndpointConfig {
    /// A `GET` endpoint at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the HTTP method
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the body template
    #[must_use]
    pub fn body_template(mut self, body: JsonValue) -> Self {
        self.body_template = Some(body);
        self
    }

    /// Set pagination rules
    #[must_use]
    pub fn pagination(mut self, pagination: PaginationSpec) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Set the response path
    #[must_use]
    pub fn response_path(mut self, path: impl Into<String>) -> Self {
        self.response_path = Some(path.into());
        self
    }

    /// Set the request schema
    #[must_use]
    pub fn request_schema(mut self, schema: JsonValue) -> Self {
        self.request_schema = Some(schema);
        self
    }

    /// Set the response schema
    #[must_use]
    pub fn response_schema(mut self, schema: JsonValue) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Set the rate limit
    #[must_use]
    pub fn rate_limit(mut self, spec: RateLimitSpec) -> Self {
        self.rate_limit = Some(spec);
        self
    }

    /// Set streaming settings
    #[must_use]
    pub fn sse(mut self, settings: SseSettings) -> Self {
        self.sse = Some(settings);
        self
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// How a paged resource is walked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSpec {
    /// Dotted path to the items in each page (whole body when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,

    /// Dotted path to the next page token (page counter when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_path: Option<String>,

    /// Query parameter carrying the token or page number
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Last page requested in page-counter mode
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_max_pages() -> u32 {
    10
}

impl Default for PaginationSpec {
    fn default() -> Self {
        Self {
            data_path: None,
            next_page_path: None,
            page_param: default_page_param(),
            max_pages: default_max_pages(),
        }
    }
}

impl PaginationSpec {
    /// Follow a next-page token found at `next_page_path`
    pub fn token(data_path: impl Into<String>, next_page_path: impl Into<String>) -> Self {
        Self {
            data_path: Some(data_path.into()),
            next_page_path: Some(next_page_path.into()),
            ..Self::default()
        }
    }

    /// Count pages up to `max_pages`
    pub fn page_counter(data_path: impl Into<String>, max_pages: u32) -> Self {
        Self {
            data_path: Some(data_path.into()),
            max_pages,
            ..Self::default()
        }
    }

    /// Set the page parameter name
    #[must_use]
    pub fn page_param(mut self, param: impl Into<String>) -> Self {
        self.page_param = param.into();
        self
    }
}

// ============================================================================
// SSE Settings
// ============================================================================

/// Per-endpoint streaming defaults.
///
/// Every field is optional; an explicit call argument wins over the value
/// here, which wins over the built-in default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SseSettings {
    /// Stop after this many dispatched events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_events: Option<usize>,

    /// Reconnect after errors and clean closes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<bool>,

    /// Delay before reconnecting, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay: Option<f64>,

    /// Give up after this many reconnects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,

    /// Per-read timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout: Option<f64>,

    /// Decode event data as JSON when possible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_json: Option<bool>,

    /// Events per processed chunk when consuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    /// Capacity of the consume buffer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backpressure_buffer_size: Option<usize>,

    /// `block` or `drop_oldest`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_policy: Option<String>,
}

/// Convert a seconds value from config.
///
/// Negatives and NaN become zero; values too large for a `Duration`
/// saturate at `Duration::MAX`.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connector_config_defaults() {
        let config = ConnectorConfig::new("rest", "https://api.example.com");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert!(config.endpoints.is_empty());
        assert_eq!(config.auth, AuthConfig::None);
    }

    #[test]
    fn test_builder() {
        let config = ConnectorConfig::builder("https://api.example.com")
            .connector_type("sse")
            .timeout(Duration::from_secs(5))
            .retry_count(1)
            .retry_delay(Duration::from_millis(250))
            .header("User-Agent", "apilinker")
            .endpoint("users", EndpointConfig::new("/users"))
            .build();

        assert_eq!(config.connector_type, "sse");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.retry_count, 1);
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert_eq!(
            config.default_headers.get("User-Agent"),
            Some(&"apilinker".to_string())
        );
        assert_eq!(config.endpoint("users").unwrap().path, "/users");
        assert!(config.endpoint("missing").is_none());
    }

    #[test]
    fn test_endpoint_deserialize() {
        let yaml = r"
path: /items
method: post
params:
  limit: 10
headers:
  X-Trace: enabled
pagination:
  data_path: items
  next_page_path: meta.next
rate_limit:
  rate: 5
  burst: 2
sse:
  reconnect: false
  drop_policy: drop_oldest
";
        let endpoint: EndpointConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(endpoint.method, Method::POST);
        assert_eq!(endpoint.params["limit"], 10);
        assert_eq!(endpoint.headers["X-Trace"], "enabled");

        let pagination = endpoint.pagination.unwrap();
        assert_eq!(pagination.data_path.as_deref(), Some("items"));
        assert_eq!(pagination.next_page_path.as_deref(), Some("meta.next"));
        assert_eq!(pagination.page_param, "page");
        assert_eq!(pagination.max_pages, 10);

        assert_eq!(endpoint.rate_limit.unwrap().burst, Some(2));

        let sse = endpoint.sse.unwrap();
        assert_eq!(sse.reconnect, Some(false));
        assert_eq!(sse.drop_policy.as_deref(), Some("drop_oldest"));
        assert_eq!(sse.max_events, None);
    }

    #[test]
    fn test_connector_deserialize_aliases() {
        let yaml = r"
type: rest
base_url: https://api.example.com
timeout: 10
retry_delay: 0.5
headers:
  Accept: application/json
endpoints:
  list:
    path: /list
";
        let config: ConnectorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_delay(), Duration::from_millis(500));
        assert_eq!(config.default_headers["Accept"], "application/json");
        assert_eq!(config.endpoints["list"].method, Method::GET);
    }

    #[test]
    fn test_secs_to_duration_clamps() {
        assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(1.5), Duration::from_millis(1500));
        assert_eq!(secs_to_duration(1e20), Duration::MAX);
        assert_eq!(secs_to_duration(f64::INFINITY), Duration::MAX);
    }
}
