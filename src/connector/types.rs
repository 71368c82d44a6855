//! Value types produced and consumed by the connector

use crate::error::ApiError;
use crate::types::{into_mapping, JsonObject, JsonValue, Method, StringMap, ValueMap};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Requests
// ============================================================================

/// Everything needed to issue one HTTP call.
///
/// Built fresh per call; identical inputs give identical descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Absolute URL (base URL + endpoint path)
    pub url: String,
    pub method: Method,
    pub headers: StringMap,
    /// Query parameters
    pub params: ValueMap,
    /// JSON body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<JsonValue>,
}

impl RequestDescriptor {
    /// Replace the JSON body
    #[must_use]
    pub fn with_json(mut self, json: Option<JsonValue>) -> Self {
        self.json = json;
        self
    }
}

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Final URL of the request
    pub url: String,
}

impl RawResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as (lossy) UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Response payload after path extraction and normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedData {
    /// A sequence payload
    List(Vec<JsonValue>),
    /// A mapping payload; scalars are wrapped as `{"value": x}`
    Mapping(JsonObject),
}

impl NormalizedData {
    /// Normalize any JSON value
    pub fn from_value(value: JsonValue) -> Self {
        match value {
            JsonValue::Array(items) => NormalizedData::List(items),
            other => NormalizedData::Mapping(into_mapping(other)),
        }
    }

    /// Back to a plain JSON value
    pub fn into_value(self) -> JsonValue {
        match self {
            NormalizedData::List(items) => JsonValue::Array(items),
            NormalizedData::Mapping(map) => JsonValue::Object(map),
        }
    }

    /// Borrow the list payload
    pub fn as_list(&self) -> Option<&[JsonValue]> {
        match self {
            NormalizedData::List(items) => Some(items),
            NormalizedData::Mapping(_) => None,
        }
    }

    /// Borrow the mapping payload
    pub fn as_mapping(&self) -> Option<&JsonObject> {
        match self {
            NormalizedData::Mapping(map) => Some(map),
            NormalizedData::List(_) => None,
        }
    }
}

// ============================================================================
// Sending
// ============================================================================

/// Per-item outcome of a batch send
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// True when at least one item was sent and none failed
    pub success: bool,
    pub sent_count: usize,
    pub failed_count: usize,
    /// Response bodies of the successful items, in send order
    pub results: Vec<JsonValue>,
    /// Structured errors of the failed items
    pub failures: Vec<ApiError>,
}

/// Result of `send_data`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SendOutcome {
    /// One payload, sent with retries
    Single { success: bool, result: JsonValue },
    /// A sequence of payloads, each sent once
    Batch(BatchReport),
}

impl SendOutcome {
    /// Whether the send counts as successful
    pub fn is_success(&self) -> bool {
        match self {
            SendOutcome::Single { success, .. } => *success,
            SendOutcome::Batch(report) => report.success,
        }
    }
}

// ============================================================================
// Health
// ============================================================================

/// Coarse health state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Outcome of a connectivity probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    /// `connector:<base_url>`
    pub component: String,
    pub message: String,
    pub latency_ms: f64,
    #[serde(default)]
    pub details: JsonObject,
}

impl HealthCheckResult {
    /// Whether the probe succeeded
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
