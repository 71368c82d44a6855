//! Plugin capabilities and registry
//!
//! Plugins come in three kinds, each a trait:
//!
//! - [`Transformer`] rewrites a value
//! - [`Connector`] reaches an API (`connect`, `fetch`, `send`)
//! - [`AuthProvider`] produces credentials
//!
//! Factories are registered explicitly in a [`PluginRegistry`] under a
//! `(kind, name)` key.

mod registry;

pub use registry::{
    AuthFactory, ConnectorFactory, PluginInfo, PluginKind, PluginRegistry, TransformerFactory,
};

use crate::auth::AuthConfig;
use crate::connector::{
    ApiConnector, HealthCheckResult, NormalizedData, SendOutcome, SseConnector,
};
use crate::error::Result;
use crate::types::{JsonValue, ValueMap};
use async_trait::async_trait;

// ============================================================================
// Capabilities
// ============================================================================

/// Rewrites one value
pub trait Transformer: Send + Sync {
    /// Transform `value`; `params` carries per-call options
    fn transform(&self, value: &JsonValue, params: &ValueMap) -> Result<JsonValue>;
}

/// Anything that can talk to an API
#[async_trait]
pub trait Connector: Send + Sync {
    /// Check that the API is reachable
    async fn connect(&self) -> Result<HealthCheckResult>;

    /// Fetch data from an endpoint
    async fn fetch(&self, endpoint: &str, params: Option<&ValueMap>) -> Result<NormalizedData>;

    /// Send data to an endpoint
    async fn send(&self, endpoint: &str, data: JsonValue) -> Result<SendOutcome>;
}

/// Produces credentials for a connector
pub trait AuthProvider: Send + Sync {
    /// Build the auth settings from provider parameters
    fn authenticate(&self, params: &ValueMap) -> Result<AuthConfig>;
}

#[async_trait]
impl Connector for ApiConnector {
    async fn connect(&self) -> Result<HealthCheckResult> {
        Ok(self.check_health().await)
    }

    async fn fetch(&self, endpoint: &str, params: Option<&ValueMap>) -> Result<NormalizedData> {
        self.fetch_data(endpoint, params).await
    }

    async fn send(&self, endpoint: &str, data: JsonValue) -> Result<SendOutcome> {
        self.send_data(endpoint, data).await
    }
}

#[async_trait]
impl Connector for SseConnector {
    async fn connect(&self) -> Result<HealthCheckResult> {
        Ok(self.connector().check_health().await)
    }

    async fn fetch(&self, endpoint: &str, params: Option<&ValueMap>) -> Result<NormalizedData> {
        self.connector().fetch_data(endpoint, params).await
    }

    async fn send(&self, endpoint: &str, data: JsonValue) -> Result<SendOutcome> {
        self.connector().send_data(endpoint, data).await
    }
}

/// Auth provider that reads an [`AuthConfig`] straight from its parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAuthProvider;

impl AuthProvider for StaticAuthProvider {
    fn authenticate(&self, params: &ValueMap) -> Result<AuthConfig> {
        let value = JsonValue::Object(params.clone().into_iter().collect());
        Ok(serde_json::from_value(value)?)
    }
}
