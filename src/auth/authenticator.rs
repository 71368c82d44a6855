//! Authenticator implementation
//!
//! Turns an [`AuthConfig`] into the headers, query parameters and request
//! decorations each call needs.

use super::types::{AuthConfig, Location};
use crate::types::{JsonValue, StringMap, ValueMap};
use reqwest::RequestBuilder;

/// Applies authentication to outgoing requests
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// The underlying config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Headers derived from credentials (bearer token, API key in header)
    pub fn headers(&self) -> StringMap {
        let mut headers = StringMap::new();
        match &self.config {
            AuthConfig::Bearer { token } => {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
            AuthConfig::ApiKey {
                key,
                location: Location::Header,
                header_name,
                ..
            } => {
                headers.insert(header_name.clone(), key.clone());
            }
            _ => {}
        }
        headers
    }

    /// Query parameters derived from credentials (API key in query)
    pub fn query_params(&self) -> ValueMap {
        let mut params = ValueMap::new();
        if let AuthConfig::ApiKey {
            key,
            location: Location::Query,
            query_param,
            ..
        } = &self.config
        {
            params.insert(query_param.clone(), JsonValue::String(key.clone()));
        }
        params
    }

    /// Apply credentials that live outside the request descriptor
    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config {
            AuthConfig::Basic { username, password } => req.basic_auth(username, Some(password)),
            _ => req,
        }
    }
}
