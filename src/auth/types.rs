//! Auth configuration types
//!
//! Credentials are supplied by the caller (or an [`crate::plugins::AuthProvider`]);
//! nothing here stores or refreshes them.

use serde::{Deserialize, Serialize};

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

/// Authentication configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        #[serde(default)]
        password: String,
    },

    /// Bearer token authentication
    Bearer {
        /// The token value
        token: String,
    },

    /// API Key authentication (header or query)
    ApiKey {
        /// The API key value
        key: String,
        /// Where to place the API key
        #[serde(default)]
        location: Location,
        /// Header name (for header location)
        #[serde(default = "default_header_name")]
        header_name: String,
        /// Query parameter name (for query location)
        #[serde(default = "default_query_param")]
        query_param: String,
    },
}

fn default_header_name() -> String {
    "X-API-Key".to_string()
}

fn default_query_param() -> String {
    "api_key".to_string()
}

impl AuthConfig {
    /// Bearer token auth
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Basic auth
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// API key sent in the default `X-API-Key` header
    pub fn api_key_header(key: impl Into<String>) -> Self {
        Self::ApiKey {
            key: key.into(),
            location: Location::Header,
            header_name: default_header_name(),
            query_param: default_query_param(),
        }
    }

    /// API key sent as the `query_param` query parameter
    pub fn api_key_query(key: impl Into<String>, query_param: impl Into<String>) -> Self {
        Self::ApiKey {
            key: key.into(),
            location: Location::Query,
            header_name: default_header_name(),
            query_param: query_param.into(),
        }
    }

    /// Short name of the auth type
    pub fn type_name(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::ApiKey { .. } => "api_key",
        }
    }

    /// Whether any credentials are configured
    pub fn is_none(&self) -> bool {
        matches!(self, AuthConfig::None)
    }
}
