//! YAML parser for connector definitions
//!
//! Parses and validates connector YAML files.

use crate::config::{ConnectorConfig, EndpointConfig, SseSettings};
use crate::error::{Error, Result};
use crate::sse::DropPolicy;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Load a connector definition from a YAML file
pub fn load_connector(path: impl AsRef<Path>) -> Result<ConnectorConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read connector file '{}': {}",
            path.display(),
            e
        ))
    })?;
    debug!(path = %path.display(), "Loading connector definition");
    load_connector_from_str(&content)
}

/// Load a connector definition from a YAML string
pub fn load_connector_from_str(yaml: &str) -> Result<ConnectorConfig> {
    let config: ConnectorConfig = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse connector YAML: {e}")))?;

    validate_connector(&config)?;
    Ok(config)
}

/// Validate a connector definition
pub fn validate_connector(config: &ConnectorConfig) -> Result<()> {
    if config.base_url.trim().is_empty() {
        return Err(Error::config("Connector base_url cannot be empty"));
    }

    if config.endpoints.is_empty() {
        return Err(Error::config("Connector must have at least one endpoint"));
    }

    validate_secs("timeout", config.timeout_secs, true)?;
    validate_secs("retry_delay", config.retry_delay_secs, false)?;

    for (name, endpoint) in &config.endpoints {
        validate_endpoint(name, endpoint)?;
    }

    Ok(())
}

fn validate_endpoint(name: &str, endpoint: &EndpointConfig) -> Result<()> {
    if endpoint.path.trim().is_empty() {
        return Err(Error::config(format!(
            "Endpoint '{name}' path cannot be empty"
        )));
    }

    if let Some(rate_limit) = &endpoint.rate_limit {
        rate_limit
            .validate()
            .map_err(|e| Error::config(format!("Endpoint '{name}': {e}")))?;
    }

    if let Some(pagination) = &endpoint.pagination {
        if pagination.page_param.is_empty() {
            return Err(Error::config(format!(
                "Endpoint '{name}' pagination page_param cannot be empty"
            )));
        }
    }

    if let Some(sse) = &endpoint.sse {
        validate_sse(name, sse)?;
    }

    Ok(())
}

fn validate_sse(name: &str, sse: &SseSettings) -> Result<()> {
    if sse.chunk_size == Some(0) {
        return Err(Error::config(format!(
            "Endpoint '{name}' sse.chunk_size must be > 0"
        )));
    }
    if sse.backpressure_buffer_size == Some(0) {
        return Err(Error::config(format!(
            "Endpoint '{name}' sse.backpressure_buffer_size must be > 0"
        )));
    }
    if let Some(policy) = &sse.drop_policy {
        policy
            .parse::<DropPolicy>()
            .map_err(|e| Error::config(format!("Endpoint '{name}': {e}")))?;
    }
    if let Some(secs) = sse.reconnect_delay {
        validate_secs(&format!("{name}.sse.reconnect_delay"), secs, false)?;
    }
    if let Some(secs) = sse.read_timeout {
        validate_secs(&format!("{name}.sse.read_timeout"), secs, true)?;
    }
    Ok(())
}

/// Check a seconds value fits in a `Duration`, optionally requiring it be > 0
fn validate_secs(field: &str, secs: f64, positive: bool) -> Result<()> {
    if Duration::try_from_secs_f64(secs).is_err() {
        return Err(Error::invalid_value(
            field,
            format!("must be a non-negative number of seconds in range, got {secs}"),
        ));
    }
    if positive && secs <= 0.0 {
        return Err(Error::invalid_value(field, format!("must be > 0, got {secs}")));
    }
    Ok(())
}
