//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, StreamArgs};
use crate::config::{secs_to_duration, ConnectorConfig};
use crate::connector::ApiConnector;
use crate::error::{Error, Result};
use crate::loader::load_connector;
use crate::plugins::{Connector, PluginRegistry};
use crate::sse::{ConsumeOptions, StreamOptions};
use crate::types::{JsonValue, ValueMap};
use futures::StreamExt;
use serde_json::json;
use std::fs;
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
    registry: PluginRegistry,
}

impl Runner {
    /// Create a new runner with the built-in plugins
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            registry: PluginRegistry::with_builtins(),
        }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let result = match &self.cli.command {
            Commands::Endpoints => self.endpoints(),
            Commands::Check => self.check().await,
            Commands::Fetch { endpoint, params } => {
                self.fetch(endpoint, params.as_deref()).await
            }
            Commands::Send {
                endpoint,
                data,
                data_file,
            } => {
                let payload = match (data, data_file) {
                    (Some(inline), _) => parse_json(inline, "data")?,
                    (None, Some(path)) => {
                        let content = fs::read_to_string(path).map_err(|e| {
                            Error::config(format!("Failed to read data file: {e}"))
                        })?;
                        parse_json(&content, "data")?
                    }
                    (None, None) => {
                        return Err(Error::config("Provide --data or --data-file"));
                    }
                };
                self.send(endpoint, payload).await
            }
            Commands::Stream { endpoint, stream } => self.stream(endpoint, stream).await,
            Commands::Consume {
                endpoint,
                stream,
                chunk_size,
                buffer_size,
                drop_policy,
            } => {
                let options = ConsumeOptions {
                    stream: stream_options(stream),
                    chunk_size: *chunk_size,
                    backpressure_buffer_size: *buffer_size,
                    drop_policy: drop_policy.clone(),
                };
                self.consume(endpoint, stream.params.as_deref(), &options)
                    .await
            }
        };

        if let Err(e) = &result {
            if let Some(api) = e.as_api() {
                self.output_message(&json!({ "type": "ERROR", "error": api }));
            }
        }
        result
    }

    /// Load connector definition
    fn load_config(&self) -> Result<ConnectorConfig> {
        let path = self
            .cli
            .connector
            .as_ref()
            .ok_or_else(|| Error::config("Connector file not specified (use -c flag)"))?;
        load_connector(path)
    }

    /// Instantiate the connector plugin named by the config's type
    fn plugin(&self) -> Result<Box<dyn Connector>> {
        let config = self.load_config()?;
        let kind = config.connector_type.clone();
        debug!(connector_type = %kind, "Creating connector");
        self.registry.connector(&kind, config)
    }

    /// List endpoints
    fn endpoints(&self) -> Result<()> {
        let config = self.load_config()?;
        for (name, endpoint) in &config.endpoints {
            self.output_message(&json!({
                "type": "ENDPOINT",
                "endpoint": {
                    "name": name,
                    "method": endpoint.method.as_str(),
                    "path": endpoint.path,
                    "paginated": endpoint.pagination.is_some(),
                    "streaming": endpoint.sse.is_some(),
                }
            }));
        }
        Ok(())
    }

    /// Check connection
    async fn check(&self) -> Result<()> {
        let connector = self.plugin()?;
        let health = connector.connect().await?;
        info!(status = ?health.status, "Health check finished");
        self.output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": health,
        }));
        Ok(())
    }

    /// Fetch data
    async fn fetch(&self, endpoint: &str, params: Option<&str>) -> Result<()> {
        let params = params.map(parse_params).transpose()?;
        let connector = self.plugin()?;
        let data = connector.fetch(endpoint, params.as_ref()).await?;
        self.output_message(&json!({ "type": "DATA", "endpoint": endpoint, "data": data }));
        Ok(())
    }

    /// Send data
    async fn send(&self, endpoint: &str, payload: JsonValue) -> Result<()> {
        let connector = self.plugin()?;
        let outcome = connector.send(endpoint, payload).await?;
        self.output_message(&json!({
            "type": "SEND_RESULT",
            "endpoint": endpoint,
            "result": outcome,
        }));
        Ok(())
    }

    /// Print events as they arrive
    async fn stream(&self, endpoint: &str, args: &StreamArgs) -> Result<()> {
        let params = args.params.as_deref().map(parse_params).transpose()?;
        let connector = ApiConnector::new(self.load_config()?)?;
        let options = stream_options(args);

        let mut events = connector.stream_sse(endpoint, params, &options)?;
        let mut count = 0usize;
        while let Some(event) = events.next().await {
            let event = event?;
            count += 1;
            self.output_message(&json!({ "type": "EVENT", "event": event }));
        }
        info!(endpoint = %endpoint, events = count, "Stream finished");
        Ok(())
    }

    /// Consume events in chunks
    async fn consume(
        &self,
        endpoint: &str,
        params: Option<&str>,
        options: &ConsumeOptions,
    ) -> Result<()> {
        let params = params.map(parse_params).transpose()?;
        let connector = ApiConnector::new(self.load_config()?)?;

        let summary = connector
            .consume_sse_with(endpoint, params, options, |chunk| chunk.len())
            .await?;
        self.output_message(&json!({ "type": "CONSUME_SUMMARY", "summary": summary }));
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &JsonValue) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn parse_json(input: &str, what: &str) -> Result<JsonValue> {
    serde_json::from_str(input).map_err(|e| Error::config(format!("Invalid {what} JSON: {e}")))
}

/// Parse `--params` into a parameter map; it must be a JSON object
fn parse_params(input: &str) -> Result<ValueMap> {
    match parse_json(input, "params")? {
        JsonValue::Object(map) => Ok(map.into_iter().collect()),
        other => Err(Error::config(format!(
            "params must be a JSON object, got {other}"
        ))),
    }
}

fn stream_options(args: &StreamArgs) -> StreamOptions {
    StreamOptions {
        max_events: args.max_events,
        reconnect: args.no_reconnect.then_some(false),
        reconnect_delay: args.reconnect_delay.map(secs_to_duration),
        max_reconnect_attempts: args.max_reconnect_attempts,
        read_timeout: args.read_timeout.map(secs_to_duration),
        decode_json: args.raw.then_some(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_parse_params_object() {
        let params = parse_params(r#"{"limit": 5, "q": "rust"}"#).unwrap();
        assert_eq!(params["limit"], 5);
        assert_eq!(params["q"], "rust");
    }

    #[test]
    fn test_parse_params_rejects_non_object() {
        assert!(parse_params("[1, 2]").unwrap_err().is_config());
        assert!(parse_params("{not json").unwrap_err().is_config());
    }

    #[test]
    fn test_stream_options_leave_unset_flags_unset() {
        let options = stream_options(&StreamArgs::default());
        assert_eq!(options, StreamOptions::default());
    }

    #[test]
    fn test_stream_options_from_flags() {
        let args = StreamArgs {
            max_events: Some(3),
            no_reconnect: true,
            reconnect_delay: Some(0.5),
            read_timeout: Some(2.0),
            raw: true,
            ..StreamArgs::default()
        };
        let options = stream_options(&args);
        assert_eq!(options.max_events, Some(3));
        assert_eq!(options.reconnect, Some(false));
        assert_eq!(options.reconnect_delay, Some(Duration::from_millis(500)));
        assert_eq!(options.read_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.decode_json, Some(false));
    }
}
