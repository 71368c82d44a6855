//! Streaming operations of the connector and the SSE convenience wrapper

use super::api::ApiConnector;
use super::types::RequestDescriptor;
use crate::config::{ConnectorConfig, EndpointConfig, SseSettings};
use crate::error::{Error, Result};
use crate::sse::{
    ConsumeOptions, ConsumeSession, ConsumeSummary, SseEvent, SseStream, StreamOptions,
    StreamSession,
};
use crate::types::{StringMap, ValueMap};

/// Endpoint name used by [`SseConnector`] when none is given
pub const DEFAULT_SSE_ENDPOINT: &str = "events";

/// Path of the default SSE endpoint
pub const DEFAULT_SSE_PATH: &str = "/events";

fn set_default_header(headers: &mut StringMap, name: &str, value: &str) {
    if !headers.keys().any(|key| key.eq_ignore_ascii_case(name)) {
        headers.insert(name.to_string(), value.to_string());
    }
}

impl ApiConnector {
    /// Build the request for (re)opening an event stream.
    ///
    /// Adds `Accept: text/event-stream` and `Cache-Control: no-cache` unless
    /// already configured, and `Last-Event-ID` when resuming.
    pub fn build_sse_request(
        &self,
        endpoint_name: &str,
        params: Option<&ValueMap>,
        last_event_id: Option<&str>,
    ) -> Result<RequestDescriptor> {
        let mut request = self.prepare_request(endpoint_name, params)?;
        set_default_header(&mut request.headers, "Accept", "text/event-stream");
        set_default_header(&mut request.headers, "Cache-Control", "no-cache");
        if let Some(id) = last_event_id.filter(|id| !id.is_empty()) {
            request
                .headers
                .insert("Last-Event-ID".to_string(), id.to_string());
        }
        Ok(request)
    }

    /// Open a lazily consumed event stream.
    ///
    /// Nothing is sent until the stream is first polled. Dropping the stream
    /// closes the connection.
    pub fn stream_sse(
        &self,
        endpoint_name: &str,
        params: Option<ValueMap>,
        options: &StreamOptions,
    ) -> Result<SseStream<'_>> {
        let endpoint = self.endpoint(endpoint_name)?;
        let resolved = options.resolve(endpoint.sse.as_ref(), self.config().timeout());
        Ok(StreamSession::new(self, endpoint_name, params, resolved).into_stream())
    }

    /// Consume a stream in chunks, recording each raw chunk
    pub async fn consume_sse(
        &self,
        endpoint_name: &str,
        params: Option<ValueMap>,
        options: &ConsumeOptions,
    ) -> Result<ConsumeSummary<Vec<SseEvent>>> {
        self.consume_sse_with(endpoint_name, params, options, |chunk| chunk)
            .await
    }

    /// Consume a stream in chunks, recording what `processor` returns for
    /// each chunk.
    ///
    /// Invalid chunk size, buffer size or drop policy fail before connecting.
    pub async fn consume_sse_with<R, F>(
        &self,
        endpoint_name: &str,
        params: Option<ValueMap>,
        options: &ConsumeOptions,
        processor: F,
    ) -> Result<ConsumeSummary<R>>
    where
        F: FnMut(Vec<SseEvent>) -> R,
    {
        let endpoint = self.endpoint(endpoint_name)?;
        let (chunk_size, capacity, policy) = options.resolve(endpoint.sse.as_ref())?;
        let session = ConsumeSession::new(chunk_size, capacity, policy, processor)?;
        let events = self.stream_sse(endpoint_name, params, &options.stream)?;
        session.run(events).await
    }
}

// ============================================================================
// SSE Connector
// ============================================================================

/// Connector preconfigured for a single event stream.
///
/// Calls without an endpoint name go to the default endpoint.
#[derive(Debug)]
pub struct SseConnector {
    inner: ApiConnector,
    default_endpoint: String,
}

impl SseConnector {
    /// Connector with an `events` endpoint at `/events`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::from_connector(ApiConnector::new(Self::default_config(base_url))?)
    }

    /// Config used by [`SseConnector::new`]
    pub fn default_config(base_url: impl Into<String>) -> ConnectorConfig {
        ConnectorConfig::builder(base_url)
            .connector_type("sse")
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .endpoint(
                DEFAULT_SSE_ENDPOINT,
                EndpointConfig::new(DEFAULT_SSE_PATH).sse(SseSettings::default()),
            )
            .build()
    }

    /// Wrap a connector; the default endpoint is `events` if present,
    /// otherwise the first configured one
    pub fn from_connector(inner: ApiConnector) -> Result<Self> {
        let default_endpoint = if inner.config().endpoint(DEFAULT_SSE_ENDPOINT).is_some() {
            DEFAULT_SSE_ENDPOINT.to_string()
        } else {
            inner
                .endpoint_names()
                .first()
                .map(|name| (*name).to_string())
                .ok_or_else(|| Error::config("SSE connector needs at least one endpoint"))?
        };
        Ok(Self {
            inner,
            default_endpoint,
        })
    }

    pub fn default_endpoint(&self) -> &str {
        &self.default_endpoint
    }

    /// The wrapped connector
    pub fn connector(&self) -> &ApiConnector {
        &self.inner
    }

    /// Stream events from `endpoint`, or the default endpoint
    pub fn stream_events(
        &self,
        endpoint: Option<&str>,
        params: Option<ValueMap>,
        options: &StreamOptions,
    ) -> Result<SseStream<'_>> {
        let endpoint = endpoint.unwrap_or(&self.default_endpoint);
        self.inner.stream_sse(endpoint, params, options)
    }

    /// Consume events in chunks from `endpoint`, or the default endpoint
    pub async fn consume_events(
        &self,
        endpoint: Option<&str>,
        params: Option<ValueMap>,
        options: &ConsumeOptions,
    ) -> Result<ConsumeSummary<Vec<SseEvent>>> {
        let endpoint = endpoint.unwrap_or(&self.default_endpoint);
        self.inner.consume_sse(endpoint, params, options).await
    }

    /// Like [`SseConnector::consume_events`] with a chunk processor
    pub async fn consume_events_with<R, F>(
        &self,
        endpoint: Option<&str>,
        params: Option<ValueMap>,
        options: &ConsumeOptions,
        processor: F,
    ) -> Result<ConsumeSummary<R>>
    where
        F: FnMut(Vec<SseEvent>) -> R,
    {
        let endpoint = endpoint.unwrap_or(&self.default_endpoint);
        self.inner
            .consume_sse_with(endpoint, params, options, processor)
            .await
    }
}
