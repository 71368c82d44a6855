//! SSE stream loop
//!
//! A [`StreamSession`] owns the state of one `stream_sse` call across
//! reconnects: the live connection, the partially received block, the last
//! event ID and the reconnect bookkeeping. It is driven one event at a time
//! by [`StreamSession::next_event`], which is what the public stream pulls on.

use super::event::SseEvent;
use super::parser::{parse_sse_event, LineBuffer};
use crate::config::{secs_to_duration, SseSettings};
use crate::connector::{ApiConnector, RequestDescriptor};
use crate::error::{ApiError, Error, Result};
use crate::types::ValueMap;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

/// Lazily pulled sequence of events from one `stream_sse` call
pub type SseStream<'a> = BoxStream<'a, Result<SseEvent>>;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Options
// ============================================================================

/// Per-call streaming options.
///
/// Each field left as `None` falls back to the endpoint's `sse` settings,
/// then to the built-in default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamOptions {
    /// Stop after this many dispatched events (default: unlimited)
    pub max_events: Option<usize>,
    /// Reconnect after errors and clean closes (default: true)
    pub reconnect: Option<bool>,
    /// Delay before reconnecting (default: 1s)
    pub reconnect_delay: Option<Duration>,
    /// Give up after this many reconnects (default: unlimited)
    pub max_reconnect_attempts: Option<u32>,
    /// Per-read timeout (default: the connector timeout)
    pub read_timeout: Option<Duration>,
    /// Decode event data as JSON (default: true)
    pub decode_json: Option<bool>,
}

impl StreamOptions {
    /// Options with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `max` events
    #[must_use]
    pub fn max_events(mut self, max: usize) -> Self {
        self.max_events = Some(max);
        self
    }

    /// Enable or disable reconnecting
    #[must_use]
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = Some(reconnect);
        self
    }

    /// Set the reconnect delay
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Cap the number of reconnects
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Set the per-read timeout
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Enable or disable JSON decoding of event data
    #[must_use]
    pub fn decode_json(mut self, decode: bool) -> Self {
        self.decode_json = Some(decode);
        self
    }

    /// Resolve against endpoint settings and the connector timeout
    pub fn resolve(
        &self,
        settings: Option<&SseSettings>,
        default_timeout: Duration,
    ) -> ResolvedStreamOptions {
        let settings = settings.cloned().unwrap_or_default();
        ResolvedStreamOptions {
            max_events: self.max_events.or(settings.max_events),
            reconnect: self.reconnect.or(settings.reconnect).unwrap_or(true),
            reconnect_delay: self
                .reconnect_delay
                .or(settings.reconnect_delay.map(secs_to_duration))
                .unwrap_or(DEFAULT_RECONNECT_DELAY),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .or(settings.max_reconnect_attempts),
            read_timeout: self
                .read_timeout
                .or(settings.read_timeout.map(secs_to_duration))
                .unwrap_or(default_timeout),
            decode_json: self.decode_json.or(settings.decode_json).unwrap_or(true),
        }
    }
}

/// Streaming options after precedence has been applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStreamOptions {
    pub max_events: Option<usize>,
    pub reconnect: bool,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: Option<u32>,
    pub read_timeout: Duration,
    pub decode_json: bool,
}

// ============================================================================
// State
// ============================================================================

/// Reconnect bookkeeping for one stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    /// Most recent valid event ID, sent as `Last-Event-ID` on reconnect
    pub last_event_id: Option<String>,
    /// Delay before the next reconnect (updated by `retry:` hints)
    pub effective_reconnect_delay: Duration,
    /// Reconnects attempted so far (never reset)
    pub reconnect_attempts: u32,
    /// Events dispatched so far
    pub received_events: usize,
}

enum Phase {
    Connecting,
    Streaming(Connection),
    Done,
}

struct Connection {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    lines: LineBuffer,
    pending: Vec<String>,
}

// ============================================================================
// Session
// ============================================================================

/// State machine behind one `stream_sse` call
pub struct StreamSession<'a> {
    connector: &'a ApiConnector,
    endpoint: String,
    params: Option<ValueMap>,
    options: ResolvedStreamOptions,
    state: StreamState,
    phase: Phase,
    ready: VecDeque<SseEvent>,
    last_request: Option<RequestDescriptor>,
}

impl<'a> StreamSession<'a> {
    /// Start a session; nothing is sent until the first pull
    pub fn new(
        connector: &'a ApiConnector,
        endpoint: impl Into<String>,
        params: Option<ValueMap>,
        options: ResolvedStreamOptions,
    ) -> Self {
        let state = StreamState {
            effective_reconnect_delay: options.reconnect_delay,
            ..StreamState::default()
        };
        let phase = if options.max_events == Some(0) {
            Phase::Done
        } else {
            Phase::Connecting
        };
        Self {
            connector,
            endpoint: endpoint.into(),
            params,
            options,
            state,
            phase,
            ready: VecDeque::new(),
            last_request: None,
        }
    }

    /// Current reconnect bookkeeping
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Turn the session into a lazily pulled stream
    pub fn into_stream(self) -> SseStream<'a> {
        let span = self.connector.span().clone();
        stream::unfold(self, move |mut session| {
            let span = span.clone();
            async move {
                let item = session.next_event().instrument(span).await?;
                Some((item, session))
            }
        })
        .boxed()
    }

    /// Pull the next event, reconnecting as needed.
    ///
    /// Returns `None` once the stream is finished; after an `Err` the
    /// session is finished too.
    pub async fn next_event(&mut self) -> Option<Result<SseEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }

            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Done => return None,
                Phase::Connecting => match self.connect().await {
                    Ok(connection) => self.phase = Phase::Streaming(connection),
                    Err(e) if e.is_config() => return Some(Err(e)),
                    Err(e) => {
                        if let Some(err) = self.on_failure(e).await {
                            return Some(Err(err));
                        }
                    }
                },
                Phase::Streaming(mut connection) => {
                    let read_timeout = self.options.read_timeout;
                    match tokio::time::timeout(read_timeout, connection.body.next()).await {
                        Err(_) => {
                            let timeout_ms = read_timeout.as_millis() as u64;
                            let error = Error::Timeout { timeout_ms };
                            if let Some(err) = self.on_failure(error).await {
                                return Some(Err(err));
                            }
                        }
                        Ok(Some(Err(e))) => {
                            if let Some(err) = self.on_failure(Error::Http(e)).await {
                                return Some(Err(err));
                            }
                        }
                        Ok(Some(Ok(chunk))) => match connection.lines.push(&chunk) {
                            Ok(lines) => {
                                if self.feed_lines(&mut connection, lines) {
                                    self.phase = Phase::Streaming(connection);
                                }
                            }
                            Err(e) => {
                                if let Some(err) = self.on_failure(e).await {
                                    return Some(Err(err));
                                }
                            }
                        },
                        Ok(None) => {
                            // Flush a trailing block the server never terminated.
                            if let Some(rest) = connection.lines.finish() {
                                connection.pending.push(rest);
                            }
                            if !connection.pending.is_empty() {
                                let trailing = std::mem::take(&mut connection.pending);
                                self.dispatch_block(&trailing);
                            }
                            drop(connection);
                            if !self.reached_max() {
                                self.on_clean_close().await;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn connect(&mut self) -> Result<Connection> {
        let request = self.connector.build_sse_request(
            &self.endpoint,
            self.params.as_ref(),
            self.state.last_event_id.as_deref(),
        )?;
        self.last_request = Some(request.clone());

        self.connector
            .rate_limit_manager()
            .acquire(&self.endpoint, self.connector.sleeper())
            .await;

        let read_timeout = self.options.read_timeout;
        let response = tokio::time::timeout(read_timeout, self.connector.execute(&request, None))
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: read_timeout.as_millis() as u64,
            })??;

        self.connector
            .rate_limit_manager()
            .update_from_response(&self.endpoint, response.headers());

        let status = response.status();
        if !status.is_success() {
            // A stalled error body must not outlive the read timeout.
            let body = tokio::time::timeout(read_timeout, response.text())
                .await
                .ok()
                .and_then(std::result::Result::ok)
                .unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }

        info!(
            endpoint = %self.endpoint,
            method = %request.method,
            url = %request.url,
            "Connected to SSE endpoint"
        );

        Ok(Connection {
            body: response.bytes_stream().boxed(),
            lines: LineBuffer::new(),
            pending: Vec::new(),
        })
    }

    /// Feed completed lines; returns false once `max_events` is reached
    fn feed_lines(&mut self, connection: &mut Connection, lines: Vec<String>) -> bool {
        for line in lines {
            if line.is_empty() {
                let block = std::mem::take(&mut connection.pending);
                self.dispatch_block(&block);
                if self.reached_max() {
                    return false;
                }
            } else {
                connection.pending.push(line);
            }
        }
        true
    }

    /// Apply a block's control fields and queue it if it carries data
    fn dispatch_block(&mut self, lines: &[String]) {
        let Some(block) = parse_sse_event(lines, self.options.decode_json) else {
            return;
        };

        if let Some(retry_ms) = block.retry() {
            self.state.effective_reconnect_delay = Duration::from_millis(retry_ms);
        }
        if let Some(id) = block.id().filter(|id| !id.is_empty()) {
            self.state.last_event_id = Some(id.to_string());
        }

        if let Some(event) = block.into_event() {
            self.state.received_events += 1;
            self.ready.push_back(event);
        }
    }

    fn reached_max(&self) -> bool {
        self.options
            .max_events
            .is_some_and(|max| self.state.received_events >= max)
    }

    /// Decide what a failure means: `Some(error)` ends the stream,
    /// `None` means we slept and will reconnect.
    async fn on_failure(&mut self, error: Error) -> Option<Error> {
        if !self.options.reconnect {
            return Some(self.stream_error(&error));
        }

        self.state.reconnect_attempts += 1;
        if self.attempts_exhausted() {
            return Some(self.stream_error(&error));
        }

        let delay = self.state.effective_reconnect_delay;
        warn!(
            endpoint = %self.endpoint,
            error = %error,
            delay_secs = delay.as_secs_f64(),
            attempt = self.state.reconnect_attempts,
            "SSE stream error, reconnecting"
        );
        self.connector.sleeper().sleep(delay).await;
        self.phase = Phase::Connecting;
        None
    }

    async fn on_clean_close(&mut self) {
        if !self.options.reconnect {
            debug!(endpoint = %self.endpoint, "SSE stream closed");
            return;
        }

        self.state.reconnect_attempts += 1;
        if self.attempts_exhausted() {
            debug!(
                endpoint = %self.endpoint,
                "SSE stream closed, reconnect attempts exhausted"
            );
            return;
        }

        let delay = self.state.effective_reconnect_delay;
        info!(
            endpoint = %self.endpoint,
            delay_secs = delay.as_secs_f64(),
            attempt = self.state.reconnect_attempts,
            "SSE stream closed, reconnecting"
        );
        self.connector.sleeper().sleep(delay).await;
        self.phase = Phase::Connecting;
    }

    fn attempts_exhausted(&self) -> bool {
        self.options
            .max_reconnect_attempts
            .is_some_and(|max| self.state.reconnect_attempts > max)
    }

    fn stream_error(&self, error: &Error) -> Error {
        let mut api = ApiError::from_error(
            format!("Failed to stream SSE from {}: {error}", self.endpoint),
            error,
        )
        .with_context("endpoint", self.endpoint.clone());
        if let Some(request) = &self.last_request {
            api = api.with_request(request.url.clone(), request.method.as_str());
        }
        Error::api(api)
    }
}

impl std::fmt::Debug for StreamSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("buffered", &self.ready.len())
            .finish_non_exhaustive()
    }
}
