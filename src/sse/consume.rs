//! Chunked SSE consumption with backpressure
//!
//! A [`ConsumeSession`] holds a bounded buffer of events and flushes it to a
//! processor in chunks. When the buffer is full the drop policy decides
//! whether the oldest event is discarded or the buffer is drained first.

use super::event::SseEvent;
use super::session::StreamOptions;
use crate::config::SseSettings;
use crate::error::{Error, Result};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use tracing::debug;

const DEFAULT_CHUNK_SIZE: usize = 50;
const DEFAULT_BUFFER_SIZE: usize = 500;

/// What to do when an event arrives at a full buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Flush chunks until there is room
    #[default]
    Block,
    /// Discard the oldest buffered event
    DropOldest,
}

impl DropPolicy {
    /// Config name of the policy
    pub fn as_str(&self) -> &'static str {
        match self {
            DropPolicy::Block => "block",
            DropPolicy::DropOldest => "drop_oldest",
        }
    }
}

impl FromStr for DropPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(DropPolicy::Block),
            "drop_oldest" => Ok(DropPolicy::DropOldest),
            _ => Err(Error::invalid_value(
                "drop_policy",
                format!("must be either 'block' or 'drop_oldest', got '{s}'"),
            )),
        }
    }
}

impl std::fmt::Display for DropPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call consumption options; unset fields fall back like [`StreamOptions`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumeOptions {
    /// Options for the underlying stream
    pub stream: StreamOptions,
    /// Events per chunk (default 50)
    pub chunk_size: Option<usize>,
    /// Buffer capacity (default 500)
    pub backpressure_buffer_size: Option<usize>,
    /// `block` or `drop_oldest` (default `block`)
    pub drop_policy: Option<String>,
}

impl ConsumeOptions {
    /// Options with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the underlying stream options
    #[must_use]
    pub fn stream(mut self, stream: StreamOptions) -> Self {
        self.stream = stream;
        self
    }

    /// Set the chunk size
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Set the buffer capacity
    #[must_use]
    pub fn backpressure_buffer_size(mut self, size: usize) -> Self {
        self.backpressure_buffer_size = Some(size);
        self
    }

    /// Set the drop policy by name
    #[must_use]
    pub fn drop_policy(mut self, policy: impl Into<String>) -> Self {
        self.drop_policy = Some(policy.into());
        self
    }

    /// Resolve chunk size, capacity and policy, rejecting invalid values
    pub fn resolve(&self, settings: Option<&SseSettings>) -> Result<(usize, usize, DropPolicy)> {
        let chunk_size = self
            .chunk_size
            .or(settings.and_then(|s| s.chunk_size))
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        let buffer_size = self
            .backpressure_buffer_size
            .or(settings.and_then(|s| s.backpressure_buffer_size))
            .unwrap_or(DEFAULT_BUFFER_SIZE);
        let policy = match self
            .drop_policy
            .as_deref()
            .or(settings.and_then(|s| s.drop_policy.as_deref()))
        {
            Some(name) => name.parse()?,
            None => DropPolicy::default(),
        };

        if chunk_size == 0 {
            return Err(Error::invalid_value("chunk_size", "must be > 0"));
        }
        if buffer_size == 0 {
            return Err(Error::invalid_value("backpressure_buffer_size", "must be > 0"));
        }
        Ok((chunk_size, buffer_size, policy))
    }
}

/// Outcome of one consume call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumeSummary<R> {
    pub success: bool,
    /// Events handed to the processor
    pub processed_events: usize,
    pub chunks_processed: usize,
    /// Events discarded under `drop_oldest`
    pub dropped_events: usize,
    pub chunk_size: usize,
    pub buffer_max_size: usize,
    /// One entry per chunk, in flush order
    pub results: Vec<R>,
}

/// Bounded buffer feeding chunks to a processor
pub struct ConsumeSession<R, F>
where
    F: FnMut(Vec<SseEvent>) -> R,
{
    chunk_size: usize,
    capacity: usize,
    policy: DropPolicy,
    buffer: VecDeque<SseEvent>,
    processor: F,
    results: Vec<R>,
    processed_events: usize,
    chunks_processed: usize,
    dropped_events: usize,
}

impl<R, F> ConsumeSession<R, F>
where
    F: FnMut(Vec<SseEvent>) -> R,
{
    /// Create a session; sizes must be non-zero
    pub fn new(
        chunk_size: usize,
        capacity: usize,
        policy: DropPolicy,
        processor: F,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid_value("chunk_size", "must be > 0"));
        }
        if capacity == 0 {
            return Err(Error::invalid_value("backpressure_buffer_size", "must be > 0"));
        }
        Ok(Self {
            chunk_size,
            capacity,
            policy,
            buffer: VecDeque::with_capacity(capacity),
            processor,
            results: Vec::new(),
            processed_events: 0,
            chunks_processed: 0,
            dropped_events: 0,
        })
    }

    /// Admit one event, applying the drop policy if the buffer is full
    pub fn push(&mut self, event: SseEvent) {
        while self.buffer.len() >= self.capacity {
            match self.policy {
                DropPolicy::DropOldest => {
                    self.buffer.pop_front();
                    self.dropped_events += 1;
                    break;
                }
                DropPolicy::Block => {
                    if !self.flush(false) {
                        self.flush(true);
                        break;
                    }
                }
            }
        }

        self.buffer.push_back(event);
        self.flush(false);
    }

    /// Flush one full chunk, or everything when `force` is set.
    ///
    /// Returns whether anything was flushed.
    fn flush(&mut self, force: bool) -> bool {
        let mut flushed = false;
        while !self.buffer.is_empty() && (force || self.buffer.len() >= self.chunk_size) {
            let take = self.chunk_size.min(self.buffer.len());
            let chunk: Vec<SseEvent> = self.buffer.drain(..take).collect();
            self.chunks_processed += 1;
            self.processed_events += chunk.len();
            flushed = true;
            self.results.push((self.processor)(chunk));

            if !force {
                break;
            }
        }
        flushed
    }

    /// Drain the buffer and produce the summary
    pub fn finish(mut self) -> ConsumeSummary<R> {
        self.flush(true);
        debug!(
            processed = self.processed_events,
            chunks = self.chunks_processed,
            dropped = self.dropped_events,
            "SSE consumption finished"
        );
        ConsumeSummary {
            success: true,
            processed_events: self.processed_events,
            chunks_processed: self.chunks_processed,
            dropped_events: self.dropped_events,
            chunk_size: self.chunk_size,
            buffer_max_size: self.capacity,
            results: self.results,
        }
    }

    /// Consume a whole event stream.
    ///
    /// A stream error ends consumption and is returned as is.
    pub async fn run<S>(mut self, events: S) -> Result<ConsumeSummary<R>>
    where
        S: Stream<Item = Result<SseEvent>>,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.push(event?);
        }
        Ok(self.finish())
    }
}
