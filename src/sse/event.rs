//! SSE event types

use crate::types::JsonValue;
use serde::{Deserialize, Serialize};

/// Default event name when a block has no (or an empty) `event:` field
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Value of the `id:` field
    pub id: Option<String>,
    /// Value of the `event:` field
    pub event: String,
    /// Decoded JSON payload, or the raw string when decoding is off or fails
    pub data: JsonValue,
    /// Server-requested reconnect delay in milliseconds
    pub retry: Option<u64>,
    /// `data:` lines joined with `\n`
    pub raw_data: String,
}

impl SseEvent {
    /// A plain `message` event carrying `data`
    pub fn message(data: impl Into<JsonValue>) -> Self {
        let data = data.into();
        let raw_data = match &data {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            id: None,
            event: DEFAULT_EVENT_NAME.to_string(),
            data,
            retry: None,
            raw_data,
        }
    }

    /// Set the event ID
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the event name
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }
}

/// A parsed event block.
///
/// Blocks without `data:` lines only carry control information (`id`,
/// `retry`) and are never dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct SseBlock {
    event: SseEvent,
    has_data: bool,
}

impl SseBlock {
    pub(crate) fn new(event: SseEvent, has_data: bool) -> Self {
        Self { event, has_data }
    }

    /// Whether this block should reach the caller
    pub fn is_dispatchable(&self) -> bool {
        self.has_data
    }

    /// The event's `id`, if valid
    pub fn id(&self) -> Option<&str> {
        self.event.id.as_deref()
    }

    /// The event's `retry` hint
    pub fn retry(&self) -> Option<u64> {
        self.event.retry
    }

    /// Take the event, or `None` for control-only blocks
    pub fn into_event(self) -> Option<SseEvent> {
        self.has_data.then_some(self.event)
    }
}
