//! API connector
//!
//! The connector composes the request pipeline:
//!
//! ```text
//! fetch_data ──> prepare_request ──> rate limit ──> HTTP ──> process_response ──> pagination
//! stream_sse ──> build_sse_request ──> rate limit ──> HTTP stream ──> SSE parser ──> caller
//! ```
//!
//! Failed fetches and single sends are retried `retry_count` times with a
//! linearly growing delay; SSE failures go through the reconnect loop
//! instead.

mod api;
mod sse;
mod types;

pub use api::{ApiConnector, ApiConnectorBuilder};
pub use sse::{SseConnector, DEFAULT_SSE_ENDPOINT, DEFAULT_SSE_PATH};
pub use types::{
    BatchReport, HealthCheckResult, HealthStatus, NormalizedData, RawResponse, RequestDescriptor,
    SendOutcome,
};

#[cfg(test)]
mod tests;
