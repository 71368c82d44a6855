// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # apilinker
//!
//! A configuration-driven client for REST APIs and server-sent event streams.
//!
//! ## Features
//!
//! - **Request pipeline**: endpoint definitions in YAML, header/param merging,
//!   retries with linear backoff, structured errors
//! - **Pagination**: next-page tokens or page counters, merged into one list
//! - **Rate limiting**: token or leaky bucket per endpoint, tuned by server headers
//! - **SSE**: resumable event streams with reconnects and `Last-Event-ID`
//! - **Backpressure**: chunked consumption with `block` or `drop_oldest` buffers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apilinker::{load_connector, ApiConnector, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = load_connector("connectors/github.yaml")?;
//!     let connector = ApiConnector::new(config)?;
//!
//!     let issues = connector.fetch_data("issues", None).await?;
//!     println!("{}", serde_json::to_string_pretty(&issues)?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          ApiConnector                            │
//! │  fetch_data()   send_data()   stream_sse()   consume_sse()       │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │
//! ┌───────────┬────────────┬──────┴──────┬────────────┬──────────────┐
//! │   Auth    │ RateLimit  │  Paginate   │   Schema   │     SSE      │
//! ├───────────┼────────────┼─────────────┼────────────┼──────────────┤
//! │ Basic     │ Token      │ Next token  │ Request    │ Parser       │
//! │ Bearer    │ Leaky      │ Page count  │ Response   │ Reconnect    │
//! │ API key   │ Headers    │             │            │ Backpressure │
//! └───────────┴────────────┴─────────────┴────────────┴──────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types and the failure taxonomy
pub mod error;

/// Common types and type aliases
pub mod types;

/// Injectable sleeping for retries, reconnects and rate limits
pub mod sleep;

/// Authentication settings
pub mod auth;

/// Connector and endpoint configuration
pub mod config;

/// Client-side rate limiting
pub mod ratelimit;

/// Payload validation against JSON schemas
pub mod schema;

/// Pagination walking
pub mod pagination;

/// Server-sent event parsing, streaming and consumption
pub mod sse;

/// The connector: request pipeline, fetch, send and streaming
pub mod connector;

/// Plugin capability traits and registry
pub mod plugins;

/// YAML loader for connector definitions
pub mod loader;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{ApiError, Error, ErrorCategory, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::AuthConfig;
pub use config::{ConnectorConfig, EndpointConfig, PaginationSpec, SseSettings};
pub use connector::{ApiConnector, NormalizedData, SendOutcome, SseConnector};
pub use loader::{load_connector, load_connector_from_str};
pub use sleep::{RecordingSleeper, Sleeper, TokioSleeper};
pub use sse::{ConsumeOptions, ConsumeSummary, SseEvent, StreamOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
