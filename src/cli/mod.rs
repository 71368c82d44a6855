//! CLI module
//!
//! Command-line interface for running connectors.
//!
//! # Commands
//!
//! - `endpoints` - List configured endpoints
//! - `check` - Test connection to the API
//! - `fetch` - Fetch data from an endpoint
//! - `send` - Send data to an endpoint
//! - `stream` - Print server-sent events as they arrive
//! - `consume` - Consume server-sent events in chunks

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, StreamArgs};
pub use runner::Runner;
