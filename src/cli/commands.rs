//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// apilinker CLI
#[derive(Parser, Debug)]
#[command(name = "apilinker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Connector definition file (YAML)
    #[arg(short, long, global = true)]
    pub connector: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured endpoints
    Endpoints,

    /// Check that the API is reachable
    Check,

    /// Fetch data from an endpoint (follows pagination)
    Fetch {
        /// Endpoint name
        endpoint: String,

        /// Call parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },

    /// Send data to an endpoint (arrays are sent item by item)
    Send {
        /// Endpoint name
        endpoint: String,

        /// Payload as inline JSON
        #[arg(long, conflicts_with = "data_file")]
        data: Option<String>,

        /// Payload read from a JSON file
        #[arg(long)]
        data_file: Option<PathBuf>,
    },

    /// Stream server-sent events, one JSON line per event
    Stream {
        /// Endpoint name
        endpoint: String,

        #[command(flatten)]
        stream: StreamArgs,
    },

    /// Consume server-sent events in chunks and print the summary
    Consume {
        /// Endpoint name
        endpoint: String,

        #[command(flatten)]
        stream: StreamArgs,

        /// Events per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Buffer capacity
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Buffer overflow policy (`block` or `drop_oldest`)
        #[arg(long)]
        drop_policy: Option<String>,
    },
}

/// Options shared by `stream` and `consume`
#[derive(Args, Debug, Clone, Default)]
pub struct StreamArgs {
    /// Call parameters as a JSON object
    #[arg(long)]
    pub params: Option<String>,

    /// Stop after this many events
    #[arg(long)]
    pub max_events: Option<usize>,

    /// Do not reconnect after errors or closes
    #[arg(long)]
    pub no_reconnect: bool,

    /// Delay before reconnecting, in seconds
    #[arg(long)]
    pub reconnect_delay: Option<f64>,

    /// Give up after this many reconnects
    #[arg(long)]
    pub max_reconnect_attempts: Option<u32>,

    /// Per-read timeout, in seconds
    #[arg(long)]
    pub read_timeout: Option<f64>,

    /// Keep event data as raw strings
    #[arg(long)]
    pub raw: bool,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
