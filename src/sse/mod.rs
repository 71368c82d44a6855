//! Server-Sent Events engine
//!
//! - [`parse_sse_event`] parses one event block
//! - [`StreamSession`] runs the connect / stream / reconnect loop
//! - [`ConsumeSession`] batches events into chunks with bounded buffering
//!
//! ```text
//! CONNECTING ──> STREAMING ──> closed / failed ──> (sleep) ──> CONNECTING
//!                     │                │
//!                     └── max events ──┴── reconnect off / attempts exhausted ──> DONE
//! ```

mod consume;
mod event;
mod parser;
mod session;

pub use consume::{ConsumeOptions, ConsumeSession, ConsumeSummary, DropPolicy};
pub use event::{SseBlock, SseEvent, DEFAULT_EVENT_NAME};
pub use parser::{decode_data, parse_sse_event, LineBuffer, MAX_LINE_BYTES};
pub use session::{ResolvedStreamOptions, SseStream, StreamOptions, StreamSession, StreamState};
