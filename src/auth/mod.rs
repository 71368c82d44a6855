//! Authentication module
//!
//! Supports: Basic, Bearer, API Key (header or query)
//!
//! The `Authenticator` contributes headers and query parameters to each
//! request descriptor, and applies Basic credentials directly to the
//! outgoing request.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, Location};

#[cfg(test)]
mod tests;
