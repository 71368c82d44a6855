//! YAML Loader module
//!
//! Parse connector definitions from YAML files into a validated
//! [`ConnectorConfig`](crate::config::ConnectorConfig).
//!
//! ```yaml
//! type: rest
//! base_url: https://api.example.com
//! auth:
//!   type: bearer
//!   token: abc
//! endpoints:
//!   users:
//!     path: /users
//!     pagination:
//!       data_path: data
//!       next_page_path: meta.next
//! ```

mod parser;

pub use parser::{load_connector, load_connector_from_str, validate_connector};
