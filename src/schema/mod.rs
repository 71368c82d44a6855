//! Schema validation module
//!
//! Validation is an optional collaborator: connectors hold an
//! `Option<Arc<dyn SchemaValidator>>` and skip validation entirely when it
//! is `None`.

mod types;
mod validator;

pub use types::{JsonType, SchemaDiff, ValidationOutcome};
pub use validator::{pretty_print_diffs, BasicSchemaValidator, SchemaValidator};

#[cfg(test)]
mod tests;
