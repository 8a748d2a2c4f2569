//! Selection, merge, and formatting rules for scoped notice publication.
//!
//! Everything here is pure: callers hand in raw documents and a reference
//! instant, and get back the per-scope lists ready to be written.

pub mod catalog;
pub mod format;
pub mod identity;
pub mod item;
pub mod loader;
pub mod pipeline;
pub mod schema;
pub mod selection;

pub use format::{format_selection, render_compact, render_pretty, PublishedBucket};
pub use identity::IdentityGuard;
pub use item::{format_timestamp, parse_timestamp, Item, Scope, COMMON_SCOPE};
pub use loader::{load_clients, load_items, parse_document};
pub use pipeline::{prepare, Documents, Prepared};
pub use schema::{allowed_channels, JsonSchemaValidator, SchemaValidator};
pub use selection::{select, Selection};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum BulletinError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("item `{id}` has an invalid `{field}` value {value}: {reason}")]
    MalformedTimestamp { id: String, field: &'static str, value: String, reason: String },
    #[error("The ID '{0}' already exists.")]
    DuplicateIdentifier(String),
    #[error("{document} does not match the schema: {}", .reasons.join("; "))]
    SchemaValidation { document: String, reasons: Vec<String> },
    #[error("invalid schema: {0}")]
    Schema(String),
    #[error("encoding error: {0}")]
    Encoding(String),
}
