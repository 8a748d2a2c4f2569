use time::OffsetDateTime;

use crate::{
    format_selection, load_clients, load_items, parse_document, select, BulletinError,
    JsonSchemaValidator, PublishedBucket, SchemaValidator,
};

pub const SCHEMA_DOCUMENT: &str = "schema.json";
pub const SOURCE_DOCUMENT: &str = "source.json";
pub const CLIENTS_DOCUMENT: &str = "clients.json";

/// Raw text of the three inputs.
#[derive(Debug, Clone, Copy)]
pub struct Documents<'a> {
    pub schema: &'a str,
    pub source: &'a str,
    pub clients: &'a str,
}

/// Everything needed to write and re-check the artifacts of one run.
#[derive(Debug)]
pub struct Prepared {
    pub validator: JsonSchemaValidator,
    pub buckets: Vec<PublishedBucket>,
}

/// Run every step up to serialization against a single reference instant.
///
/// Order matters: the source is schema-checked before items are read, and the
/// first repeated id stops item loading before anything is filtered.
///
/// # Errors
/// Returns the first [`BulletinError`] raised by schema compilation, input
/// validation, item parsing, the duplicate-id check, or formatting.
pub fn prepare(documents: &Documents<'_>, now: OffsetDateTime) -> Result<Prepared, BulletinError> {
    let schema = parse_document(SCHEMA_DOCUMENT, documents.schema)?;
    let validator = JsonSchemaValidator::compile(&schema)?;

    let source = parse_document(SOURCE_DOCUMENT, documents.source)?;
    validator.validate(SOURCE_DOCUMENT, &source)?;

    let items = load_items(&source)?;

    let clients = load_clients(&parse_document(CLIENTS_DOCUMENT, documents.clients)?)?;

    let selection = select(&items, &clients, now);
    let buckets = format_selection(&selection)?;
    Ok(Prepared { validator, buckets })
}
