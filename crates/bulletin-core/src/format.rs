use std::cmp::Reverse;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

use crate::item::LIMITED_TO_FIELD;
use crate::{BulletinError, Item, Scope, Selection};

const PRETTY_INDENT: &[u8] = b"    ";

/// A frozen, publication-ready result list for one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedBucket {
    pub scope: Scope,
    pub items: Vec<Value>,
}

impl PublishedBucket {
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(self.items.clone())
    }

    /// # Errors
    /// Returns [`BulletinError::Encoding`] when serialization fails.
    pub fn render_pretty(&self) -> Result<String, BulletinError> {
        render_pretty(&self.items)
    }

    /// # Errors
    /// Returns [`BulletinError::Encoding`] when serialization fails.
    pub fn render_compact(&self) -> Result<String, BulletinError> {
        render_compact(&self.items)
    }
}

/// Most recent `validSince` first. Stable, so ties keep bucket order and a
/// client's own items stay ahead of appended `common` items.
pub fn sort_by_recency(items: &mut [&Item]) {
    items.sort_by_key(|item| Reverse(item.valid_since));
}

/// Published form of one item: canonical timestamps, no `limitedTo`.
///
/// # Errors
/// Returns [`BulletinError::Encoding`] when a timestamp cannot be rendered.
pub fn publish_item(item: &Item) -> Result<Value, BulletinError> {
    let mut fields = item.normalized_fields()?;
    fields.shift_remove(LIMITED_TO_FIELD);
    Ok(Value::Object(fields))
}

/// Sort every bucket and render its items, in ascending scope order.
///
/// # Errors
/// Returns [`BulletinError::Encoding`] when an item cannot be rendered.
pub fn format_selection(selection: &Selection<'_>) -> Result<Vec<PublishedBucket>, BulletinError> {
    selection
        .iter()
        .map(|(scope, items)| {
            let mut ordered = items.to_vec();
            sort_by_recency(&mut ordered);
            let items = ordered.into_iter().map(publish_item).collect::<Result<Vec<_>, _>>()?;
            Ok(PublishedBucket { scope: scope.clone(), items })
        })
        .collect()
}

/// Indented JSON with four-space indentation. Slashes and non-ASCII text are
/// written literally.
///
/// # Errors
/// Returns [`BulletinError::Encoding`] when serialization fails.
pub fn render_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, BulletinError> {
    let mut buffer = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(PRETTY_INDENT));
    value
        .serialize(&mut serializer)
        .map_err(|err| BulletinError::Encoding(format!("failed to render JSON: {err}")))?;
    String::from_utf8(buffer)
        .map_err(|err| BulletinError::Encoding(format!("rendered JSON is not UTF-8: {err}")))
}

/// # Errors
/// Returns [`BulletinError::Encoding`] when serialization fails.
pub fn render_compact<T: Serialize + ?Sized>(value: &T) -> Result<String, BulletinError> {
    serde_json::to_string(value)
        .map_err(|err| BulletinError::Encoding(format!("failed to render JSON: {err}")))
}
