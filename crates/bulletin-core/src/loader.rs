use serde_json::Value;

use crate::{BulletinError, IdentityGuard, Item, Scope};

/// Parse one input document.
///
/// # Errors
/// Returns [`BulletinError::MalformedInput`] naming `document` when `raw` is not JSON.
pub fn parse_document(document: &str, raw: &str) -> Result<Value, BulletinError> {
    serde_json::from_str(raw)
        .map_err(|err| BulletinError::MalformedInput(format!("{document} is not valid JSON: {err}")))
}

/// Flatten the keyed source mapping into items, in source order.
///
/// The mapping keys only disambiguate entries for authors; they are not kept.
/// Each entry is checked for a repeated id as soon as it is parsed, so entries
/// after the first duplicate are never looked at.
///
/// # Errors
/// Returns [`BulletinError::MalformedInput`] when `source` is not an object or
/// an entry is not a well-formed item, [`BulletinError::MalformedTimestamp`]
/// when an entry's validity bounds do not parse, and
/// [`BulletinError::DuplicateIdentifier`] for the first repeated id.
pub fn load_items(source: &Value) -> Result<Vec<Item>, BulletinError> {
    let Value::Object(entries) = source else {
        return Err(BulletinError::MalformedInput(
            "source document MUST be an object mapping keys to items".to_string(),
        ));
    };

    let mut guard = IdentityGuard::new();
    let mut items = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let item = Item::from_value(key, value)?;
        guard.admit(&item.id)?;
        items.push(item);
    }
    Ok(items)
}

/// Read the declared client list.
///
/// # Errors
/// Returns [`BulletinError::MalformedInput`] when `clients` is not an array of
/// strings or an entry is not a usable scope identifier.
pub fn load_clients(clients: &Value) -> Result<Vec<Scope>, BulletinError> {
    let Value::Array(values) = clients else {
        return Err(BulletinError::MalformedInput(
            "clients document MUST be an array of strings".to_string(),
        ));
    };

    values
        .iter()
        .map(|value| match value {
            Value::String(client) => Scope::parse(client),
            other => Err(BulletinError::MalformedInput(format!(
                "clients document MUST only contain strings, found {other}"
            ))),
        })
        .collect()
}
