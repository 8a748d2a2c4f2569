//! Maintenance operations on the keyed source catalog.
//!
//! These rewrite the source document itself rather than producing artifacts.
//! Entries are keyed by their id when added; removal looks entries up by the
//! `id` field so hand-authored keys work too.

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::item::{
    format_timestamp, parse_timestamp, ID_FIELD, LIMITED_TO_FIELD, VALID_SINCE_FIELD,
    VALID_UNTIL_FIELD,
};
use crate::{load_items, BulletinError, Item, Scope};

const TITLE_FIELD: &str = "title";
const DESCRIPTION_FIELD: &str = "description";
const LINK_FIELD: &str = "link";
const CHANNELS_FIELD: &str = "channels";

/// A notice to append to the catalog. Bounds are any RFC 3339 date-time and are
/// stored in canonical UTC form; the id is assigned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewEntry {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub valid_since: String,
    pub valid_until: String,
    pub limited_to: Vec<String>,
    pub channels: Vec<String>,
}

/// Append `entry` under `id`, keyed by that id.
///
/// The existing catalog has to load cleanly first. When `allowed_channels` is
/// non-empty every requested channel must be one of them.
///
/// # Errors
/// Returns [`BulletinError::DuplicateIdentifier`] when `id` is already used as an
/// id or key, [`BulletinError::MalformedTimestamp`] for an unparseable bound,
/// and [`BulletinError::MalformedInput`] for a bad scope, an unknown channel, or
/// a catalog that does not load. `source` is left untouched on error.
pub fn add_entry(
    source: &mut Value,
    id: &str,
    entry: &NewEntry,
    allowed_channels: &[String],
) -> Result<(), BulletinError> {
    if load_items(source)?.iter().any(|item| item.id == id) {
        return Err(BulletinError::DuplicateIdentifier(id.to_string()));
    }

    let valid_since = canonical_bound(id, VALID_SINCE_FIELD, &entry.valid_since)?;
    let valid_until = canonical_bound(id, VALID_UNTIL_FIELD, &entry.valid_until)?;
    for scope in &entry.limited_to {
        Scope::parse(scope)?;
    }
    if !allowed_channels.is_empty() {
        if let Some(unknown) =
            entry.channels.iter().find(|channel| !allowed_channels.contains(channel))
        {
            return Err(BulletinError::MalformedInput(format!(
                "channel `{unknown}` is not one of: {}",
                allowed_channels.join(", ")
            )));
        }
    }

    let mut fields = Map::new();
    fields.insert(ID_FIELD.to_string(), Value::from(id));
    fields.insert(TITLE_FIELD.to_string(), Value::from(entry.title.as_str()));
    fields.insert(VALID_SINCE_FIELD.to_string(), Value::from(valid_since));
    fields.insert(VALID_UNTIL_FIELD.to_string(), Value::from(valid_until));
    if let Some(description) = &entry.description {
        fields.insert(DESCRIPTION_FIELD.to_string(), Value::from(description.as_str()));
    }
    if !entry.limited_to.is_empty() {
        fields.insert(LIMITED_TO_FIELD.to_string(), Value::from(entry.limited_to.clone()));
    }
    if let Some(link) = &entry.link {
        fields.insert(LINK_FIELD.to_string(), Value::from(link.as_str()));
    }
    if !entry.channels.is_empty() {
        fields.insert(CHANNELS_FIELD.to_string(), Value::from(entry.channels.clone()));
    }

    let entries = entries_mut(source)?;
    if entries.contains_key(id) {
        return Err(BulletinError::DuplicateIdentifier(id.to_string()));
    }
    entries.insert(id.to_string(), Value::Object(fields));
    Ok(())
}

/// Remove the first entry whose `id` is `id`. Returns whether one was found.
///
/// # Errors
/// Returns [`BulletinError::MalformedInput`] when `source` is not an object.
pub fn remove_entry(source: &mut Value, id: &str) -> Result<bool, BulletinError> {
    let entries = entries_mut(source)?;
    let key = entries
        .iter()
        .find(|(_, entry)| entry.get(ID_FIELD).and_then(Value::as_str) == Some(id))
        .map(|(key, _)| key.clone());

    Ok(key.is_some_and(|key| entries.shift_remove(&key).is_some()))
}

/// Remove every entry whose `validUntil` is strictly before `now`.
///
/// Remaining entries keep their keys and order. Returns the number removed.
///
/// # Errors
/// Returns [`BulletinError::MalformedInput`] when `source` is not an object, and
/// [`BulletinError::MalformedTimestamp`] when an entry's `validUntil` does not parse.
/// `source` is left untouched on error.
pub fn prune_expired(source: &mut Value, now: OffsetDateTime) -> Result<usize, BulletinError> {
    let entries = entries_mut(source)?;

    let mut expired = Vec::new();
    for (key, entry) in entries.iter() {
        let until = entry.get(VALID_UNTIL_FIELD).and_then(Value::as_str);
        let Some(raw) = until else {
            return Err(BulletinError::MalformedTimestamp {
                id: entry_id(key, entry),
                field: VALID_UNTIL_FIELD,
                value: "<missing>".to_string(),
                reason: "expected a date-time string".to_string(),
            });
        };
        let valid_until = parse_timestamp(raw).map_err(|err| BulletinError::MalformedTimestamp {
            id: entry_id(key, entry),
            field: VALID_UNTIL_FIELD,
            value: raw.to_string(),
            reason: err.to_string(),
        })?;
        if valid_until < now {
            expired.push(key.clone());
        }
    }

    for key in &expired {
        entries.shift_remove(key);
    }
    Ok(expired.len())
}

/// Canonical form of the source catalog: same keys and field order, validity
/// bounds rewritten as UTC with an explicit offset. `limitedTo` is kept.
///
/// # Errors
/// Returns [`BulletinError::MalformedInput`] or [`BulletinError::MalformedTimestamp`]
/// when an entry is not a well-formed item.
pub fn format_source(source: &Value) -> Result<Value, BulletinError> {
    let Value::Object(entries) = source else {
        return Err(not_a_mapping());
    };

    let mut formatted = Map::with_capacity(entries.len());
    for (key, entry) in entries {
        let item = Item::from_value(key, entry)?;
        formatted.insert(key.clone(), Value::Object(item.normalized_fields()?));
    }
    Ok(Value::Object(formatted))
}

fn entries_mut(source: &mut Value) -> Result<&mut Map<String, Value>, BulletinError> {
    match source {
        Value::Object(entries) => Ok(entries),
        _ => Err(not_a_mapping()),
    }
}

fn not_a_mapping() -> BulletinError {
    BulletinError::MalformedInput("source document MUST be an object mapping keys to items".to_string())
}

fn canonical_bound(id: &str, field: &'static str, raw: &str) -> Result<String, BulletinError> {
    let parsed = parse_timestamp(raw).map_err(|err| BulletinError::MalformedTimestamp {
        id: id.to_string(),
        field,
        value: raw.to_string(),
        reason: err.to_string(),
    })?;
    format_timestamp(parsed)
}

fn entry_id(key: &str, entry: &Value) -> String {
    entry.get(ID_FIELD).and_then(Value::as_str).unwrap_or(key).to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    fn catalog() -> Value {
        json!({
            "spring": {"id": "s", "validSince": "2024-03-01T00:00:00Z", "validUntil": "2024-05-31T00:00:00Z"},
            "winter": {"id": "w", "validSince": "2023-12-01T00:00:00Z", "validUntil": "2024-02-28T23:59:59+01:00"},
            "always": {"id": "a", "validSince": "2020-01-01T00:00:00Z", "validUntil": "2099-01-01T00:00:00Z", "limitedTo": ["web"]}
        })
    }

    #[test]
    fn prune_removes_only_entries_that_ended_before_now() {
        let mut source = catalog();

        let removed = prune_expired(&mut source, datetime!(2024-02-28 23:00 UTC));

        assert_eq!(removed, Ok(1));
        let keys = source
            .as_object()
            .map(|entries| entries.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(keys, vec!["spring", "always"]);
    }

    #[test]
    fn prune_keeps_entry_ending_exactly_now() {
        let mut source = catalog();
        let removed = prune_expired(&mut source, datetime!(2024-05-31 00:00 UTC));
        assert_eq!(removed, Ok(1));
        assert!(source.get("spring").is_some());
    }

    #[test]
    fn prune_leaves_source_untouched_on_bad_timestamp() {
        let mut source = catalog();
        source["broken"] = json!({"id": "b", "validSince": "2020-01-01T00:00:00Z", "validUntil": "soon"});
        let before = source.clone();

        let result = prune_expired(&mut source, datetime!(2099-06-01 00:00 UTC));

        assert!(matches!(result, Err(BulletinError::MalformedTimestamp { .. })));
        assert_eq!(source, before);
    }

    #[test]
    fn format_normalizes_timestamps_and_keeps_scoping() {
        let formatted =
            format_source(&catalog()).unwrap_or_else(|err| panic!("catalog should format: {err}"));

        assert_eq!(formatted["winter"]["validUntil"], json!("2024-02-28T22:59:59+00:00"));
        assert_eq!(formatted["always"]["limitedTo"], json!(["web"]));
        let keys = formatted
            .as_object()
            .map(|entries| entries.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(keys, vec!["spring", "winter", "always"]);
    }

    #[test]
    fn maintenance_rejects_non_mapping_sources() {
        assert!(format_source(&json!([])).is_err());
        assert!(prune_expired(&mut json!("x"), datetime!(2024-01-01 00:00 UTC)).is_err());
        assert!(remove_entry(&mut json!([]), "s").is_err());
        assert!(add_entry(&mut json!([]), "n", &outage(), &[]).is_err());
    }

    fn outage() -> NewEntry {
        NewEntry {
            title: "Planned outage".to_string(),
            valid_since: "2024-06-01T08:00:00+02:00".to_string(),
            valid_until: "2024-06-01T12:00:00Z".to_string(),
            ..NewEntry::default()
        }
    }

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn add_appends_entry_keyed_by_id_with_utc_bounds() {
        let mut source = catalog();
        let entry = NewEntry {
            description: Some("Short maintenance window".to_string()),
            limited_to: vec!["web".to_string()],
            channels: channels(&["email"]),
            ..outage()
        };

        let result = add_entry(&mut source, "new-1", &entry, &channels(&["web", "email"]));

        assert_eq!(result, Ok(()));
        assert_eq!(
            source["new-1"],
            json!({
                "id": "new-1",
                "title": "Planned outage",
                "validSince": "2024-06-01T06:00:00+00:00",
                "validUntil": "2024-06-01T12:00:00+00:00",
                "description": "Short maintenance window",
                "limitedTo": ["web"],
                "channels": ["email"]
            })
        );
        let keys = source
            .as_object()
            .map(|entries| entries.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(keys, vec!["spring", "winter", "always", "new-1"]);
    }

    #[test]
    fn add_omits_unset_optional_fields() {
        let mut source = json!({});

        assert_eq!(add_entry(&mut source, "n", &outage(), &[]), Ok(()));

        let fields = source["n"]
            .as_object()
            .map(|fields| fields.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(fields, vec!["id", "title", "validSince", "validUntil"]);
    }

    #[test]
    fn add_rejects_existing_id() {
        let mut source = catalog();
        let before = source.clone();

        let result = add_entry(&mut source, "s", &outage(), &[]);

        assert_eq!(result, Err(BulletinError::DuplicateIdentifier("s".to_string())));
        assert_eq!(source, before);
    }

    #[test]
    fn add_rejects_unparseable_bound() {
        let mut source = catalog();
        let entry = NewEntry { valid_until: "next tuesday".to_string(), ..outage() };

        let result = add_entry(&mut source, "n", &entry, &[]);

        assert!(matches!(
            result,
            Err(BulletinError::MalformedTimestamp { field, .. }) if field == VALID_UNTIL_FIELD
        ));
        assert!(source.get("n").is_none());
    }

    #[test]
    fn add_rejects_channels_outside_the_schema_enum() {
        let mut source = catalog();
        let entry = NewEntry { channels: channels(&["web", "fax"]), ..outage() };

        let result = add_entry(&mut source, "n", &entry, &channels(&["web", "email"]));

        assert!(matches!(result, Err(BulletinError::MalformedInput(message)) if message.contains("`fax`")));
        assert!(source.get("n").is_none());
    }

    #[test]
    fn add_accepts_any_channel_when_schema_lists_none() {
        let mut source = catalog();
        let entry = NewEntry { channels: channels(&["fax"]), ..outage() };

        assert_eq!(add_entry(&mut source, "n", &entry, &[]), Ok(()));
        assert_eq!(source["n"]["channels"], json!(["fax"]));
    }

    #[test]
    fn add_rejects_scope_unusable_as_file_name() {
        let mut source = catalog();
        let entry = NewEntry { limited_to: vec!["../web".to_string()], ..outage() };

        assert!(matches!(
            add_entry(&mut source, "n", &entry, &[]),
            Err(BulletinError::MalformedInput(_))
        ));
    }

    #[test]
    fn remove_finds_entry_by_id_not_key() {
        let mut source = catalog();

        assert_eq!(remove_entry(&mut source, "w"), Ok(true));

        assert!(source.get("winter").is_none());
        let keys = source
            .as_object()
            .map(|entries| entries.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(keys, vec!["spring", "always"]);
    }

    #[test]
    fn remove_reports_missing_id() {
        let mut source = catalog();
        let before = source.clone();

        assert_eq!(remove_entry(&mut source, "winter"), Ok(false));
        assert_eq!(source, before);
    }
}
