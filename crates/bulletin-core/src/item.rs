use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::BulletinError;

pub const COMMON_SCOPE: &str = "common";

pub const ID_FIELD: &str = "id";
pub const VALID_SINCE_FIELD: &str = "validSince";
pub const VALID_UNTIL_FIELD: &str = "validUntil";
pub const LIMITED_TO_FIELD: &str = "limitedTo";

/// Client scope identifier, or the reserved `common` scope.
///
/// Scopes end up in artifact file names, so construction rejects values that
/// cannot be used as a single path component.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Scope(String);

impl Scope {
    #[must_use]
    pub fn common() -> Self {
        Self(COMMON_SCOPE.to_string())
    }

    /// Parse a scope identifier taken from `limitedTo` or the client list.
    ///
    /// # Errors
    /// Returns [`BulletinError::MalformedInput`] for empty identifiers, `.`/`..`,
    /// or identifiers containing path separators or NUL.
    pub fn parse(value: &str) -> Result<Self, BulletinError> {
        if value.is_empty() {
            return Err(BulletinError::MalformedInput(
                "scope identifiers MUST be non-empty".to_string(),
            ));
        }
        if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
            return Err(BulletinError::MalformedInput(format!(
                "scope identifier `{value}` cannot be used in an artifact file name"
            )));
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn is_common(&self) -> bool {
        self.0 == COMMON_SCOPE
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One catalog entry with its validity window resolved to UTC instants.
///
/// `fields` is the raw object as authored, in source key order; the typed
/// fields are parsed views over it.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub valid_since: OffsetDateTime,
    pub valid_until: OffsetDateTime,
    pub limited_to: Option<Vec<Scope>>,
    pub fields: Map<String, Value>,
}

impl Item {
    /// Build an item from one value of the source mapping.
    ///
    /// `key` is only used to name the entry in error messages.
    ///
    /// # Errors
    /// Returns [`BulletinError::MalformedInput`] when the entry is not an object,
    /// has a non-string `id`, or a `limitedTo` that is not an array of strings,
    /// and [`BulletinError::MalformedTimestamp`] when a validity bound does not parse.
    pub fn from_value(key: &str, value: &Value) -> Result<Self, BulletinError> {
        let Value::Object(fields) = value else {
            return Err(BulletinError::MalformedInput(format!(
                "source entry `{key}` MUST be an object"
            )));
        };

        let id = match fields.get(ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            _ => {
                return Err(BulletinError::MalformedInput(format!(
                    "source entry `{key}` MUST have a string `{ID_FIELD}`"
                )))
            }
        };

        let valid_since = timestamp_field(&id, fields, VALID_SINCE_FIELD)?;
        let valid_until = timestamp_field(&id, fields, VALID_UNTIL_FIELD)?;
        let limited_to = limited_to_field(&id, fields)?;

        Ok(Self { id, valid_since, valid_until, limited_to, fields: fields.clone() })
    }

    /// Inclusive on both ends.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        self.valid_since <= now && now <= self.valid_until
    }

    /// Scopes this item is published to; an unrestricted item belongs to `common`.
    #[must_use]
    pub fn scopes(&self) -> Vec<Scope> {
        match &self.limited_to {
            Some(scopes) => scopes.clone(),
            None => vec![Scope::common()],
        }
    }

    /// Raw fields with both validity bounds rewritten in canonical form.
    ///
    /// Key order is preserved; every other field is passed through unchanged.
    ///
    /// # Errors
    /// Returns [`BulletinError::Encoding`] when a bound cannot be rendered.
    pub fn normalized_fields(&self) -> Result<Map<String, Value>, BulletinError> {
        let mut fields = self.fields.clone();
        fields.insert(
            VALID_SINCE_FIELD.to_string(),
            Value::String(format_timestamp(self.valid_since)?),
        );
        fields.insert(
            VALID_UNTIL_FIELD.to_string(),
            Value::String(format_timestamp(self.valid_until)?),
        );
        Ok(fields)
    }
}

/// Parse an RFC 3339 date-time and normalize it to UTC.
///
/// # Errors
/// Returns the underlying parse error when `value` is not RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    let parsed = OffsetDateTime::parse(value, &Rfc3339)?;
    Ok(parsed.to_offset(UtcOffset::UTC))
}

/// Render an instant as `YYYY-MM-DDTHH:MM:SS+00:00`, dropping sub-second precision.
///
/// # Errors
/// Returns [`BulletinError::Encoding`] when the instant has no four-digit year.
pub fn format_timestamp(value: OffsetDateTime) -> Result<String, BulletinError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        ))
        .map_err(|err| BulletinError::Encoding(format!("invalid timestamp: {err}")))
}

fn timestamp_field(
    id: &str,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<OffsetDateTime, BulletinError> {
    let Some(Value::String(raw)) = fields.get(field) else {
        return Err(BulletinError::MalformedTimestamp {
            id: id.to_string(),
            field,
            value: fields.get(field).map_or_else(|| "<missing>".to_string(), Value::to_string),
            reason: "expected a date-time string".to_string(),
        });
    };

    parse_timestamp(raw).map_err(|err| BulletinError::MalformedTimestamp {
        id: id.to_string(),
        field,
        value: raw.clone(),
        reason: err.to_string(),
    })
}

fn limited_to_field(
    id: &str,
    fields: &Map<String, Value>,
) -> Result<Option<Vec<Scope>>, BulletinError> {
    match fields.get(LIMITED_TO_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| match value {
                Value::String(scope) => Scope::parse(scope),
                other => Err(BulletinError::MalformedInput(format!(
                    "item `{id}` has a non-string `{LIMITED_TO_FIELD}` entry: {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(BulletinError::MalformedInput(format!(
            "item `{id}` MUST have `{LIMITED_TO_FIELD}` as an array of strings, got {other}"
        ))),
    }
}
