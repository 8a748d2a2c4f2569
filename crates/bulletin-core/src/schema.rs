use jsonschema::JSONSchema;
use serde_json::Value;

use crate::BulletinError;

/// Conformance check for one JSON document against the notice schema.
pub trait SchemaValidator {
    /// # Errors
    /// Returns [`BulletinError::SchemaValidation`] naming `document` with every
    /// reported violation.
    fn validate(&self, document: &str, instance: &Value) -> Result<(), BulletinError>;
}

/// [`SchemaValidator`] backed by a compiled JSON Schema.
///
/// The same compiled schema checks the keyed source mapping and every published
/// list, so the schema has to accept both shapes.
pub struct JsonSchemaValidator {
    compiled: JSONSchema,
}

impl JsonSchemaValidator {
    /// # Errors
    /// Returns [`BulletinError::Schema`] when `schema` is not a valid JSON Schema.
    pub fn compile(schema: &Value) -> Result<Self, BulletinError> {
        let compiled = JSONSchema::compile(schema)
            .map_err(|err| BulletinError::Schema(format!("failed to compile schema: {err}")))?;
        Ok(Self { compiled })
    }
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, document: &str, instance: &Value) -> Result<(), BulletinError> {
        let reasons = self.compiled.validate(instance).err().map(|errors| {
            errors
                .map(|err| {
                    let path = err.instance_path.to_string();
                    if path.is_empty() {
                        err.to_string()
                    } else {
                        format!("{path}: {err}")
                    }
                })
                .collect::<Vec<_>>()
        });

        match reasons {
            Some(reasons) => {
                Err(BulletinError::SchemaValidation { document: document.to_string(), reasons })
            }
            None => Ok(()),
        }
    }
}

/// Channel names enumerated by the item schema, if it declares any.
///
/// Looks at `items.properties.channels.items.enum`, following local `$ref`s.
#[must_use]
pub fn allowed_channels(schema: &Value) -> Vec<String> {
    let channels = ["items", "properties", "channels", "items", "enum"]
        .iter()
        .try_fold(schema, |node, key| resolve_local_ref(schema, node).get(*key));

    channels
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn resolve_local_ref<'a>(root: &'a Value, node: &'a Value) -> &'a Value {
    let mut current = node;
    // Bounded so a self-referencing `$ref` cannot loop.
    for _ in 0..16 {
        let Some(pointer) = current.get("$ref").and_then(Value::as_str) else {
            return current;
        };
        let Some(target) = pointer.strip_prefix('#').and_then(|path| root.pointer(path)) else {
            return current;
        };
        current = target;
    }
    current
}
