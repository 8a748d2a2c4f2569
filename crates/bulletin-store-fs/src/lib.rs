use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bulletin_core::pipeline::{CLIENTS_DOCUMENT, SCHEMA_DOCUMENT, SOURCE_DOCUMENT};
use bulletin_core::catalog::{self, NewEntry};
use bulletin_core::{
    allowed_channels, parse_document, prepare, render_pretty, Documents, JsonSchemaValidator,
    PublishedBucket, SchemaValidator, Scope,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use ulid::Ulid;

const RESULT_PREFIX: &str = "results";
const RESULT_EXTENSION: &str = "json";
const RESULT_MIN_EXTENSION: &str = "min.json";

/// Fixed file locations, all relative to one base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    base_dir: PathBuf,
}

impl StoreLayout {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn schema_path(&self) -> PathBuf {
        self.base_dir.join(SCHEMA_DOCUMENT)
    }

    #[must_use]
    pub fn source_path(&self) -> PathBuf {
        self.base_dir.join(SOURCE_DOCUMENT)
    }

    #[must_use]
    pub fn clients_path(&self) -> PathBuf {
        self.base_dir.join(CLIENTS_DOCUMENT)
    }

    /// `results.<scope>.json`
    #[must_use]
    pub fn result_path(&self, scope: &Scope) -> PathBuf {
        self.base_dir.join(format!("{RESULT_PREFIX}.{scope}.{RESULT_EXTENSION}"))
    }

    /// `results.<scope>.min.json`
    #[must_use]
    pub fn result_min_path(&self, scope: &Scope) -> PathBuf {
        self.base_dir.join(format!("{RESULT_PREFIX}.{scope}.{RESULT_MIN_EXTENSION}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub scope: Scope,
    pub items: usize,
    pub pretty_path: PathBuf,
    pub compact_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishSummary {
    pub artifacts: Vec<PublishedArtifact>,
}

#[derive(Debug, Clone)]
pub struct FsStore {
    layout: StoreLayout,
}

impl FsStore {
    #[must_use]
    pub fn open(layout: StoreLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Select, write, and re-validate every scope's artifacts.
    ///
    /// Artifacts written before a failure are left in place.
    ///
    /// # Errors
    /// Returns an error when an input cannot be read, any pipeline step fails,
    /// an artifact cannot be written, or a written artifact fails the schema.
    pub fn publish(&self, now: OffsetDateTime) -> Result<PublishSummary> {
        let schema = read_document(&self.layout.schema_path())?;
        let source = read_document(&self.layout.source_path())?;
        let clients = read_document(&self.layout.clients_path())?;

        let prepared = prepare(
            &Documents { schema: &schema, source: &source, clients: &clients },
            now,
        )?;

        let mut summary = PublishSummary::default();
        for bucket in &prepared.buckets {
            match self.publish_bucket(&prepared.validator, bucket) {
                Ok(artifact) => summary.artifacts.push(artifact),
                Err(err) => {
                    warn!(
                        scope = %bucket.scope,
                        already_published = summary.artifacts.len(),
                        "publication aborted; written artifacts are kept"
                    );
                    return Err(err);
                }
            }
        }
        Ok(summary)
    }

    /// Drop source entries that expired before `now` and rewrite `source.json`.
    ///
    /// The file is only rewritten when something was removed.
    ///
    /// # Errors
    /// Returns an error when the inputs cannot be read or parsed, the pruned
    /// catalog fails the schema, or the file cannot be written.
    pub fn prune_source(&self, now: OffsetDateTime) -> Result<usize> {
        let validator = self.load_validator()?;
        let source_path = self.layout.source_path();
        let mut source = self.read_source()?;

        let removed = catalog::prune_expired(&mut source, now)?;
        if removed == 0 {
            info!("no expired notices found");
            return Ok(0);
        }

        validator.validate(SOURCE_DOCUMENT, &source)?;
        write_document(&source_path, &render_pretty(&source)?)?;
        info!(removed, "expired notices removed from catalog");
        Ok(removed)
    }

    /// Rewrite `source.json` in canonical form.
    ///
    /// # Errors
    /// Returns an error when the inputs cannot be read or parsed, the formatted
    /// catalog fails the schema, or the file cannot be written.
    pub fn format_source(&self) -> Result<()> {
        let validator = self.load_validator()?;
        let source_path = self.layout.source_path();
        let source = self.read_source()?;

        let formatted = catalog::format_source(&source)?;
        validator.validate(SOURCE_DOCUMENT, &formatted)?;
        write_document(&source_path, &render_pretty(&formatted)?)?;
        info!(path = %source_path.display(), "catalog formatted");
        Ok(())
    }

    /// Check `source.json` against the schema without publishing anything.
    ///
    /// # Errors
    /// Returns an error when either file cannot be read or parsed, or the catalog
    /// does not match the schema.
    pub fn validate_source(&self) -> Result<()> {
        let validator = self.load_validator()?;
        let source = self.read_source()?;
        validator.validate(SOURCE_DOCUMENT, &source)?;
        info!("catalog matches the schema");
        Ok(())
    }

    /// Append a notice under a freshly generated id and rewrite `source.json`.
    ///
    /// Channels are checked against the enum the schema declares, if any.
    ///
    /// # Errors
    /// Returns an error when the inputs cannot be read, the entry is rejected,
    /// the extended catalog fails the schema, or the file cannot be written.
    pub fn add_entry(&self, entry: &NewEntry) -> Result<String> {
        let schema = self.read_schema()?;
        let validator = JsonSchemaValidator::compile(&schema)?;
        let mut source = self.read_source()?;

        let id = Ulid::new().to_string();
        catalog::add_entry(&mut source, &id, entry, &allowed_channels(&schema))?;
        validator.validate(SOURCE_DOCUMENT, &source)?;
        write_document(&self.layout.source_path(), &render_pretty(&source)?)?;
        info!(id = %id, "notice added to catalog");
        Ok(id)
    }

    /// Remove the notice with `id` and rewrite `source.json`.
    ///
    /// Returns `false` without touching the file when no notice has that id.
    ///
    /// # Errors
    /// Returns an error when the inputs cannot be read or parsed, the remaining
    /// catalog fails the schema, or the file cannot be written.
    pub fn remove_entry(&self, id: &str) -> Result<bool> {
        let validator = self.load_validator()?;
        let mut source = self.read_source()?;

        if !catalog::remove_entry(&mut source, id)? {
            warn!(id, "notice not found in catalog");
            return Ok(false);
        }

        validator.validate(SOURCE_DOCUMENT, &source)?;
        write_document(&self.layout.source_path(), &render_pretty(&source)?)?;
        info!(id, "notice removed from catalog");
        Ok(true)
    }

    fn read_schema(&self) -> Result<Value> {
        Ok(parse_document(SCHEMA_DOCUMENT, &read_document(&self.layout.schema_path())?)?)
    }

    fn read_source(&self) -> Result<Value> {
        Ok(parse_document(SOURCE_DOCUMENT, &read_document(&self.layout.source_path())?)?)
    }

    fn load_validator(&self) -> Result<JsonSchemaValidator> {
        Ok(JsonSchemaValidator::compile(&self.read_schema()?)?)
    }

    fn publish_bucket(
        &self,
        validator: &JsonSchemaValidator,
        bucket: &PublishedBucket,
    ) -> Result<PublishedArtifact> {
        let pretty_path = self.layout.result_path(&bucket.scope);
        let compact_path = self.layout.result_min_path(&bucket.scope);

        write_document(&pretty_path, &bucket.render_pretty()?)?;
        write_document(&compact_path, &bucket.render_compact()?)?;

        revalidate(validator, &pretty_path)?;
        revalidate(validator, &compact_path)?;

        info!(scope = %bucket.scope, items = bucket.items.len(), "scope published");
        Ok(PublishedArtifact {
            scope: bucket.scope.clone(),
            items: bucket.items.len(),
            pretty_path,
            compact_path,
        })
    }
}

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_document(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn revalidate(validator: &JsonSchemaValidator, path: &Path) -> Result<()> {
    let name = document_name(path);
    let written: Value = parse_document(&name, &read_document(path)?)?;
    validator.validate(&name, &written)?;
    debug!(artifact = %name, "artifact re-validated");
    Ok(())
}

fn document_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
