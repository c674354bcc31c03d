use std::{fmt, sync::Arc};

use mea::rwlock::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    CompiledValidator, JsonSchemaEngine, LocalRefBundler, Schema, SchemaResolver,
    ValidationEngine,
};
use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    options::ValidatorOptions,
};

/// Validates documents against a collection's schema.
///
/// The schema bundle is resolved on first use and memoized for the lifetime of the
/// validator. A failed resolution leaves the cache empty, so the next call retries it.
/// Concurrent first calls may each resolve; the last one stored wins, which is harmless
/// because the bundle is derived from the immutable schema.
pub struct SchemaValidator {
    schema: Option<Schema>,
    options: ValidatorOptions,
    resolver: Arc<dyn SchemaResolver>,
    engine: Arc<dyn ValidationEngine>,
    bundle: RwLock<Option<Arc<Value>>>,
    compiled: RwLock<Option<Arc<dyn CompiledValidator>>>,
}

impl SchemaValidator {
    /// Creates a validator using [`LocalRefBundler`] and [`JsonSchemaEngine`].
    pub fn new(schema: Option<Schema>, options: ValidatorOptions) -> Self {
        Self {
            schema,
            options,
            resolver: Arc::new(LocalRefBundler::default()),
            engine: Arc::new(JsonSchemaEngine),
            bundle: RwLock::new(None),
            compiled: RwLock::new(None),
        }
    }

    /// Replaces the schema resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn SchemaResolver>) -> Self {
        self.resolver = resolver;
        self.bundle = RwLock::new(None);
        self.compiled = RwLock::new(None);
        self
    }

    /// Replaces the validation engine.
    pub fn with_engine(mut self, engine: Arc<dyn ValidationEngine>) -> Self {
        self.engine = engine;
        self.compiled = RwLock::new(None);
        self
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn options(&self) -> ValidatorOptions {
        self.options
    }

    /// Returns the schema bundle, resolving it on first use.
    ///
    /// Returns `Ok(None)` when no schema is configured.
    pub async fn bundle(&self) -> DocumentStoreResult<Option<Arc<Value>>> {
        let Some(schema) = &self.schema else {
            return Ok(None);
        };

        let cached = self.bundle.read().await.clone();
        if let Some(bundle) = cached {
            return Ok(Some(bundle));
        }

        debug!(schema = schema.name(), "resolving schema references");
        let bundle = Arc::new(
            self.resolver
                .bundle(schema.document())
                .await
                .inspect_err(|e| warn!(schema = schema.name(), error = %e, "schema resolution failed"))?,
        );
        *self.bundle.write().await = Some(bundle.clone());

        Ok(Some(bundle))
    }

    async fn compiled(&self) -> DocumentStoreResult<Option<Arc<dyn CompiledValidator>>> {
        let cached = self.compiled.read().await.clone();
        if let Some(compiled) = cached {
            return Ok(Some(compiled));
        }

        let Some(bundle) = self.bundle().await? else {
            return Ok(None);
        };
        let compiled = self.engine.compile(bundle, self.options)?;
        *self.compiled.write().await = Some(compiled.clone());

        Ok(Some(compiled))
    }

    /// Validates `document`, applying defaults and coercions in place.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Validation`] with every issue found
    /// - [`DocumentStoreError::SchemaResolution`] / [`DocumentStoreError::InvalidSchema`]
    ///   when the schema itself is unusable
    pub async fn validate(&self, document: &mut Value) -> DocumentStoreResult<()> {
        let Some(compiled) = self.compiled().await? else {
            return Ok(());
        };

        compiled.validate(document).map_err(|errors| {
            warn!(issues = errors.len(), "document rejected by schema");
            DocumentStoreError::Validation { errors }
        })
    }

    /// Validates a batch of documents. Every document is checked before failing; issue
    /// paths are prefixed with the index of the offending document.
    pub async fn validate_many(&self, documents: &mut [Value]) -> DocumentStoreResult<()> {
        let Some(compiled) = self.compiled().await? else {
            return Ok(());
        };

        let errors: Vec<_> = documents
            .iter_mut()
            .enumerate()
            .filter_map(|(index, document)| {
                compiled.validate(document).err().map(|issues| {
                    issues
                        .into_iter()
                        .map(move |issue| issue.with_instance_prefix(&format!("/{index}")))
                })
            })
            .flatten()
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            warn!(issues = errors.len(), "batch rejected by schema");
            Err(DocumentStoreError::Validation { errors })
        }
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema.as_ref().map(Schema::name))
            .field("options", &self.options)
            .field("resolver", &self.resolver)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
