//! The gated collection facade.
//!
//! A [`Collection`] stands in for a store collection handle. Every operation is forwarded
//! through the [`OperationGateway`], so arguments arrive at the store as canonical BSON and
//! results come back as canonical Extended JSON. Insert-family operations additionally pass
//! their documents through the collection's [`SchemaValidator`] first; the corrected
//! documents (defaults applied, types coerced) are what gets written.
//!
//! # Example
//!
//! ```ignore
//! use docgate_core::collection::Collection;
//! use serde_json::json;
//!
//! # async fn example(backend: &impl docgate_core::backend::StoreBackend) -> docgate_core::error::DocumentStoreResult<()> {
//! let users = Collection::new(backend, json!({
//!     "name": "users",
//!     "type": "object",
//!     "required": ["name"],
//!     "properties": {
//!         "name": { "type": "string" },
//!         "age": { "type": "integer" },
//!         "status": { "type": "string", "default": "active" }
//!     }
//! }), None)?;
//!
//! let ana = users.insert_one(json!({ "name": "Ana", "age": "30" })).await?;
//! assert_eq!(ana["age"], json!(30));
//! assert_eq!(ana["status"], json!("active"));
//! # Ok(()) }
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::{
    adapter::ResultAdapter,
    backend::{StoreBackend, UpdateOptions},
    codec::{ExtJsonCodec, ExtendedValueCodec},
    error::DocumentStoreResult,
    gateway::OperationGateway,
    operation::{Call, FindOptions},
    options::{CollectionOptions, CollectionSource, CollectionTarget},
    schema::{Schema, SchemaResolver, SchemaValidator, ValidationEngine},
};

/// A schema-validating, canonicalizing collection bound to a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
    options: CollectionOptions,
    gateway: OperationGateway<B::Collection>,
    validator: SchemaValidator,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    /// Creates a gated collection.
    ///
    /// # Arguments
    ///
    /// * `backend` - The backend to open the collection on
    /// * `source` - A collection name, options carrying a named schema, or a named schema
    /// * `options` - Options used alongside a bare name or a schema document
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidCollection`](crate::error::DocumentStoreError::InvalidCollection)
    ///   when no collection name can be derived
    /// - any error the backend reports while opening the collection
    pub fn new(
        backend: &'a B,
        source: impl Into<CollectionSource>,
        options: Option<CollectionOptions>,
    ) -> DocumentStoreResult<Self> {
        let CollectionTarget { name, schema, options } =
            CollectionTarget::resolve(source.into(), options)?;

        let handle = backend.collection(&name, &options)?;
        let codec = Arc::new(ExtJsonCodec::new(options.ext_json_mode));
        let validator = SchemaValidator::new(schema, options.validation);

        debug!(collection = %name, validated = validator.schema().is_some(), "opened gated collection");

        Ok(Self {
            name,
            backend,
            options,
            gateway: OperationGateway::new(handle, codec),
            validator,
        })
    }

    /// Replaces the schema reference resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn SchemaResolver>) -> Self {
        self.validator = self.validator.with_resolver(resolver);
        self
    }

    /// Replaces the validation engine.
    pub fn with_engine(mut self, engine: Arc<dyn ValidationEngine>) -> Self {
        self.validator = self.validator.with_engine(engine);
        self
    }

    /// Replaces the extended value codec.
    ///
    /// When the codec reports an [`output_mode`](ExtendedValueCodec::output_mode), it is
    /// recorded in [`options`](Self::options). Otherwise `ext_json_mode` keeps its configured
    /// value but no longer governs output.
    pub fn with_codec(self, codec: Arc<dyn ExtendedValueCodec>) -> Self {
        let Self { name, backend, mut options, gateway, validator } = self;
        let handle = gateway.into_collection();
        if let Some(mode) = codec.output_mode() {
            options.ext_json_mode = mode;
        }

        Self {
            name,
            backend,
            options,
            gateway: OperationGateway::new(handle, codec),
            validator,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.validator.schema()
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub fn backend(&self) -> &'a B {
        self.backend
    }

    /// Returns the underlying store collection handle.
    pub fn inner(&self) -> &B::Collection {
        self.gateway.collection()
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    /// Validates `document` against the collection's schema without writing it.
    ///
    /// The document is corrected in place, exactly as it would be before an insert.
    pub async fn validate(&self, document: &mut Value) -> DocumentStoreResult<()> {
        self.validator.validate(document).await
    }

    /// Finds every document matching `filter`, materialized as an array.
    pub async fn find(&self, filter: Value, options: FindOptions) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::Find { filter, options }, ResultAdapter::Materialize)
            .await
    }

    /// Finds the first document matching `filter`, or `null`.
    pub async fn find_one(&self, filter: Value, options: FindOptions) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::FindOne { filter, options }, ResultAdapter::Identity)
            .await
    }

    pub async fn count(&self, filter: Value) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::Count { filter }, ResultAdapter::Identity)
            .await
    }

    /// Runs an aggregation pipeline (an array of stage documents).
    pub async fn aggregate(&self, pipeline: Value) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::Aggregate { pipeline }, ResultAdapter::Materialize)
            .await
    }

    /// Inserts one document or an array of documents.
    ///
    /// Returns the inserted documents as an array, including their `_id`s.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`](crate::error::DocumentStoreError::Validation)
    /// without touching the store when any document fails validation.
    pub async fn insert(&self, mut documents: Value) -> DocumentStoreResult<Value> {
        self.validate_batch(&mut documents).await?;
        self.gateway
            .invoke(Call::Insert { documents }, ResultAdapter::InsertedDocuments)
            .await
    }

    /// Inserts a single document and returns it, including its `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`](crate::error::DocumentStoreError::Validation)
    /// without touching the store when the document fails validation.
    pub async fn insert_one(&self, mut document: Value) -> DocumentStoreResult<Value> {
        self.validator.validate(&mut document).await?;
        self.gateway
            .invoke(Call::InsertOne { document }, ResultAdapter::InsertedDocument)
            .await
    }

    /// Inserts an array of documents and returns them, including their `_id`s.
    pub async fn insert_many(&self, mut documents: Value) -> DocumentStoreResult<Value> {
        if let Value::Array(batch) = &mut documents {
            self.validator.validate_many(batch).await?;
        }
        self.gateway
            .invoke(Call::InsertMany { documents }, ResultAdapter::InsertedDocuments)
            .await
    }

    /// Updates one or, with `options.multi`, every matching document.
    pub async fn update(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::Update { filter, update, options }, ResultAdapter::WriteSummary)
            .await
    }

    pub async fn update_one(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::UpdateOne { filter, update, options }, ResultAdapter::WriteSummary)
            .await
    }

    pub async fn update_many(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::UpdateMany { filter, update, options }, ResultAdapter::WriteSummary)
            .await
    }

    /// Deletes the first matching document and returns the deleted count.
    pub async fn delete_one(&self, filter: Value) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::DeleteOne { filter }, ResultAdapter::DeletedCount)
            .await
    }

    /// Deletes every matching document and returns the deleted count.
    pub async fn delete_many(&self, filter: Value) -> DocumentStoreResult<Value> {
        self.gateway
            .invoke(Call::DeleteMany { filter }, ResultAdapter::DeletedCount)
            .await
    }

    async fn validate_batch(&self, documents: &mut Value) -> DocumentStoreResult<()> {
        match documents {
            Value::Array(batch) => self.validator.validate_many(batch).await,
            document => self.validator.validate(document).await,
        }
    }
}
