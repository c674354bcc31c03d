//! Storage backend abstraction for gated collections.
//!
//! This module defines the contract the gateway expects from the underlying document
//! store. A [`StoreBackend`] is a database-level handle that hands out per-collection
//! [`StoreCollection`] handles; the collection handle exposes the named operations the
//! gateway forwards to.
//!
//! # Traits
//!
//! - [`StoreBackend`]: Database-level handle, `collection(name, options)`
//! - [`StoreCollection`]: The forwarded collection operations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! Every value crossing this boundary is already canonical BSON; backends never see the
//! caller's JSON.

use std::{fmt, fmt::Debug};

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{Stream, StreamExt, TryStreamExt, stream::BoxStream};

use crate::{error::DocumentStoreResult, options::CollectionOptions};

/// Database-level handle able to open collections.
///
/// The gateway borrows the backend; connection lifecycle stays with the caller
/// (see [`StoreBackend::shutdown`]).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// The per-collection handle type.
    type Collection: StoreCollection;

    /// Opens (or references) the named collection.
    ///
    /// # Arguments
    ///
    /// * `name` - The collection name
    /// * `options` - The options the collection was constructed with
    fn collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> DocumentStoreResult<Self::Collection>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    type Collection = B::Collection;

    fn collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> DocumentStoreResult<Self::Collection> {
        (*self).collection(name, options)
    }
}

/// A collection handle exposing the operations the gateway forwards to.
///
/// # Error Handling
///
/// Backends report their own failures with any [`DocumentStoreError`](crate::error::DocumentStoreError)
/// variant; the gateway wraps them as delegation errors.
#[async_trait]
pub trait StoreCollection: Send + Sync + Debug {
    /// Returns a cursor over the documents matching `filter`.
    async fn find(&self, filter: Document, options: FindSpec) -> DocumentStoreResult<DocumentCursor>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(
        &self,
        filter: Document,
        options: FindSpec,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, filter: Document) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline.
    async fn aggregate(&self, pipeline: Vec<Document>) -> DocumentStoreResult<DocumentCursor>;

    /// Inserts a single document.
    ///
    /// The returned [`InsertResult`] holds the document as written, `_id` included.
    async fn insert_one(&self, document: Document) -> DocumentStoreResult<InsertResult>;

    /// Inserts a batch of documents, in order.
    async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<InsertResult>;

    /// Legacy insert accepting either one document or an array of documents.
    async fn insert(&self, documents: Vec<Document>) -> DocumentStoreResult<InsertResult> {
        match <[Document; 1]>::try_from(documents) {
            Ok([document]) => self.insert_one(document).await,
            Err(documents) => self.insert_many(documents).await,
        }
    }

    /// Updates the first document matching `filter`.
    ///
    /// `update` is either an operator document (`$set`, `$inc`, ...) or a full replacement.
    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Updates every document matching `filter`.
    async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Legacy update, touching one or all matches depending on `options.multi`.
    async fn update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        if options.multi {
            self.update_many(filter, update, options).await
        } else {
            self.update_one(filter, update, options).await
        }
    }

    /// Deletes the first document matching `filter`.
    async fn delete_one(&self, filter: Document) -> DocumentStoreResult<DeleteResult>;

    /// Deletes every document matching `filter`.
    async fn delete_many(&self, filter: Document) -> DocumentStoreResult<DeleteResult>;
}

/// Store-side read options, already canonicalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

/// Options for the update family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateOptions {
    /// Insert a document when nothing matches.
    pub upsert: bool,
    /// Legacy `update` only: touch every match instead of the first.
    pub multi: bool,
}

impl UpdateOptions {
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }
}

/// Outcome of an insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    /// The documents as written, in insertion order, each carrying its `_id`.
    pub inserted: Vec<Document>,
}

/// Outcome of an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
    /// Raw acknowledgement reply. Internal bookkeeping, never surfaced to callers.
    pub reply: Option<Document>,
}

/// Outcome of a delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
    /// Raw acknowledgement reply. Internal bookkeeping, never surfaced to callers.
    pub reply: Option<Document>,
}

/// A lazily consumed sequence of documents returned by read-many operations.
pub struct DocumentCursor {
    stream: BoxStream<'static, DocumentStoreResult<Document>>,
}

impl DocumentCursor {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DocumentStoreResult<Document>> + Send + 'static,
    {
        Self { stream: stream.boxed() }
    }

    /// A cursor over already materialized documents.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self::new(futures::stream::iter(documents.into_iter().map(Ok)))
    }

    /// Drains the cursor into an ordered vector, failing on the first bad item.
    pub async fn to_vec(self) -> DocumentStoreResult<Vec<Document>> {
        self.stream.try_collect().await
    }
}

impl Debug for DocumentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCursor").finish_non_exhaustive()
    }
}

/// Factory for backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
