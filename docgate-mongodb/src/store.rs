use async_trait::async_trait;
use bson::{Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as DriverCollection, Database,
    options::{ClientOptions, FindOneOptions, FindOptions},
};
use tracing::debug;

use docgate_core::{
    backend::{
        DeleteResult, DocumentCursor, FindSpec, InsertResult, StoreBackend, StoreBackendBuilder,
        StoreCollection, UpdateOptions, UpdateResult,
    },
    error::{DocumentStoreError, DocumentStoreResult},
    options::CollectionOptions,
};

fn backend_error(e: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(e.to_string())
}

/// MongoDB-backed store.
///
/// Built either from a client and a database name, in which case [`StoreBackend::shutdown`]
/// closes the client, or from an existing [`Database`] handle, whose client stays with the
/// caller.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    database: Database,
    client: Option<Client>,
}

impl MongoDbStore {
    pub fn new(client: Client, database: &str) -> Self {
        Self {
            database: client.database(database),
            client: Some(client),
        }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl From<Database> for MongoDbStore {
    fn from(database: Database) -> Self {
        Self { database, client: None }
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    type Collection = MongoCollection;

    fn collection(
        &self,
        name: &str,
        _options: &CollectionOptions,
    ) -> DocumentStoreResult<Self::Collection> {
        if name.is_empty() || name.contains('\0') || name.starts_with("system.") {
            return Err(DocumentStoreError::InvalidCollection(format!(
                "invalid MongoDB collection name {name:?}"
            )));
        }

        Ok(MongoCollection {
            inner: self.database.collection::<Document>(name),
        })
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        if let Some(client) = self.client {
            client.shutdown().await;
        }

        Ok(())
    }
}

/// Handle to one MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: DriverCollection<Document>,
}

impl MongoCollection {
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the driver's collection handle.
    pub fn inner(&self) -> &DriverCollection<Document> {
        &self.inner
    }
}

#[async_trait]
impl StoreCollection for MongoCollection {
    async fn find(&self, filter: Document, options: FindSpec) -> DocumentStoreResult<DocumentCursor> {
        let mut find_options = FindOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort;
        find_options.skip = options.skip;
        find_options.limit = options.limit;

        let cursor = self
            .inner
            .find(filter)
            .with_options(find_options)
            .await
            .map_err(backend_error)?;

        Ok(DocumentCursor::new(cursor.map_err(backend_error)))
    }

    async fn find_one(&self, filter: Document, options: FindSpec) -> DocumentStoreResult<Option<Document>> {
        let mut find_options = FindOneOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort;
        find_options.skip = options.skip;

        self.inner
            .find_one(filter)
            .with_options(find_options)
            .await
            .map_err(backend_error)
    }

    async fn count(&self, filter: Document) -> DocumentStoreResult<u64> {
        self.inner.count_documents(filter).await.map_err(backend_error)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> DocumentStoreResult<DocumentCursor> {
        let cursor = self.inner.aggregate(pipeline).await.map_err(backend_error)?;

        Ok(DocumentCursor::new(cursor.map_err(backend_error)))
    }

    async fn insert_one(&self, document: Document) -> DocumentStoreResult<InsertResult> {
        let document = with_id(document);
        self.inner.insert_one(&document).await.map_err(backend_error)?;
        debug!(collection = self.name(), "inserted document");

        Ok(InsertResult { inserted: vec![document] })
    }

    async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<InsertResult> {
        let documents: Vec<_> = documents.into_iter().map(with_id).collect();
        self.inner.insert_many(&documents).await.map_err(backend_error)?;
        debug!(collection = self.name(), count = documents.len(), "inserted documents");

        Ok(InsertResult { inserted: documents })
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        let result = if is_operator_update(&update) {
            self.inner
                .update_one(filter, update)
                .upsert(options.upsert)
                .await
        } else {
            self.inner
                .replace_one(filter, &update)
                .upsert(options.upsert)
                .await
        }
        .map_err(backend_error)?;

        Ok(summary(result))
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        let result = self
            .inner
            .update_many(filter, update)
            .upsert(options.upsert)
            .await
            .map_err(backend_error)?;

        Ok(summary(result))
    }

    async fn delete_one(&self, filter: Document) -> DocumentStoreResult<DeleteResult> {
        let result = self.inner.delete_one(filter).await.map_err(backend_error)?;

        Ok(DeleteResult {
            deleted_count: result.deleted_count,
            reply: Some(doc! { "acknowledged": true, "deletedCount": result.deleted_count as i64 }),
        })
    }

    async fn delete_many(&self, filter: Document) -> DocumentStoreResult<DeleteResult> {
        let result = self.inner.delete_many(filter).await.map_err(backend_error)?;

        Ok(DeleteResult {
            deleted_count: result.deleted_count,
            reply: Some(doc! { "acknowledged": true, "deletedCount": result.deleted_count as i64 }),
        })
    }
}

fn summary(result: mongodb::results::UpdateResult) -> UpdateResult {
    UpdateResult {
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        reply: Some(doc! {
            "acknowledged": true,
            "matchedCount": result.matched_count as i64,
            "modifiedCount": result.modified_count as i64,
        }),
        upserted_id: result.upserted_id,
    }
}

/// Operator updates start with a `$` key; anything else replaces the whole document.
fn is_operator_update(update: &Document) -> bool {
    update.keys().next().is_some_and(|key| key.starts_with('$'))
}

/// Assigns the `_id` client-side so inserted documents can be reported back whole.
fn with_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }

    let mut identified = doc! { "_id": ObjectId::new() };
    for (key, value) in document {
        identified.insert(key, value);
    }

    identified
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        let client =
            Client::with_options(options).map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        Ok(MongoDbStore::new(client, &self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_kind_detection() {
        assert!(is_operator_update(&doc! { "$set": { "a": 1 } }));
        assert!(!is_operator_update(&doc! { "a": 1 }));
    }

    #[test]
    fn test_client_side_id() {
        let document = with_id(doc! { "name": "Ana" });
        assert!(document.get_object_id("_id").is_ok());
        assert_eq!(document.keys().next().map(String::as_str), Some("_id"));

        let kept = with_id(doc! { "_id": 7, "name": "Bo" });
        assert_eq!(kept.get_i32("_id").unwrap(), 7);
    }

    #[tokio::test]
    async fn test_builder_rejects_malformed_dsn() {
        let err = MongoDbStore::builder("not-a-uri", "test").build().await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::Initialization(_)));
    }
}
