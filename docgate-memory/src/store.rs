//! In-memory storage implementation for gated collections.
//!
//! Documents are kept as BSON in insertion order, one vector per collection, behind an
//! async-aware read-write lock.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use mea::rwlock::RwLock;
use tracing::debug;

use docgate_core::{
    backend::{
        DeleteResult, DocumentCursor, FindSpec, InsertResult, StoreBackend, StoreBackendBuilder,
        StoreCollection, UpdateOptions, UpdateResult,
    },
    error::{DocumentStoreError, DocumentStoreResult},
    options::CollectionOptions,
};

use crate::{evaluator::DocumentEvaluator, pipeline, update};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// shared across async tasks. Clones share the same underlying data, and so do the
/// collection handles it opens.
///
/// Queries scan every document in a collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docgate_core::collection::Collection;
/// use docgate_memory::InMemoryStore;
/// use serde_json::json;
///
/// let store = InMemoryStore::new();
/// let users = Collection::new(&store, "users", None)?;
/// users.insert_one(json!({ "name": "Alice" })).await?;
/// assert_eq!(store.documents("users").await.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents, in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Lists the collections that have been written to.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.store.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns a snapshot of a collection's documents, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Drops a collection and all of its documents.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CollectionNotFound`] if the collection does not exist.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        match self.store.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(DocumentStoreError::CollectionNotFound(name.to_string())),
        }
    }
}

impl StoreBackend for InMemoryStore {
    type Collection = InMemoryCollection;

    fn collection(
        &self,
        name: &str,
        _options: &CollectionOptions,
    ) -> DocumentStoreResult<Self::Collection> {
        Ok(InMemoryCollection {
            name: name.to_string(),
            store: self.store.clone(),
        })
    }
}

/// Handle to one collection of an [`InMemoryStore`].
#[derive(Clone, Debug)]
pub struct InMemoryCollection {
    name: String,
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn matching(&self, filter: &Document) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;

        match store.get(&self.name) {
            Some(documents) => DocumentEvaluator::filter_documents(documents, filter),
            None => Ok(Vec::new()),
        }
    }

    async fn update_matching(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        many: bool,
    ) -> DocumentStoreResult<UpdateResult> {
        if many && !update::is_operator_update(&update)? {
            return Err(DocumentStoreError::InvalidDocument(
                "multi-document updates require update operators".into(),
            ));
        }

        let mut store = self.store.write().await;
        let documents = store.entry(self.name.clone()).or_default();

        let (mut matched, mut modified) = (0u64, 0u64);
        for document in documents.iter_mut() {
            if !DocumentEvaluator::new(document).matches(&filter)? {
                continue;
            }
            matched += 1;
            if update::apply(document, &update)? {
                modified += 1;
            }
            if !many {
                break;
            }
        }

        let mut upserted_id = None;
        if matched == 0 && options.upsert {
            let document = update::upsert(&filter, &update)?;
            upserted_id = document.get("_id").cloned();
            documents.push(document);
        }

        debug!(collection = %self.name, matched, modified, upserted = upserted_id.is_some(), "updated documents");

        let n = matched + u64::from(upserted_id.is_some());
        Ok(UpdateResult {
            matched_count: matched,
            modified_count: modified,
            reply: Some(doc! {
                "ok": 1,
                "n": count(n),
                "nModified": count(modified),
            }),
            upserted_id,
        })
    }

    async fn delete_matching(&self, filter: Document, many: bool) -> DocumentStoreResult<DeleteResult> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(&self.name) else {
            return Ok(DeleteResult {
                deleted_count: 0,
                reply: Some(doc! { "ok": 1, "n": 0 }),
            });
        };

        let mut doomed = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(&filter)? {
                doomed.push(index);
                if !many {
                    break;
                }
            }
        }

        for index in doomed.iter().rev() {
            documents.remove(*index);
        }

        let deleted_count = doomed.len() as u64;
        debug!(collection = %self.name, deleted_count, "deleted documents");

        Ok(DeleteResult {
            deleted_count,
            reply: Some(doc! { "ok": 1, "n": count(deleted_count) }),
        })
    }
}

fn count(n: u64) -> Bson {
    i64::try_from(n).map(Bson::Int64).unwrap_or(Bson::Double(n as f64))
}

#[async_trait]
impl StoreCollection for InMemoryCollection {
    async fn find(&self, filter: Document, options: FindSpec) -> DocumentStoreResult<DocumentCursor> {
        let documents = pipeline::shape(self.matching(&filter).await?, &options)?;

        Ok(DocumentCursor::from_documents(documents))
    }

    async fn find_one(&self, filter: Document, options: FindSpec) -> DocumentStoreResult<Option<Document>> {
        let options = FindSpec { limit: Some(1), ..options };

        Ok(pipeline::shape(self.matching(&filter).await?, &options)?
            .into_iter()
            .next())
    }

    async fn count(&self, filter: Document) -> DocumentStoreResult<u64> {
        Ok(self.matching(&filter).await?.len() as u64)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> DocumentStoreResult<DocumentCursor> {
        let documents = self.store.read().await.get(&self.name).cloned().unwrap_or_default();

        Ok(DocumentCursor::from_documents(pipeline::aggregate(documents, &pipeline)?))
    }

    async fn insert_one(&self, document: Document) -> DocumentStoreResult<InsertResult> {
        self.insert_many(vec![document]).await
    }

    /// Inserts the batch atomically: a duplicate `_id` anywhere rejects the whole batch.
    async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<InsertResult> {
        let inserted: Vec<_> = documents.into_iter().map(update::with_id).collect();

        let mut store = self.store.write().await;
        let collection = store.entry(self.name.clone()).or_default();

        for (index, document) in inserted.iter().enumerate() {
            let id = document.get("_id");
            let taken = collection.iter().any(|existing| existing.get("_id") == id)
                || inserted[..index].iter().any(|earlier| earlier.get("_id") == id);
            if taken {
                return Err(DocumentStoreError::Backend(format!(
                    "duplicate key: _id {} already exists in {}",
                    id.map(ToString::to_string).unwrap_or_default(),
                    self.name
                )));
            }
        }

        collection.extend(inserted.iter().cloned());
        debug!(collection = %self.name, count = inserted.len(), "inserted documents");

        Ok(InsertResult { inserted })
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.update_matching(filter, update, options, false).await
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.update_matching(filter, update, options, true).await
    }

    async fn delete_one(&self, filter: Document) -> DocumentStoreResult<DeleteResult> {
        self.delete_matching(filter, false).await
    }

    async fn delete_many(&self, filter: Document) -> DocumentStoreResult<DeleteResult> {
        self.delete_matching(filter, true).await
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docgate_core::backend::StoreBackendBuilder;
/// use docgate_memory::InMemoryStore;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: StoreMap,
}

impl InMemoryStoreBuilder {
    /// Pre-populates a collection. Documents without an `_id` get one generated.
    pub fn with_documents(mut self, collection: &str, documents: Vec<Document>) -> Self {
        self.seed
            .entry(collection.to_string())
            .or_default()
            .extend(documents.into_iter().map(update::with_id));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore {
            store: Arc::new(RwLock::new(self.seed)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    fn users(store: &InMemoryStore) -> InMemoryCollection {
        store.collection("users", &CollectionOptions::default()).unwrap()
    }

    async fn seeded() -> InMemoryStore {
        InMemoryStore::builder()
            .with_documents(
                "users",
                vec![
                    doc! { "_id": 1, "name": "Ana", "age": 30 },
                    doc! { "_id": 2, "name": "Bo", "age": 25 },
                    doc! { "_id": 3, "name": "Cy", "age": 35 },
                ],
            )
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_object_ids() {
        let store = InMemoryStore::new();

        let result = users(&store).insert_one(doc! { "name": "Ana" }).await.unwrap();

        let id = result.inserted[0].get_object_id("_id").unwrap();
        assert_eq!(store.documents("users").await[0].get_object_id("_id").unwrap(), id);
        assert_eq!(store.collection_names().await, vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejects_the_whole_batch() {
        let store = seeded().await;

        let err = users(&store)
            .insert_many(vec![doc! { "_id": 9 }, doc! { "_id": 1 }])
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Backend(msg) if msg.contains("duplicate key")));
        assert_eq!(store.documents("users").await.len(), 3);
    }

    #[tokio::test]
    async fn test_find_with_options() {
        let store = seeded().await;
        let options = FindSpec {
            projection: Some(doc! { "name": 1, "_id": 0 }),
            sort: Some(doc! { "age": -1 }),
            skip: Some(1),
            limit: Some(1),
        };

        let found = users(&store)
            .find(doc! { "age": { "$gte": 25 } }, options)
            .await
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        assert_eq!(found, vec![doc! { "name": "Ana" }]);
    }

    #[tokio::test]
    async fn test_find_one_and_count() {
        let store = seeded().await;
        let users = users(&store);

        let bo = users.find_one(doc! { "name": "Bo" }, FindSpec::default()).await.unwrap();
        let nobody = users.find_one(doc! { "name": "Zed" }, FindSpec::default()).await.unwrap();

        assert_eq!(bo.unwrap().get_i32("age").unwrap(), 25);
        assert!(nobody.is_none());
        assert_eq!(users.count(doc! { "age": { "$lt": 35 } }).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_one_touches_only_the_first_match() {
        let store = seeded().await;

        let result = users(&store)
            .update_one(doc! {}, doc! { "$inc": { "age": 1 } }, UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!((result.matched_count, result.modified_count), (1, 1));
        let ages: Vec<_> = store
            .documents("users")
            .await
            .iter()
            .map(|d| d.get_i32("age").unwrap())
            .collect();
        assert_eq!(ages, vec![31, 25, 35]);
    }

    #[tokio::test]
    async fn test_update_many_and_upsert() {
        let store = seeded().await;
        let users = users(&store);

        let result = users
            .update_many(doc! { "age": { "$gt": 26 } }, doc! { "$set": { "senior": true } }, UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!((result.matched_count, result.modified_count), (2, 2));

        let result = users
            .update_one(
                doc! { "name": "Di" },
                doc! { "$set": { "age": 40 } },
                UpdateOptions::default().with_upsert(true),
            )
            .await
            .unwrap();
        assert_eq!(result.matched_count, 0);
        assert!(matches!(result.upserted_id, Some(Bson::ObjectId(_))));

        let di = users.find_one(doc! { "name": "Di" }, FindSpec::default()).await.unwrap().unwrap();
        assert_eq!(di.get_i32("age").unwrap(), 40);
    }

    #[tokio::test]
    async fn test_replacement_requires_a_single_target() {
        let store = seeded().await;

        let err = users(&store)
            .update_many(doc! {}, doc! { "name": "X" }, UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_delete_one_and_many() {
        let store = seeded().await;
        let users = users(&store);

        assert_eq!(users.delete_one(doc! { "age": { "$gt": 0 } }).await.unwrap().deleted_count, 1);
        assert_eq!(users.delete_many(doc! {}).await.unwrap().deleted_count, 2);
        assert!(store.documents("users").await.is_empty());

        let nothing = store
            .collection("ghosts", &CollectionOptions::default())
            .unwrap()
            .delete_many(doc! {})
            .await
            .unwrap();
        assert_eq!(nothing.deleted_count, 0);
    }

    #[tokio::test]
    async fn test_aggregate() {
        let store = seeded().await;

        let result = users(&store)
            .aggregate(vec![doc! { "$match": { "age": { "$gte": 30 } } }, doc! { "$count": "n" }])
            .await
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        assert_eq!(result, vec![doc! { "n": 2 }]);
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let store = InMemoryStore::new();
        let clone = store.clone();

        users(&clone).insert_one(doc! { "_id": ObjectId::new() }).await.unwrap();

        assert_eq!(store.documents("users").await.len(), 1);
        clone.drop_collection("users").await.unwrap();
        assert!(matches!(
            store.drop_collection("users").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));
    }
}
