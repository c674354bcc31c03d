//! Scripted store double used by the gateway and collection tests.

use std::sync::Mutex;

use async_trait::async_trait;
use bson::{Bson, Document, doc};

use crate::{
    backend::{
        DeleteResult, DocumentCursor, FindSpec, InsertResult, StoreBackend, StoreCollection,
        UpdateOptions, UpdateResult,
    },
    error::{DocumentStoreError, DocumentStoreResult},
    options::CollectionOptions,
};

/// What the double answers with.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    Documents(Vec<Document>),
    Cursor(fn() -> DocumentCursor),
    Count(u64),
    Deleted(u64),
    Fail(String),
}

#[derive(Debug)]
pub(crate) struct MockCollection {
    script: Script,
    calls: Mutex<Vec<&'static str>>,
    filters: Mutex<Vec<Document>>,
    written: Mutex<Vec<Document>>,
}

impl MockCollection {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_filter(&self) -> Option<Document> {
        self.filters.lock().unwrap().last().cloned()
    }

    pub(crate) fn written(&self) -> Vec<Document> {
        self.written.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, filter: Option<&Document>) -> DocumentStoreResult<()> {
        self.calls.lock().unwrap().push(operation);
        if let Some(filter) = filter {
            self.filters.lock().unwrap().push(filter.clone());
        }
        match &self.script {
            Script::Fail(message) => Err(DocumentStoreError::Backend(message.clone())),
            _ => Ok(()),
        }
    }

    fn cursor(&self) -> DocumentCursor {
        match &self.script {
            Script::Documents(documents) => DocumentCursor::from_documents(documents.clone()),
            Script::Cursor(make) => make(),
            _ => DocumentCursor::from_documents(Vec::new()),
        }
    }

    fn write(&self, documents: Vec<Document>) -> InsertResult {
        let mut written = self.written.lock().unwrap();
        let inserted = documents
            .into_iter()
            .map(|mut document| {
                if !document.contains_key("_id") {
                    document.insert("_id", Bson::Int64(written.len() as i64 + 1));
                }
                written.push(document.clone());
                document
            })
            .collect();

        InsertResult { inserted }
    }

    fn updated(&self) -> UpdateResult {
        UpdateResult {
            matched_count: 1,
            modified_count: 1,
            upserted_id: None,
            reply: Some(doc! { "ok": 1, "n": 1 }),
        }
    }

    fn deleted(&self) -> DeleteResult {
        let deleted_count = match &self.script {
            Script::Deleted(count) => *count,
            _ => 0,
        };

        DeleteResult {
            deleted_count,
            reply: Some(doc! { "ok": 1, "n": deleted_count as i64 }),
        }
    }
}

#[async_trait]
impl StoreCollection for MockCollection {
    async fn find(&self, filter: Document, _options: FindSpec) -> DocumentStoreResult<DocumentCursor> {
        self.record("find", Some(&filter))?;
        Ok(self.cursor())
    }

    async fn find_one(&self, filter: Document, _options: FindSpec) -> DocumentStoreResult<Option<Document>> {
        self.record("findOne", Some(&filter))?;
        Ok(match &self.script {
            Script::Documents(documents) => documents.first().cloned(),
            _ => None,
        })
    }

    async fn count(&self, filter: Document) -> DocumentStoreResult<u64> {
        self.record("count", Some(&filter))?;
        Ok(match &self.script {
            Script::Count(count) => *count,
            Script::Documents(documents) => documents.len() as u64,
            _ => 0,
        })
    }

    async fn aggregate(&self, _pipeline: Vec<Document>) -> DocumentStoreResult<DocumentCursor> {
        self.record("aggregate", None)?;
        Ok(self.cursor())
    }

    async fn insert_one(&self, document: Document) -> DocumentStoreResult<InsertResult> {
        self.record("insertOne", None)?;
        Ok(self.write(vec![document]))
    }

    async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<InsertResult> {
        self.record("insertMany", None)?;
        Ok(self.write(documents))
    }

    async fn update_one(
        &self,
        filter: Document,
        _update: Document,
        _options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.record("updateOne", Some(&filter))?;
        Ok(self.updated())
    }

    async fn update_many(
        &self,
        filter: Document,
        _update: Document,
        _options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.record("updateMany", Some(&filter))?;
        Ok(self.updated())
    }

    async fn delete_one(&self, filter: Document) -> DocumentStoreResult<DeleteResult> {
        self.record("deleteOne", Some(&filter))?;
        Ok(self.deleted())
    }

    async fn delete_many(&self, filter: Document) -> DocumentStoreResult<DeleteResult> {
        self.record("deleteMany", Some(&filter))?;
        Ok(self.deleted())
    }
}

/// A backend handing out one shared scripted collection.
#[derive(Debug)]
pub(crate) struct MockStore {
    pub(crate) collection: std::sync::Arc<MockCollection>,
    pub(crate) opened: Mutex<Vec<String>>,
}

impl MockStore {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            collection: std::sync::Arc::new(MockCollection::new(script)),
            opened: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl StoreCollection for std::sync::Arc<MockCollection> {
    async fn find(&self, filter: Document, options: FindSpec) -> DocumentStoreResult<DocumentCursor> {
        self.as_ref().find(filter, options).await
    }

    async fn find_one(&self, filter: Document, options: FindSpec) -> DocumentStoreResult<Option<Document>> {
        self.as_ref().find_one(filter, options).await
    }

    async fn count(&self, filter: Document) -> DocumentStoreResult<u64> {
        self.as_ref().count(filter).await
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> DocumentStoreResult<DocumentCursor> {
        self.as_ref().aggregate(pipeline).await
    }

    async fn insert_one(&self, document: Document) -> DocumentStoreResult<InsertResult> {
        self.as_ref().insert_one(document).await
    }

    async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<InsertResult> {
        self.as_ref().insert_many(documents).await
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.as_ref().update_one(filter, update, options).await
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.as_ref().update_many(filter, update, options).await
    }

    async fn delete_one(&self, filter: Document) -> DocumentStoreResult<DeleteResult> {
        self.as_ref().delete_one(filter).await
    }

    async fn delete_many(&self, filter: Document) -> DocumentStoreResult<DeleteResult> {
        self.as_ref().delete_many(filter).await
    }
}

impl StoreBackend for MockStore {
    type Collection = std::sync::Arc<MockCollection>;

    fn collection(
        &self,
        name: &str,
        _options: &CollectionOptions,
    ) -> DocumentStoreResult<Self::Collection> {
        self.opened.lock().unwrap().push(name.to_string());
        Ok(self.collection.clone())
    }
}
