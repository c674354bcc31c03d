//! Typed operation arguments and their canonical store-side form.
//!
//! Every forwarded operation has a [`Call`] variant carrying its arguments in the caller's
//! JSON form. [`Call::canonicalize`] turns a call into a [`Request`] by passing every present
//! argument through the codec; [`Request::dispatch`] forwards it to the matching
//! [`StoreCollection`] method and wraps the raw outcome in a [`Response`].

use std::fmt;

use bson::{Bson, Document};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    backend::{
        DeleteResult, DocumentCursor, FindSpec, InsertResult, StoreCollection, UpdateOptions,
        UpdateResult,
    },
    codec::ExtendedValueCodec,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// The forwarded collection operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Find,
    FindOne,
    Count,
    Aggregate,
    Insert,
    InsertOne,
    InsertMany,
    Update,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::Count => "count",
            Operation::Aggregate => "aggregate",
            Operation::Insert => "insert",
            Operation::InsertOne => "insertOne",
            Operation::InsertMany => "insertMany",
            Operation::Update => "update",
            Operation::UpdateOne => "updateOne",
            Operation::UpdateMany => "updateMany",
            Operation::DeleteOne => "deleteOne",
            Operation::DeleteMany => "deleteMany",
        }
    }

    /// Whether documents of this operation pass the schema gate.
    pub fn is_validated(&self) -> bool {
        matches!(self, Operation::Insert | Operation::InsertOne | Operation::InsertMany)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read options in the caller's JSON form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FindOptions {
    pub projection: Option<Value>,
    pub sort: Option<Value>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn with_projection(mut self, projection: Value) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Arguments of one forwarded operation, in the caller's JSON form.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find { filter: Value, options: FindOptions },
    FindOne { filter: Value, options: FindOptions },
    Count { filter: Value },
    Aggregate { pipeline: Value },
    /// One document or an array of documents.
    Insert { documents: Value },
    InsertOne { document: Value },
    InsertMany { documents: Value },
    Update { filter: Value, update: Value, options: UpdateOptions },
    UpdateOne { filter: Value, update: Value, options: UpdateOptions },
    UpdateMany { filter: Value, update: Value, options: UpdateOptions },
    DeleteOne { filter: Value },
    DeleteMany { filter: Value },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::Find { .. } => Operation::Find,
            Call::FindOne { .. } => Operation::FindOne,
            Call::Count { .. } => Operation::Count,
            Call::Aggregate { .. } => Operation::Aggregate,
            Call::Insert { .. } => Operation::Insert,
            Call::InsertOne { .. } => Operation::InsertOne,
            Call::InsertMany { .. } => Operation::InsertMany,
            Call::Update { .. } => Operation::Update,
            Call::UpdateOne { .. } => Operation::UpdateOne,
            Call::UpdateMany { .. } => Operation::UpdateMany,
            Call::DeleteOne { .. } => Operation::DeleteOne,
            Call::DeleteMany { .. } => Operation::DeleteMany,
        }
    }

    /// The identifying first argument: a filter, a document, a batch or a pipeline.
    pub fn subject(&self) -> &Value {
        match self {
            Call::Find { filter, .. }
            | Call::FindOne { filter, .. }
            | Call::Count { filter }
            | Call::Update { filter, .. }
            | Call::UpdateOne { filter, .. }
            | Call::UpdateMany { filter, .. }
            | Call::DeleteOne { filter }
            | Call::DeleteMany { filter } => filter,
            Call::Aggregate { pipeline } => pipeline,
            Call::Insert { documents } | Call::InsertMany { documents } => documents,
            Call::InsertOne { document } => document,
        }
    }

    /// Canonicalizes every argument independently through `codec`.
    pub fn canonicalize(&self, codec: &dyn ExtendedValueCodec) -> DocumentStoreResult<Request> {
        let document = |value: &Value, role: &str| into_document(codec.canonicalize_input(value)?, role);
        let optional = |value: &Option<Value>, role: &str| {
            value.as_ref().map(|value| document(value, role)).transpose()
        };
        let find_spec = |options: &FindOptions| -> DocumentStoreResult<FindSpec> {
            Ok(FindSpec {
                projection: optional(&options.projection, "projection")?,
                sort: optional(&options.sort, "sort")?,
                skip: options.skip,
                limit: options.limit,
            })
        };

        Ok(match self {
            Call::Find { filter, options } => Request::Find {
                filter: document(filter, "filter")?,
                options: find_spec(options)?,
            },
            Call::FindOne { filter, options } => Request::FindOne {
                filter: document(filter, "filter")?,
                options: find_spec(options)?,
            },
            Call::Count { filter } => Request::Count {
                filter: document(filter, "filter")?,
            },
            Call::Aggregate { pipeline } => Request::Aggregate {
                pipeline: documents(codec.canonicalize_input(pipeline)?, "pipeline stage", false)?,
            },
            Call::Insert { documents: batch } => Request::Insert {
                documents: documents(codec.canonicalize_input(batch)?, "document", true)?,
            },
            Call::InsertOne { document: single } => Request::InsertOne {
                document: document(single, "document")?,
            },
            Call::InsertMany { documents: batch } => Request::InsertMany {
                documents: documents(codec.canonicalize_input(batch)?, "document", false)?,
            },
            Call::Update { filter, update, options } => Request::Update {
                filter: document(filter, "filter")?,
                update: document(update, "update")?,
                options: *options,
            },
            Call::UpdateOne { filter, update, options } => Request::UpdateOne {
                filter: document(filter, "filter")?,
                update: document(update, "update")?,
                options: *options,
            },
            Call::UpdateMany { filter, update, options } => Request::UpdateMany {
                filter: document(filter, "filter")?,
                update: document(update, "update")?,
                options: *options,
            },
            Call::DeleteOne { filter } => Request::DeleteOne {
                filter: document(filter, "filter")?,
            },
            Call::DeleteMany { filter } => Request::DeleteMany {
                filter: document(filter, "filter")?,
            },
        })
    }
}

fn into_document(value: Bson, role: &str) -> DocumentStoreResult<Document> {
    match value {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "{role} must be a document, found {:?}",
            other.element_type()
        ))),
    }
}

/// Unpacks an array of documents. With `allow_single`, a lone document is accepted too.
fn documents(value: Bson, role: &str, allow_single: bool) -> DocumentStoreResult<Vec<Document>> {
    match value {
        Bson::Array(items) => items
            .into_iter()
            .map(|item| into_document(item, role))
            .collect(),
        Bson::Document(document) if allow_single => Ok(vec![document]),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected an array of {role}s, found {:?}",
            other.element_type()
        ))),
    }
}

/// A canonicalized [`Call`], ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Find { filter: Document, options: FindSpec },
    FindOne { filter: Document, options: FindSpec },
    Count { filter: Document },
    Aggregate { pipeline: Vec<Document> },
    Insert { documents: Vec<Document> },
    InsertOne { document: Document },
    InsertMany { documents: Vec<Document> },
    Update { filter: Document, update: Document, options: UpdateOptions },
    UpdateOne { filter: Document, update: Document, options: UpdateOptions },
    UpdateMany { filter: Document, update: Document, options: UpdateOptions },
    DeleteOne { filter: Document },
    DeleteMany { filter: Document },
}

impl Request {
    /// Forwards the request to the matching store operation.
    pub async fn dispatch<C>(self, collection: &C) -> DocumentStoreResult<Response>
    where
        C: StoreCollection + ?Sized,
    {
        Ok(match self {
            Request::Find { filter, options } => Response::Cursor(collection.find(filter, options).await?),
            Request::FindOne { filter, options } => {
                Response::Document(collection.find_one(filter, options).await?)
            }
            Request::Count { filter } => Response::Count(collection.count(filter).await?),
            Request::Aggregate { pipeline } => Response::Cursor(collection.aggregate(pipeline).await?),
            Request::Insert { documents } => Response::Inserted(collection.insert(documents).await?),
            Request::InsertOne { document } => {
                Response::Inserted(collection.insert_one(document).await?)
            }
            Request::InsertMany { documents } => {
                Response::Inserted(collection.insert_many(documents).await?)
            }
            Request::Update { filter, update, options } => {
                Response::Updated(collection.update(filter, update, options).await?)
            }
            Request::UpdateOne { filter, update, options } => {
                Response::Updated(collection.update_one(filter, update, options).await?)
            }
            Request::UpdateMany { filter, update, options } => {
                Response::Updated(collection.update_many(filter, update, options).await?)
            }
            Request::DeleteOne { filter } => Response::Deleted(collection.delete_one(filter).await?),
            Request::DeleteMany { filter } => {
                Response::Deleted(collection.delete_many(filter).await?)
            }
        })
    }
}

/// The raw outcome of a store operation.
#[derive(Debug)]
pub enum Response {
    Cursor(DocumentCursor),
    Document(Option<Document>),
    Count(u64),
    Inserted(InsertResult),
    Updated(UpdateResult),
    Deleted(DeleteResult),
}
