//! Operation-specific result adapters.
//!
//! A [`ResultAdapter`] extracts the meaningful payload from a raw store [`Response`]:
//! cursors are materialized, inserted documents are pulled out of insert results, write
//! results are stripped of their acknowledgement bookkeeping and deletes are reduced to
//! their count.

use bson::{Bson, Document, doc};
use serde_json::Value;

use crate::{
    backend::{DeleteResult, InsertResult, UpdateResult},
    error::{DocumentStoreError, DocumentStoreResult},
    operation::Response,
};

/// The payload extracted from a store response.
#[derive(Debug, Clone, PartialEq)]
pub enum Shaped {
    /// A structured value that still has to be canonicalized for the caller.
    Structured(Bson),
    /// A plain scalar handed to the caller as-is.
    Scalar(Value),
    /// Nothing to return (e.g. `findOne` without a match).
    Null,
}

/// How a raw store response is turned into the caller's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAdapter {
    /// Pass documents and counts through unchanged.
    Identity,
    /// Drain a cursor into an ordered array.
    Materialize,
    /// The single inserted document.
    InsertedDocument,
    /// Every inserted document, as an array.
    InsertedDocuments,
    /// `{ matchedCount, modifiedCount, upsertedId }` without the raw reply.
    WriteSummary,
    /// The number of deleted documents.
    DeletedCount,
}

impl ResultAdapter {
    /// Applies the adapter.
    ///
    /// # Errors
    ///
    /// Fails when the response does not have the shape this adapter expects, or when
    /// draining a cursor fails.
    pub async fn apply(self, response: Response) -> DocumentStoreResult<Shaped> {
        match (self, response) {
            (ResultAdapter::Identity, Response::Document(Some(document))) => {
                Ok(Shaped::Structured(Bson::Document(document)))
            }
            (ResultAdapter::Identity, Response::Document(None)) => Ok(Shaped::Null),
            (ResultAdapter::Identity, Response::Count(count)) => Ok(Shaped::Scalar(Value::from(count))),
            (ResultAdapter::Materialize, Response::Cursor(cursor)) => Ok(Shaped::Structured(
                Bson::Array(cursor.to_vec().await?.into_iter().map(Bson::Document).collect()),
            )),
            (ResultAdapter::InsertedDocument, Response::Inserted(InsertResult { inserted })) => {
                match <[Document; 1]>::try_from(inserted) {
                    Ok([document]) => Ok(Shaped::Structured(Bson::Document(document))),
                    Err(inserted) => Err(DocumentStoreError::InvalidDocument(format!(
                        "expected one inserted document, store reported {}",
                        inserted.len()
                    ))),
                }
            }
            (ResultAdapter::InsertedDocuments, Response::Inserted(InsertResult { inserted })) => {
                Ok(Shaped::Structured(Bson::Array(
                    inserted.into_iter().map(Bson::Document).collect(),
                )))
            }
            (ResultAdapter::WriteSummary, Response::Updated(result)) => {
                Ok(Shaped::Structured(Bson::Document(write_summary(result))))
            }
            (ResultAdapter::DeletedCount, Response::Deleted(DeleteResult { deleted_count, .. })) => {
                Ok(Shaped::Scalar(Value::from(deleted_count)))
            }
            (adapter, response) => Err(DocumentStoreError::InvalidDocument(format!(
                "{adapter:?} cannot adapt {}",
                describe(&response)
            ))),
        }
    }
}

fn write_summary(result: UpdateResult) -> Document {
    let count = |n: u64| i64::try_from(n).map(Bson::Int64).unwrap_or(Bson::Double(n as f64));

    doc! {
        "matchedCount": count(result.matched_count),
        "modifiedCount": count(result.modified_count),
        "upsertedId": result.upserted_id.unwrap_or(Bson::Null),
    }
}

/// Short description of a raw response, attached to adaptation errors.
pub(crate) fn describe(response: &Response) -> String {
    match response {
        Response::Cursor(_) => "cursor".to_string(),
        Response::Document(Some(document)) => format!("document {document}"),
        Response::Document(None) => "no document".to_string(),
        Response::Count(count) => format!("count {count}"),
        Response::Inserted(result) => format!("insert result ({} documents)", result.inserted.len()),
        Response::Updated(result) => format!(
            "update result (matched {}, modified {})",
            result.matched_count, result.modified_count
        ),
        Response::Deleted(result) => format!("delete result (deleted {})", result.deleted_count),
    }
}
