//! Main docgate crate: schema-validated, Extended JSON aware document collections.
//!
//! This crate is the primary entry point for users of docgate. It re-exports the core types
//! from the sub-crates and provides access to the storage backends.
//!
//! A gated [`Collection`](collection::Collection) wraps a store collection and:
//!
//! - **Canonicalizes arguments** - Extended JSON wrappers such as `{"$oid": ...}` or
//!   `{"$date": ...}` become real BSON values before reaching the store
//! - **Canonicalizes results** - documents come back as Extended JSON in relaxed or canonical mode
//! - **Validates inserts** - documents are checked against a JSON Schema, with defaults and
//!   type coercion applied, before they are written
//! - **Attributes failures** - every error says which pipeline stage failed and on what input
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//!     let users = store.collection(json!({
//!         "name": "users",
//!         "type": "object",
//!         "required": ["email"],
//!         "properties": {
//!             "email": { "type": "string" },
//!             "age": { "type": "integer" },
//!             "role": { "type": "string", "default": "member" }
//!         }
//!     }), None)?;
//!
//!     // `age` is coerced to an integer and `role` defaulted before the write
//!     let alice = users.insert_one(json!({ "email": "alice@example.com", "age": "31" })).await?;
//!     println!("inserted {}", alice["_id"]);
//!
//!     let adults = users
//!         .find(json!({ "age": { "$gte": 18 } }), FindOptions::default().with_sort(json!({ "age": 1 })))
//!         .await?;
//!     println!("found {adults}");
//!
//!     match users.insert_one(json!({ "age": 4 })).await {
//!         Err(DocumentStoreError::Validation { errors }) => {
//!             for issue in errors {
//!                 println!("rejected: {issue}");
//!             }
//!         }
//!         other => println!("unexpected: {other:?}"),
//!     }
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docgate_core::{
    adapter, backend, codec, collection, error, gateway, operation, options, schema, store,
};

// Re-export BSON and JSON types for convenience
pub use bson;
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docgate_memory::{InMemoryCollection, InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgate_mongodb::{MongoCollection, MongoDbStore, MongoDbStoreBuilder};
}

#[cfg(test)]
mod tests {
    use super::{memory::InMemoryStore, prelude::*};
    use serde_json::json;

    #[tokio::test]
    async fn test_prelude_covers_the_common_path() {
        let store = DocumentStore::new(InMemoryStore::builder().build().await.unwrap());
        let options = CollectionOptions::new()
            .with_schema(json!({
                "type": "object",
                "properties": { "qty": { "type": "integer" } },
            }))
            .with_ext_json_mode(ExtJsonMode::Relaxed);
        let orders = store.collection("orders", Some(options)).unwrap();

        let inserted = orders.insert_one(json!({"qty": "2"})).await.unwrap();
        let found = orders
            .find(json!({"qty": 2}), FindOptions::default())
            .await
            .unwrap();

        assert_eq!(found, json!([inserted]));
        assert_eq!(
            orders
                .update_one(json!({"qty": 2}), json!({"$inc": {"qty": 1}}), UpdateOptions::default())
                .await
                .unwrap()["modifiedCount"],
            json!(1)
        );

        let err = orders.insert_one(json!({"qty": [1]})).await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::Validation { .. }));

        store.shutdown().await.unwrap();
    }
}
