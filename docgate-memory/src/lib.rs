//! In-memory document storage backend for docgate.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Filters** - `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`,
//!   `$not`, `$and`, `$or`, `$nor`, dotted paths and array membership
//! - **Updates** - `$set`, `$unset`, `$inc`, `$push`, whole-document replacement and upserts
//! - **Reads** - projection, multi-key sort, skip and limit
//! - **Aggregation** - `$match`, `$sort`, `$skip`, `$limit`, `$project` and `$count` stages
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate_core::{backend::StoreBackendBuilder, collection::Collection};
//! use docgate_memory::InMemoryStore;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let users = Collection::new(&backend, "users", None)?;
//!
//!     users.insert_one(json!({ "name": "Alice", "joined": { "$date": "2024-05-01T00:00:00Z" } })).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_memory;

mod evaluator;
mod pipeline;
pub mod store;
mod update;

pub use store::{InMemoryCollection, InMemoryStore, InMemoryStoreBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use docgate_core::{
        backend::{StoreBackendBuilder, UpdateOptions},
        codec::ExtJsonMode,
        collection::Collection,
        error::{DocumentStoreError, Stage},
        operation::FindOptions,
        options::CollectionOptions,
    };
    use serde_json::{Value, json};

    fn people_schema() -> Value {
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "name": "people",
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"},
                "status": {"type": "string", "default": "active"},
            },
        })
    }

    #[tokio::test]
    async fn test_insert_with_coercion_and_default() {
        let store = InMemoryStore::new();
        let people = Collection::new(&store, people_schema(), None).unwrap();

        let ana = people.insert_one(json!({"name": "Ana", "age": "30"})).await.unwrap();

        assert_eq!(ana["age"], json!(30));
        assert_eq!(ana["status"], json!("active"));
        assert!(ana["_id"]["$oid"].is_string());

        let stored = store.documents("people").await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get_str("status").unwrap(), "active");
    }

    #[tokio::test]
    async fn test_rejected_documents_are_not_stored() {
        let store = InMemoryStore::new();
        let people = Collection::new(&store, people_schema(), None).unwrap();

        let err = people
            .insert_many(json!([{"name": "Ana"}, {"age": 3}]))
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Validation { .. }));
        assert!(store.documents("people").await.is_empty());
    }

    #[tokio::test]
    async fn test_extended_values_round_trip() {
        let store = InMemoryStore::new();
        let events = Collection::new(&store, "events", None).unwrap();
        let id = ObjectId::new().to_hex();

        events
            .insert_one(json!({
                "_id": {"$oid": id},
                "at": {"$date": "2024-05-01T12:00:00Z"},
                "payload": {"$binary": {"base64": "AQID", "subType": "00"}},
            }))
            .await
            .unwrap();

        let found = events
            .find(json!({"_id": {"$oid": id}}), FindOptions::default())
            .await
            .unwrap();

        assert_eq!(found[0]["_id"], json!({"$oid": id}));
        assert_eq!(found[0]["at"], json!({"$date": "2024-05-01T12:00:00Z"}));
        assert_eq!(found[0]["payload"], json!({"$binary": {"base64": "AQID", "subType": "00"}}));
    }

    #[tokio::test]
    async fn test_canonical_output_mode() {
        let store = InMemoryStore::new();
        let options = CollectionOptions::new().with_ext_json_mode(ExtJsonMode::Canonical);
        let counters = Collection::new(&store, "counters", Some(options)).unwrap();

        counters.insert_one(json!({"_id": 1, "n": 5})).await.unwrap();
        let found = counters.find_one(json!({"_id": 1}), FindOptions::default()).await.unwrap();

        assert_eq!(found, json!({"_id": {"$numberInt": "1"}, "n": {"$numberInt": "5"}}));
    }

    #[tokio::test]
    async fn test_find_materializes_every_match() {
        let store = InMemoryStore::builder()
            .with_documents(
                "people",
                vec![
                    bson::doc! { "_id": 1, "name": "Ana", "age": 30 },
                    bson::doc! { "_id": 2, "name": "Bo", "age": 25 },
                ],
            )
            .build()
            .await
            .unwrap();
        let people = Collection::new(&store, "people", None).unwrap();

        let found = people
            .find(json!({}), FindOptions::default().with_sort(json!({"age": 1})))
            .await
            .unwrap();

        assert_eq!(
            found,
            json!([
                {"_id": 2, "name": "Bo", "age": 25},
                {"_id": 1, "name": "Ana", "age": 30},
            ])
        );
        assert_eq!(people.count(json!({"age": {"$gt": 26}})).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_compound_sort_follows_key_order() {
        let store = InMemoryStore::new();
        let players = Collection::new(&store, "players", None).unwrap();
        players
            .insert_many(json!([
                {"_id": 1, "team": "b", "age": 1},
                {"_id": 2, "team": "a", "age": 2},
            ]))
            .await
            .unwrap();

        let found = players
            .find(json!({}), FindOptions::default().with_sort(json!({"team": 1, "age": 1})))
            .await
            .unwrap();
        let ids: Vec<_> = found.as_array().unwrap().iter().map(|doc| doc["_id"].clone()).collect();
        assert_eq!(ids, [json!(2), json!(1)]);

        let sorted = players
            .aggregate(json!([{"$sort": {"team": 1, "age": 1}}]))
            .await
            .unwrap();
        assert_eq!(sorted[0]["_id"], json!(2));

        let stored = players.find_one(json!({"_id": 1}), FindOptions::default()).await.unwrap();
        let keys: Vec<_> = stored.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["_id", "team", "age"]);
    }

    #[tokio::test]
    async fn test_inc_overflow_is_a_delegation_error() {
        let store = InMemoryStore::new();
        let counters = Collection::new(&store, "counters", None).unwrap();
        counters
            .insert_one(json!({"_id": 1, "n": {"$numberLong": "9223372036854775807"}}))
            .await
            .unwrap();

        let err = counters
            .update_one(json!({"_id": 1}), json!({"$inc": {"n": 1}}), UpdateOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Delegation));
        let stored = counters.find_one(json!({"_id": 1}), FindOptions::default()).await.unwrap();
        assert_eq!(stored["n"], json!(i64::MAX));
    }

    #[tokio::test]
    async fn test_writes_report_plain_results() {
        let store = InMemoryStore::new();
        let people = Collection::new(&store, "people", None).unwrap();
        people
            .insert(json!([{"name": "Ana"}, {"name": "Bo"}, {"name": "Cy"}]))
            .await
            .unwrap();

        let summary = people
            .update_many(json!({}), json!({"$set": {"seen": true}}), UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(summary, json!({"matchedCount": 3, "modifiedCount": 3, "upsertedId": null}));

        assert_eq!(people.delete_one(json!({"name": "Ana"})).await.unwrap(), json!(1));
        assert_eq!(people.delete_many(json!({})).await.unwrap(), json!(2));
        assert_eq!(people.find_one(json!({}), FindOptions::default()).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_aggregate_through_the_gateway() {
        let store = InMemoryStore::new();
        let people = Collection::new(&store, "people", None).unwrap();
        people
            .insert_many(json!([{"name": "Ana", "team": "ops"}, {"name": "Bo", "team": "dev"}]))
            .await
            .unwrap();

        let result = people
            .aggregate(json!([{"$match": {"team": "ops"}}, {"$project": {"_id": 0, "name": 1}}]))
            .await
            .unwrap();

        assert_eq!(result, json!([{"name": "Ana"}]));
    }

    #[tokio::test]
    async fn test_unsupported_filter_is_a_delegation_error() {
        let store = InMemoryStore::new();
        let people = Collection::new(&store, "people", None).unwrap();

        let err = people.count(json!({"name": {"$regex": "^A"}})).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Delegation));
    }
}
