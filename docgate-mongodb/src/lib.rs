//! MongoDB backend implementation for docgate.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Gated
//! collections forward their canonicalized arguments straight to the official driver, so
//! filters, updates and pipelines run on MongoDB's own query engine.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docgate = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! Inserted documents get their `_id` assigned client-side, so insert operations can report
//! the documents exactly as written.
//!
//! # Example
//!
//! ```ignore
//! use docgate::{backend::StoreBackendBuilder, collection::Collection, mongodb::MongoDbStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let users = Collection::new(&store, "users", None)?;
//!     users.insert_one(json!({ "name": "Alice" })).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_mongodb;

pub mod store;

pub use store::{MongoCollection, MongoDbStore, MongoDbStoreBuilder};
