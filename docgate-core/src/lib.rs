//! A canonicalizing, schema-validating gateway over JSON document database collections.
//!
//! This crate is the core of the docgate project and provides:
//!
//! - **Extended JSON codec** ([`codec`]) - Converts caller JSON to BSON and back
//! - **Schema validation** ([`schema`]) - Lazily bundled JSON Schema validation with defaults and coercion
//! - **Operation gateway** ([`gateway`]) - The four-stage canonicalize/dispatch/adapt/canonicalize pipeline
//! - **Collections interface** ([`collection`]) - The gated collection facade
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Document store** ([`store`]) - Owning entry point handing out gated collections
//! - **Error handling** ([`error`]) - Stage-attributed error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docgate_core::{collection::Collection, operation::FindOptions};
//! use serde_json::json;
//!
//! let users = Collection::new(&backend, json!({
//!     "name": "users",
//!     "type": "object",
//!     "properties": { "createdAt": { "type": "object" } }
//! }), None)?;
//!
//! users.insert_one(json!({ "createdAt": { "$date": "2024-01-01T00:00:00Z" } })).await?;
//! let found = users.find(json!({}), FindOptions::default()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod adapter;
pub mod backend;
pub mod codec;
pub mod collection;
pub mod error;
pub mod gateway;
pub mod operation;
pub mod options;
pub mod schema;
pub mod store;

#[cfg(test)]
pub(crate) mod mock;
