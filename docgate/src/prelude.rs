//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```
//!
//! This provides access to:
//! - The document store and gated collections
//! - Collection, validation, read and update options
//! - Store backend traits and builders
//! - The extended value codec
//! - Error types

pub use docgate_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoreCollection, UpdateOptions},
    codec::{ExtJsonCodec, ExtJsonMode, ExtendedValueCodec},
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult, Stage, ValidationIssue},
    operation::FindOptions,
    options::{CollectionOptions, CollectionSource, ValidatorOptions},
    schema::{LocalRefBundler, Schema, SchemaResolver, SchemaValidator},
    store::DocumentStore,
};
