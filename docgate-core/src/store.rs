//! Owning entry point over a storage backend.
//!
//! [`DocumentStore`] owns a backend and hands out gated [`Collection`]s borrowing it.
//!
//! # Example
//!
//! ```ignore
//! use docgate_core::store::DocumentStore;
//! use serde_json::json;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.collection("users", None)?;
//! let found = users.find(json!({ "age": { "$gt": 21 } }), Default::default()).await?;
//! ```

use crate::{
    backend::StoreBackend,
    collection::Collection,
    error::DocumentStoreResult,
    options::{CollectionOptions, CollectionSource},
};

/// A document store bound to a specific backend implementation.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Opens a gated collection.
    ///
    /// Accepts the same arguments as [`Collection::new`].
    pub fn collection<'a>(
        &'a self,
        source: impl Into<CollectionSource>,
        options: Option<CollectionOptions>,
    ) -> DocumentStoreResult<Collection<'a, B>> {
        Collection::new(&self.backend, source, options)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consumes the store and returns the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Shuts the backend down, releasing its resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

impl<B: StoreBackend> From<B> for DocumentStore<B> {
    fn from(backend: B) -> Self {
        Self::new(backend)
    }
}
