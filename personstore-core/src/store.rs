//! Main document store handle.
//!
//! A [`DocumentStore`] owns a backend and hands out collection handles bound to it.
//! It is created once at startup, passed explicitly to whoever needs storage, and torn
//! down with [`DocumentStore::shutdown`].
//!
//! ```ignore
//! use personstore_core::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let people = store.typed_collection_named::<Person>("Person");
//! // ...
//! store.shutdown().await?;
//! ```

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    document::Document,
    error::DocumentStoreResult,
};

#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Borrows the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A typed handle on a collection with an explicit name.
    pub fn typed_collection_named<'a, D: Document>(&'a self, name: &str) -> TypedCollection<'a, B, D> {
        TypedCollection::new(name.to_string(), &self.backend)
    }

    /// Checks that the backend is reachable.
    pub async fn ping(&self) -> DocumentStoreResult<()> {
        self.backend.ping().await
    }

    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts the backend down, consuming the handle.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}
