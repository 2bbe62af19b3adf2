//! Storage backend abstraction for the document store.
//!
//! This module defines the core traits that abstract over different storage implementations,
//! allowing the document store to work with various backends (in-memory, MongoDB, ...).
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for document insertion,
//! retrieval, versioned replacement, deletion, querying, and collection management.
//! Implementations are required to be thread-safe (`Send + Sync`) and support concurrent
//! access. The trait is object safe, so `Box<dyn StoreBackend>` can stand in for a backend
//! chosen at runtime.
//!
//! # Atomicity
//!
//! Every method is one atomic unit with respect to the documents it touches:
//! a batch insert stores all documents or none, a replace either lands on the expected
//! version or changes nothing, and a find-and-update or find-and-delete never
//! interleaves with another write to the same document.
//!
//! # Versions
//!
//! Backends keep a version counter next to every document. Inserts start at 1, every
//! write increments it, and [`StoreBackend::replace_document`] only succeeds when the
//! caller's expected version is still current.
//!
//! # Examples
//!
//! ```ignore
//! use personstore_core::backend::StoreBackend;
//! use bson::{Uuid, Bson, doc};
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = Uuid::new();
//! let doc = Bson::Document(doc! { "name": "Alice Johnson", "age": 28 });
//! backend.insert_documents(vec![(id, doc)], "Person").await?;
//!
//! let current = backend.get_versioned(id, "Person").await?.unwrap();
//! backend.replace_document(id, current.version, current.document, "Person").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, Uuid};
use std::{fmt::Debug, sync::Arc};

use crate::{
    document::Versioned,
    error::DocumentStoreResult,
    query::{Expr, Query},
};

/// Which image of a document a find-and-update returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDocument {
    /// The document as it was before the update.
    Before,
    /// The document with the update applied.
    After,
}

/// Abstract interface for document storage backends.
///
/// Errors that mean the storage cannot be reached must be reported as
/// [`DocumentStoreError::StoreUnavailable`](crate::error::DocumentStoreError::StoreUnavailable)
/// and never retried internally.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Checks that the storage is reachable.
    async fn ping(&self) -> DocumentStoreResult<()>;

    /// Inserts new documents. Fails without storing anything if any ID already exists.
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Returns the documents with the given IDs; missing IDs are omitted.
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Returns one document with its current version, or `None` if absent.
    async fn get_versioned(
        &self,
        id: Uuid,
        collection: &str,
    ) -> DocumentStoreResult<Option<Versioned<Bson>>>;

    /// Replaces a document if its version still equals `expected_version`.
    ///
    /// Returns the new version. Fails with `DocumentNotFound` if the document is gone
    /// and with `Conflict` if another write got there first.
    async fn replace_document(
        &self,
        id: Uuid,
        expected_version: u64,
        document: Bson,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Removes one document and returns it, or `None` if absent.
    async fn take_document(&self, id: Uuid, collection: &str) -> DocumentStoreResult<Option<Bson>>;

    /// Deletes every document matching `filter` (all documents when `None`) and
    /// returns how many were removed.
    async fn delete_matching(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Counts the documents matching `filter` (all documents when `None`).
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Runs a query: filter, then sort, then offset, then limit, then projection.
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Sets the `patch` fields on the first document matching `filter` in natural order
    /// and returns the requested image, or `None` when nothing matched.
    async fn find_one_and_update(
        &self,
        filter: Option<Expr>,
        patch: BsonDocument,
        returning: ReturnDocument,
        collection: &str,
    ) -> DocumentStoreResult<Option<Bson>>;

    /// Creates a collection. Creating an existing collection is a no-op.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Releases the backend's resources. Later calls fail with `StoreUnavailable`.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

macro_rules! forward_store_backend {
    ($($target:ty => [$($bounds:tt)*]),+ $(,)?) => {$(
        #[async_trait]
        impl<$($bounds)*> StoreBackend for $target {
            async fn ping(&self) -> DocumentStoreResult<()> {
                (**self).ping().await
            }

            async fn insert_documents(
                &self,
                documents: Vec<(Uuid, Bson)>,
                collection: &str,
            ) -> DocumentStoreResult<()> {
                (**self).insert_documents(documents, collection).await
            }

            async fn get_documents(
                &self,
                ids: Vec<Uuid>,
                collection: &str,
            ) -> DocumentStoreResult<Vec<Bson>> {
                (**self).get_documents(ids, collection).await
            }

            async fn get_versioned(
                &self,
                id: Uuid,
                collection: &str,
            ) -> DocumentStoreResult<Option<Versioned<Bson>>> {
                (**self).get_versioned(id, collection).await
            }

            async fn replace_document(
                &self,
                id: Uuid,
                expected_version: u64,
                document: Bson,
                collection: &str,
            ) -> DocumentStoreResult<u64> {
                (**self)
                    .replace_document(id, expected_version, document, collection)
                    .await
            }

            async fn take_document(&self, id: Uuid, collection: &str) -> DocumentStoreResult<Option<Bson>> {
                (**self).take_document(id, collection).await
            }

            async fn delete_matching(
                &self,
                filter: Option<Expr>,
                collection: &str,
            ) -> DocumentStoreResult<u64> {
                (**self).delete_matching(filter, collection).await
            }

            async fn count_documents(
                &self,
                filter: Option<Expr>,
                collection: &str,
            ) -> DocumentStoreResult<u64> {
                (**self).count_documents(filter, collection).await
            }

            async fn query_documents(
                &self,
                query: Query,
                collection: &str,
            ) -> DocumentStoreResult<Vec<Bson>> {
                (**self).query_documents(query, collection).await
            }

            async fn find_one_and_update(
                &self,
                filter: Option<Expr>,
                patch: BsonDocument,
                returning: ReturnDocument,
                collection: &str,
            ) -> DocumentStoreResult<Option<Bson>> {
                (**self)
                    .find_one_and_update(filter, patch, returning, collection)
                    .await
            }

            async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
                (**self).create_collection(name).await
            }

            async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
                (**self).drop_collection(name).await
            }

            async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
                (**self).list_collections().await
            }

            async fn shutdown(&self) -> DocumentStoreResult<()> {
                (**self).shutdown().await
            }
        }
    )+};
}

forward_store_backend! {
    &B => [B: StoreBackend + ?Sized],
    Box<B> => [B: StoreBackend + ?Sized],
    Arc<B> => [B: StoreBackend + ?Sized],
}

/// Factory trait for asynchronously constructing a backend.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
