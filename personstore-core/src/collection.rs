//! Collection types for document store operations.
//!
//! This module provides collection handles bound to one collection of a backend:
//!
//! - [`Collection`] - Untyped collection with explicit BSON documents
//! - [`TypedCollection`] - Type-safe collection for a specific document type, which
//!   validates every document before it is written
//!
//! # Example
//!
//! ```ignore
//! # async fn example(store: &personstore_core::store::DocumentStore<impl personstore_core::backend::StoreBackend>) -> personstore_core::error::DocumentStoreResult<()> {
//! let users = store.typed_collection_named::<User>("users");
//! let user = User { id: Uuid::new(), email: "alice@example.com".to_string() };
//! users.insert(vec![user]).await?;
//! # Ok(()) }
//! ```

use bson::{Bson, Document as BsonDocument, Uuid};
use std::marker::PhantomData;

use crate::{
    backend::{ReturnDocument, StoreBackend},
    document::{Document, DocumentExt, IntoDocumentId, Versioned},
    error::DocumentStoreResult,
    query::{Expr, Query},
};

/// An untyped collection with a reference to a storage backend.
///
/// All documents are represented as BSON values, providing maximum flexibility
/// but without compile-time type safety or validation.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend + ?Sized> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend + ?Sized> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves documents by ID; missing IDs are omitted from the result.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<Bson>>
    where
        U: IntoDocumentId,
    {
        self.backend
            .get_documents(
                ids.into_iter()
                    .map(IntoDocumentId::into_document_id)
                    .collect::<DocumentStoreResult<Vec<Uuid>>>()?,
                self.name(),
            )
            .await
    }

    /// Retrieves one document together with its version.
    pub async fn get_versioned(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Option<Versioned<Bson>>> {
        self.backend
            .get_versioned(id.into_document_id()?, self.name())
            .await
    }

    /// Queries documents in the collection using a structured query.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        self.backend
            .query_documents(query, self.name())
            .await
    }

    /// Counts documents matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.backend
            .count_documents(filter, self.name())
            .await
    }
}

/// A collection handle that serializes, deserializes and validates documents of type `D`.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend + ?Sized, D: Document> {
    name: String,
    backend: &'a B,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend + ?Sized, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the untyped view of the same collection.
    pub fn untyped(&self) -> Collection<'a, B> {
        Collection::new(self.name.clone(), self.backend)
    }

    /// Inserts new documents.
    ///
    /// Every document is validated and serialized before the backend is called, so a
    /// single invalid document rejects the whole batch with nothing stored.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`](crate::error::DocumentStoreError::Validation)
    /// for the first invalid document, or any backend error.
    pub async fn insert(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        let prepared = documents
            .iter()
            .map(|d| {
                d.validate()?;
                d.to_bson().map(|b| (*d.id(), b))
            })
            .collect::<DocumentStoreResult<Vec<(Uuid, Bson)>>>()?;

        self.backend
            .insert_documents(prepared, self.name())
            .await
    }

    /// Replaces a document if the stored version still equals `expected_version`.
    ///
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// Validation errors are raised before the backend is called. The backend reports
    /// `DocumentNotFound` for a vanished document and `Conflict` for a stale version.
    pub async fn replace(&self, expected_version: u64, document: &D) -> DocumentStoreResult<u64> {
        document.validate()?;

        self.backend
            .replace_document(*document.id(), expected_version, document.to_bson()?, self.name())
            .await
    }

    /// Removes a document and returns it, or `None` if it does not exist.
    pub async fn take(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Option<D>> {
        self.backend
            .take_document(id.into_document_id()?, self.name())
            .await?
            .map(D::from_bson)
            .transpose()
    }

    /// Deletes every document matching `filter` and returns the number removed.
    pub async fn delete_matching(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.backend
            .delete_matching(filter, self.name())
            .await
    }

    /// Retrieves documents by ID; missing IDs are omitted from the result.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<D>>
    where
        U: IntoDocumentId,
    {
        self.untyped()
            .get(ids)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Retrieves one document by ID.
    pub async fn get_one(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Option<D>> {
        Ok(self
            .get(vec![id.into_document_id()?])
            .await?
            .into_iter()
            .next())
    }

    /// Retrieves one document together with its version.
    pub async fn get_versioned(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Option<Versioned<D>>> {
        self.untyped()
            .get_versioned(id)
            .await?
            .map(|versioned| versioned.try_map(D::from_bson))
            .transpose()
    }

    /// Queries documents in the collection using a structured query.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        self.untyped()
            .query(query)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Returns the first document matching `filter` in natural order.
    pub async fn find_one(&self, filter: Option<Expr>) -> DocumentStoreResult<Option<D>> {
        Ok(self
            .query(Query { filter, limit: Some(1), ..Query::default() })
            .await?
            .into_iter()
            .next())
    }

    /// Atomically sets `patch` on the first document matching `filter`.
    pub async fn find_one_and_update(
        &self,
        filter: Option<Expr>,
        patch: BsonDocument,
        returning: ReturnDocument,
    ) -> DocumentStoreResult<Option<D>> {
        self.backend
            .find_one_and_update(filter, patch, returning, self.name())
            .await?
            .map(D::from_bson)
            .transpose()
    }

    /// Counts documents matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.untyped().count(filter).await
    }
}
