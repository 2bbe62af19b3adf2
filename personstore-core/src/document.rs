//! Core traits and types for document representation and serialization.
//!
//! This module provides the traits every stored document implements, conversions of
//! documents to and from BSON, and [`IntoDocumentId`] for accepting identifiers
//! either as UUIDs or as their textual form.

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Core trait that all documents stored in a document store must implement.
///
/// Every document has a unique identifier (UUID), names the collection it belongs to,
/// and may reject invalid field values through [`Document::validate`], which typed
/// collections call before any write reaches the backend.
///
/// # Example
///
/// ```ignore
/// use personstore_core::{document::Document, error::{DocumentStoreError, DocumentStoreResult}};
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: Uuid,
///     pub email: String,
/// }
///
/// impl Document for User {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "users"
///     }
///
///     fn validate(&self) -> DocumentStoreResult<()> {
///         if self.email.contains('@') {
///             Ok(())
///         } else {
///             Err(DocumentStoreError::Validation("email must contain '@'".into()))
///         }
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the default name of the collection this document belongs to.
    fn collection_name() -> &'static str;

    /// Checks the document's field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] describing the first violated constraint.
    fn validate(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Extension trait providing serialization/deserialization utilities for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Creates a document from a BSON value.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }
}

/// A stored document body together with the version the backend holds for it.
///
/// Versions start at 1 and grow by one on every write, so a writer that read
/// version `n` can ask the backend to apply its change only if nothing else was
/// written in between.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// The version the document had when it was read.
    pub version: u64,
    /// The document itself.
    pub document: T,
}

impl<T> Versioned<T> {
    pub fn new(version: u64, document: T) -> Self {
        Self { version, document }
    }

    /// Converts the wrapped document, keeping the version.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Versioned<U>, E> {
        Ok(Versioned {
            version: self.version,
            document: f(self.document)?,
        })
    }
}

/// Conversion into a document identifier.
///
/// Textual ids are parsed here, so a malformed id is rejected with
/// [`DocumentStoreError::InvalidId`] before any storage call is made.
///
/// # Example
///
/// ```ignore
/// use personstore_core::document::IntoDocumentId;
///
/// assert!("67e55044-10b1-426f-9247-bb680e5fe0c8".into_document_id().is_ok());
/// assert!("not-an-id-format".into_document_id().is_err());
/// ```
pub trait IntoDocumentId {
    /// Converts this value into a [`Uuid`].
    fn into_document_id(self) -> DocumentStoreResult<Uuid>;
}

impl IntoDocumentId for Uuid {
    fn into_document_id(self) -> DocumentStoreResult<Uuid> {
        Ok(self)
    }
}

impl IntoDocumentId for &Uuid {
    fn into_document_id(self) -> DocumentStoreResult<Uuid> {
        Ok(*self)
    }
}

impl IntoDocumentId for &str {
    fn into_document_id(self) -> DocumentStoreResult<Uuid> {
        Uuid::parse_str(self.trim())
            .map_err(|_| DocumentStoreError::InvalidId(self.to_string()))
    }
}

impl IntoDocumentId for &String {
    fn into_document_id(self) -> DocumentStoreResult<Uuid> {
        self.as_str().into_document_id()
    }
}

impl IntoDocumentId for String {
    fn into_document_id(self) -> DocumentStoreResult<Uuid> {
        self.as_str().into_document_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn textual_ids_are_parsed() {
        let id = Uuid::new();

        assert_eq!(id.to_string().into_document_id().unwrap(), id);
        assert_eq!((&id).into_document_id().unwrap(), id);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        for raw in ["not-an-id-format", "", "1234", "67e55044-10b1-426f-9247"] {
            let err = raw.into_document_id().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidId, "{raw:?} should be an invalid id");
        }
    }

    #[test]
    fn versioned_map_keeps_version() {
        let mapped = Versioned::new(7, "42")
            .try_map(|s| s.parse::<i32>())
            .unwrap();

        assert_eq!(mapped, Versioned::new(7, 42));
    }
}
