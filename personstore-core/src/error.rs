//! Error types and result types for document store operations.
//!
//! Every fallible operation returns [`DocumentStoreResult<T>`]. Callers that only care
//! about the broad category of a failure (bad input, missing record, lost race, store
//! down) should match on [`DocumentStoreError::kind`] instead of the individual variants.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The document failed validation (a required field is missing or invalid).
    #[error("Validation error: {0}")]
    Validation(String),
    /// The identifier is not a well-formed document id.
    #[error("Invalid document id: {0}")]
    InvalidId(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The document changed between read and write; the operation may be retried.
    #[error("Document {id} in collection {collection} was modified concurrently")]
    Conflict {
        /// ID of the contended document.
        id: String,
        /// Collection holding the document.
        collection: String,
    },
    /// The underlying storage cannot be reached or has been closed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// Serialization/deserialization error when converting between documents and BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization, configuration or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// A stored value does not have the structure of a document.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Coarse classification of a [`DocumentStoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid required field.
    Validation,
    /// Well-formed identifier with no matching record.
    NotFound,
    /// Malformed identifier.
    InvalidId,
    /// A concurrent update won the race.
    Conflict,
    /// Underlying storage unreachable.
    StoreUnavailable,
    /// Anything else: encoding faults, driver errors, misconfiguration.
    Internal,
}

impl DocumentStoreError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocumentStoreError::Validation(_) => ErrorKind::Validation,
            DocumentStoreError::InvalidId(_) => ErrorKind::InvalidId,
            DocumentStoreError::DocumentNotFound(..) => ErrorKind::NotFound,
            DocumentStoreError::Conflict { .. } => ErrorKind::Conflict,
            DocumentStoreError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            DocumentStoreError::Serialization(_)
            | DocumentStoreError::Initialization(_)
            | DocumentStoreError::DocumentAlreadyExists(..)
            | DocumentStoreError::CollectionNotFound(_)
            | DocumentStoreError::InvalidDocument(_)
            | DocumentStoreError::Backend(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-running the same operation may succeed.
    ///
    /// Only version conflicts qualify. Unavailability is reported as-is and retrying
    /// it is left to the caller's own policy.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Shorthand for building a [`DocumentStoreError::Conflict`].
    pub fn conflict(id: impl ToString, collection: impl ToString) -> Self {
        DocumentStoreError::Conflict {
            id: id.to_string(),
            collection: collection.to_string(),
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_for_lookup_failures() {
        let invalid = DocumentStoreError::InvalidId("nope".into());
        let missing = DocumentStoreError::DocumentNotFound("abc".into(), "Person".into());

        assert_eq!(invalid.kind(), ErrorKind::InvalidId);
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_ne!(invalid.kind(), missing.kind());
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(DocumentStoreError::conflict("abc", "Person").is_retryable());
        assert!(!DocumentStoreError::StoreUnavailable("closed".into()).is_retryable());
        assert!(!DocumentStoreError::Validation("name".into()).is_retryable());
    }
}
