//! Convenient re-exports of commonly used types from personstore.
//!
//! ```ignore
//! use personstore::prelude::*;
//! ```

pub use personstore_core::{
    backend::{ReturnDocument, StoreBackend, StoreBackendBuilder},
    collection::{Collection, TypedCollection},
    document::{Document, DocumentExt, IntoDocumentId, Versioned},
    error::{DocumentStoreError, DocumentStoreResult, ErrorKind},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    store::DocumentStore,
};

pub use crate::{
    config::{BackendKind, StoreConfig},
    people::{FindOneAndUpdateOptions, PersonStore},
    people_query::PersonQuery,
    person::{NewPerson, Person, PersonField, PersonPatch},
};
