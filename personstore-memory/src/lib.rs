//! In-memory document storage backend for personstore.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Type-erased storage** - Stores documents as BSON for flexibility
//! - **Full query support** - Filtering, sorting, offset, limit and projection
//! - **Optimistic versioning** - Per-document version counters checked on replace
//! - **Stable natural order** - Unsorted results come back in insertion order
//!
//! # Quick Start
//!
//! ```ignore
//! use personstore_core::{backend::StoreBackendBuilder, store::DocumentStore};
//! use personstore_memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = InMemoryStore::builder().build().await.unwrap();
//!     let store = DocumentStore::new(backend);
//!     let users = store.typed_collection_named::<User>("users");
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as personstore_memory;

pub mod store;
pub mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
