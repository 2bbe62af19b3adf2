//! MongoDB backend implementation for personstore.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait,
//! giving persistent document storage backed by MongoDB's query engine.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! personstore = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Storage layout
//!
//! Each document is stored with its id in `_id` and its version counter in `_version`.
//! Both are stripped before documents are handed back to the caller. Field names
//! containing `.`, `$` or NUL are escaped on write and restored on read.
//!
//! # Example
//!
//! ```ignore
//! use personstore::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "personstore")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as personstore_mongodb;

pub mod store;
mod query;
mod sanitizer;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
