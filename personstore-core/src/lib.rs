//! A thin document database abstraction layer with a unified interface over document stores.
//!
//! This crate is the core of the personstore project and provides:
//!
//! - **Document traits** ([`document`]) - Defining, validating and serializing documents
//! - **Store backend abstraction** ([`backend`]) - The async trait storage backends implement
//! - **Query and filtering API** ([`query`]) - Filter expressions, sorting, limits and projection
//! - **Collections interface** ([`collection`]) - Typed and untyped handles on one collection
//! - **Document store** ([`store`]) - The explicit store handle owning a backend
//! - **Error handling** ([`error`]) - Error variants and their coarse [`error::ErrorKind`]
//!
//! # Example
//!
//! ```ignore
//! use personstore_core::document::Document;
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: Uuid,
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> &Uuid {
//!         &self.id
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as personstore_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod query;
pub mod store;
