//! A typed store for person records over pluggable document backends.
//!
//! This crate is the entry point of the personstore workspace. It defines the
//! [`Person`](person::Person) record, the [`PersonStore`](people::PersonStore) handle with its
//! CRUD operations and composable [`PersonQuery`](people_query::PersonQuery), and
//! re-exports the document layer it is built on.
//!
//! # Features
//!
//! - **Validated writes** - Records are checked before anything reaches the backend
//! - **Optimistic updates** - Read-modify-write retries on version conflicts instead of losing writes
//! - **Immutable queries** - Filter, sort, skip, limit and projection in a fixed order
//! - **Multiple backends** - In-memory, and MongoDB behind the `mongodb` feature
//!
//! # Quick Start
//!
//! ```ignore
//! use personstore::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let people = PersonStore::open(InMemoryStore::new(), &StoreConfig::default()).await?;
//!
//!     people
//!         .create_many(vec![
//!             NewPerson::named("Bob Smith").age(34).favorite_foods(["burgers", "fries"]),
//!             NewPerson::named("Mary").age(22).favorite_foods(["sushi"]),
//!         ])
//!         .await?;
//!
//!     let sushi_lovers = people
//!         .query()
//!         .filter(Filter::includes(PersonField::FavoriteFoods, "sushi"))
//!         .sort_by(PersonField::Name, SortDirection::Asc)
//!         .limit(2)
//!         .project([PersonField::Age])
//!         .execute()
//!         .await?;
//!
//!     println!("{sushi_lovers:?}");
//!     people.close().await
//! }
//! ```
//!
//! # Runtime backend selection
//!
//! [`StoreConfig::connect`](config::StoreConfig::connect) reads the backend kind from the
//! configuration and returns a `PersonStore<Box<dyn StoreBackend>>`.
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

pub mod config;
pub mod people;
pub mod people_query;
pub mod person;
pub mod prelude;
pub mod telemetry;

pub use personstore_core::{backend, collection, document, error, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use personstore_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use personstore_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
