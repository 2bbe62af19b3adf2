//! The person store: typed CRUD over the person collection.
//!
//! [`PersonStore`] is an explicit handle opened over any [`StoreBackend`]. Every operation
//! validates its input before the backend is touched. Reads that find nothing are not
//! errors ([`PersonStore::find_by_predicate`] returns an empty vector,
//! [`PersonStore::find_one`] returns `None`); only lookups by id report `DocumentNotFound`.
//!
//! # Example
//!
//! ```ignore
//! use personstore::{prelude::*, memory::InMemoryStore};
//!
//! let people = PersonStore::open(InMemoryStore::new(), &StoreConfig::default()).await?;
//! let alice = people
//!     .create(NewPerson::named("Alice Johnson").age(28).favorite_foods(["pizza", "pasta"]))
//!     .await?;
//!
//! let older = people
//!     .update_by_read_modify_write(alice.id, |p| p.age = p.age.map(|a| a + 1))
//!     .await?;
//! assert_eq!(older.age, Some(29));
//! ```

use personstore_core::{
    backend::{ReturnDocument, StoreBackend},
    collection::TypedCollection,
    document::IntoDocumentId,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query},
    store::DocumentStore,
};
use tracing::{debug, info, warn};

use crate::{
    config::StoreConfig,
    people_query::PersonQuery,
    person::{NewPerson, Person, PersonPatch},
};

/// Options for [`PersonStore::find_one_and_update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOneAndUpdateOptions {
    /// Return the record with the patch applied instead of the record before it.
    pub return_updated: bool,
}

impl FindOneAndUpdateOptions {
    pub fn returning_updated() -> Self {
        Self { return_updated: true }
    }

    pub fn returning_original() -> Self {
        Self { return_updated: false }
    }
}

/// Handle on the person collection of one document store.
#[derive(Debug)]
pub struct PersonStore<B: StoreBackend> {
    store: DocumentStore<B>,
    collection: String,
    max_update_attempts: u32,
}

impl<B: StoreBackend> PersonStore<B> {
    /// Opens the store over `backend`.
    ///
    /// Pings the backend and creates the configured collection if it does not exist yet.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` when the backend cannot be reached, `Initialization` for an
    /// invalid configuration.
    #[tracing::instrument(skip_all, fields(collection = %config.collection))]
    pub async fn open(backend: B, config: &StoreConfig) -> DocumentStoreResult<Self> {
        config.validate()?;

        let store = DocumentStore::new(backend);
        store.ping().await?;
        store.create_collection(&config.collection).await?;

        info!("person store opened");

        Ok(Self {
            store,
            collection: config.collection.clone(),
            max_update_attempts: config.max_update_attempts,
        })
    }

    /// Shuts the backend down. Every later call fails with `StoreUnavailable`.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn close(&self) -> DocumentStoreResult<()> {
        self.store.backend().shutdown().await?;
        info!("person store closed");
        Ok(())
    }

    /// The underlying document store.
    pub fn store(&self) -> &DocumentStore<B> {
        &self.store
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub(crate) fn people(&self) -> TypedCollection<'_, B, Person> {
        self.store.typed_collection_named::<Person>(&self.collection)
    }

    /// Validates `record`, assigns it a fresh id and stores it.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn create(&self, record: NewPerson) -> DocumentStoreResult<Person> {
        let person = record.into_person()?;

        self.people().insert(vec![person.clone()]).await?;

        info!(id = %person.id, "person created");
        Ok(person)
    }

    /// Stores several records at once.
    ///
    /// Every record is validated before anything is written. One invalid record fails
    /// the whole call and nothing is stored.
    #[tracing::instrument(skip_all, fields(collection = %self.collection, count = records.len()))]
    pub async fn create_many(&self, records: Vec<NewPerson>) -> DocumentStoreResult<Vec<Person>> {
        let people = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                record.into_person().map_err(|e| match e {
                    DocumentStoreError::Validation(reason) => {
                        DocumentStoreError::Validation(format!("record {index}: {reason}"))
                    }
                    other => other,
                })
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        self.people().insert(people.clone()).await?;

        info!(created = people.len(), "people created");
        Ok(people)
    }

    /// Returns every record matching `predicate` in the backend's natural order.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn find_by_predicate(&self, predicate: Expr) -> DocumentStoreResult<Vec<Person>> {
        let found = self.people().query(Query::matching(Some(predicate))).await?;
        debug!(found = found.len(), "find by predicate");
        Ok(found)
    }

    /// Returns the first record matching `predicate`, or `None`.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn find_one(&self, predicate: Expr) -> DocumentStoreResult<Option<Person>> {
        let found = self.people().find_one(Some(predicate)).await?;
        debug!(found = found.is_some(), "find one");
        Ok(found)
    }

    /// Looks a record up by id, given as a [`bson::Uuid`] or as text.
    ///
    /// # Errors
    ///
    /// `InvalidId` for malformed text (before any storage call), `DocumentNotFound` when
    /// no record has the id.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn find_by_id(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Person> {
        let id = id.into_document_id()?;

        let person = self
            .people()
            .get_one(id)
            .await?
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), self.collection.clone()))?;

        debug!(%id, "found by id");
        Ok(person)
    }

    /// Applies `mutation` to the stored record and writes it back.
    ///
    /// The write only lands if nobody else wrote the record since it was read. On a
    /// lost race the whole read, mutate, write cycle runs again, up to the configured
    /// number of attempts, so `mutation` must not have side effects.
    ///
    /// # Errors
    ///
    /// `DocumentNotFound` if the record does not exist, `Validation` if the mutated
    /// record is invalid or has a different id, `Conflict` once every attempt lost.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn update_by_read_modify_write<F>(
        &self,
        id: impl IntoDocumentId,
        mutation: F,
    ) -> DocumentStoreResult<Person>
    where
        F: Fn(&mut Person) + Send + Sync,
    {
        let id = id.into_document_id()?;
        let people = self.people();

        for attempt in 1..=self.max_update_attempts {
            let current = people
                .get_versioned(id)
                .await?
                .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), self.collection.clone()))?;

            let mut next = current.document;
            mutation(&mut next);

            if next.id != id {
                return Err(DocumentStoreError::Validation("Person id cannot be changed".into()));
            }

            match people.replace(current.version, &next).await {
                Ok(version) => {
                    info!(%id, version, attempt, "person updated");
                    return Ok(next);
                }
                Err(DocumentStoreError::Conflict { .. }) => {
                    warn!(%id, attempt, "version conflict, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(%id, attempts = self.max_update_attempts, "update attempts exhausted");
        Err(DocumentStoreError::conflict(id, &self.collection))
    }

    /// Atomically sets `patch` on the first record matching `predicate`.
    ///
    /// Returns the record before or after the patch depending on `options`, or `None`
    /// when nothing matched.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn find_one_and_update(
        &self,
        predicate: Expr,
        patch: PersonPatch,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Person>> {
        patch.validate()?;

        let returning = if options.return_updated {
            ReturnDocument::After
        } else {
            ReturnDocument::Before
        };

        let updated = self
            .people()
            .find_one_and_update(Some(predicate), patch.to_set_document(), returning)
            .await?;

        match &updated {
            Some(person) => info!(id = %person.id, "person updated"),
            None => debug!("find one and update matched nothing"),
        }
        Ok(updated)
    }

    /// Removes a record by id and returns it.
    ///
    /// # Errors
    ///
    /// `InvalidId` for malformed text, `DocumentNotFound` when no record has the id.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn delete_by_id(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Person> {
        let id = id.into_document_id()?;

        let removed = self
            .people()
            .take(id)
            .await?
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), self.collection.clone()))?;

        info!(%id, "person deleted");
        Ok(removed)
    }

    /// Removes every record matching `predicate` and returns how many were removed.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn delete_many(&self, predicate: Expr) -> DocumentStoreResult<u64> {
        let deleted = self.people().delete_matching(Some(predicate)).await?;
        info!(deleted, "people deleted");
        Ok(deleted)
    }

    /// Number of records matching `predicate`, or of all records for `None`.
    #[tracing::instrument(skip_all, fields(collection = %self.collection))]
    pub async fn count(&self, predicate: Option<Expr>) -> DocumentStoreResult<u64> {
        let counted = self.people().count(predicate).await?;
        debug!(counted, "count");
        Ok(counted)
    }

    /// Starts a query over the collection.
    pub fn query(&self) -> PersonQuery<'_, B> {
        PersonQuery::new(self)
    }
}
