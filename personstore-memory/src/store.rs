//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON values in HashMaps behind async-safe read-write locks.
//! Each document carries an insertion sequence number, which defines the store's
//! natural order, and a version counter for optimistic concurrency.

use std::{
    collections::HashMap,
    sync::{Arc, atomic::{AtomicBool, Ordering as AtomicOrdering}},
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Uuid, Bson, Document as BsonDocument};
use tracing::{debug, trace};

use personstore_core::{
    backend::{ReturnDocument, StoreBackend, StoreBackendBuilder},
    document::Versioned,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
};

use crate::evaluator::{DocumentEvaluator, compare_field};

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    version: u64,
    body: Bson,
}

#[derive(Debug, Default)]
struct CollectionState {
    next_seq: u64,
    documents: HashMap<String, StoredDocument>,
}

impl CollectionState {
    fn push(&mut self, key: String, body: Bson) {
        self.next_seq += 1;
        self.documents.insert(key, StoredDocument { seq: self.next_seq, version: 1, body });
    }

    /// Documents in insertion order.
    fn ordered(&self) -> Vec<(&String, &StoredDocument)> {
        let mut entries = self.documents.iter().collect::<Vec<_>>();
        entries.sort_by_key(|(_, stored)| stored.seq);
        entries
    }

    /// Keys of the documents matching `filter`, in insertion order.
    fn matching_keys(&self, filter: Option<&Expr>) -> DocumentStoreResult<Vec<String>> {
        let mut keys = Vec::new();

        for (key, stored) in self.ordered() {
            if DocumentEvaluator::matches(&stored.body, filter)? {
                keys.push(key.clone());
            }
        }

        Ok(keys)
    }
}

type StoreMap = HashMap<String, CollectionState>;


/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses `Arc`-wrapped internal state, so it can be
/// shared across async tasks. Clones share the same data, and shutting down any clone
/// closes the store for all of them: every later call fails with
/// [`DocumentStoreError::StoreUnavailable`].
///
/// Queries scan every document in a collection (no indexing).
///
/// # Example
///
/// ```ignore
/// use personstore_memory::InMemoryStore;
/// use personstore_core::backend::StoreBackend;
/// use bson::{Uuid, Bson, doc};
///
/// let store = InMemoryStore::new();
///
/// let id = Uuid::new();
/// let doc = Bson::Document(doc! { "name": "Alice Johnson", "age": 28 });
/// store.insert_documents(vec![(id, doc)], "Person").await?;
///
/// let docs = store.get_documents(vec![id], "Person").await?;
/// assert_eq!(docs.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty, open in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Whether the store has been shut down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    fn ensure_open(&self) -> DocumentStoreResult<()> {
        if self.is_closed() {
            return Err(DocumentStoreError::StoreUnavailable(
                "in-memory store has been shut down".to_string(),
            ));
        }

        Ok(())
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        self.ensure_open()
    }

    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let collection_state = store
            .entry(collection.to_string())
            .or_default();

        // Check the whole batch first so a duplicate leaves the collection untouched.
        let mut keys = Vec::with_capacity(documents.len());
        for (id, doc) in &documents {
            let key = id.to_string();

            if collection_state.documents.contains_key(&key) || keys.contains(&key) {
                return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
            }
            if doc.as_document().is_none() {
                return Err(DocumentStoreError::InvalidDocument(format!("{key} is not a document")));
            }

            keys.push(key);
        }

        let inserted = keys.len();
        for (key, (_, doc)) in keys.into_iter().zip(documents) {
            collection_state.push(key, doc);
        }

        debug!(collection, inserted, "inserted documents");

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        self.ensure_open()?;

        let store = self.store.read().await;
        let collection_state = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        Ok(
            ids.into_iter()
                .filter_map(|id| collection_state.documents.get(&id.to_string()))
                .map(|stored| stored.body.clone())
                .collect()
        )
    }

    async fn get_versioned(&self, id: Uuid, collection: &str) -> DocumentStoreResult<Option<Versioned<Bson>>> {
        self.ensure_open()?;

        Ok(
            self.store
                .read()
                .await
                .get(collection)
                .and_then(|col| col.documents.get(&id.to_string()))
                .map(|stored| Versioned::new(stored.version, stored.body.clone()))
        )
    }

    async fn replace_document(
        &self,
        id: Uuid,
        expected_version: u64,
        document: Bson,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        self.ensure_open()?;

        let key = id.to_string();
        let mut store = self.store.write().await;
        let stored = match store
            .get_mut(collection)
            .and_then(|col| col.documents.get_mut(&key))
        {
            Some(stored) => stored,
            None => return Err(DocumentStoreError::DocumentNotFound(key, collection.to_string())),
        };

        if stored.version != expected_version {
            trace!(collection, id = %key, expected_version, actual_version = stored.version, "version mismatch");
            return Err(DocumentStoreError::conflict(key, collection));
        }

        stored.body = document;
        stored.version += 1;

        debug!(collection, id = %key, version = stored.version, "replaced document");

        Ok(stored.version)
    }

    async fn take_document(&self, id: Uuid, collection: &str) -> DocumentStoreResult<Option<Bson>> {
        self.ensure_open()?;

        let removed = self.store
            .write()
            .await
            .get_mut(collection)
            .and_then(|col| col.documents.remove(&id.to_string()))
            .map(|stored| stored.body);

        debug!(collection, %id, removed = removed.is_some(), "took document");

        Ok(removed)
    }

    async fn delete_matching(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let collection_state = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(0),
        };

        let keys = collection_state.matching_keys(filter.as_ref())?;
        for key in &keys {
            collection_state.documents.remove(key);
        }

        debug!(collection, deleted = keys.len(), "deleted matching documents");

        Ok(keys.len() as u64)
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.ensure_open()?;

        Ok(
            match self.store.read().await.get(collection) {
                Some(col) => col.matching_keys(filter.as_ref())?.len() as u64,
                None => 0,
            }
        )
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        self.ensure_open()?;

        let store = self.store.read().await;
        let collection_state = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        // Filter in natural order
        let mut documents = Vec::new();
        for (_, stored) in collection_state.ordered() {
            if DocumentEvaluator::matches(&stored.body, query.filter.as_ref())? {
                documents.push(&stored.body);
            }
        }

        // Stable sort, so ties keep natural order
        if !query.sort.is_empty() {
            documents.sort_by(|a, b| {
                query.sort
                    .iter()
                    .map(|sort| {
                        let ordering = compare_field(a, b, &sort.field);
                        match sort.direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let results = documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|doc| {
                let mut doc = doc.clone();
                if let Some(projection) = &query.projection {
                    projection.apply(&mut doc);
                }
                doc
            })
            .collect::<Vec<_>>();

        trace!(collection, returned = results.len(), "queried documents");

        Ok(results)
    }

    async fn find_one_and_update(
        &self,
        filter: Option<Expr>,
        patch: BsonDocument,
        returning: ReturnDocument,
        collection: &str,
    ) -> DocumentStoreResult<Option<Bson>> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let collection_state = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(None),
        };

        let Some(key) = collection_state
            .matching_keys(filter.as_ref())?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let Some(stored) = collection_state.documents.get_mut(&key) else {
            return Ok(None);
        };

        let before = stored.body.clone();
        let Some(body) = stored.body.as_document_mut() else {
            return Err(DocumentStoreError::InvalidDocument(format!("{key} is not a document")));
        };
        for (field, value) in patch {
            body.insert(field, value);
        }
        stored.version += 1;

        debug!(collection, id = %key, version = stored.version, "updated first matching document");

        Ok(Some(match returning {
            ReturnDocument::Before => before,
            ReturnDocument::After => stored.body.clone(),
        }))
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.ensure_open()?;

        Ok(
            self.store
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        if !self.closed.swap(true, AtomicOrdering::AcqRel) {
            debug!("in-memory store shut down");
        }

        Ok(())
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// `seed` pre-populates collections, which is handy for tests and fixtures.
///
/// # Example
///
/// ```ignore
/// use personstore_memory::InMemoryStore;
/// use personstore_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await.unwrap();
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, Vec<(Uuid, Bson)>)>,
}

impl InMemoryStoreBuilder {
    /// Inserts `documents` into `collection` when the store is built.
    pub fn seed(mut self, collection: &str, documents: Vec<(Uuid, Bson)>) -> Self {
        self.seed.push((collection.to_string(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (collection, documents) in self.seed {
            store.insert_documents(documents, &collection).await?;
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use personstore_core::{error::ErrorKind, query::Filter};

    const PEOPLE: &str = "Person";

    fn person(name: &str, age: i32, foods: &[&str]) -> (Uuid, Bson) {
        (Uuid::new(), Bson::Document(doc! { "name": name, "age": age, "favoriteFoods": foods.to_vec() }))
    }

    async fn seeded() -> InMemoryStore {
        InMemoryStore::builder()
            .seed(PEOPLE, vec![
                person("Cathy Brown", 29, &["pasta", "sushi"]),
                person("Bob Smith", 34, &["ramen", "sushi"]),
                person("Alice Johnson", 28, &["tacos", "sushi"]),
                person("Mary", 41, &["salad"]),
            ])
            .build()
            .await
            .unwrap()
    }

    fn names(documents: &[Bson]) -> Vec<&str> {
        documents
            .iter()
            .map(|doc| doc.as_document().unwrap().get_str("name").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn natural_order_is_insertion_order() {
        let store = seeded().await;
        let all = store.query_documents(Query::new(), PEOPLE).await.unwrap();

        assert_eq!(names(&all), vec!["Cathy Brown", "Bob Smith", "Alice Johnson", "Mary"]);
    }

    #[tokio::test]
    async fn query_applies_filter_sort_limit_and_projection() {
        let store = seeded().await;
        let query = Query::builder()
            .exclude(["age"])
            .limit(2)
            .sort("name", SortDirection::Asc)
            .filter(Filter::includes("favoriteFoods", "sushi"))
            .build();

        let results = store.query_documents(query, PEOPLE).await.unwrap();

        assert_eq!(names(&results), vec!["Alice Johnson", "Bob Smith"]);
        assert!(results.iter().all(|doc| !doc.as_document().unwrap().contains_key("age")));
    }

    #[tokio::test]
    async fn descending_sort_with_offset() {
        let store = seeded().await;
        let query = Query::builder()
            .sort("age", SortDirection::Desc)
            .offset(1)
            .build();

        let results = store.query_documents(query, PEOPLE).await.unwrap();

        assert_eq!(names(&results), vec!["Bob Smith", "Cathy Brown", "Alice Johnson"]);
    }

    #[tokio::test]
    async fn batch_insert_is_all_or_nothing() {
        let store = seeded().await;
        let existing = store.query_documents(Query::new(), PEOPLE).await.unwrap();
        let (fresh_id, fresh) = person("Dan", 50, &[]);
        let duplicate_id = Uuid::new();

        store
            .insert_documents(vec![(duplicate_id, Bson::Document(doc! { "name": "Eve" }))], PEOPLE)
            .await
            .unwrap();

        let result = store
            .insert_documents(
                vec![(fresh_id, fresh), (duplicate_id, Bson::Document(doc! { "name": "Eve again" }))],
                PEOPLE,
            )
            .await;

        assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(..))));
        assert_eq!(store.count_documents(None, PEOPLE).await.unwrap(), existing.len() as u64 + 1);
        assert!(store.get_documents(vec![fresh_id], PEOPLE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_checks_the_version() {
        let store = InMemoryStore::new();
        let (id, doc) = person("Alice Johnson", 28, &["tacos"]);
        store.insert_documents(vec![(id, doc)], PEOPLE).await.unwrap();

        let current = store.get_versioned(id, PEOPLE).await.unwrap().unwrap();
        assert_eq!(current.version, 1);

        let next = store
            .replace_document(id, current.version, current.document.clone(), PEOPLE)
            .await
            .unwrap();
        assert_eq!(next, 2);

        let stale = store
            .replace_document(id, current.version, current.document, PEOPLE)
            .await
            .unwrap_err();
        assert_eq!(stale.kind(), ErrorKind::Conflict);

        let missing = store
            .replace_document(Uuid::new(), 1, Bson::Document(doc! {}), PEOPLE)
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn find_one_and_update_returns_requested_image() {
        let store = seeded().await;

        let before = store
            .find_one_and_update(Some(Filter::eq("name", "Bob Smith")), doc! { "age": 35 }, ReturnDocument::Before, PEOPLE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.as_document().unwrap().get_i32("age").unwrap(), 34);

        let after = store
            .find_one_and_update(Some(Filter::eq("name", "Bob Smith")), doc! { "age": 36 }, ReturnDocument::After, PEOPLE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.as_document().unwrap().get_i32("age").unwrap(), 36);

        let none = store
            .find_one_and_update(Some(Filter::eq("name", "Nobody")), doc! { "age": 1 }, ReturnDocument::After, PEOPLE)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn delete_matching_counts_removed_documents() {
        let store = seeded().await;

        assert_eq!(store.delete_matching(Some(Filter::eq("name", "Nobody")), PEOPLE).await.unwrap(), 0);
        assert_eq!(store.delete_matching(Some(Filter::includes("favoriteFoods", "sushi")), PEOPLE).await.unwrap(), 3);
        assert_eq!(store.count_documents(None, PEOPLE).await.unwrap(), 1);
        assert_eq!(store.delete_matching(None, "Unknown").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn take_document_removes_once() {
        let store = InMemoryStore::new();
        let (id, doc) = person("Mary", 41, &[]);
        store.insert_documents(vec![(id, doc.clone())], PEOPLE).await.unwrap();

        assert_eq!(store.take_document(id, PEOPLE).await.unwrap(), Some(doc));
        assert_eq!(store.take_document(id, PEOPLE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn shutdown_closes_every_clone() {
        let store = InMemoryStore::new();
        let other = store.clone();

        store.shutdown().await.unwrap();

        assert!(other.is_closed());
        let err = other.ping().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        let err = other.query_documents(Query::new(), PEOPLE).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }
}
