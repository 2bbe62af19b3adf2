use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, Bson, Uuid, doc};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as DriverError, ErrorKind as DriverErrorKind},
    options::{ClientOptions, FindOptions, ReturnDocument as DriverReturnDocument},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use personstore_core::{
    backend::{ReturnDocument, StoreBackend, StoreBackendBuilder},
    document::Versioned,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
};

use crate::{sanitizer::ValueSanitizer, query::MongoQueryTranslator};

/// Field holding the document id.
const ID_FIELD: &str = "_id";
/// Field holding the optimistic version counter.
const VERSION_FIELD: &str = "_version";


/// Maps a driver error onto the store taxonomy. Connectivity failures become
/// `StoreUnavailable`, everything else is a backend error.
fn driver_error(error: DriverError) -> DocumentStoreError {
    match error.kind.as_ref() {
        DriverErrorKind::ServerSelection { .. }
        | DriverErrorKind::Io(_)
        | DriverErrorKind::ConnectionPoolCleared { .. }
        | DriverErrorKind::Shutdown => DocumentStoreError::StoreUnavailable(error.to_string()),
        _ => DocumentStoreError::Backend(error.to_string()),
    }
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    closed: Arc<AtomicBool>,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn ensure_open(&self) -> DocumentStoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DocumentStoreError::StoreUnavailable("store has been shut down".into()));
        }
        Ok(())
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(collection_name))
    }

    fn prepare_document(&self, id: &Uuid, version: u64, document: &Bson) -> DocumentStoreResult<Document> {
        Ok(Document::from_iter(
            ValueSanitizer::sanitize_value(document)
                .as_document()
                .cloned()
                .ok_or_else(|| DocumentStoreError::InvalidDocument("Expected document".into()))?
                .into_iter()
                .filter(|(k, _)| k != ID_FIELD && k != VERSION_FIELD)
                .chain([
                    (ID_FIELD.to_string(), Bson::from(*id)),
                    (VERSION_FIELD.to_string(), Bson::Int64(version as i64)),
                ]),
        ))
    }

    fn restore_document(&self, document: Document) -> Bson {
        ValueSanitizer::restore_value(&Bson::Document(
            document
                .into_iter()
                .filter(|(k, _)| k != ID_FIELD && k != VERSION_FIELD)
                .collect(),
        ))
    }

    fn stored_version(document: &Document) -> u64 {
        document
            .get_i64(VERSION_FIELD)
            .ok()
            .map(|version| version.max(0) as u64)
            .unwrap_or(1)
    }

    /// Sort document for a query. `_id` is always the final key so unsorted and
    /// tied results come back in the same order every time.
    fn sort_document(query: &Query) -> Document {
        let mut sort = Document::new();
        for key in &query.sort {
            sort.insert(
                ValueSanitizer::sanitize_path(&key.field),
                match key.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                },
            );
        }
        if !sort.contains_key(ID_FIELD) {
            sort.insert(ID_FIELD, 1);
        }
        sort
    }

    /// Driver limit for a query. The driver reads `0` as "no limit", so callers
    /// handle an explicit zero limit before reaching here.
    fn find_limit(query: &Query) -> Option<i64> {
        query
            .limit
            .filter(|limit| *limit > 0)
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(driver_error)?;

        Ok(())
    }

    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        if documents.is_empty() {
            return Ok(());
        }

        let target = self.get_collection(collection);
        let ids: Vec<Uuid> = documents.iter().map(|(id, _)| *id).collect();

        if let Some(existing) = target
            .find_one(doc! { ID_FIELD: { "$in": ids.clone() } })
            .await
            .map_err(driver_error)?
        {
            let existing = existing
                .get(ID_FIELD)
                .map(|id| id.to_string())
                .unwrap_or_default();
            return Err(DocumentStoreError::DocumentAlreadyExists(existing, collection.to_string()));
        }

        let prepared = documents
            .iter()
            .map(|(id, doc)| self.prepare_document(id, 1, doc))
            .collect::<DocumentStoreResult<Vec<Document>>>()?;

        if let Err(error) = target.insert_many(prepared).await {
            // Roll back whatever part of the batch made it in.
            if let Err(cleanup) = target.delete_many(doc! { ID_FIELD: { "$in": ids } }).await {
                tracing::warn!(%collection, error = %cleanup, "failed to roll back partial batch insert");
            }
            return Err(driver_error(error));
        }

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        self.ensure_open()?;

        Ok(
            self.get_collection(collection)
                .find(doc! { ID_FIELD: { "$in": ids } })
                .await
                .map_err(driver_error)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(driver_error)?
                .into_iter()
                .map(|doc| self.restore_document(doc))
                .collect()
        )
    }

    async fn get_versioned(&self, id: Uuid, collection: &str) -> DocumentStoreResult<Option<Versioned<Bson>>> {
        self.ensure_open()?;

        Ok(
            self.get_collection(collection)
                .find_one(doc! { ID_FIELD: id })
                .await
                .map_err(driver_error)?
                .map(|doc| Versioned::new(Self::stored_version(&doc), self.restore_document(doc)))
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

        let target = self.get_collection(collection);
        let next_version = expected_version + 1;

        let result = target
            .replace_one(
                doc! { ID_FIELD: id, VERSION_FIELD: expected_version as i64 },
                self.prepare_document(&id, next_version, &document)?,
            )
            .await
            .map_err(driver_error)?;

        if result.matched_count == 0 {
            let exists = target
                .count_documents(doc! { ID_FIELD: id })
                .await
                .map_err(driver_error)?
                > 0;

            return Err(if exists {
                DocumentStoreError::conflict(id, collection)
            } else {
                DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string())
            });
        }

        Ok(next_version)
    }

    async fn take_document(&self, id: Uuid, collection: &str) -> DocumentStoreResult<Option<Bson>> {
        self.ensure_open()?;

        Ok(
            self.get_collection(collection)
                .find_one_and_delete(doc! { ID_FIELD: id })
                .await
                .map_err(driver_error)?
                .map(|doc| self.restore_document(doc))
        )
    }

    async fn delete_matching(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.ensure_open()?;

        Ok(
            self.get_collection(collection)
                .delete_many(MongoQueryTranslator::translate(filter.as_ref())?)
                .await
                .map_err(driver_error)?
                .deleted_count
        )
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.ensure_open()?;

        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(filter.as_ref())?)
            .await
            .map_err(driver_error)
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        self.ensure_open()?;

        if query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut options = FindOptions::default();

        options.limit = Self::find_limit(&query);
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        options.sort = Some(Self::sort_document(&query));
        if let Some(projection) = &query.projection {
            if !projection.exclude.is_empty() {
                options.projection = Some(
                    projection
                        .exclude
                        .iter()
                        .map(|field| (ValueSanitizer::sanitize_path(field), Bson::Int32(0)))
                        .collect(),
                );
            }
        }

        Ok(
            self.get_collection(collection)
                .find(MongoQueryTranslator::translate(query.filter.as_ref())?)
                .with_options(options)
                .await
                .map_err(driver_error)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(driver_error)?
                .into_iter()
                .map(|doc| self.restore_document(doc))
                .collect()
        )
    }

    async fn find_one_and_update(
        &self,
        filter: Option<Expr>,
        patch: Document,
        returning: ReturnDocument,
        collection: &str,
    ) -> DocumentStoreResult<Option<Bson>> {
        self.ensure_open()?;

        let patch: Document = ValueSanitizer::sanitize_document(&patch)
            .into_iter()
            .filter(|(k, _)| k != ID_FIELD && k != VERSION_FIELD)
            .collect();

        Ok(
            self.get_collection(collection)
                .find_one_and_update(
                    MongoQueryTranslator::translate(filter.as_ref())?,
                    doc! {
                        "$set": patch,
                        "$inc": { VERSION_FIELD: 1_i64 },
                    },
                )
                .sort(doc! { ID_FIELD: 1 })
                .return_document(match returning {
                    ReturnDocument::Before => DriverReturnDocument::Before,
                    ReturnDocument::After => DriverReturnDocument::After,
                })
                .await
                .map_err(driver_error)?
                .map(|doc| self.restore_document(doc))
        )
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        let database = self.client.database(&self.database);
        let name = ValueSanitizer::sanitize_string(name);

        if database
            .list_collection_names()
            .await
            .map_err(driver_error)?
            .contains(&name)
        {
            return Ok(());
        }

        database
            .create_collection(&name)
            .await
            .map_err(driver_error)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        self.get_collection(name)
            .drop()
            .await
            .map_err(driver_error)?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.ensure_open()?;

        Ok(
            self.client
                .database(&self.database)
                .list_collection_names()
                .await
                .map_err(driver_error)?
                .iter()
                .map(|name| ValueSanitizer::restore_string(name))
                .collect()
        )
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.client.clone().shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use personstore_core::query::Sort;

    #[test]
    fn sort_always_ends_on_id() {
        let mut query = Query::new();
        assert_eq!(MongoDbStore::sort_document(&query), doc! { "_id": 1 });

        query.sort = vec![
            Sort { field: "age".into(), direction: SortDirection::Desc },
            Sort { field: "name".into(), direction: SortDirection::Asc },
        ];
        assert_eq!(
            MongoDbStore::sort_document(&query),
            doc! { "age": -1, "name": 1, "_id": 1 }
        );
    }

    #[test]
    fn find_limit_never_overflows_into_unlimited() {
        let mut query = Query::new();
        assert_eq!(MongoDbStore::find_limit(&query), None);

        query.limit = Some(2);
        assert_eq!(MongoDbStore::find_limit(&query), Some(2));

        query.limit = Some(usize::MAX);
        assert_eq!(MongoDbStore::find_limit(&query), Some(i64::MAX));

        query.limit = Some(0);
        assert_eq!(MongoDbStore::find_limit(&query), None);
    }

    #[test]
    fn stored_version_defaults_to_one() {
        assert_eq!(MongoDbStore::stored_version(&doc! { "_version": 7_i64 }), 7);
        assert_eq!(MongoDbStore::stored_version(&doc! { "name": "Mary" }), 1);
    }
}
