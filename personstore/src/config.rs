//! Store configuration, read from the environment.
//!
//! | variable                           | default       |
//! |------------------------------------|---------------|
//! | `PERSON_STORE_BACKEND`             | `memory`      |
//! | `MONGO_URI`                        | (required for `mongodb`) |
//! | `PERSON_STORE_DATABASE`            | `personstore` |
//! | `PERSON_STORE_COLLECTION`          | `Person`      |
//! | `PERSON_STORE_MAX_UPDATE_ATTEMPTS` | `16`          |
//!
//! A `.env` file in the working directory is loaded first when present.

use std::{env, str::FromStr};

use personstore_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};
use personstore_memory::InMemoryStore;

use crate::{people::PersonStore, person::Person};

pub const BACKEND_VAR: &str = "PERSON_STORE_BACKEND";
pub const MONGO_URI_VAR: &str = "MONGO_URI";
pub const DATABASE_VAR: &str = "PERSON_STORE_DATABASE";
pub const COLLECTION_VAR: &str = "PERSON_STORE_COLLECTION";
pub const MAX_UPDATE_ATTEMPTS_VAR: &str = "PERSON_STORE_MAX_UPDATE_ATTEMPTS";

pub const DEFAULT_DATABASE: &str = "personstore";
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 16;

/// Which backend [`StoreConfig::connect`] builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Memory,
    MongoDb,
}

impl FromStr for BackendKind {
    type Err = DocumentStoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            other => Err(DocumentStoreError::Initialization(format!(
                "{BACKEND_VAR} must be one of: memory, mongodb (got `{other}`)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub mongo_uri: Option<String>,
    pub database: String,
    pub collection: String,
    /// Attempts a read-modify-write update makes before giving up with `Conflict`.
    pub max_update_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            mongo_uri: None,
            database: DEFAULT_DATABASE.to_string(),
            collection: Person::collection_name().to_string(),
            max_update_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
        }
    }
}

impl StoreConfig {
    /// Reads the configuration from the process environment, after loading `.env`.
    pub fn from_env() -> DocumentStoreResult<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DocumentStoreResult<Self> {
        let defaults = Self::default();

        let backend = match lookup(BACKEND_VAR) {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };

        let max_update_attempts = match lookup(MAX_UPDATE_ATTEMPTS_VAR) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                DocumentStoreError::Initialization(format!(
                    "{MAX_UPDATE_ATTEMPTS_VAR} must be a positive integer (got `{raw}`)"
                ))
            })?,
            None => defaults.max_update_attempts,
        };

        let config = Self {
            backend,
            mongo_uri: lookup(MONGO_URI_VAR).filter(|uri| !uri.trim().is_empty()),
            database: lookup(DATABASE_VAR).unwrap_or(defaults.database),
            collection: lookup(COLLECTION_VAR).unwrap_or(defaults.collection),
            max_update_attempts,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_mongo_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongo_uri = Some(uri.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_max_update_attempts(mut self, attempts: u32) -> Self {
        self.max_update_attempts = attempts;
        self
    }

    /// Checks the values make sense together.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.max_update_attempts == 0 {
            return Err(DocumentStoreError::Initialization(format!(
                "{MAX_UPDATE_ATTEMPTS_VAR} must be at least 1"
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(DocumentStoreError::Initialization("collection name must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(DocumentStoreError::Initialization("database name must not be empty".into()));
        }
        if self.backend == BackendKind::MongoDb && self.mongo_uri.is_none() {
            return Err(DocumentStoreError::Initialization(format!(
                "{MONGO_URI_VAR} is required for the mongodb backend"
            )));
        }
        Ok(())
    }

    /// Builds the configured backend and opens a [`PersonStore`] over it.
    pub async fn connect(&self) -> DocumentStoreResult<PersonStore<Box<dyn StoreBackend>>> {
        self.validate()?;

        let backend: Box<dyn StoreBackend> = match self.backend {
            BackendKind::Memory => Box::new(InMemoryStore::builder().build().await?),
            BackendKind::MongoDb => self.mongo_backend().await?,
        };

        PersonStore::open(backend, self).await
    }

    #[cfg(feature = "mongodb")]
    async fn mongo_backend(&self) -> DocumentStoreResult<Box<dyn StoreBackend>> {
        let uri = self.mongo_uri.as_deref().ok_or_else(|| {
            DocumentStoreError::Initialization(format!("{MONGO_URI_VAR} is required for the mongodb backend"))
        })?;

        Ok(Box::new(
            personstore_mongodb::MongoDbStore::builder(uri, &self.database)
                .build()
                .await?,
        ))
    }

    #[cfg(not(feature = "mongodb"))]
    async fn mongo_backend(&self) -> DocumentStoreResult<Box<dyn StoreBackend>> {
        Err(DocumentStoreError::Initialization(
            "personstore was built without the `mongodb` feature".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.collection, "Person");
        assert_eq!(config.max_update_attempts, 16);
    }

    #[test]
    fn reads_every_variable() {
        let config = StoreConfig::from_lookup(lookup(&[
            (BACKEND_VAR, "MongoDB"),
            (MONGO_URI_VAR, "mongodb://localhost:27017"),
            (DATABASE_VAR, "tutorial"),
            (COLLECTION_VAR, "People"),
            (MAX_UPDATE_ATTEMPTS_VAR, "4"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendKind::MongoDb);
        assert_eq!(config.mongo_uri.as_deref(), Some("mongodb://localhost:27017"));
        assert_eq!(config.database, "tutorial");
        assert_eq!(config.collection, "People");
        assert_eq!(config.max_update_attempts, 4);
    }

    #[test]
    fn rejects_invalid_values() {
        for vars in [
            vec![(BACKEND_VAR, "postgres")],
            vec![(MAX_UPDATE_ATTEMPTS_VAR, "0")],
            vec![(MAX_UPDATE_ATTEMPTS_VAR, "many")],
            vec![(BACKEND_VAR, "mongodb")],
        ] {
            let err = StoreConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, DocumentStoreError::Initialization(_)), "{vars:?}: {err}");
        }
    }

    #[tokio::test]
    async fn connects_to_memory_backend() {
        let people = StoreConfig::default()
            .with_collection("Tutorial")
            .connect()
            .await
            .unwrap();

        assert_eq!(people.collection_name(), "Tutorial");
        assert_eq!(people.count(None).await.unwrap(), 0);
    }
}
