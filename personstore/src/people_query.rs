//! Composable queries over the person collection.

use personstore_core::{
    backend::StoreBackend,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, QueryBuilder, SortDirection},
};
use tracing::debug;

use crate::{
    people::PersonStore,
    person::{Person, PersonField},
};

/// An immutable query over the person collection.
///
/// Every method returns a new query and leaves the receiver untouched, so a partial
/// query can be kept and extended in different directions. However the calls are
/// ordered, [`PersonQuery::execute`] always filters, then sorts, then skips, then
/// limits, then projects.
///
/// - `filter` calls are combined with AND.
/// - `sort_by` calls add secondary keys after the earlier ones.
/// - `skip` and `limit` replace any earlier value.
/// - `project` calls add to the set of excluded fields.
pub struct PersonQuery<'a, B: StoreBackend> {
    store: &'a PersonStore<B>,
    builder: QueryBuilder,
}

impl<B: StoreBackend> Clone for PersonQuery<'_, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            builder: self.builder.clone(),
        }
    }
}

impl<B: StoreBackend> std::fmt::Debug for PersonQuery<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonQuery")
            .field("collection", &self.store.collection_name())
            .field("query", &self.builder)
            .finish()
    }
}

impl<'a, B: StoreBackend> PersonQuery<'a, B> {
    pub(crate) fn new(store: &'a PersonStore<B>) -> Self {
        Self {
            store,
            builder: QueryBuilder::new(),
        }
    }

    fn with(&self, f: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        Self {
            store: self.store,
            builder: f(self.builder.clone()),
        }
    }

    pub fn filter(&self, predicate: Expr) -> Self {
        self.with(|b| b.filter(predicate))
    }

    pub fn sort_by(&self, field: PersonField, direction: SortDirection) -> Self {
        self.with(|b| b.sort(field, direction))
    }

    pub fn skip(&self, count: usize) -> Self {
        self.with(|b| b.offset(count))
    }

    pub fn limit(&self, count: usize) -> Self {
        self.with(|b| b.limit(count))
    }

    /// Leaves `fields` out of the results. Excluded optional fields come back empty.
    pub fn project(&self, fields: impl IntoIterator<Item = PersonField>) -> Self {
        self.with(|b| b.exclude(fields))
    }

    /// Runs the query.
    ///
    /// # Errors
    ///
    /// `Validation` when the projection excludes a required field.
    #[tracing::instrument(skip_all, fields(collection = %self.store.collection_name()))]
    pub async fn execute(&self) -> DocumentStoreResult<Vec<Person>> {
        let query = self.builder.clone().build();

        if let Some(projection) = &query.projection {
            if let Some(field) = PersonField::ALL
                .into_iter()
                .find(|f| f.is_required() && projection.excludes(f.as_str()))
            {
                return Err(DocumentStoreError::Validation(format!(
                    "required field `{field}` cannot be excluded"
                )));
            }
        }

        let people = self.store.people().query(query).await?;
        debug!(found = people.len(), "query executed");
        Ok(people)
    }
}
