//! Metadata store
//!
//! [`CatalogStore`] is the seam between the HTTP/search layer and persistence. Two
//! implementations exist:
//!
//! - [`PgCatalogStore`]: PostgreSQL via sqlx
//! - [`InMemoryStore`]: process-local maps, for tests and database-less runs
//!
//! Reads go through [`DatasetQuery`], an immutable value describing scope,
//! conditions, ordering and de-duplication. Each builder method returns a new query,
//! so a step can never be applied by side effect and then lost.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgCatalogStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::filters::resolve::{Condition, Ordering, ResolvedFilters};
use crate::models::{Dataset, DatasetPatch, ExternalDataset, FilterOptions, NewDataset};

/// Datasets are inserted in chunks of this many rows during ingestion
pub const INGEST_CHUNK_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Dataset {0} not found")]
    NotFound(i64),

    #[error("Referenced {entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which datasets a query starts from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Case-insensitive substring match on title or description
    Text(String),
    /// Exactly these dataset ids
    Ids(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetQuery {
    scope: Scope,
    conditions: Vec<Condition>,
    ordering: Ordering,
    distinct: bool,
}

impl DatasetQuery {
    fn new(scope: Scope) -> Self {
        Self {
            scope,
            conditions: Vec::new(),
            ordering: Ordering::default(),
            distinct: false,
        }
    }

    pub fn all() -> Self {
        Self::new(Scope::All)
    }

    pub fn matching(text: impl Into<String>) -> Self {
        Self::new(Scope::Text(text.into()))
    }

    pub fn ids(ids: Vec<i64>) -> Self {
        Self::new(Scope::Ids(ids))
    }

    #[must_use]
    pub fn filter(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    #[must_use]
    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.ordering = ordering;
        self
    }

    #[must_use]
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Apply conditions, then ordering (when requested), then distinct.
    #[must_use]
    pub fn apply(self, filters: &ResolvedFilters) -> Self {
        let query = self.filter(filters.conditions.iter().cloned());
        let query = match filters.ordering {
            Some(ordering) => query.order_by(ordering),
            None => query,
        };
        query.distinct(filters.distinct)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }
}

/// One external dataset plus the tag names to link to it
#[derive(Debug, Clone, PartialEq)]
pub struct IngestItem {
    pub dataset: ExternalDataset,
    pub tags: Vec<String>,
}

/// Outcome of [`CatalogStore::ingest`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Ids of the created datasets, in input order
    pub dataset_ids: Vec<i64>,
    pub areas_created: usize,
    pub tags_created: usize,
    /// Dataset-tag links actually inserted (duplicates skipped)
    pub links_created: usize,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Number of datasets whose title or description contains `text`, ignoring case.
    async fn probe(&self, text: &str) -> StoreResult<i64>;

    async fn fetch(&self, query: &DatasetQuery) -> StoreResult<Vec<Dataset>>;

    /// Persist externally sourced datasets together with their areas and tags.
    ///
    /// Either everything in the batch is written or nothing is.
    async fn ingest(&self, batch: Vec<IngestItem>) -> StoreResult<IngestReport>;

    async fn get_dataset(&self, id: i64) -> StoreResult<Option<Dataset>>;

    /// One page of datasets, newest first, plus the total count.
    async fn list_datasets(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Dataset>, i64)>;

    async fn create_dataset(&self, new: NewDataset) -> StoreResult<Dataset>;

    /// Apply `patch`, refresh `updated_at` and drop any cached README.
    async fn update_dataset(&self, id: i64, patch: DatasetPatch) -> StoreResult<Dataset>;

    /// Cached README, `None` when not generated yet.
    async fn readme_content(&self, id: i64) -> StoreResult<Option<String>>;

    async fn store_readme(&self, id: i64, content: &str) -> StoreResult<()>;

    async fn filter_options(&self) -> StoreResult<FilterOptions>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Unique non-empty names in first-seen order.
pub(crate) fn distinct_names<'a>(names: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::resolve::{CmpOp, OrderColumn, ScalarColumn, ScalarValue};

    #[test]
    fn test_builder_returns_new_values() {
        let base = DatasetQuery::matching("lung");
        let ordered = base.clone().order_by(Ordering {
            column: OrderColumn::Scalar(ScalarColumn::Size),
            descending: true,
        });

        assert_eq!(base.ordering(), Ordering::default());
        assert_eq!(ordered.ordering().column, OrderColumn::Scalar(ScalarColumn::Size));
        assert_eq!(ordered.scope(), &Scope::Text("lung".to_string()));
    }

    #[test]
    fn test_apply_keeps_default_ordering_when_none_requested() {
        let filters = ResolvedFilters {
            conditions: vec![Condition::Scalar {
                column: ScalarColumn::Size,
                op: CmpOp::Gte,
                value: ScalarValue::Int(1),
            }],
            ordering: None,
            distinct: true,
        };
        let query = DatasetQuery::all().apply(&filters);
        assert_eq!(query.ordering(), Ordering::default());
        assert_eq!(query.conditions().len(), 1);
        assert!(query.is_distinct());
    }

    #[test]
    fn test_distinct_names() {
        let names = vec![
            "mri".to_string(),
            " ct ".to_string(),
            "mri".to_string(),
            "".to_string(),
        ];
        assert_eq!(distinct_names(&names), vec!["mri", "ct"]);
    }
}
