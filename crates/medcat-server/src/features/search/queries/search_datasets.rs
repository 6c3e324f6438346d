//! Dataset search with external backfill
//!
//! Local datasets matching the query text are served directly. When nothing
//! matches, the external provider is asked for its most popular datasets for the
//! query; they are mapped, ingested with their tags, and the freshly created rows
//! become the result set. Filters apply to whichever set was chosen.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::features::FeatureState;
use crate::filters::{self, resolve::ResolvedFilters, FilterError, FilterParams};
use crate::models::Dataset;
use crate::provider::{mapper::map_external, ListRequest, MetadataOutcome, ProviderError};
use crate::store::{DatasetQuery, IngestItem, StoreError};

/// Minimum query length, in characters
pub const QUERY_MIN_LEN: usize = 2;

/// Maximum query length, in characters
pub const QUERY_MAX_LEN: usize = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchDatasetsQuery {
    pub query: String,
    /// Filter parameters in request order
    pub filters: FilterParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDatasetsResponse {
    pub count: usize,
    pub results: Vec<Dataset>,
}

impl SearchDatasetsResponse {
    fn empty() -> Self {
        Self {
            count: 0,
            results: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchDatasetsError {
    #[error("Query is required and cannot be blank")]
    QueryRequired,
    #[error("Query must be between 2 and 100 characters")]
    QueryLength,
    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),
    #[error("External provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SearchDatasetsQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.push((name.into(), value));
        self
    }

    pub fn validate(&self) -> Result<(), SearchDatasetsError> {
        let text = self.query.trim();
        if text.is_empty() {
            return Err(SearchDatasetsError::QueryRequired);
        }
        let len = text.chars().count();
        if !(QUERY_MIN_LEN..=QUERY_MAX_LEN).contains(&len) {
            return Err(SearchDatasetsError::QueryLength);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, query), fields(query = %query.query, filters = query.filters.len()))]
pub async fn handle(
    state: &FeatureState,
    query: SearchDatasetsQuery,
) -> Result<SearchDatasetsResponse, SearchDatasetsError> {
    query.validate()?;

    // filters are checked before any I/O so a bad request never triggers ingestion
    let resolved = filters::resolve::resolve(&filters::translate(query.filters)?)?;
    let text = query.query.trim();

    let hits = state.store.probe(text).await?;
    let scope = if hits > 0 {
        debug!(hits, "Serving local matches");
        DatasetQuery::matching(text)
    } else {
        match backfill(state, text).await? {
            Some(ids) => DatasetQuery::ids(ids),
            None => return Ok(SearchDatasetsResponse::empty()),
        }
    };

    let results = fetch_filtered(state, scope, &resolved).await?;
    Ok(SearchDatasetsResponse {
        count: results.len(),
        results,
    })
}

async fn fetch_filtered(
    state: &FeatureState,
    scope: DatasetQuery,
    filters: &ResolvedFilters,
) -> Result<Vec<Dataset>, StoreError> {
    state.store.fetch(&scope.apply(filters)).await
}

/// Pull datasets for `text` from the provider and ingest them.
///
/// Returns the ids of the created datasets, or `None` when the provider had
/// nothing or any metadata lookup reported an error.
async fn backfill(state: &FeatureState, text: &str) -> Result<Option<Vec<i64>>, SearchDatasetsError> {
    let listing = state.provider.list(&ListRequest::popular(text)).await?;
    if listing.is_empty() {
        info!(provider = state.provider.name(), "Provider returned no datasets");
        return Ok(None);
    }

    let mut batch = Vec::with_capacity(listing.len());
    for item in &listing {
        let (owner, slug) = item.slugs()?;
        let metadata = match state.provider.get_metadata(owner, slug).await? {
            MetadataOutcome::Found(metadata) => metadata,
            MetadataOutcome::Error(message) => {
                warn!(
                    reference = %item.reference,
                    error = %message,
                    mapped = batch.len(),
                    "Metadata lookup failed, discarding batch"
                );
                return Ok(None);
            },
        };

        batch.push(IngestItem {
            dataset: map_external(item, &metadata, state.parser.as_ref()),
            tags: item.tag_names(),
        });
    }

    let report = state.store.ingest(batch).await?;
    info!(
        provider = state.provider.name(),
        datasets = report.dataset_ids.len(),
        areas_created = report.areas_created,
        tags_created = report.tags_created,
        links_created = report.links_created,
        "External datasets ingested"
    );

    Ok(Some(report.dataset_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_success() {
        assert!(SearchDatasetsQuery::new("lungs").validate().is_ok());
        assert!(SearchDatasetsQuery::new("ct").validate().is_ok());
        assert!(SearchDatasetsQuery::new("x".repeat(100)).validate().is_ok());
    }

    #[test]
    fn test_validation_blank() {
        assert!(matches!(
            SearchDatasetsQuery::new("   ").validate(),
            Err(SearchDatasetsError::QueryRequired)
        ));
    }

    #[test]
    fn test_validation_length() {
        assert!(matches!(
            SearchDatasetsQuery::new("a").validate(),
            Err(SearchDatasetsError::QueryLength)
        ));
        assert!(matches!(
            SearchDatasetsQuery::new("x".repeat(101)).validate(),
            Err(SearchDatasetsError::QueryLength)
        ));
    }

    #[test]
    fn test_with_filter_keeps_order() {
        let query = SearchDatasetsQuery::new("lungs")
            .with_filter("size_min", json!(1000))
            .with_filter("ordering", json!(["size", "desc"]));
        let names: Vec<_> = query.filters.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["size_min", "ordering"]);
    }
}
