use crate::models::FilterOptions;
use crate::store::{CatalogStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ListFiltersError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Every anatomical area, modality, ML task and tag, for filter controls.
#[tracing::instrument(skip(store))]
pub async fn handle(store: &dyn CatalogStore) -> Result<FilterOptions, ListFiltersError> {
    Ok(store.filter_options().await?)
}
