//! README retrieval
//!
//! The README is generated on first access and cached on the dataset row; an
//! update clears the cache so the next read regenerates it.

use serde::{Deserialize, Serialize};

use crate::readme;
use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetReadmeQuery {
    pub id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum GetReadmeError {
    #[error("Dataset {0} not found")]
    NotFound(i64),
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for GetReadmeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => GetReadmeError::NotFound(id),
            other => GetReadmeError::Store(other),
        }
    }
}

#[tracing::instrument(skip(store))]
pub async fn handle(store: &dyn CatalogStore, query: GetReadmeQuery) -> Result<String, GetReadmeError> {
    if let Some(content) = store.readme_content(query.id).await? {
        return Ok(content);
    }

    let dataset = store
        .get_dataset(query.id)
        .await?
        .ok_or(GetReadmeError::NotFound(query.id))?;

    let content = readme::generate(&dataset);
    store.store_readme(query.id, &content).await?;

    tracing::debug!(dataset_id = query.id, "README generated");
    Ok(content)
}
