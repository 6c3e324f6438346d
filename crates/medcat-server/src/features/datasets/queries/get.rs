use serde::{Deserialize, Serialize};

use crate::models::Dataset;
use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetDatasetQuery {
    pub id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum GetDatasetError {
    #[error("Dataset {0} not found")]
    NotFound(i64),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: &dyn CatalogStore,
    query: GetDatasetQuery,
) -> Result<Dataset, GetDatasetError> {
    store
        .get_dataset(query.id)
        .await?
        .ok_or(GetDatasetError::NotFound(query.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDataset;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_get_existing() {
        let store = InMemoryStore::new();
        let created = store
            .create_dataset(NewDataset {
                title: "Brain MRI".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let dataset = handle(&store, GetDatasetQuery { id: created.id }).await.unwrap();
        assert_eq!(dataset.title, "Brain MRI");
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryStore::new();
        let result = handle(&store, GetDatasetQuery { id: 404 }).await;
        assert!(matches!(result, Err(GetDatasetError::NotFound(404))));
    }
}
