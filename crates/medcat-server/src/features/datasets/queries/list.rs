use serde::{Deserialize, Serialize};

use crate::features::shared::{PaginationMetadata, PaginationParams};
use crate::models::Dataset;
use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDatasetsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDatasetsResponse {
    pub items: Vec<Dataset>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListDatasetsError {
    #[error("{0}")]
    InvalidPagination(&'static str),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ListDatasetsQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    pub fn validate(&self) -> Result<(), ListDatasetsError> {
        self.pagination()
            .validate()
            .map_err(ListDatasetsError::InvalidPagination)
    }
}

/// Newest datasets first.
#[tracing::instrument(skip(store))]
pub async fn handle(
    store: &dyn CatalogStore,
    query: ListDatasetsQuery,
) -> Result<ListDatasetsResponse, ListDatasetsError> {
    query.validate()?;

    let params = query.pagination();
    let (items, total) = store
        .list_datasets(params.offset(), params.per_page())
        .await?;

    Ok(ListDatasetsResponse {
        items,
        pagination: PaginationMetadata::from_params(&params, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDataset;
    use crate::store::InMemoryStore;

    #[test]
    fn test_validation() {
        let query = ListDatasetsQuery {
            page: Some(0),
            per_page: None,
        };
        assert!(matches!(
            query.validate(),
            Err(ListDatasetsError::InvalidPagination(_))
        ));
        assert!(ListDatasetsQuery::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_second_page() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .create_dataset(NewDataset {
                    title: format!("Dataset {}", i),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let query = ListDatasetsQuery {
            page: Some(2),
            per_page: Some(2),
        };
        let response = handle(&store, query).await.unwrap();

        assert_eq!(response.items.len(), 2);
        assert_eq!(response.pagination.total, 5);
        assert_eq!(response.pagination.pages, 3);
        assert!(response.pagination.has_next);
        assert!(response.pagination.has_prev);
    }
}
