//! Update dataset command
//!
//! Partially updates a dataset. Fields that are absent stay unchanged; lookup id
//! lists, when present, replace the current associations.

use serde::{Deserialize, Serialize};

use crate::features::shared::validation::{
    validate_max_len, validate_non_negative, validate_required, FieldValidationError,
};
use crate::models::{Dataset, DatasetPatch, LICENSE_MAX_LEN, PATH_MAX_LEN, TITLE_MAX_LEN};
use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDatasetCommand {
    /// Taken from the request path
    #[serde(skip)]
    pub id: i64,
    #[serde(flatten)]
    pub patch: DatasetPatch,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateDatasetError {
    #[error("At least one field must be provided for update")]
    NoFieldsToUpdate,
    #[error("{0}")]
    Validation(#[from] FieldValidationError),
    #[error("Dataset {0} not found")]
    NotFound(i64),
    #[error("Referenced {entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: i64 },
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for UpdateDatasetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::MissingReference { entity, id } => Self::MissingReference { entity, id },
            other => Self::Store(other),
        }
    }
}

impl UpdateDatasetCommand {
    pub fn validate(&self) -> Result<(), UpdateDatasetError> {
        let p = &self.patch;
        if p.is_empty() {
            return Err(UpdateDatasetError::NoFieldsToUpdate);
        }
        if let Some(title) = &p.title {
            validate_required("title", title, TITLE_MAX_LEN)?;
        }
        validate_max_len("external_path", p.external_path.as_deref(), PATH_MAX_LEN)?;
        validate_max_len("local_path", p.local_path.as_deref(), PATH_MAX_LEN)?;
        validate_max_len("license", p.license.as_deref(), LICENSE_MAX_LEN)?;
        validate_non_negative("record_count", p.record_count)?;
        validate_non_negative("size", p.size)?;
        Ok(())
    }
}

#[tracing::instrument(skip(store, command), fields(dataset_id = command.id))]
pub async fn handle(
    store: &dyn CatalogStore,
    command: UpdateDatasetCommand,
) -> Result<Dataset, UpdateDatasetError> {
    command.validate()?;

    let mut patch = command.patch;
    patch.title = patch.title.map(|t| t.trim().to_string());

    let dataset = store.update_dataset(command.id, patch).await?;
    tracing::info!(dataset_id = dataset.id, "Dataset updated");
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::resolve::Relation;
    use crate::models::NewDataset;
    use crate::store::InMemoryStore;

    #[test]
    fn test_empty_patch_rejected() {
        let command = UpdateDatasetCommand {
            id: 1,
            patch: DatasetPatch::default(),
        };
        assert!(matches!(
            command.validate(),
            Err(UpdateDatasetError::NoFieldsToUpdate)
        ));
    }

    #[test]
    fn test_blank_title_rejected() {
        let command = UpdateDatasetCommand {
            id: 1,
            patch: DatasetPatch {
                title: Some(" ".to_string()),
                ..Default::default()
            },
        };
        assert!(matches!(
            command.validate(),
            Err(UpdateDatasetError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_replaces_tags_and_bumps_updated_at() {
        let store = InMemoryStore::new();
        let tags = store.seed_lookups(Some(Relation::Tags), &["oncology", "pediatric"]).await;
        let created = store
            .create_dataset(NewDataset {
                title: "Bone scans".to_string(),
                tag_ids: vec![tags[0]],
                ..Default::default()
            })
            .await
            .unwrap();

        let command = UpdateDatasetCommand {
            id: created.id,
            patch: DatasetPatch {
                tag_ids: Some(vec![tags[1]]),
                size: Some(100),
                ..Default::default()
            },
        };
        let updated = handle(&store, command).await.unwrap();

        assert_eq!(updated.tags.len(), 1);
        assert_eq!(updated.tags[0].name, "pediatric");
        assert_eq!(updated.size, Some(100));
        assert_eq!(updated.title, "Bone scans");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_handle_not_found() {
        let store = InMemoryStore::new();
        let command = UpdateDatasetCommand {
            id: 77,
            patch: DatasetPatch {
                size: Some(1),
                ..Default::default()
            },
        };
        assert!(matches!(
            handle(&store, command).await,
            Err(UpdateDatasetError::NotFound(77))
        ));
    }
}
