//! Create dataset command
//!
//! Manual registration of a dataset, typically one that lives on local storage.
//! Lookup ids are optional but must exist when given.

use serde::{Deserialize, Serialize};

use crate::features::shared::validation::{
    validate_max_len, validate_non_negative, validate_required, FieldValidationError,
};
use crate::models::{Dataset, NewDataset, LICENSE_MAX_LEN, PATH_MAX_LEN, TITLE_MAX_LEN};
use crate::store::{CatalogStore, StoreError};

/// Command to create a dataset
///
/// # Examples
///
/// ```rust,ignore
/// let command = CreateDatasetCommand {
///     dataset: NewDataset {
///         title: "Chest CT".to_string(),
///         size: Some(1_048_576),
///         modality_ids: vec![1],
///         ..Default::default()
///     },
/// };
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDatasetCommand {
    #[serde(flatten)]
    pub dataset: NewDataset,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateDatasetError {
    #[error("{0}")]
    Validation(#[from] FieldValidationError),
    #[error("Referenced {entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: i64 },
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CreateDatasetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingReference { entity, id } => Self::MissingReference { entity, id },
            other => Self::Store(other),
        }
    }
}

impl CreateDatasetCommand {
    pub fn validate(&self) -> Result<(), CreateDatasetError> {
        let d = &self.dataset;
        validate_required("title", &d.title, TITLE_MAX_LEN)?;
        validate_max_len("external_path", d.external_path.as_deref(), PATH_MAX_LEN)?;
        validate_max_len("local_path", d.local_path.as_deref(), PATH_MAX_LEN)?;
        validate_max_len("license", d.license.as_deref(), LICENSE_MAX_LEN)?;
        validate_non_negative("record_count", d.record_count)?;
        validate_non_negative("size", d.size)?;
        Ok(())
    }
}

#[tracing::instrument(skip(store, command), fields(title = %command.dataset.title))]
pub async fn handle(
    store: &dyn CatalogStore,
    command: CreateDatasetCommand,
) -> Result<Dataset, CreateDatasetError> {
    command.validate()?;

    let mut new = command.dataset;
    new.title = new.title.trim().to_string();

    let dataset = store.create_dataset(new).await?;
    tracing::info!(dataset_id = dataset.id, "Dataset created");
    Ok(dataset)
}
