//! Catalog models
//!
//! [`Dataset`] is the read view returned by every endpoint: the dataset row with its
//! anatomical area and many-to-many lookup entities resolved to `{id, name}` pairs.
//! [`NewDataset`] and [`DatasetPatch`] are the write shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maximum stored title length, in characters
pub const TITLE_MAX_LEN: usize = 500;

/// Maximum stored path length (external URL or local path), in characters
pub const PATH_MAX_LEN: usize = 1000;

/// Maximum stored license length, in characters
pub const LICENSE_MAX_LEN: usize = 255;

/// Maximum anatomical area name length
pub const AREA_NAME_MAX_LEN: usize = 100;

/// Maximum modality, ML task and tag name length
pub const LOOKUP_NAME_MAX_LEN: usize = 50;

/// Name of the anatomical area used when nothing could be extracted
pub const UNKNOWN_AREA: &str = "unknown";

/// A row of one of the lookup tables (anatomical areas, modalities, ML tasks, tags)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct LookupEntry {
    pub id: i64,
    pub name: String,
}

impl LookupEntry {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Dataset with its lookup entities resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub external_path: Option<String>,
    pub local_path: Option<String>,
    pub record_count: Option<i64>,
    pub size: Option<i64>,
    pub license: Option<String>,
    /// Anatomical area id
    pub anatomical_area: Option<i64>,
    pub anatomical_area_name: Option<String>,
    pub modalities: Vec<LookupEntry>,
    pub ml_tasks: Vec<LookupEntry>,
    pub tags: Vec<LookupEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `datasets` row plus the joined area name
#[derive(Debug, Clone, FromRow)]
pub struct DatasetRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub external_path: Option<String>,
    pub local_path: Option<String>,
    pub record_count: Option<i64>,
    pub size: Option<i64>,
    pub license: Option<String>,
    pub anatomical_area_id: Option<i64>,
    pub anatomical_area_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DatasetRecord {
    /// Attach the many-to-many entities loaded separately.
    pub fn into_dataset(
        self,
        modalities: Vec<LookupEntry>,
        ml_tasks: Vec<LookupEntry>,
        tags: Vec<LookupEntry>,
    ) -> Dataset {
        Dataset {
            id: self.id,
            title: self.title,
            description: self.description,
            external_path: self.external_path,
            local_path: self.local_path,
            record_count: self.record_count,
            size: self.size,
            license: self.license,
            anatomical_area: self.anatomical_area_id,
            anatomical_area_name: self.anatomical_area_name,
            modalities,
            ml_tasks,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Fields for a dataset that does not exist yet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDataset {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external_path: Option<String>,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub record_count: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub anatomical_area_id: Option<i64>,
    #[serde(default)]
    pub modality_ids: Vec<i64>,
    #[serde(default)]
    pub ml_task_ids: Vec<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

/// Partial update; `None` leaves a field unchanged.
///
/// Lookup id lists replace the current associations when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external_path: Option<String>,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub record_count: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub anatomical_area_id: Option<i64>,
    #[serde(default)]
    pub modality_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub ml_task_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub tag_ids: Option<Vec<i64>>,
}

impl DatasetPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Dataset built from an external provider record, not yet persisted.
///
/// The anatomical area is carried as extracted name candidates; the store resolves
/// them to a single area when the record is ingested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalDataset {
    pub title: String,
    pub description: Option<String>,
    pub license: Option<String>,
    pub external_path: Option<String>,
    pub local_path: Option<String>,
    pub record_count: Option<i64>,
    pub size: Option<i64>,
    pub area_candidates: Vec<String>,
}

/// Every lookup entity, for populating filter controls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub anatomical_areas: Vec<LookupEntry>,
    pub modalities: Vec<LookupEntry>,
    pub ml_tasks: Vec<LookupEntry>,
    pub tags: Vec<LookupEntry>,
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
