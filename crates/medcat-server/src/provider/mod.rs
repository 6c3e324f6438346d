//! External dataset provider
//!
//! The search flow backfills empty local results from a third-party dataset
//! repository through [`DatasetProvider`]. [`KaggleClient`] talks to the Kaggle
//! public API; [`DisabledProvider`] is used when backfill is switched off.

pub mod kaggle;
pub mod mapper;

pub use kaggle::KaggleClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid dataset reference '{0}', expected 'owner/slug'")]
    InvalidRef(String),

    #[error("Provider configuration error: {0}")]
    Config(String),
}

/// Listing sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Popularity
    #[default]
    Hottest,
    Votes,
    Updated,
    Active,
}

impl SortBy {
    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Hottest => "hottest",
            SortBy::Votes => "votes",
            SortBy::Updated => "updated",
            SortBy::Active => "active",
        }
    }
}

/// Parameters of a dataset listing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub search: String,
    pub sort_by: SortBy,
    pub page: u32,
    pub license: String,
    pub file_type: String,
}

impl ListRequest {
    /// First page of the most popular datasets matching `search`, any license or file type.
    pub fn popular(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            sort_by: SortBy::Hottest,
            page: 1,
            license: "all".to_string(),
            file_type: "all".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListingTag {
    pub name: String,
}

/// One entry of a provider listing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingItem {
    /// `owner/slug`
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub license_name: Option<String>,
    #[serde(default)]
    pub total_bytes: Option<i64>,
    #[serde(default)]
    pub tags: Vec<ListingTag>,
}

impl ListingItem {
    /// Split the reference into owner and dataset slug.
    pub fn slugs(&self) -> Result<(&str, &str), ProviderError> {
        match self.reference.split_once('/') {
            Some((owner, slug)) if !owner.is_empty() && !slug.is_empty() => Ok((owner, slug)),
            _ => Err(ProviderError::InvalidRef(self.reference.clone())),
        }
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }
}

/// Extended metadata of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetMetadata {
    pub description: Option<String>,
    pub license_names: Vec<String>,
}

/// Result of a metadata lookup that reached the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    Found(DatasetMetadata),
    /// The provider answered but reported an error for this dataset
    Error(String),
}

#[async_trait]
pub trait DatasetProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn list(&self, request: &ListRequest) -> Result<Vec<ListingItem>, ProviderError>;

    async fn get_metadata(&self, owner: &str, slug: &str)
        -> Result<MetadataOutcome, ProviderError>;
}

/// Provider that never returns anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

#[async_trait]
impl DatasetProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn list(&self, _request: &ListRequest) -> Result<Vec<ListingItem>, ProviderError> {
        Ok(Vec::new())
    }

    async fn get_metadata(
        &self,
        owner: &str,
        slug: &str,
    ) -> Result<MetadataOutcome, ProviderError> {
        Ok(MetadataOutcome::Error(format!(
            "external provider disabled, cannot load {}/{}",
            owner, slug
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_item_from_provider_json() {
        let item: ListingItem = serde_json::from_value(json!({
            "ref": "nih/chest-xray",
            "title": "Chest X-Ray",
            "url": "https://www.kaggle.com/datasets/nih/chest-xray",
            "licenseName": "CC0-1.0",
            "totalBytes": 4096,
            "tags": [{"name": "lung"}, {"name": "x-ray"}],
            "downloadCount": 12
        }))
        .unwrap();

        assert_eq!(item.slugs().unwrap(), ("nih", "chest-xray"));
        assert_eq!(item.license_name.as_deref(), Some("CC0-1.0"));
        assert_eq!(item.total_bytes, Some(4096));
        assert_eq!(item.tag_names(), vec!["lung", "x-ray"]);
    }

    #[test]
    fn test_invalid_reference() {
        let item = ListingItem {
            reference: "no-slash".to_string(),
            ..Default::default()
        };
        assert!(matches!(item.slugs(), Err(ProviderError::InvalidRef(_))));
    }

    #[test]
    fn test_popular_request() {
        let request = ListRequest::popular("lungs");
        assert_eq!(request.sort_by.as_str(), "hottest");
        assert_eq!(request.page, 1);
        assert_eq!(request.license, "all");
        assert_eq!(request.file_type, "all");
    }

    #[tokio::test]
    async fn test_disabled_provider_lists_nothing() {
        let provider = DisabledProvider;
        let items = provider.list(&ListRequest::popular("x")).await.unwrap();
        assert!(items.is_empty());
    }
}
