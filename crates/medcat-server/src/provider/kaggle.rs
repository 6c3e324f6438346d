//! Kaggle public API client

use super::{
    DatasetMetadata, DatasetProvider, ListRequest, ListingItem, MetadataOutcome, ProviderError,
};
use crate::config::ProviderConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Kaggle API client
#[derive(Clone)]
pub struct KaggleClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataEnvelope {
    #[serde(default)]
    info: Option<MetadataInfo>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataInfo {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    licenses: Vec<LicenseEntry>,
}

#[derive(Debug, Deserialize)]
struct LicenseEntry {
    #[serde(default)]
    name: Option<String>,
}

impl KaggleClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        if config.base_url.trim().is_empty() {
            return Err(ProviderError::Config("base URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("medcat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let credentials = match (&config.username, &config.key) {
            (Some(user), Some(key)) => Some((user.clone(), key.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.credentials {
            Some((user, key)) => request.basic_auth(user, Some(key)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<reqwest::Response, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %url, "Provider request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl DatasetProvider for KaggleClient {
    fn name(&self) -> &str {
        "kaggle"
    }

    #[tracing::instrument(skip(self, request), fields(search = %request.search, page = request.page))]
    async fn list(&self, request: &ListRequest) -> Result<Vec<ListingItem>, ProviderError> {
        let url = format!("{}/datasets/list", self.base_url);
        let page = request.page.to_string();

        let builder = self.get(&url).query(&[
            ("search", request.search.as_str()),
            ("sortBy", request.sort_by.as_str()),
            ("page", page.as_str()),
            ("license", request.license.as_str()),
            ("filetype", request.file_type.as_str()),
        ]);

        // the API answers `null` instead of `[]` for some empty searches
        let items: Vec<ListingItem> = self
            .send(builder, &url)
            .await?
            .json::<Option<Vec<ListingItem>>>()
            .await?
            .unwrap_or_default();
        debug!(count = items.len(), "Provider listing received");
        Ok(items)
    }

    #[tracing::instrument(skip(self))]
    async fn get_metadata(
        &self,
        owner: &str,
        slug: &str,
    ) -> Result<MetadataOutcome, ProviderError> {
        let url = format!("{}/datasets/metadata/{}/{}", self.base_url, owner, slug);

        let envelope: MetadataEnvelope = self.send(self.get(&url), &url).await?.json().await?;

        if let Some(message) = envelope.error_message.filter(|m| !m.trim().is_empty()) {
            return Ok(MetadataOutcome::Error(message));
        }

        let info = envelope.info.unwrap_or_default();
        Ok(MetadataOutcome::Found(DatasetMetadata {
            description: info.description.filter(|d| !d.trim().is_empty()),
            license_names: info
                .licenses
                .into_iter()
                .filter_map(|l| l.name)
                .filter(|n| !n.trim().is_empty())
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ProviderConfig {
            base_url: "http://localhost:9999/api/v1/".to_string(),
            ..Default::default()
        };
        let client = KaggleClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9999/api/v1");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = ProviderConfig {
            base_url: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            KaggleClient::new(&config),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn test_metadata_envelope_shape() {
        let envelope: MetadataEnvelope = serde_json::from_str(
            r#"{"info": {"description": "Lung scans", "licenses": [{"name": "CC0-1.0"}]}, "errorMessage": null}"#,
        )
        .unwrap();
        let info = envelope.info.unwrap();
        assert_eq!(info.description.as_deref(), Some("Lung scans"));
        assert_eq!(info.licenses[0].name.as_deref(), Some("CC0-1.0"));
        assert!(envelope.error_message.is_none());
    }
}
