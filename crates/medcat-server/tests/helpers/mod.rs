//! Shared fixtures for the integration tests
//!
//! Everything runs against [`InMemoryStore`] and a [`ScriptedProvider`], so no
//! database or network access is needed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use medcat_server::{
    api,
    config::CorsConfig,
    extraction::KeywordEntityParser,
    features::FeatureState,
    models::{Dataset, NewDataset},
    provider::{
        DatasetMetadata, DatasetProvider, ListRequest, ListingItem, ListingTag, MetadataOutcome,
        ProviderError,
    },
    store::{CatalogStore, InMemoryStore},
};

/// Provider returning a fixed listing and per-reference metadata, counting calls.
#[derive(Default)]
pub struct ScriptedProvider {
    listing: Vec<ListingItem>,
    metadata: HashMap<String, MetadataOutcome>,
    list_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_listing(listing: Vec<ListingItem>) -> Self {
        Self {
            listing,
            ..Default::default()
        }
    }

    /// Metadata for `reference`; unscripted references get an empty record.
    pub fn metadata(mut self, reference: &str, outcome: MetadataOutcome) -> Self {
        self.metadata.insert(reference.to_string(), outcome);
        self
    }

    pub fn describe(self, reference: &str, description: &str) -> Self {
        self.metadata(
            reference,
            MetadataOutcome::Found(DatasetMetadata {
                description: Some(description.to_string()),
                license_names: Vec::new(),
            }),
        )
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list(&self, _request: &ListRequest) -> Result<Vec<ListingItem>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.listing.clone())
    }

    async fn get_metadata(
        &self,
        owner: &str,
        slug: &str,
    ) -> Result<MetadataOutcome, ProviderError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let reference = format!("{}/{}", owner, slug);
        Ok(self
            .metadata
            .get(&reference)
            .cloned()
            .unwrap_or_else(|| MetadataOutcome::Found(DatasetMetadata::default())))
    }
}

pub fn listing_item(reference: &str, title: &str, size: i64, tags: &[&str]) -> ListingItem {
    ListingItem {
        reference: reference.to_string(),
        title: title.to_string(),
        url: Some(format!("https://www.kaggle.com/datasets/{}", reference)),
        license_name: Some("CC0-1.0".to_string()),
        total_bytes: Some(size),
        tags: tags
            .iter()
            .map(|t| ListingTag {
                name: t.to_string(),
            })
            .collect(),
    }
}

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub provider: Arc<ScriptedProvider>,
    pub state: FeatureState,
    pub router: Router,
}

impl TestApp {
    pub fn new(provider: ScriptedProvider) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(provider);
        let parser = Arc::new(KeywordEntityParser::new().expect("vocabulary compiles"));

        let state = FeatureState::new(store.clone(), provider.clone(), parser);
        let cors = CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        };
        let router = api::create_router(state.clone(), &cors);

        Self {
            store,
            provider,
            state,
            router,
        }
    }

    pub async fn create_dataset(&self, title: &str, size: Option<i64>) -> Dataset {
        self.store
            .create_dataset(NewDataset {
                title: title.to_string(),
                size,
                ..Default::default()
            })
            .await
            .expect("Failed to create dataset")
    }

    /// Send a request and decode the JSON body (`Value::Null` when not JSON).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}
