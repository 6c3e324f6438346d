//! Feature modules implementing the MedCat API
//!
//! Each feature is a vertical slice with its own commands, queries and routes.
//!
//! # Features
//!
//! - **datasets**: dataset listing, detail, manual registration, updates and README
//! - **search**: free-text search with external backfill, and filter options
//!
//! # Architecture
//!
//! - `commands/` - write operations (create, update)
//! - `queries/` - read operations (get, list, search)
//! - `routes.rs` - HTTP route definitions
//!
//! Handlers receive their collaborators from [`FeatureState`], so tests can swap
//! in an in-memory store or a scripted provider.

pub mod datasets;
pub mod search;
pub mod shared;

use std::sync::Arc;

use axum::Router;

use crate::extraction::EntityParser;
use crate::provider::DatasetProvider;
use crate::store::CatalogStore;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Catalog persistence
    pub store: Arc<dyn CatalogStore>,
    /// External source used to backfill empty searches
    pub provider: Arc<dyn DatasetProvider>,
    /// Extracts anatomical areas from provider descriptions
    pub parser: Arc<dyn EntityParser>,
}

impl FeatureState {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        provider: Arc<dyn DatasetProvider>,
        parser: Arc<dyn EntityParser>,
    ) -> Self {
        Self {
            store,
            provider,
            parser,
        }
    }
}

/// Creates the API router with all feature routes mounted
///
/// - `/datasets` - dataset operations
/// - `/search` - search and filter options
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/datasets", datasets::datasets_routes().with_state(state.clone()))
        .nest("/search", search::search_routes().with_state(state))
}
