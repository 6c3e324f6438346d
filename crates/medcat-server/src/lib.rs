//! MedCat Server Library
//!
//! HTTP service for a catalog of medical-imaging and clinical datasets.
//!
//! # Overview
//!
//! - **Search**: free-text search over the local catalog with `<column>_<suffix>`
//!   filter parameters. A search with no local match is backfilled from an external
//!   dataset provider (Kaggle): the provider's most popular datasets for the query
//!   are mapped, tagged and ingested, then filtered like local results.
//! - **Datasets**: listing, detail, manual registration, partial updates and a
//!   lazily generated README per dataset.
//!
//! # Architecture
//!
//! - [`features`]: vertical slices (`commands/`, `queries/`, `routes.rs`)
//! - [`filters`]: parameter translation and resolution into typed conditions
//! - [`store`]: the [`store::CatalogStore`] seam with PostgreSQL and in-memory backends
//! - [`provider`]: the external dataset provider and its mapper
//! - [`extraction`]: anatomical entity extraction from free text
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use medcat_server::{api, config::Config, extraction::KeywordEntityParser,
//!     features::FeatureState, provider::DisabledProvider, store::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let state = FeatureState::new(
//!         Arc::new(InMemoryStore::new()),
//!         Arc::new(DisabledProvider),
//!         Arc::new(KeywordEntityParser::new()?),
//!     );
//!     let app = api::create_router(state, &config.cors);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod features;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod provider;
pub mod readme;
pub mod store;

// Re-export commonly used types
pub use error::{ApiResult, AppError};
