//! Application router
//!
//! Mounts the feature routes under `/api/v1` next to the service endpoints and
//! applies the middleware stack.

pub mod response;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tower_http::compression::CompressionLayer;

use crate::config::CorsConfig;
use crate::error::{ApiResult, AppError};
use crate::features::{self, FeatureState};
use crate::middleware;

/// Build the complete application router.
pub fn create_router(state: FeatureState, cors: &CorsConfig) -> Router {
    let service_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state.clone());

    service_routes
        .nest("/api/v1", features::router(state))
        // layers apply from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "MedCat Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Store reachability
async fn health(State(state): State<FeatureState>) -> ApiResult<impl IntoResponse> {
    if let Err(e) = state.store.health_check().await {
        tracing::error!("Store health check failed: {}", e);
        return Err(AppError::Unavailable("Catalog store is unreachable".to_string()));
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "store": "connected",
            "provider": state.provider.name()
        })),
    ))
}
