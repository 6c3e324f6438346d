//! Search API routes
//!
//! - `GET /api/v1/search?q=..&<filters>` - search with filters in the query string
//! - `POST /api/v1/search` - search with `{"query", "filters"}` in the body; query
//!   string parameters are applied before the body filters
//! - `GET /api/v1/search/filters` - lookup entities for filter controls

use crate::api::response::ErrorResponse;
use crate::features::FeatureState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::queries::{ListFiltersError, SearchDatasetsError, SearchDatasetsQuery};

/// Query string parameter carrying the search text on `GET`
const QUERY_PARAM: &str = "q";

pub fn search_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(search_get).post(search_post))
        .route("/filters", get(list_filters))
}

/// Body of `POST /search`
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

fn url_filters(params: Vec<(String, String)>) -> impl Iterator<Item = (String, Value)> {
    params
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
}

#[tracing::instrument(skip(state, params), fields(params = params.len()))]
async fn search_get(
    State(state): State<FeatureState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, SearchApiError> {
    let (text, rest): (Vec<_>, Vec<_>) = params.into_iter().partition(|(name, _)| name == QUERY_PARAM);

    let query = SearchDatasetsQuery {
        query: text.into_iter().last().map(|(_, v)| v).unwrap_or_default(),
        filters: url_filters(rest).collect(),
    };

    run_search(&state, query).await
}

#[tracing::instrument(skip(state, params, request), fields(query = %request.query))]
async fn search_post(
    State(state): State<FeatureState>,
    Query(params): Query<Vec<(String, String)>>,
    Json(request): Json<SearchRequest>,
) -> Result<Response, SearchApiError> {
    let filters = url_filters(params).chain(request.filters).collect();

    let query = SearchDatasetsQuery {
        query: request.query,
        filters,
    };

    run_search(&state, query).await
}

async fn run_search(
    state: &FeatureState,
    query: SearchDatasetsQuery,
) -> Result<Response, SearchApiError> {
    let response = super::queries::search_datasets::handle(state, query).await?;

    tracing::debug!(count = response.count, "Search completed");

    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip(state))]
async fn list_filters(State(state): State<FeatureState>) -> Result<Response, SearchApiError> {
    let options = super::queries::list_filters::handle(state.store.as_ref()).await?;
    Ok((StatusCode::OK, Json(options)).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum SearchApiError {
    Search(SearchDatasetsError),
    Filters(ListFiltersError),
}

impl From<SearchDatasetsError> for SearchApiError {
    fn from(err: SearchDatasetsError) -> Self {
        Self::Search(err)
    }
}

impl From<ListFiltersError> for SearchApiError {
    fn from(err: ListFiltersError) -> Self {
        Self::Filters(err)
    }
}

impl IntoResponse for SearchApiError {
    fn into_response(self) -> Response {
        match self {
            SearchApiError::Search(
                SearchDatasetsError::QueryRequired
                | SearchDatasetsError::QueryLength
                | SearchDatasetsError::Filter(_),
            ) => {
                let error = ErrorResponse::new("VALIDATION_ERROR", self.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            SearchApiError::Search(SearchDatasetsError::Provider(_)) => {
                tracing::error!("External provider failure during search: {}", self);
                let error =
                    ErrorResponse::new("PROVIDER_ERROR", "The external dataset provider failed");
                (StatusCode::BAD_GATEWAY, Json(error)).into_response()
            },
            SearchApiError::Search(SearchDatasetsError::Store(_))
            | SearchApiError::Filters(ListFiltersError::Store(_)) => {
                tracing::error!("Store error during search: {}", self);
                let error = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
        }
    }
}

impl std::fmt::Display for SearchApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search(e) => write!(f, "{}", e),
            Self::Filters(e) => write!(f, "{}", e),
        }
    }
}
