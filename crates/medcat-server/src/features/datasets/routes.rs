//! Dataset API routes
//!
//! - `GET /api/v1/datasets` - paginated list, newest first
//! - `POST /api/v1/datasets` - register a dataset
//! - `GET /api/v1/datasets/:id` - dataset detail
//! - `PATCH /api/v1/datasets/:id` - partial update
//! - `GET /api/v1/datasets/:id/readme` - README markdown

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::FeatureState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::{
    commands::{CreateDatasetCommand, CreateDatasetError, UpdateDatasetCommand, UpdateDatasetError},
    queries::{
        GetDatasetError, GetDatasetQuery, GetReadmeError, GetReadmeQuery, ListDatasetsError,
        ListDatasetsQuery,
    },
};

pub fn datasets_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(list_datasets).post(create_dataset))
        .route("/:id", get(get_dataset).patch(update_dataset))
        .route("/:id/readme", get(get_readme))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// `201 Created` with the stored dataset
#[tracing::instrument(skip(state, command), fields(title = %command.dataset.title))]
async fn create_dataset(
    State(state): State<FeatureState>,
    Json(command): Json<CreateDatasetCommand>,
) -> Result<Response, DatasetApiError> {
    let dataset = super::commands::create::handle(state.store.as_ref(), command).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(dataset))).into_response())
}

#[tracing::instrument(skip(state, command), fields(id = %id))]
async fn update_dataset(
    State(state): State<FeatureState>,
    Path(id): Path<i64>,
    Json(mut command): Json<UpdateDatasetCommand>,
) -> Result<Response, DatasetApiError> {
    command.id = id;

    let dataset = super::commands::update::handle(state.store.as_ref(), command).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(dataset))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(state, query), fields(page = ?query.page, per_page = ?query.per_page))]
async fn list_datasets(
    State(state): State<FeatureState>,
    Query(query): Query<ListDatasetsQuery>,
) -> Result<Response, DatasetApiError> {
    let response = super::queries::list::handle(state.store.as_ref(), query).await?;

    tracing::debug!(
        count = response.items.len(),
        total = response.pagination.total,
        "Datasets listed via API"
    );

    let meta = json!({
        "pagination": response.pagination
    });

    Ok(
        (StatusCode::OK, Json(ApiResponse::success_with_meta(response.items, meta)))
            .into_response(),
    )
}

#[tracing::instrument(skip(state), fields(id = %id))]
async fn get_dataset(
    State(state): State<FeatureState>,
    Path(id): Path<i64>,
) -> Result<Response, DatasetApiError> {
    let dataset =
        super::queries::get::handle(state.store.as_ref(), GetDatasetQuery { id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(dataset))).into_response())
}

#[tracing::instrument(skip(state), fields(id = %id))]
async fn get_readme(
    State(state): State<FeatureState>,
    Path(id): Path<i64>,
) -> Result<Response, DatasetApiError> {
    let content =
        super::queries::readme::handle(state.store.as_ref(), GetReadmeQuery { id }).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        content,
    )
        .into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum DatasetApiError {
    Create(CreateDatasetError),
    Update(UpdateDatasetError),
    Get(GetDatasetError),
    List(ListDatasetsError),
    Readme(GetReadmeError),
}

impl From<CreateDatasetError> for DatasetApiError {
    fn from(err: CreateDatasetError) -> Self {
        Self::Create(err)
    }
}

impl From<UpdateDatasetError> for DatasetApiError {
    fn from(err: UpdateDatasetError) -> Self {
        Self::Update(err)
    }
}

impl From<GetDatasetError> for DatasetApiError {
    fn from(err: GetDatasetError) -> Self {
        Self::Get(err)
    }
}

impl From<ListDatasetsError> for DatasetApiError {
    fn from(err: ListDatasetsError) -> Self {
        Self::List(err)
    }
}

impl From<GetReadmeError> for DatasetApiError {
    fn from(err: GetReadmeError) -> Self {
        Self::Readme(err)
    }
}

impl IntoResponse for DatasetApiError {
    fn into_response(self) -> Response {
        match self {
            DatasetApiError::Create(
                CreateDatasetError::Validation(_) | CreateDatasetError::MissingReference { .. },
            )
            | DatasetApiError::Update(
                UpdateDatasetError::NoFieldsToUpdate
                | UpdateDatasetError::Validation(_)
                | UpdateDatasetError::MissingReference { .. },
            )
            | DatasetApiError::List(ListDatasetsError::InvalidPagination(_)) => {
                let error = ErrorResponse::new("VALIDATION_ERROR", self.to_string());
                (StatusCode::BAD_REQUEST, Json(error)).into_response()
            },
            DatasetApiError::Update(UpdateDatasetError::NotFound(_))
            | DatasetApiError::Get(GetDatasetError::NotFound(_))
            | DatasetApiError::Readme(GetReadmeError::NotFound(_)) => {
                let error = ErrorResponse::new("NOT_FOUND", self.to_string());
                (StatusCode::NOT_FOUND, Json(error)).into_response()
            },
            DatasetApiError::Create(CreateDatasetError::Store(_))
            | DatasetApiError::Update(UpdateDatasetError::Store(_))
            | DatasetApiError::Get(GetDatasetError::Store(_))
            | DatasetApiError::List(ListDatasetsError::Store(_))
            | DatasetApiError::Readme(GetReadmeError::Store(_)) => {
                tracing::error!("Store error in dataset API: {}", self);
                let error = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
        }
    }
}

impl std::fmt::Display for DatasetApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(e) => write!(f, "{}", e),
            Self::Update(e) => write!(f, "{}", e),
            Self::Get(e) => write!(f, "{}", e),
            Self::List(e) => write!(f, "{}", e),
            Self::Readme(e) => write!(f, "{}", e),
        }
    }
}
