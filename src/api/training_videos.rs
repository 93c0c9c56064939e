//! Training video library
//!
//! Training videos are resources of kind `video`:
//! - GET  /api/v1/training-videos
//! - GET  /api/v1/training-videos/{id}
//! - POST /api/v1/training-videos (`manage_training_videos`)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, ApiJson, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{CreateResourceInput, PagedResult, Permission, Resource, ResourceFilter, ResourceKind};

#[derive(Debug, Default, Deserialize)]
pub struct VideoQuery {
    pub category_id: Option<i64>,
    pub q: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_videos).post(create_video))
        .route("/{id}", get(get_video))
}

async fn list_videos(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<VideoQuery>,
) -> Result<Json<PagedResult<Resource>>, ApiError> {
    let filter = ResourceFilter {
        kind: Some(ResourceKind::Video),
        category_id: query.category_id,
        query: query.q,
    };
    Ok(Json(state.services.resources.list(&filter, &page.params()).await?))
}

async fn get_video(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Resource>, ApiError> {
    let resource = state.services.resources.get(id).await?;
    if resource.kind != ResourceKind::Video {
        return Err(ApiError::not_found(format!("Training video {} not found", id)));
    }
    Ok(Json(resource))
}

/// The `kind` in the body is ignored
async fn create_video(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateResourceInput>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    auth.require(Permission::ManageTrainingVideos)?;
    let input = CreateResourceInput {
        kind: ResourceKind::Video,
        ..body
    };
    let video = state.services.resources.create(&auth.user, input).await?;
    Ok((StatusCode::CREATED, Json(video)))
}
