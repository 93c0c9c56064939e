//! Resource endpoints
//!
//! - GET    /api/v1/resources - Filter by kind, category and free text
//! - GET    /api/v1/resources/{id}
//! - POST   /api/v1/admin/resources
//! - PATCH  /api/v1/admin/resources/{id}
//! - DELETE /api/v1/admin/resources/{id}
//!
//! Admin routes need `manage_resources`; for video resources
//! `manage_training_videos` is enough. The service checks the exact kind.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, ApiJson, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{
    CreateResourceInput, PagedResult, Permission, Resource, ResourceFilter, ResourceKind, UpdateResourceInput,
};

#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    pub kind: Option<ResourceKind>,
    pub category_id: Option<i64>,
    pub q: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_resources))
        .route("/{id}", get(get_resource))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_resource))
        .route("/{id}", patch(update_resource).delete(delete_resource))
}

/// 403 unless the user can manage at least some kind of resource
fn require_any_manage(auth: &AuthenticatedUser) -> Result<(), ApiError> {
    if auth.can(Permission::ManageResources) {
        Ok(())
    } else {
        auth.require(Permission::ManageTrainingVideos)
    }
}

async fn list_resources(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<ResourceQuery>,
) -> Result<Json<PagedResult<Resource>>, ApiError> {
    let filter = ResourceFilter {
        kind: query.kind,
        category_id: query.category_id,
        query: query.q,
    };
    Ok(Json(state.services.resources.list(&filter, &page.params()).await?))
}

async fn get_resource(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Resource>, ApiError> {
    Ok(Json(state.services.resources.get(id).await?))
}

async fn create_resource(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateResourceInput>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    require_any_manage(&auth)?;
    let resource = state.services.resources.create(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

async fn update_resource(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateResourceInput>,
) -> Result<Json<Resource>, ApiError> {
    require_any_manage(&auth)?;
    Ok(Json(state.services.resources.update(&auth.user, id, body).await?))
}

async fn delete_resource(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_any_manage(&auth)?;
    state.services.resources.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
