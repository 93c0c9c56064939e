//! Category endpoints
//!
//! - GET    /api/v1/categories - All categories (cached)
//! - POST   /api/v1/admin/categories
//! - PATCH  /api/v1/admin/categories/{id}
//! - DELETE /api/v1/admin/categories/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{Category, CreateCategoryInput, Permission, UpdateCategoryInput};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/{id}", patch(update_category).delete(delete_category))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.services.categories.list().await?))
}

async fn create_category(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    auth.require(Permission::ManageCategories)?;
    let category = state.services.categories.create(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    auth.require(Permission::ManageCategories)?;
    Ok(Json(state.services.categories.update(&auth.user, id, body).await?))
}

async fn delete_category(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(Permission::ManageCategories)?;
    state.services.categories.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
