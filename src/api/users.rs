//! User administration endpoints (`manage_users`)
//!
//! - GET    /api/v1/admin/users - Paged list, filter by role/status/search
//! - POST   /api/v1/admin/users - Create a user
//! - GET    /api/v1/admin/users/{id}
//! - PATCH  /api/v1/admin/users/{id}
//! - DELETE /api/v1/admin/users/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, ApiJson, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{CreateUserInput, PagedResult, Permission, UpdateUserInput, User, UserFilter, UserRole, UserStatus};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).patch(update_user).delete(delete_user))
}

async fn list_users(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    auth.require(Permission::ManageUsers)?;
    let filter = UserFilter {
        role: query.role,
        status: query.status,
        search: query.search,
    };
    let result = state.services.users.list_users(&filter, &page.params()).await?;
    Ok(Json(result))
}

async fn create_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    auth.require(Permission::ManageUsers)?;
    let user = state.services.users.create_user(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    auth.require(Permission::ManageUsers)?;
    Ok(Json(state.services.users.get_user(id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    auth.require(Permission::ManageUsers)?;
    Ok(Json(state.services.users.update_user(&auth.user, id, body).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(Permission::ManageUsers)?;
    state.services.users.delete_user(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
