//! Notification endpoints
//!
//! Inbox of the signed-in user:
//! - GET  /api/v1/notifications?unread_only=true
//! - GET  /api/v1/notifications/unread-count
//! - POST /api/v1/notifications/{id}/read
//! - POST /api/v1/notifications/read-all
//!
//! Sending (`send_notifications`):
//! - POST   /api/v1/admin/notifications
//! - DELETE /api/v1/admin/notifications/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, ApiJson, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{InboxItem, NewNotification, Notification, PagedResult, Permission};

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub marked: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(inbox))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/{id}/read", post(mark_read))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(send_notification))
        .route("/{id}", delete(delete_notification))
}

async fn inbox(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<InboxQuery>,
) -> Result<Json<PagedResult<InboxItem>>, ApiError> {
    let result = state
        .services
        .notifications
        .inbox(&auth.user, query.unread_only, &page.params())
        .await?;
    Ok(Json(result))
}

async fn unread_count(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = state.services.notifications.unread_count(&auth.user).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

async fn mark_read(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.services.notifications.mark_read(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let marked = state.services.notifications.mark_all_read(&auth.user).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}

async fn send_notification(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<NewNotification>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    auth.require(Permission::SendNotifications)?;
    let notification = state.services.notifications.send(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(Permission::SendNotifications)?;
    state.services.notifications.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
