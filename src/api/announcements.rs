//! Announcement endpoints
//!
//! Readers:
//! - GET /api/v1/announcements - Visible feed, pinned first
//! - GET /api/v1/announcements/{id}
//!
//! Managers (`manage_announcements`):
//! - GET/POST     /api/v1/admin/announcements
//! - PATCH/DELETE /api/v1/admin/announcements/{id}
//! - POST         /api/v1/admin/announcements/{id}/publish?notify=true
//! - POST         /api/v1/admin/announcements/{id}/archive

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
    Announcement, AnnouncementStatus, CreateAnnouncementInput, PagedResult, Permission, UpdateAnnouncementInput,
};

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub category_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<AnnouncementStatus>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublishQuery {
    #[serde(default)]
    pub notify: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(feed))
        .route("/{id}", get(get_announcement))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_announcement))
        .route("/{id}", patch(update_announcement).delete(delete_announcement))
        .route("/{id}/publish", post(publish_announcement))
        .route("/{id}/archive", post(archive_announcement))
}

async fn feed(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> Result<Json<PagedResult<Announcement>>, ApiError> {
    let result = state.services.announcements.feed(query.category_id, &page.params()).await?;
    Ok(Json(result))
}

/// Managers may open drafts and archived announcements here as well
async fn get_announcement(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Announcement>, ApiError> {
    let service = &state.services.announcements;
    let announcement = if auth.can(Permission::ManageAnnouncements) {
        service.get(id).await?
    } else {
        service.get_visible(id).await?
    };
    Ok(Json(announcement))
}

async fn list_all(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<AdminListQuery>,
) -> Result<Json<PagedResult<Announcement>>, ApiError> {
    auth.require(Permission::ManageAnnouncements)?;
    let result = state
        .services
        .announcements
        .list_all(query.status, query.category_id, &page.params())
        .await?;
    Ok(Json(result))
}

async fn create_announcement(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateAnnouncementInput>,
) -> Result<(StatusCode, Json<Announcement>), ApiError> {
    auth.require(Permission::ManageAnnouncements)?;
    let announcement = state.services.announcements.create(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

async fn update_announcement(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateAnnouncementInput>,
) -> Result<Json<Announcement>, ApiError> {
    auth.require(Permission::ManageAnnouncements)?;
    Ok(Json(state.services.announcements.update(&auth.user, id, body).await?))
}

async fn publish_announcement(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<PublishQuery>,
) -> Result<Json<Announcement>, ApiError> {
    auth.require(Permission::ManageAnnouncements)?;
    Ok(Json(
        state.services.announcements.publish(&auth.user, id, query.notify).await?,
    ))
}

async fn archive_announcement(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Announcement>, ApiError> {
    auth.require(Permission::ManageAnnouncements)?;
    Ok(Json(state.services.announcements.archive(&auth.user, id).await?))
}

async fn delete_announcement(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(Permission::ManageAnnouncements)?;
    state.services.announcements.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
