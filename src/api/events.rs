//! Calendar (internal event) endpoints
//!
//! - GET    /api/v1/events?from&to - Events overlapping the window
//!   (default: the next 30 days)
//! - GET    /api/v1/events/{id}
//! - POST   /api/v1/admin/events (`manage_events`)
//! - PATCH  /api/v1/admin/events/{id}
//! - DELETE /api/v1/admin/events/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{CreateEventInput, EventWindow, InternalEvent, Permission, UpdateEventInput};

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/{id}", get(get_event))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_event))
        .route("/{id}", patch(update_event).delete(delete_event))
}

async fn list_events(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    ApiQuery(query): ApiQuery<WindowQuery>,
) -> Result<Json<Vec<InternalEvent>>, ApiError> {
    let window = EventWindow::resolve(query.from, query.to);
    Ok(Json(state.services.calendar.list(&window).await?))
}

async fn get_event(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<InternalEvent>, ApiError> {
    Ok(Json(state.services.calendar.get(id).await?))
}

async fn create_event(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateEventInput>,
) -> Result<(StatusCode, Json<InternalEvent>), ApiError> {
    auth.require(Permission::ManageEvents)?;
    let event = state.services.calendar.create(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateEventInput>,
) -> Result<Json<InternalEvent>, ApiError> {
    auth.require(Permission::ManageEvents)?;
    Ok(Json(state.services.calendar.update(&auth.user, id, body).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(Permission::ManageEvents)?;
    state.services.calendar.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
