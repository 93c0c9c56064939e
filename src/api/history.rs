//! GET /api/v1/admin/history - Audit trail, newest first (`view_history`)

use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{HistoryEntity, HistoryEvent, HistoryFilter, PagedResult, Permission};

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub entity_type: Option<HistoryEntity>,
    pub actor_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_history))
}

async fn list_history(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<PagedResult<HistoryEvent>>, ApiError> {
    auth.require(Permission::ViewHistory)?;
    let filter = HistoryFilter {
        entity_type: query.entity_type,
        actor_id: query.actor_id,
    };
    Ok(Json(state.services.history.list(&filter, &page.params()).await?))
}
