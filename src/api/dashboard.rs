//! GET /api/v1/dashboard - Counters for the signed-in user's start page

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::DashboardSummary;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(summary))
}

async fn summary(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(state.services.dashboard.summary(&auth.user).await?))
}
