//! API layer - HTTP handlers and routing
//!
//! Everything lives under `/api/v1`. Apart from setup, login and the
//! health check every route requires a valid session; permission checks
//! happen in the handlers.

pub mod announcements;
pub mod articles;
pub mod auth;
pub mod categories;
pub mod common;
pub mod dashboard;
pub mod events;
pub mod history;
pub mod middleware;
pub mod notifications;
pub mod resources;
pub mod training_videos;
pub mod users;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub avg_response_time_us: f64,
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check database ping failed: {:#}", e);
            false
        }
    };
    let stats = &state.request_stats;
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        uptime_seconds: stats.uptime_seconds(),
        total_requests: stats.total_requests(),
        avg_response_time_us: stats.avg_response_time_us(),
    })
}

/// Build the API router (mounted under `/api/v1`)
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Everything below needs a session
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/dashboard", dashboard::router())
        .nest("/categories", categories::router())
        .nest("/announcements", announcements::router())
        .nest("/resources", resources::router())
        .nest("/training-videos", training_videos::router())
        .nest("/articles", articles::router())
        .nest("/events", events::router())
        .nest("/notifications", notifications::router())
        .nest("/admin/users", users::router())
        .nest("/admin/categories", categories::admin_router())
        .nest("/admin/announcements", announcements::admin_router())
        .nest("/admin/resources", resources::admin_router())
        .nest("/admin/articles", articles::admin_router())
        .nest("/admin/events", events::admin_router())
        .nest("/admin/notifications", notifications::admin_router())
        .nest("/admin/history", history::router())
        .route_layer(axum_middleware::from_fn_with_state(state, middleware::require_auth));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // Cookie sessions need credentials, which rule out a wildcard origin
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!("Invalid CORS origin {:?}; cross-origin requests disabled", cors_origin),
    }

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
