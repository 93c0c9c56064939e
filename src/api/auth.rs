//! Authentication API endpoints
//!
//! - GET  /api/v1/auth/setup-status - Whether the first admin still has to be created
//! - POST /api/v1/auth/setup - Create the first admin
//! - POST /api/v1/auth/login - User login
//! - POST /api/v1/auth/logout - User logout
//! - GET  /api/v1/auth/me - Current user and permissions
//! - PUT  /api/v1/auth/profile - Update display name / email
//! - PUT  /api/v1/auth/password - Change password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{client_ip, ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{Permission, Session, User};
use crate::services::{LoginInput, ProfileInput, SetupInput, UserServiceError};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub permissions: Vec<Permission>,
}

/// Response for the current user
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
pub struct SetupStatusResponse {
    pub needs_setup: bool,
}

/// Request body for changing password
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/setup-status", get(setup_status))
        .route("/setup", post(setup))
        .route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

/// GET /api/v1/auth/setup-status
async fn setup_status(State(state): State<AppState>) -> Result<Json<SetupStatusResponse>, ApiError> {
    let needs_setup = state.services.users.needs_setup().await?;
    Ok(Json(SetupStatusResponse { needs_setup }))
}

/// POST /api/v1/auth/setup - Create the first admin and sign them in
async fn setup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SetupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, session) = state.services.users.setup(body).await?;
    let headers = session_cookie_headers(&session, state.auth.session_days)?;
    Ok((StatusCode::CREATED, headers, Json(auth_response(user, session))))
}

/// POST /api/v1/auth/login - User login
///
/// Limited per client IP and per account. A username and its email share
/// one lockout; failed attempts count towards it and a successful login
/// clears it.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let limiter = &state.rate_limiter;

    if let Some(ip) = client_ip(&headers) {
        if limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login rate limit exceeded for IP");
            return Err(ApiError::rate_limited(
                "Too many requests, please try again later",
                crate::services::rate_limiter::IP_WINDOW_SECONDS,
            ));
        }
        limiter.record_ip_request(ip).await;
    }

    let lockout_key = state.services.users.lockout_key(&body.username_or_email).await?;
    if limiter.is_username_limited(&lockout_key).await {
        tracing::warn!(user = %lockout_key, "Login locked out after repeated failures");
        return Err(ApiError::rate_limited(
            format!(
                "Too many failed login attempts, try again in {} minutes",
                limiter.lockout_minutes()
            ),
            limiter.lockout_minutes() * 60,
        ));
    }

    let (user, session) = match state.services.users.login(body).await {
        Ok(ok) => ok,
        Err(e) => {
            if matches!(e, UserServiceError::AuthenticationError(_)) {
                limiter.record_failed_attempt(&lockout_key).await;
            }
            return Err(e.into());
        }
    };
    limiter.clear_username_attempts(&lockout_key).await;

    let headers = session_cookie_headers(&session, state.auth.session_days)?;
    Ok((headers, Json(auth_response(user, session))))
}

/// POST /api/v1/auth/logout - User logout
async fn logout(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<impl IntoResponse, ApiError> {
    state.services.users.logout(&auth.user, &auth.token).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/me - Get current user
async fn me(auth: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: auth.user,
        permissions: auth.permissions,
    })
}

/// PUT /api/v1/auth/profile - Update current user's profile
async fn update_profile(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<ProfileInput>,
) -> Result<Json<User>, ApiError> {
    let updated = state.services.users.update_profile(&auth.user, body).await?;
    Ok(Json(updated))
}

/// PUT /api/v1/auth/password - Change current user's password
///
/// Every other session of the user is signed out.
async fn change_password(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .users
        .change_password(&auth.user, &auth.token, &body.current_password, &body.new_password)
        .await
        .map_err(|e| match e {
            // the caller is authenticated; a wrong current password is bad input
            UserServiceError::AuthenticationError(msg) => ApiError::validation_error(msg),
            other => other.into(),
        })?;
    Ok(StatusCode::NO_CONTENT)
}

fn auth_response(user: User, session: Session) -> AuthResponse {
    let permissions = user.effective_permissions();
    AuthResponse {
        user,
        token: session.id,
        permissions,
    }
}

/// `Set-Cookie` header carrying the session token
fn session_cookie_headers(session: &Session, session_days: i64) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id,
        session_days * 24 * 60 * 60
    );
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).map_err(ApiError::internal)?);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_session_cookie() {
        let now = Utc::now();
        let session = Session {
            id: "abc-123".into(),
            user_id: 1,
            expires_at: now + Duration::days(7),
            created_at: now,
        };
        let headers = session_cookie_headers(&session, 7).unwrap();
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert_eq!(cookie, "session=abc-123; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800");
    }
}
