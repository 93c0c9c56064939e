//! Article endpoints
//!
//! - GET /api/v1/articles - Published articles, optional `category_id`
//! - GET /api/v1/articles/{slug}
//! - GET/POST /api/v1/admin/articles (`manage_articles`)
//! - GET/PATCH/DELETE /api/v1/admin/articles/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, ApiJson, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{Article, ArticleStatus, CreateArticleInput, PagedResult, Permission, UpdateArticleInput};

#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    pub category_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminArticleQuery {
    pub status: Option<ArticleStatus>,
    pub category_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{slug}", get(get_by_slug))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_article))
        .route("/{id}", get(get_by_id).patch(update_article).delete(delete_article))
}

async fn list_published(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<ArticleQuery>,
) -> Result<Json<PagedResult<Article>>, ApiError> {
    let result = state
        .services
        .articles
        .list_published(query.category_id, &page.params())
        .await?;
    Ok(Json(result))
}

async fn get_by_slug(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.services.articles.get_published_by_slug(&slug).await?))
}

async fn list_all(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiQuery(page): ApiQuery<PaginationQuery>,
    ApiQuery(query): ApiQuery<AdminArticleQuery>,
) -> Result<Json<PagedResult<Article>>, ApiError> {
    auth.require(Permission::ManageArticles)?;
    let result = state
        .services
        .articles
        .list(query.status, query.category_id, &page.params())
        .await?;
    Ok(Json(result))
}

async fn get_by_id(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    auth.require(Permission::ManageArticles)?;
    Ok(Json(state.services.articles.get(id).await?))
}

async fn create_article(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiJson(body): ApiJson<CreateArticleInput>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    auth.require(Permission::ManageArticles)?;
    let article = state.services.articles.create(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

async fn update_article(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateArticleInput>,
) -> Result<Json<Article>, ApiError> {
    auth.require(Permission::ManageArticles)?;
    Ok(Json(state.services.articles.update(&auth.user, id, body).await?))
}

async fn delete_article(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(Permission::ManageArticles)?;
    state.services.articles.delete(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
