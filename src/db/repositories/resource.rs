//! Resource repository
//!
//! Links, documents and training videos live in the same table.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{ListParams, Resource, ResourceFilter, ResourceKind};

/// Resource repository trait
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn create(&self, resource: &Resource) -> Result<Resource>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Resource>>;

    async fn update(&self, resource: &Resource) -> Result<Resource>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Resources matching `filter`, newest first
    async fn list(&self, filter: &ResourceFilter, params: &ListParams) -> Result<(Vec<Resource>, i64)>;

    /// Number of resources of the given kind
    async fn count_by_kind(&self, kind: ResourceKind) -> Result<i64>;
}

/// SQLx-based resource repository implementation
pub struct SqlxResourceRepository {
    pool: DynDatabasePool,
}

impl SqlxResourceRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ResourceRepository> {
        Arc::new(Self::new(pool))
    }
}

const RESOURCE_COLUMNS: &str = "id, title, description, url, kind, category_id, thumbnail_url, \
     duration_seconds, created_by, created_at, updated_at";

const RESOURCE_FILTER: &str = "(? IS NULL OR kind = ?) AND (? IS NULL OR category_id = ?) \
     AND (? IS NULL OR title LIKE ? OR description LIKE ?)";

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: i64,
    title: String,
    description: Option<String>,
    url: String,
    kind: String,
    category_id: Option<i64>,
    thumbnail_url: Option<String>,
    duration_seconds: Option<i64>,
    created_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ResourceRow> for Resource {
    type Error = anyhow::Error;

    fn try_from(row: ResourceRow) -> Result<Self> {
        Ok(Resource {
            id: row.id,
            title: row.title,
            description: row.description,
            url: row.url,
            kind: row.kind.parse()?,
            category_id: row.category_id,
            thumbnail_url: row.thumbnail_url,
            duration_seconds: row.duration_seconds,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ResourceRepository for SqlxResourceRepository {
    async fn create(&self, resource: &Resource) -> Result<Resource> {
        let now = Utc::now();
        let id = with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                INSERT INTO resources (title, description, url, kind, category_id, thumbnail_url,
                    duration_seconds, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&resource.title)
            .bind(&resource.description)
            .bind(&resource.url)
            .bind(resource.kind.as_str())
            .bind(resource.category_id)
            .bind(&resource.thumbnail_url)
            .bind(resource.duration_seconds)
            .bind(resource.created_by)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create resource")?
            .inserted_id()
        });

        Ok(Resource {
            id,
            created_at: now,
            updated_at: now,
            ..resource.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Resource>> {
        let sql = format!("SELECT {} FROM resources WHERE id = ?", RESOURCE_COLUMNS);
        let row = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, ResourceRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get resource by ID")?
        });
        row.map(Resource::try_from).transpose()
    }

    async fn update(&self, resource: &Resource) -> Result<Resource> {
        let now = Utc::now();
        with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                UPDATE resources
                SET title = ?, description = ?, url = ?, kind = ?, category_id = ?,
                    thumbnail_url = ?, duration_seconds = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&resource.title)
            .bind(&resource.description)
            .bind(&resource.url)
            .bind(resource.kind.as_str())
            .bind(resource.category_id)
            .bind(&resource.thumbnail_url)
            .bind(resource.duration_seconds)
            .bind(now)
            .bind(resource.id)
            .execute(conn)
            .await
            .context("Failed to update resource")?;
        });

        Ok(Resource {
            updated_at: now,
            ..resource.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM resources WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete resource")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, filter: &ResourceFilter, params: &ListParams) -> Result<(Vec<Resource>, i64)> {
        let kind = filter.kind.map(|k| k.as_str());
        let query = filter.query.as_ref().map(|q| format!("%{}%", q));
        let count_sql = format!("SELECT COUNT(*) FROM resources WHERE {}", RESOURCE_FILTER);
        let list_sql = format!(
            "SELECT {} FROM resources WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            RESOURCE_COLUMNS, RESOURCE_FILTER
        );

        let (rows, total) = with_pool!(self.pool, conn => {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(kind)
                .bind(kind)
                .bind(filter.category_id)
                .bind(filter.category_id)
                .bind(&query)
                .bind(&query)
                .bind(&query)
                .fetch_one(conn)
                .await
                .context("Failed to count resources")?;
            let rows = sqlx::query_as::<_, ResourceRow>(&list_sql)
                .bind(kind)
                .bind(kind)
                .bind(filter.category_id)
                .bind(filter.category_id)
                .bind(&query)
                .bind(&query)
                .bind(&query)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list resources")?;
            (rows, total)
        });

        let resources = rows.into_iter().map(Resource::try_from).collect::<Result<Vec<_>>>()?;
        Ok((resources, total))
    }

    async fn count_by_kind(&self, kind: ResourceKind) -> Result<i64> {
        let count = with_pool!(self.pool, conn => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM resources WHERE kind = ?")
                .bind(kind.as_str())
                .fetch_one(conn)
                .await
                .context("Failed to count resources")?
        });
        Ok(count)
    }
}
