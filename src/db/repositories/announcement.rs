//! Announcement repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{Announcement, AnnouncementStatus, ListParams};

/// Announcement repository trait
#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    async fn create(&self, announcement: &Announcement) -> Result<Announcement>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Announcement>>;

    async fn update(&self, announcement: &Announcement) -> Result<Announcement>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Published, unexpired announcements: pinned first, then newest
    async fn list_visible(
        &self,
        now: DateTime<Utc>,
        category_id: Option<i64>,
        params: &ListParams,
    ) -> Result<(Vec<Announcement>, i64)>;

    /// Every announcement regardless of state, most recently created first
    async fn list_all(
        &self,
        status: Option<AnnouncementStatus>,
        category_id: Option<i64>,
        params: &ListParams,
    ) -> Result<(Vec<Announcement>, i64)>;

    async fn count_visible(&self, now: DateTime<Utc>) -> Result<i64>;
}

/// SQLx-based announcement repository implementation
pub struct SqlxAnnouncementRepository {
    pool: DynDatabasePool,
}

impl SqlxAnnouncementRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AnnouncementRepository> {
        Arc::new(Self::new(pool))
    }
}

const ANNOUNCEMENT_COLUMNS: &str = "id, title, content, content_html, author_id, category_id, \
     priority, status, pinned, published_at, expires_at, created_at, updated_at";

const VISIBLE_FILTER: &str =
    "status = 'published' AND (expires_at IS NULL OR expires_at > ?) AND (? IS NULL OR category_id = ?)";

const ADMIN_FILTER: &str = "(? IS NULL OR status = ?) AND (? IS NULL OR category_id = ?)";

#[derive(sqlx::FromRow)]
struct AnnouncementRow {
    id: i64,
    title: String,
    content: String,
    content_html: String,
    author_id: Option<i64>,
    category_id: Option<i64>,
    priority: String,
    status: String,
    pinned: bool,
    published_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AnnouncementRow> for Announcement {
    type Error = anyhow::Error;

    fn try_from(row: AnnouncementRow) -> Result<Self> {
        Ok(Announcement {
            id: row.id,
            title: row.title,
            content: row.content,
            content_html: row.content_html,
            author_id: row.author_id,
            category_id: row.category_id,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            pinned: row.pinned,
            published_at: row.published_at,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_announcements(rows: Vec<AnnouncementRow>) -> Result<Vec<Announcement>> {
    rows.into_iter().map(Announcement::try_from).collect()
}

#[async_trait]
impl AnnouncementRepository for SqlxAnnouncementRepository {
    async fn create(&self, announcement: &Announcement) -> Result<Announcement> {
        let now = Utc::now();
        let id = with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                INSERT INTO announcements (title, content, content_html, author_id, category_id,
                    priority, status, pinned, published_at, expires_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&announcement.title)
            .bind(&announcement.content)
            .bind(&announcement.content_html)
            .bind(announcement.author_id)
            .bind(announcement.category_id)
            .bind(announcement.priority.as_str())
            .bind(announcement.status.as_str())
            .bind(announcement.pinned)
            .bind(announcement.published_at)
            .bind(announcement.expires_at)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create announcement")?
            .inserted_id()
        });

        Ok(Announcement {
            id,
            created_at: now,
            updated_at: now,
            ..announcement.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Announcement>> {
        let sql = format!("SELECT {} FROM announcements WHERE id = ?", ANNOUNCEMENT_COLUMNS);
        let row = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, AnnouncementRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get announcement by ID")?
        });
        row.map(Announcement::try_from).transpose()
    }

    async fn update(&self, announcement: &Announcement) -> Result<Announcement> {
        let now = Utc::now();
        with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                UPDATE announcements
                SET title = ?, content = ?, content_html = ?, category_id = ?, priority = ?,
                    status = ?, pinned = ?, published_at = ?, expires_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&announcement.title)
            .bind(&announcement.content)
            .bind(&announcement.content_html)
            .bind(announcement.category_id)
            .bind(announcement.priority.as_str())
            .bind(announcement.status.as_str())
            .bind(announcement.pinned)
            .bind(announcement.published_at)
            .bind(announcement.expires_at)
            .bind(now)
            .bind(announcement.id)
            .execute(conn)
            .await
            .context("Failed to update announcement")?;
        });

        Ok(Announcement {
            updated_at: now,
            ..announcement.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM announcements WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete announcement")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_visible(
        &self,
        now: DateTime<Utc>,
        category_id: Option<i64>,
        params: &ListParams,
    ) -> Result<(Vec<Announcement>, i64)> {
        let count_sql = format!("SELECT COUNT(*) FROM announcements WHERE {}", VISIBLE_FILTER);
        let list_sql = format!(
            "SELECT {} FROM announcements WHERE {} \
             ORDER BY pinned DESC, published_at DESC, id DESC LIMIT ? OFFSET ?",
            ANNOUNCEMENT_COLUMNS, VISIBLE_FILTER
        );

        let (rows, total) = with_pool!(self.pool, conn => {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(now)
                .bind(category_id)
                .bind(category_id)
                .fetch_one(conn)
                .await
                .context("Failed to count announcements")?;
            let rows = sqlx::query_as::<_, AnnouncementRow>(&list_sql)
                .bind(now)
                .bind(category_id)
                .bind(category_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list announcements")?;
            (rows, total)
        });

        Ok((into_announcements(rows)?, total))
    }

    async fn list_all(
        &self,
        status: Option<AnnouncementStatus>,
        category_id: Option<i64>,
        params: &ListParams,
    ) -> Result<(Vec<Announcement>, i64)> {
        let status = status.map(|s| s.as_str());
        let count_sql = format!("SELECT COUNT(*) FROM announcements WHERE {}", ADMIN_FILTER);
        let list_sql = format!(
            "SELECT {} FROM announcements WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            ANNOUNCEMENT_COLUMNS, ADMIN_FILTER
        );

        let (rows, total) = with_pool!(self.pool, conn => {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(status)
                .bind(status)
                .bind(category_id)
                .bind(category_id)
                .fetch_one(conn)
                .await
                .context("Failed to count announcements")?;
            let rows = sqlx::query_as::<_, AnnouncementRow>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(category_id)
                .bind(category_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list announcements")?;
            (rows, total)
        });

        Ok((into_announcements(rows)?, total))
    }

    async fn count_visible(&self, now: DateTime<Utc>) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM announcements WHERE {}", VISIBLE_FILTER);
        let count = with_pool!(self.pool, conn => {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(now)
                .bind(None::<i64>)
                .bind(None::<i64>)
                .fetch_one(conn)
                .await
                .context("Failed to count announcements")?
        });
        Ok(count)
    }
}
