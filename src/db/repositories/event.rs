//! Calendar event repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{EventWindow, InternalEvent};

/// Calendar event repository trait
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &InternalEvent) -> Result<InternalEvent>;

    async fn get_by_id(&self, id: i64) -> Result<Option<InternalEvent>>;

    async fn update(&self, event: &InternalEvent) -> Result<InternalEvent>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Events overlapping `window`, earliest first
    async fn list_in_window(&self, window: &EventWindow) -> Result<Vec<InternalEvent>>;

    async fn count_in_window(&self, window: &EventWindow) -> Result<i64>;
}

/// SQLx-based calendar event repository implementation
pub struct SqlxEventRepository {
    pool: DynDatabasePool,
}

impl SqlxEventRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EventRepository> {
        Arc::new(Self::new(pool))
    }
}

const EVENT_COLUMNS: &str = "id, title, description, location, starts_at, ends_at, all_day, \
     created_by, created_at, updated_at";

/// Overlap with `[from, to)`. Event ends are exclusive; an event without an
/// end occupies its start instant. Binds: to, from, from.
const WINDOW_FILTER: &str = "starts_at < ? AND (starts_at >= ? OR ends_at > ?)";

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    title: String,
    description: Option<String>,
    location: Option<String>,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    all_day: bool,
    created_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for InternalEvent {
    fn from(row: EventRow) -> Self {
        InternalEvent {
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            all_day: row.all_day,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn create(&self, event: &InternalEvent) -> Result<InternalEvent> {
        let now = Utc::now();
        let id = with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                INSERT INTO internal_events (title, description, location, starts_at, ends_at,
                    all_day, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.ends_at)
            .bind(event.all_day)
            .bind(event.created_by)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create event")?
            .inserted_id()
        });

        Ok(InternalEvent {
            id,
            created_at: now,
            updated_at: now,
            ..event.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<InternalEvent>> {
        let sql = format!("SELECT {} FROM internal_events WHERE id = ?", EVENT_COLUMNS);
        let row = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, EventRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get event by ID")?
        });
        Ok(row.map(InternalEvent::from))
    }

    async fn update(&self, event: &InternalEvent) -> Result<InternalEvent> {
        let now = Utc::now();
        with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                UPDATE internal_events
                SET title = ?, description = ?, location = ?, starts_at = ?, ends_at = ?,
                    all_day = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.ends_at)
            .bind(event.all_day)
            .bind(now)
            .bind(event.id)
            .execute(conn)
            .await
            .context("Failed to update event")?;
        });

        Ok(InternalEvent {
            updated_at: now,
            ..event.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM internal_events WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete event")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_in_window(&self, window: &EventWindow) -> Result<Vec<InternalEvent>> {
        let sql = format!(
            "SELECT {} FROM internal_events WHERE {} ORDER BY starts_at, id",
            EVENT_COLUMNS, WINDOW_FILTER
        );
        let rows = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, EventRow>(&sql)
                .bind(window.to)
                .bind(window.from)
                .bind(window.from)
                .fetch_all(conn)
                .await
                .context("Failed to list events")?
        });
        Ok(rows.into_iter().map(InternalEvent::from).collect())
    }

    async fn count_in_window(&self, window: &EventWindow) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM internal_events WHERE {}", WINDOW_FILTER);
        let count = with_pool!(self.pool, conn => {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(window.to)
                .bind(window.from)
                .bind(window.from)
                .fetch_one(conn)
                .await
                .context("Failed to count events")?
        });
        Ok(count)
    }
}
