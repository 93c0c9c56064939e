//! History event repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{HistoryEvent, HistoryFilter, ListParams, NewHistoryEvent};

/// History event repository trait
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn record(&self, event: &NewHistoryEvent) -> Result<HistoryEvent>;

    /// Entries matching `filter`, newest first
    async fn list(&self, filter: &HistoryFilter, params: &ListParams) -> Result<(Vec<HistoryEvent>, i64)>;
}

/// SQLx-based history repository implementation
pub struct SqlxHistoryRepository {
    pool: DynDatabasePool,
}

impl SqlxHistoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn HistoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const HISTORY_FILTER: &str = "(? IS NULL OR entity_type = ?) AND (? IS NULL OR actor_id = ?)";

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    actor_id: Option<i64>,
    action: String,
    entity_type: String,
    entity_id: Option<i64>,
    summary: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEvent {
    type Error = anyhow::Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(HistoryEvent {
            id: row.id,
            actor_id: row.actor_id,
            action: row.action.parse()?,
            entity_type: row.entity_type.parse()?,
            entity_id: row.entity_id,
            summary: row.summary,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl HistoryRepository for SqlxHistoryRepository {
    async fn record(&self, event: &NewHistoryEvent) -> Result<HistoryEvent> {
        let now = Utc::now();
        let id = with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                INSERT INTO history_events (actor_id, action, entity_type, entity_id, summary, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(event.actor_id)
            .bind(event.action.as_str())
            .bind(event.entity_type.as_str())
            .bind(event.entity_id)
            .bind(&event.summary)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to record history event")?
            .inserted_id()
        });

        Ok(HistoryEvent {
            id,
            actor_id: event.actor_id,
            action: event.action,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            summary: event.summary.clone(),
            created_at: now,
        })
    }

    async fn list(&self, filter: &HistoryFilter, params: &ListParams) -> Result<(Vec<HistoryEvent>, i64)> {
        let entity_type = filter.entity_type.map(|e| e.as_str());
        let count_sql = format!("SELECT COUNT(*) FROM history_events WHERE {}", HISTORY_FILTER);
        let list_sql = format!(
            "SELECT id, actor_id, action, entity_type, entity_id, summary, created_at \
             FROM history_events WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            HISTORY_FILTER
        );

        let (rows, total) = with_pool!(self.pool, conn => {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(entity_type)
                .bind(entity_type)
                .bind(filter.actor_id)
                .bind(filter.actor_id)
                .fetch_one(conn)
                .await
                .context("Failed to count history events")?;
            let rows = sqlx::query_as::<_, HistoryRow>(&list_sql)
                .bind(entity_type)
                .bind(entity_type)
                .bind(filter.actor_id)
                .bind(filter.actor_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list history events")?;
            (rows, total)
        });

        let events = rows.into_iter().map(HistoryEvent::try_from).collect::<Result<Vec<_>>>()?;
        Ok((events, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{HistoryAction, HistoryEntity};

    async fn setup_test_repo() -> SqlxHistoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO users (id, username, email, password_hash) VALUES (1, 'a', 'a@example.com', 'x')")
            .await
            .expect("Failed to create user");
        SqlxHistoryRepository::new(pool)
    }

    #[tokio::test]
    async fn test_record_and_filter() {
        let repo = setup_test_repo().await;
        repo.record(&NewHistoryEvent::new(
            Some(1),
            HistoryAction::Create,
            HistoryEntity::Announcement,
            Some(10),
            "Created announcement 'Fire drill'",
        ))
        .await
        .unwrap();
        repo.record(&NewHistoryEvent::new(Some(1), HistoryAction::Login, HistoryEntity::User, Some(1), "Logged in"))
            .await
            .unwrap();
        repo.record(&NewHistoryEvent::new(None, HistoryAction::Delete, HistoryEntity::Announcement, Some(10), "Deleted"))
            .await
            .unwrap();

        let (all, total) = repo.list(&HistoryFilter::default(), &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[0].action, HistoryAction::Delete);

        let announcements = HistoryFilter {
            entity_type: Some(HistoryEntity::Announcement),
            ..Default::default()
        };
        let (_, total) = repo.list(&announcements, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);

        let by_actor = HistoryFilter {
            actor_id: Some(1),
            ..Default::default()
        };
        let (items, total) = repo.list(&by_actor, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert!(items.iter().all(|e| e.actor_id == Some(1)));
    }
}
