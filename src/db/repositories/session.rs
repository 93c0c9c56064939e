//! Session repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{with_pool, DynDatabasePool};
use crate::models::Session;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get an unexpired session by ID (token)
    async fn get_valid(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions of a user except `keep`; returns how many were removed
    async fn delete_by_user(&self, user_id: i64, keep: Option<&str>) -> Result<u64>;

    /// Delete sessions that expired before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: i64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        with_pool!(self.pool, conn => {
            sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
                .bind(&session.id)
                .bind(session.user_id)
                .bind(session.expires_at)
                .bind(session.created_at)
                .execute(conn)
                .await
                .context("Failed to create session")?;
        });
        Ok(session.clone())
    }

    async fn get_valid(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let row: Option<SessionRow> = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, SessionRow>(
                "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ? AND expires_at > ?",
            )
            .bind(id)
            .bind(now)
            .fetch_optional(conn)
            .await
            .context("Failed to get session")?
        });
        Ok(row.map(Session::from))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete session")?;
        });
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64, keep: Option<&str>) -> Result<u64> {
        let keep = keep.unwrap_or("");
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM sessions WHERE user_id = ? AND id <> ?")
                .bind(user_id)
                .bind(keep)
                .execute(conn)
                .await
                .context("Failed to delete user sessions")?
                .rows_affected()
        });
        Ok(affected)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
                .bind(now)
                .execute(conn)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected()
        });
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSessionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            "INSERT INTO users (id, username, email, password_hash) VALUES (1, 'u1', 'u1@example.com', 'x'), (2, 'u2', 'u2@example.com', 'x')",
        )
        .await
        .expect("Failed to create users");
        let repo = SqlxSessionRepository::new(pool.clone());
        (pool, repo)
    }

    fn session(id: &str, user_id: i64, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: id.to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_valid() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&session("tok", 1, Duration::days(1))).await.unwrap();

        let found = repo.get_valid("tok", Utc::now()).await.unwrap();
        assert_eq!(found.map(|s| s.user_id), Some(1));
        assert!(repo.get_valid("missing", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_not_valid() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&session("old", 1, Duration::seconds(-10))).await.unwrap();

        assert!(repo.get_valid("old", Utc::now()).await.unwrap().is_none());
        assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_user_keeps_current() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&session("a", 1, Duration::days(1))).await.unwrap();
        repo.create(&session("b", 1, Duration::days(1))).await.unwrap();
        repo.create(&session("c", 2, Duration::days(1))).await.unwrap();

        assert_eq!(repo.delete_by_user(1, Some("a")).await.unwrap(), 1);
        assert!(repo.get_valid("a", Utc::now()).await.unwrap().is_some());
        assert!(repo.get_valid("b", Utc::now()).await.unwrap().is_none());
        assert!(repo.get_valid("c", Utc::now()).await.unwrap().is_some());

        assert_eq!(repo.delete_by_user(1, None).await.unwrap(), 1);
        assert!(repo.get_valid("a", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&session("x", 2, Duration::days(1))).await.unwrap();
        repo.delete("x").await.unwrap();
        assert!(repo.get_valid("x", Utc::now()).await.unwrap().is_none());
    }
}
