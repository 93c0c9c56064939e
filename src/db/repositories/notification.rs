//! Notification repository
//!
//! Notifications are stored once with their target; per-user read receipts
//! live in `notification_reads`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{InboxItem, ListParams, Notification, NotificationTarget, User};

/// Notification repository trait
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<Notification>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Notifications addressed to `user`, newest first
    async fn inbox(
        &self,
        user: &User,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<InboxItem>, i64)>;

    async fn count_unread(&self, user: &User) -> Result<i64>;

    /// Record a read receipt; repeated calls are no-ops
    async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<()>;

    /// Mark everything addressed to `user` as read; returns newly read count
    async fn mark_all_read(&self, user: &User) -> Result<u64>;
}

/// SQLx-based notification repository implementation
pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }

    /// `INSERT ... IGNORE` spelling differs between the backends
    fn insert_ignore(&self) -> &'static str {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => "INSERT OR IGNORE",
            DatabaseDriver::Mysql => "INSERT IGNORE",
        }
    }
}

const NOTIFICATION_COLUMNS: &str =
    "n.id, n.title, n.body, n.link, n.target, n.target_role, n.target_user_id, n.created_by, n.created_at";

/// Binds: role, user id
const ADDRESSED_TO: &str = "(n.target = 'all' OR (n.target = 'role' AND n.target_role = ?) \
     OR (n.target = 'user' AND n.target_user_id = ?))";

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    title: String,
    body: String,
    link: Option<String>,
    target: String,
    target_role: Option<String>,
    target_user_id: Option<i64>,
    created_by: Option<i64>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct InboxRow {
    #[sqlx(flatten)]
    notification: NotificationRow,
    is_read: i64,
}

fn parse_target(kind: &str, role: Option<String>, user_id: Option<i64>) -> Result<NotificationTarget> {
    match (kind, role, user_id) {
        ("all", _, _) => Ok(NotificationTarget::All),
        ("role", Some(role), _) => Ok(NotificationTarget::Role { role: role.parse()? }),
        ("user", _, Some(user_id)) => Ok(NotificationTarget::User { user_id }),
        (kind, _, _) => Err(anyhow!("Invalid notification target: {}", kind)),
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = anyhow::Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: row.id,
            title: row.title,
            body: row.body,
            link: row.link,
            target: parse_target(&row.target, row.target_role, row.target_user_id)?,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<Notification> {
        let now = Utc::now();
        let (target_role, target_user_id) = match notification.target {
            NotificationTarget::All => (None, None),
            NotificationTarget::Role { role } => (Some(role.as_str()), None),
            NotificationTarget::User { user_id } => (None, Some(user_id)),
        };

        let id = with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                INSERT INTO notifications (title, body, link, target, target_role, target_user_id,
                    created_by, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&notification.title)
            .bind(&notification.body)
            .bind(&notification.link)
            .bind(notification.target.kind())
            .bind(target_role)
            .bind(target_user_id)
            .bind(notification.created_by)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create notification")?
            .inserted_id()
        });

        Ok(Notification {
            id,
            created_at: now,
            ..notification.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let sql = format!("SELECT {} FROM notifications n WHERE n.id = ?", NOTIFICATION_COLUMNS);
        let row = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, NotificationRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get notification by ID")?
        });
        row.map(Notification::try_from).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM notifications WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete notification")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn inbox(
        &self,
        user: &User,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<InboxItem>, i64)> {
        let from = format!(
            "FROM notifications n \
             LEFT JOIN notification_reads r ON r.notification_id = n.id AND r.user_id = ? \
             WHERE {} AND (? = 0 OR r.user_id IS NULL)",
            ADDRESSED_TO
        );
        let count_sql = format!("SELECT COUNT(*) {}", from);
        let list_sql = format!(
            "SELECT {}, CASE WHEN r.user_id IS NULL THEN 0 ELSE 1 END AS is_read {} \
             ORDER BY n.created_at DESC, n.id DESC LIMIT ? OFFSET ?",
            NOTIFICATION_COLUMNS, from
        );
        let role = user.role.as_str();
        let unread_only = unread_only as i64;

        let (rows, total) = with_pool!(self.pool, conn => {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(user.id)
                .bind(role)
                .bind(user.id)
                .bind(unread_only)
                .fetch_one(conn)
                .await
                .context("Failed to count notifications")?;
            let rows = sqlx::query_as::<_, InboxRow>(&list_sql)
                .bind(user.id)
                .bind(role)
                .bind(user.id)
                .bind(unread_only)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list notifications")?;
            (rows, total)
        });

        let items = rows
            .into_iter()
            .map(|row| -> Result<InboxItem> {
                Ok(InboxItem {
                    notification: Notification::try_from(row.notification)?,
                    read: row.is_read != 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn count_unread(&self, user: &User) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM notifications n \
             LEFT JOIN notification_reads r ON r.notification_id = n.id AND r.user_id = ? \
             WHERE {} AND r.user_id IS NULL",
            ADDRESSED_TO
        );
        let count = with_pool!(self.pool, conn => {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(user.id)
                .bind(user.role.as_str())
                .bind(user.id)
                .fetch_one(conn)
                .await
                .context("Failed to count unread notifications")?
        });
        Ok(count)
    }

    async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<()> {
        let sql = format!(
            "{} INTO notification_reads (notification_id, user_id, read_at) VALUES (?, ?, ?)",
            self.insert_ignore()
        );
        with_pool!(self.pool, conn => {
            sqlx::query(&sql)
                .bind(notification_id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(conn)
                .await
                .context("Failed to mark notification as read")?;
        });
        Ok(())
    }

    async fn mark_all_read(&self, user: &User) -> Result<u64> {
        let sql = format!(
            "{} INTO notification_reads (notification_id, user_id, read_at) \
             SELECT n.id, ?, ? FROM notifications n WHERE {}",
            self.insert_ignore(),
            ADDRESSED_TO
        );
        let affected = with_pool!(self.pool, conn => {
            sqlx::query(&sql)
                .bind(user.id)
                .bind(Utc::now())
                .bind(user.role.as_str())
                .bind(user.id)
                .execute(conn)
                .await
                .context("Failed to mark notifications as read")?
                .rows_affected()
        });
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserRole;

    async fn setup_test_repo() -> SqlxNotificationRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            "INSERT INTO users (id, username, email, password_hash, role) VALUES \
             (1, 'teach', 't@example.com', 'x', 'teacher'), (2, 'office', 'o@example.com', 'x', 'staff')",
        )
        .await
        .expect("Failed to create users");
        SqlxNotificationRepository::new(pool)
    }

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new(format!("u{}", id), format!("u{}@example.com", id), "x".to_string(), role);
        user.id = id;
        user
    }

    fn notification(title: &str, target: NotificationTarget) -> Notification {
        Notification {
            id: 0,
            title: title.to_string(),
            body: "Body".to_string(),
            link: None,
            target,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_targeting() {
        let repo = setup_test_repo().await;
        repo.create(&notification("everyone", NotificationTarget::All)).await.unwrap();
        repo.create(&notification("teachers", NotificationTarget::Role { role: UserRole::Teacher }))
            .await
            .unwrap();
        repo.create(&notification("office only", NotificationTarget::User { user_id: 2 }))
            .await
            .unwrap();

        let teacher = user(1, UserRole::Teacher);
        let office = user(2, UserRole::Staff);

        let (items, total) = repo.inbox(&teacher, false, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        let titles: Vec<&str> = items.iter().map(|i| i.notification.title.as_str()).collect();
        assert_eq!(titles, vec!["teachers", "everyone"]);

        let (items, total) = repo.inbox(&office, false, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].notification.target, NotificationTarget::User { user_id: 2 });
    }

    #[tokio::test]
    async fn test_read_receipts() {
        let repo = setup_test_repo().await;
        let first = repo.create(&notification("a", NotificationTarget::All)).await.unwrap();
        repo.create(&notification("b", NotificationTarget::All)).await.unwrap();
        let teacher = user(1, UserRole::Teacher);

        assert_eq!(repo.count_unread(&teacher).await.unwrap(), 2);

        repo.mark_read(first.id, teacher.id).await.unwrap();
        repo.mark_read(first.id, teacher.id).await.unwrap();
        assert_eq!(repo.count_unread(&teacher).await.unwrap(), 1);

        let (unread, total) = repo.inbox(&teacher, true, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(unread[0].notification.title, "b");
        assert!(!unread[0].read);

        let (all, _) = repo.inbox(&teacher, false, &ListParams::default()).await.unwrap();
        assert!(all.iter().find(|i| i.notification.id == first.id).unwrap().read);

        assert_eq!(repo.mark_all_read(&teacher).await.unwrap(), 1);
        assert_eq!(repo.count_unread(&teacher).await.unwrap(), 0);

        let office = user(2, UserRole::Staff);
        assert_eq!(repo.count_unread(&office).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_receipts() {
        let repo = setup_test_repo().await;
        let created = repo.create(&notification("gone", NotificationTarget::All)).await.unwrap();
        repo.mark_read(created.id, 1).await.unwrap();

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
