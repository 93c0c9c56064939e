//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{overrides_to_json, parse_overrides, ListParams, User, UserFilter, UserRole, UserStatus};

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Write every mutable column of `user` back to its row
    async fn update(&self, user: &User) -> Result<User>;

    /// Record a successful login
    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Delete a user; returns false if no such user
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Count active administrators
    async fn count_active_admins(&self) -> Result<i64>;

    /// List users matching `filter`, newest first, with the total match count
    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        let row: Option<UserRow> = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(value)
                .fetch_optional(conn)
                .await
                .with_context(|| format!("Failed to get user by {}", column))?
        });
        row.map(User::try_from).transpose()
    }
}

const USER_COLUMNS: &str = "id, username, email, display_name, password_hash, role, status, \
     permissions, last_login_at, created_at, updated_at";

const USER_FILTER: &str = "(? IS NULL OR role = ?) AND (? IS NULL OR status = ?) \
     AND (? IS NULL OR username LIKE ? OR email LIKE ? OR display_name LIKE ?)";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    display_name: Option<String>,
    password_hash: String,
    role: String,
    status: String,
    permissions: String,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role: row.role.parse::<UserRole>()?,
            status: row.status.parse::<UserStatus>()?,
            permissions: parse_overrides(&row.permissions),
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let permissions = overrides_to_json(&user.permissions);
        let sql = r#"
            INSERT INTO users (username, email, display_name, password_hash, role, status,
                               permissions, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        let id = with_pool!(self.pool, conn => {
            sqlx::query(sql)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.display_name)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .bind(user.status.as_str())
                .bind(&permissions)
                .bind(now)
                .bind(now)
                .execute(conn)
                .await
                .context("Failed to create user")?
                .inserted_id()
        });

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            last_login_at: None,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row: Option<UserRow> = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get user by ID")?
        });
        row.map(User::try_from).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_one_by("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_by("email", email).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let permissions = overrides_to_json(&user.permissions);
        let sql = r#"
            UPDATE users
            SET email = ?, display_name = ?, password_hash = ?, role = ?, status = ?,
                permissions = ?, updated_at = ?
            WHERE id = ?
        "#;

        with_pool!(self.pool, conn => {
            sqlx::query(sql)
                .bind(&user.email)
                .bind(&user.display_name)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .bind(user.status.as_str())
                .bind(&permissions)
                .bind(now)
                .bind(user.id)
                .execute(conn)
                .await
                .context("Failed to update user")?;
        });

        self.get_by_id(user.id)
            .await?
            .with_context(|| format!("User {} disappeared during update", user.id))
    }

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        with_pool!(self.pool, conn => {
            sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
                .bind(at)
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to record last login")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete user")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = with_pool!(self.pool, conn => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(conn)
                .await
                .context("Failed to count users")?
        });
        Ok(count)
    }

    async fn count_active_admins(&self) -> Result<i64> {
        let count: i64 = with_pool!(self.pool, conn => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = ? AND status = ?")
                .bind(UserRole::Admin.as_str())
                .bind(UserStatus::Active.as_str())
                .fetch_one(conn)
                .await
                .context("Failed to count administrators")?
        });
        Ok(count)
    }

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let role = filter.role.map(|r| r.as_str());
        let status = filter.status.map(|s| s.as_str());
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));

        let count_sql = format!("SELECT COUNT(*) FROM users WHERE {}", USER_FILTER);
        let list_sql = format!(
            "SELECT {} FROM users WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS, USER_FILTER
        );

        let (rows, total): (Vec<UserRow>, i64) = with_pool!(self.pool, conn => {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(role)
                .bind(role)
                .bind(status)
                .bind(status)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .fetch_one(conn)
                .await
                .context("Failed to count users")?;
            let rows = sqlx::query_as::<_, UserRow>(&list_sql)
                .bind(role)
                .bind(role)
                .bind(status)
                .bind(status)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(&search)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list users")?;
            (rows, total)
        });

        let users = rows.into_iter().map(User::try_from).collect::<Result<Vec<_>>>()?;
        Ok((users, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::Permission;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn test_user(username: &str, role: UserRole) -> User {
        User::new(
            username.to_string(),
            format!("{}@example.com", username),
            "hash".to_string(),
            role,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (_pool, repo) = setup_test_repo().await;
        let mut user = test_user("alice", UserRole::Teacher);
        user.permissions = vec![Permission::SendNotifications];
        user.display_name = Some("Alice A.".to_string());

        let created = repo.create(&user).await.expect("Failed to create user");
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("user exists");
        assert_eq!(found.username, "alice");
        assert_eq!(found.role, UserRole::Teacher);
        assert_eq!(found.permissions, vec![Permission::SendNotifications]);
        assert_eq!(found.display_name.as_deref(), Some("Alice A."));

        assert!(repo.get_by_username("alice").await.unwrap().is_some());
        assert!(repo.get_by_email("alice@example.com").await.unwrap().is_some());
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_username_constraint() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&test_user("bob", UserRole::Staff)).await.unwrap();

        let mut dup = test_user("bob", UserRole::Staff);
        dup.email = "other@example.com".to_string();
        let err = repo.create(&dup).await.unwrap_err();
        assert_eq!(crate::db::classify_error(&err), crate::db::DbErrorKind::UniqueViolation);
    }

    #[tokio::test]
    async fn test_update_user() {
        let (_pool, repo) = setup_test_repo().await;
        let mut user = repo.create(&test_user("carol", UserRole::Staff)).await.unwrap();

        user.role = UserRole::Editor;
        user.status = UserStatus::Disabled;
        user.permissions = vec![Permission::ViewHistory];
        let updated = repo.update(&user).await.unwrap();

        assert_eq!(updated.role, UserRole::Editor);
        assert_eq!(updated.status, UserStatus::Disabled);
        assert_eq!(updated.permissions, vec![Permission::ViewHistory]);
    }

    #[tokio::test]
    async fn test_touch_last_login() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&test_user("dan", UserRole::Staff)).await.unwrap();

        repo.touch_last_login(user.id, Utc::now()).await.unwrap();
        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(found.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&test_user("erin", UserRole::Staff)).await.unwrap();

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_active_admins() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&test_user("root", UserRole::Admin)).await.unwrap();
        let mut second = repo.create(&test_user("root2", UserRole::Admin)).await.unwrap();
        repo.create(&test_user("t", UserRole::Teacher)).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.count_active_admins().await.unwrap(), 2);

        second.status = UserStatus::Disabled;
        repo.update(&second).await.unwrap();
        assert_eq!(repo.count_active_admins().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let (_pool, repo) = setup_test_repo().await;
        for name in ["amy", "ben", "cat"] {
            repo.create(&test_user(name, UserRole::Teacher)).await.unwrap();
        }
        repo.create(&test_user("dora", UserRole::Staff)).await.unwrap();

        let (all, total) = repo
            .list(&UserFilter::default(), &ListParams::new(1, 2))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(total, 4);

        let teachers = UserFilter {
            role: Some(UserRole::Teacher),
            ..Default::default()
        };
        let (_, total) = repo.list(&teachers, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);

        let search = UserFilter {
            search: Some("dor".to_string()),
            ..Default::default()
        };
        let (found, total) = repo.list(&search, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].username, "dora");
    }
}
