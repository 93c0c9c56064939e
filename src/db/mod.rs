//! Database layer
//!
//! This module provides database abstraction for the schoolnet intranet.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for district-wide deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Usage
//!
//! ```ignore
//! use schoolnet::config::DatabaseConfig;
//! use schoolnet::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```
//!
//! Repositories write each statement once and run it on whichever backend is
//! active through [`with_pool!`]; the SQL used by repositories is restricted to
//! the dialect both backends accept (`?` placeholders, `LIMIT ? OFFSET ?`).

pub mod migrations;
pub mod pool;
pub mod repositories;

use sqlx::mysql::MySqlQueryResult;
use sqlx::sqlite::SqliteQueryResult;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Run `$body` against the typed pool behind a [`DynDatabasePool`].
///
/// The body is expanded once per backend, with `$conn` bound to `&SqlitePool`
/// or `&MySqlPool`, so the same sqlx query builder chain type-checks against
/// both drivers. Must be used inside a function returning `anyhow::Result`.
macro_rules! with_pool {
    ($pool:expr, $conn:ident => $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $conn = $pool
                    .as_sqlite()
                    .ok_or_else(|| ::anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $conn = $pool
                    .as_mysql()
                    .ok_or_else(|| ::anyhow::anyhow!("MySQL pool unavailable"))?;
                $body
            }
        }
    };
}

pub(crate) use with_pool;

/// Backend-neutral access to the id generated by an INSERT
pub trait InsertedId {
    fn inserted_id(&self) -> i64;
}

impl InsertedId for SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertedId for MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// Classification of database failures that callers react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// A UNIQUE constraint rejected the write
    UniqueViolation,
    /// A FOREIGN KEY constraint rejected the write
    ForeignKeyViolation,
    /// Anything else
    Other,
}

/// Inspect an error chain for the sqlx database error it wraps.
pub fn classify_error(err: &anyhow::Error) -> DbErrorKind {
    let db_err = err.chain().find_map(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => Some(db_err),
        _ => None,
    });

    match db_err {
        Some(e) if e.is_unique_violation() => DbErrorKind::UniqueViolation,
        Some(e) if e.is_foreign_key_violation() => DbErrorKind::ForeignKeyViolation,
        _ => DbErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[tokio::test]
    async fn test_classify_unique_violation() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE t (name TEXT UNIQUE)").await.unwrap();
        pool.execute("INSERT INTO t (name) VALUES ('a')").await.unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        let err = sqlx::query("INSERT INTO t (name) VALUES ('a')")
            .execute(sqlite)
            .await
            .context("insert duplicate")
            .unwrap_err();

        assert_eq!(classify_error(&err), DbErrorKind::UniqueViolation);
    }

    #[tokio::test]
    async fn test_classify_foreign_key_violation() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE p (id INTEGER PRIMARY KEY)").await.unwrap();
        pool.execute("CREATE TABLE c (id INTEGER PRIMARY KEY, p_id INTEGER REFERENCES p(id))")
            .await
            .unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        let err = sqlx::query("INSERT INTO c (p_id) VALUES (7)")
            .execute(sqlite)
            .await
            .context("insert orphan")
            .unwrap_err();

        assert_eq!(classify_error(&err), DbErrorKind::ForeignKeyViolation);
    }

    #[test]
    fn test_classify_other() {
        let err = anyhow::anyhow!("plain failure");
        assert_eq!(classify_error(&err), DbErrorKind::Other);
    }
}
