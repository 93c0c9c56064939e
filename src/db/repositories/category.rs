//! Category repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::Category;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by `sort_order`, then name
    async fn list(&self) -> Result<Vec<Category>>;

    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category; content referencing it is detached by the schema
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE {} = ?", CATEGORY_COLUMNS, column);
        let row = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, CategoryRow>(&sql)
                .bind(value)
                .fetch_optional(conn)
                .await
                .with_context(|| format!("Failed to get category by {}", column))?
        });
        Ok(row.map(Category::from))
    }
}

const CATEGORY_COLUMNS: &str = "id, name, slug, description, color, sort_order, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    color: Option<String>,
    sort_order: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            color: row.color,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        let now = Utc::now();
        let id = with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                INSERT INTO categories (name, slug, description, color, sort_order, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(&category.color)
            .bind(category.sort_order)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create category")?
            .inserted_id()
        });

        Ok(Category {
            id,
            created_at: now,
            updated_at: now,
            ..category.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
        let row = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, CategoryRow>(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get category by ID")?
        });
        Ok(row.map(Category::from))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.fetch_one_by("slug", slug).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        self.fetch_one_by("name", name).await
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories ORDER BY sort_order, name",
            CATEGORY_COLUMNS
        );
        let rows = with_pool!(self.pool, conn => {
            sqlx::query_as::<_, CategoryRow>(&sql)
                .fetch_all(conn)
                .await
                .context("Failed to list categories")?
        });
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        let now = Utc::now();
        with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                UPDATE categories
                SET name = ?, slug = ?, description = ?, color = ?, sort_order = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(&category.color)
            .bind(category.sort_order)
            .bind(now)
            .bind(category.id)
            .execute(conn)
            .await
            .context("Failed to update category")?;
        });

        Ok(Category {
            updated_at: now,
            ..category.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete category")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{classify_error, create_test_pool, migrations, DbErrorKind};

    async fn setup_test_repo() -> SqlxCategoryRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCategoryRepository::new(pool)
    }

    fn category(name: &str, slug: &str, sort_order: i64) -> Category {
        let now = Utc::now();
        Category {
            id: 0,
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            color: Some("#336699".to_string()),
            sort_order,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        let created = repo.create(&category("Safeguarding", "safeguarding", 0)).await.unwrap();
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("category exists");
        assert_eq!(by_id.slug, "safeguarding");
        assert_eq!(by_id.color.as_deref(), Some("#336699"));

        assert!(repo.get_by_slug("safeguarding").await.unwrap().is_some());
        assert!(repo.get_by_name("Safeguarding").await.unwrap().is_some());
        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ordering() {
        let repo = setup_test_repo().await;
        repo.create(&category("Zebra", "zebra", 0)).await.unwrap();
        repo.create(&category("Apple", "apple", 0)).await.unwrap();
        repo.create(&category("First", "first", -1)).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["First", "Apple", "Zebra"]);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_unique_violation() {
        let repo = setup_test_repo().await;
        repo.create(&category("One", "same", 0)).await.unwrap();

        let err = repo.create(&category("Two", "same", 0)).await.unwrap_err();
        assert_eq!(classify_error(&err), DbErrorKind::UniqueViolation);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&category("Old", "old", 0)).await.unwrap();

        created.name = "New".to_string();
        created.description = Some("Renamed".to_string());
        repo.update(&created).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.name, "New");
        assert_eq!(found.description.as_deref(), Some("Renamed"));

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
