//! Article repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{Article, ArticleStatus, ListParams};

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create(&self, article: &Article) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    async fn update(&self, article: &Article) -> Result<Article>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Articles by status (all when `None`), newest first
    async fn list(
        &self,
        status: Option<ArticleStatus>,
        category_id: Option<i64>,
        params: &ListParams,
    ) -> Result<(Vec<Article>, i64)>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one(&self, sql: &str, id: Option<i64>, slug: Option<&str>) -> Result<Option<Article>> {
        let row = with_pool!(self.pool, conn => {
            let query = sqlx::query_as::<_, ArticleRow>(sql);
            let query = match (id, slug) {
                (Some(id), _) => query.bind(id),
                (None, slug) => query.bind(slug),
            };
            query.fetch_optional(conn).await.context("Failed to get article")?
        });
        row.map(Article::try_from).transpose()
    }
}

const ARTICLE_COLUMNS: &str = "id, slug, title, summary, content, content_html, author_id, \
     category_id, status, published_at, created_at, updated_at";

const ARTICLE_FILTER: &str = "(? IS NULL OR status = ?) AND (? IS NULL OR category_id = ?)";

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    slug: String,
    title: String,
    summary: Option<String>,
    content: String,
    content_html: String,
    author_id: Option<i64>,
    category_id: Option<i64>,
    status: String,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = anyhow::Error;

    fn try_from(row: ArticleRow) -> Result<Self> {
        Ok(Article {
            id: row.id,
            slug: row.slug,
            title: row.title,
            summary: row.summary,
            content: row.content,
            content_html: row.content_html,
            author_id: row.author_id,
            category_id: row.category_id,
            status: row.status.parse()?,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, article: &Article) -> Result<Article> {
        let now = Utc::now();
        let id = with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                INSERT INTO articles (slug, title, summary, content, content_html, author_id,
                    category_id, status, published_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&article.slug)
            .bind(&article.title)
            .bind(&article.summary)
            .bind(&article.content)
            .bind(&article.content_html)
            .bind(article.author_id)
            .bind(article.category_id)
            .bind(article.status.as_str())
            .bind(article.published_at)
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create article")?
            .inserted_id()
        });

        Ok(Article {
            id,
            created_at: now,
            updated_at: now,
            ..article.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
        self.fetch_one(&sql, Some(id), None).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE slug = ?", ARTICLE_COLUMNS);
        self.fetch_one(&sql, None, Some(slug)).await
    }

    async fn update(&self, article: &Article) -> Result<Article> {
        let now = Utc::now();
        with_pool!(self.pool, conn => {
            sqlx::query(
                r#"
                UPDATE articles
                SET slug = ?, title = ?, summary = ?, content = ?, content_html = ?,
                    category_id = ?, status = ?, published_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&article.slug)
            .bind(&article.title)
            .bind(&article.summary)
            .bind(&article.content)
            .bind(&article.content_html)
            .bind(article.category_id)
            .bind(article.status.as_str())
            .bind(article.published_at)
            .bind(now)
            .bind(article.id)
            .execute(conn)
            .await
            .context("Failed to update article")?;
        });

        Ok(Article {
            updated_at: now,
            ..article.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, conn => {
            sqlx::query("DELETE FROM articles WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete article")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(
        &self,
        status: Option<ArticleStatus>,
        category_id: Option<i64>,
        params: &ListParams,
    ) -> Result<(Vec<Article>, i64)> {
        let status = status.map(|s| s.as_str());
        let count_sql = format!("SELECT COUNT(*) FROM articles WHERE {}", ARTICLE_FILTER);
        let list_sql = format!(
            "SELECT {} FROM articles WHERE {} \
             ORDER BY COALESCE(published_at, created_at) DESC, id DESC LIMIT ? OFFSET ?",
            ARTICLE_COLUMNS, ARTICLE_FILTER
        );

        let (rows, total) = with_pool!(self.pool, conn => {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(status)
                .bind(status)
                .bind(category_id)
                .bind(category_id)
                .fetch_one(conn)
                .await
                .context("Failed to count articles")?;
            let rows = sqlx::query_as::<_, ArticleRow>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(category_id)
                .bind(category_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list articles")?;
            (rows, total)
        });

        let articles = rows.into_iter().map(Article::try_from).collect::<Result<Vec<_>>>()?;
        Ok((articles, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{classify_error, create_test_pool, migrations, DbErrorKind};

    async fn setup_test_repo() -> SqlxArticleRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxArticleRepository::new(pool)
    }

    fn article(slug: &str, status: ArticleStatus) -> Article {
        let now = Utc::now();
        Article {
            id: 0,
            slug: slug.to_string(),
            title: slug.to_uppercase(),
            summary: None,
            content: "# Heading".to_string(),
            content_html: "<h1>Heading</h1>".to_string(),
            author_id: None,
            category_id: None,
            status,
            published_at: (status == ArticleStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let repo = setup_test_repo().await;
        let created = repo.create(&article("onboarding", ArticleStatus::Published)).await.unwrap();

        let by_slug = repo.get_by_slug("onboarding").await.unwrap().unwrap();
        assert_eq!(by_slug.id, created.id);
        assert!(repo.get_by_id(created.id).await.unwrap().is_some());
        assert!(repo.get_by_slug("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let repo = setup_test_repo().await;
        repo.create(&article("dup", ArticleStatus::Draft)).await.unwrap();
        let err = repo.create(&article("dup", ArticleStatus::Draft)).await.unwrap_err();
        assert_eq!(classify_error(&err), DbErrorKind::UniqueViolation);
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let repo = setup_test_repo().await;
        repo.create(&article("a", ArticleStatus::Published)).await.unwrap();
        repo.create(&article("b", ArticleStatus::Draft)).await.unwrap();
        repo.create(&article("c", ArticleStatus::Published)).await.unwrap();

        let (published, total) = repo
            .list(Some(ArticleStatus::Published), None, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(published.iter().all(|a| a.status == ArticleStatus::Published));

        let (_, total) = repo.list(None, None, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&article("draft", ArticleStatus::Draft)).await.unwrap();

        created.status = ArticleStatus::Published;
        created.published_at = Some(Utc::now());
        repo.update(&created).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.status, ArticleStatus::Published);
        assert!(found.published_at.is_some());

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
