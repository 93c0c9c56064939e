//! Article service
//!
//! Longer-lived knowledge-base articles (policies, how-tos). Articles are
//! addressed by slug on the reader side and by id in the admin area.

use std::sync::Arc;

use chrono::Utc;

use crate::db::repositories::ArticleRepository;
use crate::models::{
    Article, ArticleStatus, CreateArticleInput, HistoryAction, HistoryEntity, ListParams, PagedResult,
    UpdateArticleInput, User,
};

use super::category::CategoryService;
use super::error::{ServiceError, ServiceResult};
use super::history::HistoryService;
use super::markdown::MarkdownRenderer;
use super::validation::{optional_text, required_text, resolve_slug, MAX_TITLE_LENGTH};

const MAX_CONTENT_LENGTH: usize = 200_000;
const MAX_SUMMARY_LENGTH: usize = 500;
/// Length of the summary generated when none is given
const AUTO_SUMMARY_LENGTH: usize = 200;

pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    categories: Arc<CategoryService>,
    history: Arc<HistoryService>,
    markdown: MarkdownRenderer,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticleRepository>, categories: Arc<CategoryService>, history: Arc<HistoryService>) -> Self {
        Self {
            repo,
            categories,
            history,
            markdown: MarkdownRenderer::new().with_smart_punctuation(),
        }
    }

    pub async fn list(
        &self,
        status: Option<ArticleStatus>,
        category_id: Option<i64>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Article>> {
        let (items, total) = self.repo.list(status, category_id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_published(&self, category_id: Option<i64>, params: &ListParams) -> ServiceResult<PagedResult<Article>> {
        self.list(Some(ArticleStatus::Published), category_id, params).await
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Article> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Article {}", id)))
    }

    /// Reader lookup; drafts are not found
    pub async fn get_published_by_slug(&self, slug: &str) -> ServiceResult<Article> {
        self.repo
            .get_by_slug(slug)
            .await?
            .filter(|a| a.status == ArticleStatus::Published)
            .ok_or_else(|| ServiceError::not_found(format!("Article '{}'", slug)))
    }

    /// # Errors
    /// - `Duplicate` if the slug is taken
    /// - `Validation` for empty title/content, a bad slug or an unknown category
    pub async fn create(&self, author: &User, input: CreateArticleInput) -> ServiceResult<Article> {
        let title = required_text("Title", &input.title, MAX_TITLE_LENGTH)?;
        let content = required_text("Content", &input.content, MAX_CONTENT_LENGTH)?;
        let slug = resolve_slug(input.slug.as_deref(), &title)?;
        self.categories.ensure_exists(input.category_id).await?;
        self.ensure_slug_free(&slug, None).await?;

        let now = Utc::now();
        let summary = self.summary_for(input.summary, &content)?;
        let article = Article {
            id: 0,
            slug,
            title,
            summary,
            content_html: self.markdown.render(&content),
            content,
            author_id: Some(author.id),
            category_id: input.category_id,
            status: input.status,
            published_at: (input.status == ArticleStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&article)
            .await
            .map_err(|e| ServiceError::from_write(e, "Article slug"))?;

        tracing::info!(id = created.id, slug = %created.slug, status = %created.status, "Article created");
        self.history
            .record(
                Some(author.id),
                HistoryAction::Create,
                HistoryEntity::Article,
                Some(created.id),
                format!("Created article \"{}\"", created.title),
            )
            .await;
        Ok(created)
    }

    pub async fn update(&self, actor: &User, id: i64, input: UpdateArticleInput) -> ServiceResult<Article> {
        let mut article = self.get(id).await?;
        let was_published = article.status == ArticleStatus::Published;

        if let Some(title) = input.title {
            article.title = required_text("Title", &title, MAX_TITLE_LENGTH)?;
        }
        if let Some(slug) = input.slug {
            article.slug = resolve_slug(Some(&slug), &article.title)?;
            self.ensure_slug_free(&article.slug, Some(id)).await?;
        }
        if let Some(content) = input.content {
            article.content = required_text("Content", &content, MAX_CONTENT_LENGTH)?;
            article.content_html = self.markdown.render(&article.content);
        }
        if input.summary.is_some() {
            article.summary = self.summary_for(input.summary, &article.content)?;
        }
        if input.clear_category {
            article.category_id = None;
        } else if input.category_id.is_some() {
            self.categories.ensure_exists(input.category_id).await?;
            article.category_id = input.category_id;
        }
        if let Some(status) = input.status {
            article.status = status;
            if status == ArticleStatus::Published {
                article.published_at.get_or_insert_with(Utc::now);
            }
        }

        let updated = self
            .repo
            .update(&article)
            .await
            .map_err(|e| ServiceError::from_write(e, "Article slug"))?;

        let action = if !was_published && updated.status == ArticleStatus::Published {
            HistoryAction::Publish
        } else {
            HistoryAction::Update
        };
        tracing::info!(id, %action, "Article updated");
        self.history
            .record(
                Some(actor.id),
                action,
                HistoryEntity::Article,
                Some(id),
                format!("{} article \"{}\"", past_tense(action), updated.title),
            )
            .await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let article = self.get(id).await?;
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found(format!("Article {}", id)));
        }

        tracing::info!(id, "Article deleted");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Delete,
                HistoryEntity::Article,
                Some(id),
                format!("Deleted article \"{}\"", article.title),
            )
            .await;
        Ok(())
    }

    async fn ensure_slug_free(&self, slug: &str, current_id: Option<i64>) -> ServiceResult<()> {
        match self.repo.get_by_slug(slug).await? {
            Some(existing) if Some(existing.id) != current_id => {
                Err(ServiceError::Duplicate(format!("Article slug already exists: {}", slug)))
            }
            _ => Ok(()),
        }
    }

    /// Explicit summary, or an excerpt of the content when blank
    fn summary_for(&self, summary: Option<String>, content: &str) -> ServiceResult<Option<String>> {
        match optional_text(summary) {
            Some(s) if s.chars().count() > MAX_SUMMARY_LENGTH => Err(ServiceError::validation(format!(
                "Summary must be at most {} characters",
                MAX_SUMMARY_LENGTH
            ))),
            Some(s) => Ok(Some(s)),
            None => {
                let excerpt = self.markdown.excerpt(content, AUTO_SUMMARY_LENGTH);
                Ok((!excerpt.is_empty()).then_some(excerpt))
            }
        }
    }
}

fn past_tense(action: HistoryAction) -> &'static str {
    match action {
        HistoryAction::Publish => "Published",
        _ => "Updated",
    }
}
