//! Category service
//!
//! Categories are shared by announcements, resources and articles. The full
//! list is small and read on nearly every page, so it is served from cache
//! and invalidated on every write.

use std::sync::Arc;

use anyhow::Context;

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CreateCategoryInput, HistoryAction, HistoryEntity, UpdateCategoryInput, User};

use super::announcement::FEED_CACHE_PREFIX;
use super::error::{ServiceError, ServiceResult};
use super::history::HistoryService;
use super::validation::{is_valid_color, optional_text, required_text, resolve_slug};

const CACHE_KEY_CATEGORY_LIST: &str = "categories:list";
const MAX_NAME_LENGTH: usize = 100;

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<MemoryCache>,
    history: Arc<HistoryService>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<MemoryCache>, history: Arc<HistoryService>) -> Self {
        Self { repo, cache, history }
    }

    /// All categories ordered by `sort_order`, then name
    pub async fn list(&self) -> ServiceResult<Vec<Category>> {
        if let Some(list) = self.cache.get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST).await.ok().flatten() {
            return Ok(list);
        }

        let list = self.repo.list().await.context("Failed to list categories")?;
        if let Err(e) = self.cache.set(CACHE_KEY_CATEGORY_LIST, &list, self.cache.default_ttl()).await {
            tracing::warn!("Failed to cache category list: {:#}", e);
        }
        Ok(list)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Category> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Category {}", id)))
    }

    /// Fail with `Validation` when a referenced category id is unknown
    pub async fn ensure_exists(&self, id: Option<i64>) -> ServiceResult<()> {
        if let Some(id) = id {
            if self.repo.get_by_id(id).await?.is_none() {
                return Err(ServiceError::validation(format!("Category {} does not exist", id)));
            }
        }
        Ok(())
    }

    /// Create a category. The slug is derived from the name when omitted.
    ///
    /// # Errors
    /// - `Duplicate` if the name or slug is taken
    /// - `Validation` for an empty name, a bad slug or a bad color
    pub async fn create(&self, actor: &User, input: CreateCategoryInput) -> ServiceResult<Category> {
        let name = required_text("Name", &input.name, MAX_NAME_LENGTH)?;
        let slug = resolve_slug(input.slug.as_deref(), &name)?;
        let color = validate_color(input.color)?;

        self.ensure_unique(&name, &slug, None).await?;

        let now = chrono::Utc::now();
        let category = Category {
            id: 0,
            name,
            slug,
            description: optional_text(input.description),
            color,
            sort_order: input.sort_order.unwrap_or(0),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&category)
            .await
            .map_err(|e| ServiceError::from_write(e, "Category"))?;

        tracing::info!(id = created.id, slug = %created.slug, "Category created");
        self.invalidate_cache().await;
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Create,
                HistoryEntity::Category,
                Some(created.id),
                format!("Created category \"{}\"", created.name),
            )
            .await;
        Ok(created)
    }

    pub async fn update(&self, actor: &User, id: i64, input: UpdateCategoryInput) -> ServiceResult<Category> {
        let mut category = self.get(id).await?;
        if !input.has_changes() {
            return Ok(category);
        }

        if let Some(name) = input.name {
            category.name = required_text("Name", &name, MAX_NAME_LENGTH)?;
        }
        if let Some(slug) = input.slug {
            category.slug = resolve_slug(Some(&slug), &category.name)?;
        }
        if let Some(description) = input.description {
            category.description = optional_text(Some(description));
        }
        if input.color.is_some() {
            category.color = validate_color(input.color)?;
        }
        if let Some(sort_order) = input.sort_order {
            category.sort_order = sort_order;
        }

        self.ensure_unique(&category.name, &category.slug, Some(id)).await?;

        let updated = self
            .repo
            .update(&category)
            .await
            .map_err(|e| ServiceError::from_write(e, "Category"))?;

        tracing::info!(id, "Category updated");
        self.invalidate_cache().await;
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Update,
                HistoryEntity::Category,
                Some(id),
                format!("Updated category \"{}\"", updated.name),
            )
            .await;
        Ok(updated)
    }

    /// Delete a category. Content in it becomes uncategorised.
    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let category = self.get(id).await?;
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found(format!("Category {}", id)));
        }

        tracing::info!(id, "Category deleted");
        self.invalidate_cache().await;
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Delete,
                HistoryEntity::Category,
                Some(id),
                format!("Deleted category \"{}\"", category.name),
            )
            .await;
        Ok(())
    }

    async fn ensure_unique(&self, name: &str, slug: &str, current_id: Option<i64>) -> ServiceResult<()> {
        let is_other = |c: &Category| Some(c.id) != current_id;

        if self.repo.get_by_name(name).await?.as_ref().is_some_and(is_other) {
            return Err(ServiceError::Duplicate(format!("Category name already exists: {}", name)));
        }
        if self.repo.get_by_slug(slug).await?.as_ref().is_some_and(is_other) {
            return Err(ServiceError::Duplicate(format!("Category slug already exists: {}", slug)));
        }
        Ok(())
    }

    /// Feed entries embed the category id, so they go too.
    async fn invalidate_cache(&self) {
        let _ = self.cache.delete(CACHE_KEY_CATEGORY_LIST).await;
        let _ = self.cache.delete_prefix(FEED_CACHE_PREFIX).await;
    }
}

fn validate_color(color: Option<String>) -> ServiceResult<Option<String>> {
    match optional_text(color) {
        Some(c) if !is_valid_color(&c) => Err(ServiceError::validation("Color must be a hex value like #1e88e5")),
        other => Ok(other),
    }
}
