//! Announcement service
//!
//! Announcements move draft → published → archived. Readers only see
//! published, unexpired ones (pinned first, newest first); that feed is
//! cached per page and dropped on every write.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::AnnouncementRepository;
use crate::models::{
    Announcement, AnnouncementStatus, CreateAnnouncementInput, HistoryAction, HistoryEntity, ListParams,
    PagedResult, UpdateAnnouncementInput, User,
};

use super::category::CategoryService;
use super::error::{ServiceError, ServiceResult};
use super::history::HistoryService;
use super::markdown::MarkdownRenderer;
use super::notification::NotificationService;
use super::validation::{required_text, MAX_TITLE_LENGTH};

/// Key prefix of cached feed pages
pub const FEED_CACHE_PREFIX: &str = "announcements:feed:";

/// Feed pages live briefly so expiring announcements drop out on time
const FEED_CACHE_TTL: Duration = Duration::from_secs(60);

const MAX_CONTENT_LENGTH: usize = 50_000;

pub struct AnnouncementService {
    repo: Arc<dyn AnnouncementRepository>,
    categories: Arc<CategoryService>,
    notifications: Arc<NotificationService>,
    history: Arc<HistoryService>,
    cache: Arc<MemoryCache>,
    markdown: MarkdownRenderer,
}

impl AnnouncementService {
    pub fn new(
        repo: Arc<dyn AnnouncementRepository>,
        categories: Arc<CategoryService>,
        notifications: Arc<NotificationService>,
        history: Arc<HistoryService>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            categories,
            notifications,
            history,
            cache,
            markdown: MarkdownRenderer::new(),
        }
    }

    /// The reader-facing feed
    pub async fn feed(&self, category_id: Option<i64>, params: &ListParams) -> ServiceResult<PagedResult<Announcement>> {
        let key = format!(
            "{}{}:{}:{}",
            FEED_CACHE_PREFIX,
            category_id.map(|id| id.to_string()).unwrap_or_default(),
            params.page,
            params.per_page
        );
        if let Some(page) = self.cache.get::<PagedResult<Announcement>>(&key).await.ok().flatten() {
            return Ok(page);
        }

        let (items, total) = self.repo.list_visible(Utc::now(), category_id, params).await?;
        let page = PagedResult::new(items, total, params);
        if let Err(e) = self.cache.set(&key, &page, FEED_CACHE_TTL.min(self.cache.default_ttl())).await {
            tracing::warn!("Failed to cache announcement feed: {:#}", e);
        }
        Ok(page)
    }

    /// Every announcement regardless of state, newest first
    pub async fn list_all(
        &self,
        status: Option<AnnouncementStatus>,
        category_id: Option<i64>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Announcement>> {
        let (items, total) = self.repo.list_all(status, category_id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Announcement> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Announcement {}", id)))
    }

    /// Drafts, archived and expired announcements are not found for readers
    pub async fn get_visible(&self, id: i64) -> ServiceResult<Announcement> {
        let announcement = self.get(id).await?;
        if announcement.is_visible_at(Utc::now()) {
            Ok(announcement)
        } else {
            Err(ServiceError::not_found(format!("Announcement {}", id)))
        }
    }

    pub async fn count_visible(&self) -> ServiceResult<i64> {
        Ok(self.repo.count_visible(Utc::now()).await?)
    }

    pub async fn create(&self, author: &User, input: CreateAnnouncementInput) -> ServiceResult<Announcement> {
        let title = required_text("Title", &input.title, MAX_TITLE_LENGTH)?;
        let content = required_text("Content", &input.content, MAX_CONTENT_LENGTH)?;
        self.categories.ensure_exists(input.category_id).await?;

        let now = Utc::now();
        if input.publish {
            check_expiry(input.expires_at, now)?;
        }

        let announcement = Announcement {
            id: 0,
            content_html: self.markdown.render(&content),
            title,
            content,
            author_id: Some(author.id),
            category_id: input.category_id,
            priority: input.priority,
            status: if input.publish {
                AnnouncementStatus::Published
            } else {
                AnnouncementStatus::Draft
            },
            pinned: input.pinned,
            published_at: input.publish.then_some(now),
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&announcement)
            .await
            .map_err(|e| ServiceError::from_write(e, "Announcement"))?;

        tracing::info!(id = created.id, status = %created.status, author = %author.username, "Announcement created");
        self.invalidate_feed().await;
        self.history
            .record(
                Some(author.id),
                HistoryAction::Create,
                HistoryEntity::Announcement,
                Some(created.id),
                format!("Created announcement \"{}\"", created.title),
            )
            .await;

        if input.publish && input.notify {
            self.notify(author, &created).await;
        }
        Ok(created)
    }

    pub async fn update(&self, actor: &User, id: i64, input: UpdateAnnouncementInput) -> ServiceResult<Announcement> {
        let mut announcement = self.get(id).await?;

        if let Some(title) = input.title {
            announcement.title = required_text("Title", &title, MAX_TITLE_LENGTH)?;
        }
        if let Some(content) = input.content {
            announcement.content = required_text("Content", &content, MAX_CONTENT_LENGTH)?;
            announcement.content_html = self.markdown.render(&announcement.content);
        }
        if input.clear_category {
            announcement.category_id = None;
        } else if input.category_id.is_some() {
            self.categories.ensure_exists(input.category_id).await?;
            announcement.category_id = input.category_id;
        }
        if let Some(priority) = input.priority {
            announcement.priority = priority;
        }
        if let Some(pinned) = input.pinned {
            announcement.pinned = pinned;
        }
        if input.clear_expiry {
            announcement.expires_at = None;
        } else if let Some(expires_at) = input.expires_at {
            if announcement.status == AnnouncementStatus::Published {
                check_expiry(Some(expires_at), Utc::now())?;
            }
            announcement.expires_at = Some(expires_at);
        }

        let updated = self
            .repo
            .update(&announcement)
            .await
            .map_err(|e| ServiceError::from_write(e, "Announcement"))?;

        tracing::info!(id, "Announcement updated");
        self.invalidate_feed().await;
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Update,
                HistoryEntity::Announcement,
                Some(id),
                format!("Updated announcement \"{}\"", updated.title),
            )
            .await;
        Ok(updated)
    }

    /// Publish a draft or re-publish an archived announcement.
    ///
    /// `published_at` keeps the time of the first publication. Publishing an
    /// already published announcement changes nothing and sends nothing.
    pub async fn publish(&self, actor: &User, id: i64, notify: bool) -> ServiceResult<Announcement> {
        let mut announcement = self.get(id).await?;
        if announcement.status == AnnouncementStatus::Published {
            return Ok(announcement);
        }

        let now = Utc::now();
        check_expiry(announcement.expires_at, now)?;
        announcement.status = AnnouncementStatus::Published;
        announcement.published_at.get_or_insert(now);

        let published = self.repo.update(&announcement).await?;

        tracing::info!(id, "Announcement published");
        self.invalidate_feed().await;
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Publish,
                HistoryEntity::Announcement,
                Some(id),
                format!("Published announcement \"{}\"", published.title),
            )
            .await;

        if notify {
            self.notify(actor, &published).await;
        }
        Ok(published)
    }

    pub async fn archive(&self, actor: &User, id: i64) -> ServiceResult<Announcement> {
        let mut announcement = self.get(id).await?;
        if announcement.status == AnnouncementStatus::Archived {
            return Ok(announcement);
        }
        announcement.status = AnnouncementStatus::Archived;

        let archived = self.repo.update(&announcement).await?;

        tracing::info!(id, "Announcement archived");
        self.invalidate_feed().await;
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Update,
                HistoryEntity::Announcement,
                Some(id),
                format!("Archived announcement \"{}\"", archived.title),
            )
            .await;
        Ok(archived)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let announcement = self.get(id).await?;
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found(format!("Announcement {}", id)));
        }

        tracing::info!(id, "Announcement deleted");
        self.invalidate_feed().await;
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Delete,
                HistoryEntity::Announcement,
                Some(id),
                format!("Deleted announcement \"{}\"", announcement.title),
            )
            .await;
        Ok(())
    }

    async fn notify(&self, sender: &User, announcement: &Announcement) {
        self.notifications
            .broadcast(
                Some(sender.id),
                &announcement.title,
                &format!("New {} announcement", announcement.priority),
                Some(format!("/announcements/{}", announcement.id)),
            )
            .await;
    }

    async fn invalidate_feed(&self) {
        let _ = self.cache.delete_prefix(FEED_CACHE_PREFIX).await;
    }
}

fn check_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ServiceResult<()> {
    match expires_at {
        Some(expires) if expires <= now => Err(ServiceError::validation("Expiry must be in the future")),
        _ => Ok(()),
    }
}
