//! Notification service
//!
//! Notifications are addressed to everyone, to one role or to a single
//! user. Read state is tracked per user, so a broadcast is stored once and
//! each recipient marks it read independently.

use std::sync::Arc;

use crate::db::repositories::{NotificationRepository, UserRepository};
use crate::models::{
    HistoryAction, HistoryEntity, InboxItem, ListParams, NewNotification, Notification,
    NotificationTarget, PagedResult, User,
};

use super::error::{ServiceError, ServiceResult};
use super::history::HistoryService;
use super::validation::{required_text, MAX_TITLE_LENGTH};

pub const MAX_BODY_LENGTH: usize = 5000;

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    user_repo: Arc<dyn UserRepository>,
    history: Arc<HistoryService>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        user_repo: Arc<dyn UserRepository>,
        history: Arc<HistoryService>,
    ) -> Self {
        Self {
            repo,
            user_repo,
            history,
        }
    }

    /// Send a notification on behalf of `sender`.
    ///
    /// # Errors
    /// - `Validation` for an empty title/body or a bad link
    /// - `NotFound` when targeting a user that does not exist
    pub async fn send(&self, sender: &User, input: NewNotification) -> ServiceResult<Notification> {
        let notification = self.build(Some(sender.id), input).await?;
        let created = self.repo.create(&notification).await?;

        tracing::info!(
            id = created.id,
            target = created.target.kind(),
            sender = %sender.username,
            "Notification sent"
        );
        self.history
            .record(
                Some(sender.id),
                HistoryAction::Create,
                HistoryEntity::Notification,
                Some(created.id),
                format!("Sent notification \"{}\" to {}", created.title, describe_target(&created.target)),
            )
            .await;
        Ok(created)
    }

    /// Broadcast to every user as a side effect of another operation.
    /// Failures are logged, not returned.
    pub async fn broadcast(&self, sender_id: Option<i64>, title: &str, body: &str, link: Option<String>) {
        let input = NewNotification {
            title: title.to_string(),
            body: body.to_string(),
            link,
            target: NotificationTarget::All,
        };
        let result = match self.build(sender_id, input).await {
            Ok(notification) => self.repo.create(&notification).await.map_err(ServiceError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(created) => tracing::info!(id = created.id, "Broadcast notification sent"),
            Err(e) => tracing::warn!("Failed to broadcast notification: {}", e),
        }
    }

    async fn build(&self, created_by: Option<i64>, input: NewNotification) -> ServiceResult<Notification> {
        let title = required_text("Title", &input.title, MAX_TITLE_LENGTH)?;
        let body = required_text("Body", &input.body, MAX_BODY_LENGTH)?;
        let link = validate_link(input.link)?;

        if let NotificationTarget::User { user_id } = input.target {
            if self.user_repo.get_by_id(user_id).await?.is_none() {
                return Err(ServiceError::not_found(format!("User {}", user_id)));
            }
        }

        Ok(Notification {
            id: 0,
            title,
            body,
            link,
            target: input.target,
            created_by,
            created_at: chrono::Utc::now(),
        })
    }

    /// The user's inbox, newest first
    pub async fn inbox(
        &self,
        user: &User,
        unread_only: bool,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<InboxItem>> {
        let (items, total) = self.repo.inbox(user, unread_only, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn unread_count(&self, user: &User) -> ServiceResult<i64> {
        Ok(self.repo.count_unread(user).await?)
    }

    /// Mark one notification read. Idempotent; notifications addressed to
    /// someone else are reported as not found.
    pub async fn mark_read(&self, user: &User, id: i64) -> ServiceResult<()> {
        let notification = self
            .repo
            .get_by_id(id)
            .await?
            .filter(|n| n.target.includes(user))
            .ok_or_else(|| ServiceError::not_found(format!("Notification {}", id)))?;

        self.repo.mark_read(notification.id, user.id).await?;
        Ok(())
    }

    /// Returns how many notifications changed state
    pub async fn mark_all_read(&self, user: &User) -> ServiceResult<u64> {
        Ok(self.repo.mark_all_read(user).await?)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found(format!("Notification {}", id)));
        }
        tracing::info!(id, actor = %actor.username, "Notification deleted");
        self.history
            .record(Some(actor.id), HistoryAction::Delete, HistoryEntity::Notification, Some(id), "Deleted notification")
            .await;
        Ok(())
    }
}

fn describe_target(target: &NotificationTarget) -> String {
    match target {
        NotificationTarget::All => "everyone".to_string(),
        NotificationTarget::Role { role } => format!("role {}", role),
        NotificationTarget::User { user_id } => format!("user {}", user_id),
    }
}

/// Links are either site-relative paths or absolute http(s) URLs
fn validate_link(link: Option<String>) -> ServiceResult<Option<String>> {
    match super::validation::optional_text(link) {
        None => Ok(None),
        Some(path) if path.starts_with('/') && !path.starts_with("//") => Ok(Some(path)),
        Some(url) => super::validation::http_url("Link", &url).map(Some),
    }
}
