//! History service
//!
//! The audit trail: other services record who created, changed, published
//! or deleted what, and every login/logout. Recording never fails the
//! operation that triggered it.

use std::sync::Arc;

use crate::db::repositories::HistoryRepository;
use crate::models::{
    HistoryAction, HistoryEntity, HistoryEvent, HistoryFilter, ListParams, NewHistoryEvent, PagedResult,
};

use super::error::ServiceResult;

pub struct HistoryService {
    repo: Arc<dyn HistoryRepository>,
}

impl HistoryService {
    pub fn new(repo: Arc<dyn HistoryRepository>) -> Self {
        Self { repo }
    }

    /// Append an audit record; failures are logged and swallowed.
    pub async fn record(
        &self,
        actor_id: Option<i64>,
        action: HistoryAction,
        entity: HistoryEntity,
        entity_id: Option<i64>,
        summary: impl Into<String>,
    ) {
        let event = NewHistoryEvent::new(actor_id, action, entity, entity_id, summary);
        if let Err(e) = self.repo.record(&event).await {
            tracing::warn!(
                action = %event.action,
                entity = %event.entity_type,
                entity_id = ?event.entity_id,
                "Failed to record history event: {:#}",
                e
            );
        }
    }

    /// Newest first
    pub async fn list(
        &self,
        filter: &HistoryFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<HistoryEvent>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{create_user, setup_pool};
    use crate::db::repositories::SqlxHistoryRepository;
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_record_and_list_newest_first() {
        let pool = setup_pool().await;
        let admin = create_user(&pool, "admin", UserRole::Admin).await;
        let service = HistoryService::new(SqlxHistoryRepository::boxed(pool));

        service
            .record(Some(admin.id), HistoryAction::Create, HistoryEntity::Category, Some(1), "Created category Trips")
            .await;
        service
            .record(Some(admin.id), HistoryAction::Delete, HistoryEntity::Category, Some(1), "Deleted category Trips")
            .await;
        service
            .record(None, HistoryAction::Login, HistoryEntity::User, Some(admin.id), "admin logged in")
            .await;

        let page = service.list(&HistoryFilter::default(), &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].action, HistoryAction::Login);

        let filter = HistoryFilter {
            entity_type: Some(HistoryEntity::Category),
            actor_id: Some(admin.id),
        };
        let page = service.list(&filter, &ListParams::new(1, 1)).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].action, HistoryAction::Delete);
        assert_eq!(page.total_pages, 2);
    }

    #[tokio::test]
    async fn test_record_with_unknown_actor_is_swallowed() {
        let pool = setup_pool().await;
        let service = HistoryService::new(SqlxHistoryRepository::boxed(pool));

        // actor 999 violates the foreign key; the caller must not notice
        service
            .record(Some(999), HistoryAction::Update, HistoryEntity::Resource, Some(3), "ghost edit")
            .await;

        let page = service.list(&HistoryFilter::default(), &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }
}
