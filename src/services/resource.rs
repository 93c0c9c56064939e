//! Resource service
//!
//! Links, documents and training videos share one table; a training video
//! is a resource of kind `video`. Anyone with `manage_resources` may edit
//! every kind, `manage_training_videos` only covers videos.

use std::sync::Arc;

use crate::db::repositories::ResourceRepository;
use crate::models::{
    CreateResourceInput, HistoryAction, HistoryEntity, ListParams, PagedResult, Permission, Resource,
    ResourceFilter, ResourceKind, UpdateResourceInput, User,
};

use super::category::CategoryService;
use super::error::{ServiceError, ServiceResult};
use super::history::HistoryService;
use super::validation::{http_url, optional_http_url, optional_text, required_text, MAX_TITLE_LENGTH};

const MAX_DESCRIPTION_LENGTH: usize = 2000;

pub struct ResourceService {
    repo: Arc<dyn ResourceRepository>,
    categories: Arc<CategoryService>,
    history: Arc<HistoryService>,
}

/// Can `user` create, edit or delete resources of `kind`?
pub fn can_manage(user: &User, kind: ResourceKind) -> bool {
    let permissions = user.effective_permissions();
    permissions.contains(&Permission::ManageResources)
        || (kind == ResourceKind::Video && permissions.contains(&Permission::ManageTrainingVideos))
}

fn authorize(user: &User, kind: ResourceKind) -> ServiceResult<()> {
    if can_manage(user, kind) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!("Not allowed to manage {} resources", kind)))
    }
}

impl ResourceService {
    pub fn new(
        repo: Arc<dyn ResourceRepository>,
        categories: Arc<CategoryService>,
        history: Arc<HistoryService>,
    ) -> Self {
        Self {
            repo,
            categories,
            history,
        }
    }

    pub async fn list(&self, filter: &ResourceFilter, params: &ListParams) -> ServiceResult<PagedResult<Resource>> {
        let filter = ResourceFilter {
            query: optional_text(filter.query.clone()),
            ..filter.clone()
        };
        let (items, total) = self.repo.list(&filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Resource> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Resource {}", id)))
    }

    pub async fn count_by_kind(&self, kind: ResourceKind) -> ServiceResult<i64> {
        Ok(self.repo.count_by_kind(kind).await?)
    }

    /// # Errors
    /// - `Forbidden` if the actor may not manage this kind
    /// - `Validation` for a bad URL, a duration on a non-video or a negative duration
    pub async fn create(&self, actor: &User, input: CreateResourceInput) -> ServiceResult<Resource> {
        authorize(actor, input.kind)?;

        let title = required_text("Title", &input.title, MAX_TITLE_LENGTH)?;
        let url = http_url("URL", &input.url)?;
        let thumbnail_url = optional_http_url("Thumbnail URL", input.thumbnail_url)?;
        let description = validate_description(input.description)?;
        check_duration(input.kind, input.duration_seconds)?;
        self.categories.ensure_exists(input.category_id).await?;

        let now = chrono::Utc::now();
        let resource = Resource {
            id: 0,
            title,
            description,
            url,
            kind: input.kind,
            category_id: input.category_id,
            thumbnail_url,
            duration_seconds: input.duration_seconds,
            created_by: Some(actor.id),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&resource)
            .await
            .map_err(|e| ServiceError::from_write(e, "Resource"))?;

        tracing::info!(id = created.id, kind = %created.kind, "Resource created");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Create,
                HistoryEntity::Resource,
                Some(created.id),
                format!("Added {} \"{}\"", created.kind, created.title),
            )
            .await;
        Ok(created)
    }

    pub async fn update(&self, actor: &User, id: i64, input: UpdateResourceInput) -> ServiceResult<Resource> {
        let mut resource = self.get(id).await?;
        authorize(actor, resource.kind)?;

        if let Some(kind) = input.kind {
            authorize(actor, kind)?;
            if kind != ResourceKind::Video {
                resource.duration_seconds = None;
            }
            resource.kind = kind;
        }
        if let Some(title) = input.title {
            resource.title = required_text("Title", &title, MAX_TITLE_LENGTH)?;
        }
        if let Some(url) = input.url {
            resource.url = http_url("URL", &url)?;
        }
        if input.description.is_some() {
            resource.description = validate_description(input.description)?;
        }
        if input.thumbnail_url.is_some() {
            resource.thumbnail_url = optional_http_url("Thumbnail URL", input.thumbnail_url)?;
        }
        if input.duration_seconds.is_some() {
            check_duration(resource.kind, input.duration_seconds)?;
            resource.duration_seconds = input.duration_seconds;
        }
        if input.clear_category {
            resource.category_id = None;
        } else if input.category_id.is_some() {
            self.categories.ensure_exists(input.category_id).await?;
            resource.category_id = input.category_id;
        }

        let updated = self
            .repo
            .update(&resource)
            .await
            .map_err(|e| ServiceError::from_write(e, "Resource"))?;

        tracing::info!(id, "Resource updated");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Update,
                HistoryEntity::Resource,
                Some(id),
                format!("Updated {} \"{}\"", updated.kind, updated.title),
            )
            .await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let resource = self.get(id).await?;
        authorize(actor, resource.kind)?;

        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found(format!("Resource {}", id)));
        }

        tracing::info!(id, "Resource deleted");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Delete,
                HistoryEntity::Resource,
                Some(id),
                format!("Deleted {} \"{}\"", resource.kind, resource.title),
            )
            .await;
        Ok(())
    }
}

fn validate_description(description: Option<String>) -> ServiceResult<Option<String>> {
    match optional_text(description) {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LENGTH => Err(ServiceError::validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LENGTH
        ))),
        other => Ok(other),
    }
}

fn check_duration(kind: ResourceKind, duration_seconds: Option<i64>) -> ServiceResult<()> {
    match duration_seconds {
        None => Ok(()),
        Some(_) if kind != ResourceKind::Video => {
            Err(ServiceError::validation("Only videos have a duration"))
        }
        Some(d) if d < 0 => Err(ServiceError::validation("Duration must not be negative")),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxHistoryRepository, SqlxResourceRepository};
    use crate::cache::MemoryCache;
    use crate::models::UserRole;
    use crate::services::test_support::{create_user, setup_pool};

    struct Fixture {
        service: ResourceService,
        editor: User,
        video_editor: User,
        staff: User,
    }

    async fn setup_test_service() -> Fixture {
        let pool = setup_pool().await;
        let editor = create_user(&pool, "editor", UserRole::Editor).await;
        let staff = create_user(&pool, "staff", UserRole::Staff).await;
        let mut video_editor = create_user(&pool, "mediaclub", UserRole::Staff).await;
        video_editor.permissions = vec![Permission::ManageTrainingVideos];

        let history = Arc::new(HistoryService::new(SqlxHistoryRepository::boxed(pool.clone())));
        let categories = Arc::new(CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
            history.clone(),
        ));
        let service = ResourceService::new(SqlxResourceRepository::boxed(pool), categories, history);
        Fixture {
            service,
            editor,
            video_editor,
            staff,
        }
    }

    fn link(title: &str) -> CreateResourceInput {
        CreateResourceInput {
            title: title.to_string(),
            url: "https://docs.school.example/handbook.pdf".to_string(),
            kind: ResourceKind::Document,
            ..Default::default()
        }
    }

    fn video(title: &str) -> CreateResourceInput {
        CreateResourceInput {
            title: title.to_string(),
            url: "https://video.school.example/watch/1".to_string(),
            kind: ResourceKind::Video,
            duration_seconds: Some(600),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_filter() {
        let f = setup_test_service().await;
        f.service.create(&f.editor, link("Staff handbook")).await.unwrap();
        f.service.create(&f.editor, video("First aid basics")).await.unwrap();

        let all = f.service.list(&ResourceFilter::default(), &ListParams::default()).await.unwrap();
        assert_eq!(all.total, 2);

        let videos = ResourceFilter {
            kind: Some(ResourceKind::Video),
            ..Default::default()
        };
        let page = f.service.list(&videos, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].duration_seconds, Some(600));

        let search = ResourceFilter {
            query: Some("handbook".into()),
            ..Default::default()
        };
        assert_eq!(f.service.list(&search, &ListParams::default()).await.unwrap().total, 1);

        assert_eq!(f.service.count_by_kind(ResourceKind::Video).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_permissions_by_kind() {
        let f = setup_test_service().await;

        assert!(matches!(f.service.create(&f.staff, link("x")).await, Err(ServiceError::Forbidden(_))));
        assert!(matches!(
            f.service.create(&f.video_editor, link("x")).await,
            Err(ServiceError::Forbidden(_))
        ));

        let clip = f.service.create(&f.video_editor, video("Safeguarding")).await.unwrap();

        // a video-only editor cannot turn a video into a document
        let to_doc = UpdateResourceInput {
            kind: Some(ResourceKind::Document),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(&f.video_editor, clip.id, to_doc).await,
            Err(ServiceError::Forbidden(_))
        ));

        f.service.delete(&f.video_editor, clip.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_validation() {
        let f = setup_test_service().await;

        let bad_url = CreateResourceInput {
            url: "ftp://files.example/x".into(),
            ..link("Bad")
        };
        assert!(matches!(f.service.create(&f.editor, bad_url).await, Err(ServiceError::Validation(_))));

        let doc_with_duration = CreateResourceInput {
            duration_seconds: Some(30),
            ..link("Doc")
        };
        assert!(matches!(
            f.service.create(&f.editor, doc_with_duration).await,
            Err(ServiceError::Validation(_))
        ));

        let negative = CreateResourceInput {
            duration_seconds: Some(-1),
            ..video("Neg")
        };
        assert!(matches!(f.service.create(&f.editor, negative).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_kind_clears_duration() {
        let f = setup_test_service().await;
        let clip = f.service.create(&f.editor, video("Clip")).await.unwrap();

        let update = UpdateResourceInput {
            kind: Some(ResourceKind::Link),
            description: Some("Now just a link".into()),
            ..Default::default()
        };
        let updated = f.service.update(&f.editor, clip.id, update).await.unwrap();
        assert_eq!(updated.kind, ResourceKind::Link);
        assert_eq!(updated.duration_seconds, None);
        assert_eq!(updated.description.as_deref(), Some("Now just a link"));

        assert!(matches!(f.service.get(999).await, Err(ServiceError::NotFound(_))));
    }
}
