//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - enforce business rules and validate input
//! - keep the caches coherent
//! - record history events and fan out notifications

pub mod announcement;
pub mod article;
pub mod calendar;
pub mod category;
pub mod dashboard;
pub mod error;
pub mod history;
pub mod markdown;
pub mod notification;
pub mod password;
pub mod rate_limiter;
pub mod resource;
pub mod user;
pub mod validation;

use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::config::AuthConfig;
use crate::db::repositories::{
    SqlxAnnouncementRepository, SqlxArticleRepository, SqlxCategoryRepository, SqlxEventRepository,
    SqlxHistoryRepository, SqlxNotificationRepository, SqlxResourceRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;

pub use announcement::AnnouncementService;
pub use article::ArticleService;
pub use calendar::CalendarService;
pub use category::CategoryService;
pub use dashboard::{DashboardService, DashboardSummary};
pub use error::{ServiceError, ServiceResult};
pub use history::HistoryService;
pub use markdown::MarkdownRenderer;
pub use notification::NotificationService;
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use resource::ResourceService;
pub use user::{LoginInput, ProfileInput, SetupInput, UserService, UserServiceError};

/// Every service, wired to one pool and one cache
#[derive(Clone)]
pub struct Services {
    pub users: Arc<UserService>,
    pub history: Arc<HistoryService>,
    pub notifications: Arc<NotificationService>,
    pub categories: Arc<CategoryService>,
    pub announcements: Arc<AnnouncementService>,
    pub resources: Arc<ResourceService>,
    pub articles: Arc<ArticleService>,
    pub calendar: Arc<CalendarService>,
    pub dashboard: Arc<DashboardService>,
}

impl Services {
    pub fn new(pool: DynDatabasePool, cache: Arc<MemoryCache>, auth: &AuthConfig) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let history = Arc::new(HistoryService::new(SqlxHistoryRepository::boxed(pool.clone())));

        let users = Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            history.clone(),
            auth,
        ));
        let notifications = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            user_repo,
            history.clone(),
        ));
        let categories = Arc::new(CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            cache.clone(),
            history.clone(),
        ));
        let announcements = Arc::new(AnnouncementService::new(
            SqlxAnnouncementRepository::boxed(pool.clone()),
            categories.clone(),
            notifications.clone(),
            history.clone(),
            cache,
        ));
        let resources = Arc::new(ResourceService::new(
            SqlxResourceRepository::boxed(pool.clone()),
            categories.clone(),
            history.clone(),
        ));
        let articles = Arc::new(ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            categories.clone(),
            history.clone(),
        ));
        let calendar = Arc::new(CalendarService::new(SqlxEventRepository::boxed(pool), history.clone()));
        let dashboard = Arc::new(DashboardService::new(
            announcements.clone(),
            calendar.clone(),
            resources.clone(),
            notifications.clone(),
        ));

        Self {
            users,
            history,
            notifications,
            categories,
            announcements,
            resources,
            articles,
            calendar,
            dashboard,
        }
    }
}

/// Fixtures shared by the service tests
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::repositories::UserRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    pub async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// Insert an active user with password `password123`
    pub async fn create_user(pool: &DynDatabasePool, username: &str, role: UserRole) -> User {
        let hash = hash_password("password123").expect("hash");
        let user = User::new(username.to_string(), format!("{}@school.example", username), hash, role);
        SqlxUserRepository::new(pool.clone())
            .create(&user)
            .await
            .expect("Failed to create user")
    }

    pub fn build_services(pool: DynDatabasePool) -> Services {
        Services::new(pool, Arc::new(MemoryCache::new()), &AuthConfig::default())
    }
}
