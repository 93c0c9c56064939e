//! Database repositories
//!
//! One repository per entity. Each is a trait (so services can be tested
//! against other implementations) plus an `Sqlx*Repository` that works on
//! both SQLite and MySQL.

pub mod announcement;
pub mod article;
pub mod category;
pub mod event;
pub mod history;
pub mod notification;
pub mod resource;
pub mod session;
pub mod user;

pub use announcement::{AnnouncementRepository, SqlxAnnouncementRepository};
pub use article::{ArticleRepository, SqlxArticleRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use event::{EventRepository, SqlxEventRepository};
pub use history::{HistoryRepository, SqlxHistoryRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use resource::{ResourceRepository, SqlxResourceRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
