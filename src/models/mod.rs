//! Data models
//!
//! Database entities (User, Session, Category, Announcement, Resource,
//! Article, InternalEvent, Notification, HistoryEvent), the inputs services
//! accept for them, and the pagination types shared by list endpoints.

/// Implements `as_str`, `Display` and a case-insensitive `FromStr` for a
/// fieldless enum stored as a string column.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants in declaration order
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(anyhow::anyhow!(concat!("Invalid ", stringify!($ty), ": {}"), s)),
                }
            }
        }
    };
}

mod announcement;
mod article;
mod category;
mod event;
mod history;
mod notification;
mod pagination;
mod permission;
mod resource;
mod session;
mod user;

pub use announcement::{
    Announcement, AnnouncementPriority, AnnouncementStatus, CreateAnnouncementInput,
    UpdateAnnouncementInput,
};
pub use article::{Article, ArticleStatus, CreateArticleInput, UpdateArticleInput};
pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use event::{CreateEventInput, EventWindow, InternalEvent, UpdateEventInput};
pub use history::{HistoryAction, HistoryEntity, HistoryEvent, HistoryFilter, NewHistoryEvent};
pub use notification::{InboxItem, NewNotification, Notification, NotificationTarget};
pub use pagination::{ListParams, PagedResult, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use permission::{effective_permissions, overrides_to_json, parse_overrides, role_permissions, Permission};
pub use resource::{CreateResourceInput, Resource, ResourceFilter, ResourceKind, UpdateResourceInput};
pub use session::Session;
pub use user::{CreateUserInput, UpdateUserInput, User, UserFilter, UserRole, UserStatus};
