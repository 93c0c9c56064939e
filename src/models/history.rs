//! History (audit trail) model
//!
//! Append-only record of who changed what, and of logins and logouts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: i64,
    /// `None` once the acting user has been deleted
    pub actor_id: Option<i64>,
    pub action: HistoryAction,
    pub entity_type: HistoryEntity,
    pub entity_id: Option<i64>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
    Publish,
    Login,
    Logout,
}

string_enum!(HistoryAction {
    Create => "create",
    Update => "update",
    Delete => "delete",
    Publish => "publish",
    Login => "login",
    Logout => "logout",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEntity {
    User,
    Category,
    Announcement,
    Resource,
    Article,
    Event,
    Notification,
}

string_enum!(HistoryEntity {
    User => "user",
    Category => "category",
    Announcement => "announcement",
    Resource => "resource",
    Article => "article",
    Event => "event",
    Notification => "notification",
});

/// A history entry about to be recorded
#[derive(Debug, Clone)]
pub struct NewHistoryEvent {
    pub actor_id: Option<i64>,
    pub action: HistoryAction,
    pub entity_type: HistoryEntity,
    pub entity_id: Option<i64>,
    pub summary: String,
}

impl NewHistoryEvent {
    pub fn new(
        actor_id: Option<i64>,
        action: HistoryAction,
        entity_type: HistoryEntity,
        entity_id: Option<i64>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            actor_id,
            action,
            entity_type,
            entity_id,
            summary: summary.into(),
        }
    }
}

/// Filters for the history listing
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub entity_type: Option<HistoryEntity>,
    pub actor_id: Option<i64>,
}
