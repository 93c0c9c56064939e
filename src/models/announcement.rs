//! Announcement model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A school-wide announcement.
///
/// Only published, unexpired announcements appear in the public feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    /// Markdown source
    pub content: String,
    /// Rendered HTML
    pub content_html: String,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub priority: AnnouncementPriority,
    pub status: AnnouncementStatus,
    /// Pinned announcements sort before everything else
    pub pinned: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Announcement {
    /// Whether readers without `manage_announcements` may see it at `now`
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.status == AnnouncementStatus::Published
            && self.expires_at.map_or(true, |expires| expires > now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementPriority {
    #[default]
    Normal,
    Important,
    Urgent,
}

string_enum!(AnnouncementPriority {
    Normal => "normal",
    Important => "important",
    Urgent => "urgent",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

string_enum!(AnnouncementStatus {
    Draft => "draft",
    Published => "published",
    Archived => "archived",
});

/// Input for creating an announcement
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAnnouncementInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub priority: AnnouncementPriority,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Publish immediately instead of saving a draft
    #[serde(default)]
    pub publish: bool,
    /// Send an `all` notification when published
    #[serde(default)]
    pub notify: bool,
}

/// Partial update of an announcement
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAnnouncementInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Detach from its category
    #[serde(default)]
    pub clear_category: bool,
    #[serde(default)]
    pub priority: Option<AnnouncementPriority>,
    #[serde(default)]
    pub pinned: Option<bool>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Remove the expiry date
    #[serde(default)]
    pub clear_expiry: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn announcement(status: AnnouncementStatus, expires_at: Option<DateTime<Utc>>) -> Announcement {
        let now = Utc::now();
        Announcement {
            id: 1,
            title: "Staff meeting".to_string(),
            content: String::new(),
            content_html: String::new(),
            author_id: Some(1),
            category_id: None,
            priority: AnnouncementPriority::Normal,
            status,
            pinned: false,
            published_at: Some(now),
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_visibility() {
        let now = Utc::now();
        assert!(announcement(AnnouncementStatus::Published, None).is_visible_at(now));
        assert!(announcement(AnnouncementStatus::Published, Some(now + Duration::days(1)))
            .is_visible_at(now));
        assert!(!announcement(AnnouncementStatus::Published, Some(now - Duration::days(1)))
            .is_visible_at(now));
        assert!(!announcement(AnnouncementStatus::Draft, None).is_visible_at(now));
        assert!(!announcement(AnnouncementStatus::Archived, None).is_visible_at(now));
    }

    #[test]
    fn test_input_defaults() {
        let input: CreateAnnouncementInput =
            serde_json::from_str(r#"{"title": "Hi", "content": "Body"}"#).unwrap();
        assert_eq!(input.priority, AnnouncementPriority::Normal);
        assert!(!input.publish);
        assert!(!input.notify);
    }
}
