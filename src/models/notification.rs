//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{User, UserRole};

/// Who a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotificationTarget {
    /// Every user
    All,
    /// Users whose role matches
    Role { role: UserRole },
    /// A single user
    User { user_id: i64 },
}

impl NotificationTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationTarget::All => "all",
            NotificationTarget::Role { .. } => "role",
            NotificationTarget::User { .. } => "user",
        }
    }

    pub fn includes(&self, user: &User) -> bool {
        match self {
            NotificationTarget::All => true,
            NotificationTarget::Role { role } => user.role == *role,
            NotificationTarget::User { user_id } => user.id == *user_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub target: NotificationTarget,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A notification as seen from one user's inbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxItem {
    #[serde(flatten)]
    pub notification: Notification,
    pub read: bool,
}

/// Input for sending a notification
#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub link: Option<String>,
    pub target: NotificationTarget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_json_shape() {
        let target: NotificationTarget =
            serde_json::from_str(r#"{"type": "role", "role": "teacher"}"#).unwrap();
        assert_eq!(target, NotificationTarget::Role { role: UserRole::Teacher });

        let target: NotificationTarget = serde_json::from_str(r#"{"type": "all"}"#).unwrap();
        assert_eq!(target, NotificationTarget::All);

        let json = serde_json::to_value(NotificationTarget::User { user_id: 7 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "user", "user_id": 7}));
    }

    #[test]
    fn test_target_includes() {
        let mut teacher = User::new(
            "t".to_string(),
            "t@example.com".to_string(),
            "hash".to_string(),
            UserRole::Teacher,
        );
        teacher.id = 3;

        assert!(NotificationTarget::All.includes(&teacher));
        assert!(NotificationTarget::Role { role: UserRole::Teacher }.includes(&teacher));
        assert!(!NotificationTarget::Role { role: UserRole::Staff }.includes(&teacher));
        assert!(NotificationTarget::User { user_id: 3 }.includes(&teacher));
        assert!(!NotificationTarget::User { user_id: 4 }.includes(&teacher));
    }
}
