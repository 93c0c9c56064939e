//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::permission::{effective_permissions, Permission};

/// A staff account.
///
/// `permissions` holds the per-user overrides only; the effective set also
/// includes everything the role grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    pub display_name: Option<String>,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub permissions: Vec<Permission>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User.
    ///
    /// The password must already be hashed (see `services::password`).
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            display_name: None,
            password_hash,
            role,
            status: UserStatus::Active,
            permissions: Vec::new(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Role permissions merged with this user's overrides
    pub fn effective_permissions(&self) -> Vec<Permission> {
        effective_permissions(self.role, &self.permissions)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.effective_permissions().contains(&permission)
    }
}

/// User role. Determines the base permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Editor,
    Teacher,
    #[default]
    Staff,
}

string_enum!(UserRole {
    Admin => "admin",
    Editor => "editor",
    Teacher => "teacher",
    Staff => "staff",
});

/// Account state. Disabled users cannot log in and lose their sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
}

string_enum!(UserStatus {
    Active => "active",
    Disabled => "disabled",
});

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub display_name: Option<String>,
    /// Defaults to staff
    pub role: Option<UserRole>,
    pub permissions: Vec<Permission>,
}

/// Partial update of a user; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    /// Empty string clears the display name
    pub display_name: Option<String>,
    /// Plaintext password (will be hashed)
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub permissions: Option<Vec<Permission>>,
}

/// Filters for the admin user list
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    /// Substring of username, email or display name
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User::new("u".to_string(), "u@example.com".to_string(), "hash".to_string(), role)
    }

    #[test]
    fn test_user_new_defaults() {
        let u = user(UserRole::Teacher);
        assert_eq!(u.id, 0);
        assert!(u.is_active());
        assert!(u.permissions.is_empty());
        assert!(u.last_login_at.is_none());
    }

    #[test]
    fn test_has_permission_uses_overrides() {
        let mut staff = user(UserRole::Staff);
        assert!(!staff.has_permission(Permission::ManageEvents));

        staff.permissions = vec![Permission::ManageEvents];
        assert!(staff.has_permission(Permission::ManageEvents));
        assert!(!staff.has_permission(Permission::ManageUsers));
    }

    #[test]
    fn test_admin_has_everything() {
        let admin = user(UserRole::Admin);
        assert!(admin.is_admin());
        for p in Permission::ALL {
            assert!(admin.has_permission(*p));
        }
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("TEACHER".parse::<UserRole>().unwrap(), UserRole::Teacher);
        assert_eq!(UserRole::Editor.to_string(), "editor");
        assert!("author".parse::<UserRole>().is_err());
        assert_eq!(UserRole::default(), UserRole::Staff);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(UserRole::Staff)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "staff");
        assert_eq!(json["status"], "active");
    }
}
