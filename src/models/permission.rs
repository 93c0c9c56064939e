//! Permissions and the role table
//!
//! Every role grants a fixed set of permissions. Individual users may carry
//! extra grants, stored as a JSON array of permission names on the user row;
//! the effective set is the union of both. Overrides only add.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::UserRole;

/// A single capability checked by handlers.
///
/// Declaration order is the canonical order used when listing permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ManageAnnouncements,
    ManageCategories,
    ManageResources,
    ManageTrainingVideos,
    ManageArticles,
    ManageEvents,
    SendNotifications,
    ViewHistory,
}

string_enum!(Permission {
    ManageUsers => "manage_users",
    ManageAnnouncements => "manage_announcements",
    ManageCategories => "manage_categories",
    ManageResources => "manage_resources",
    ManageTrainingVideos => "manage_training_videos",
    ManageArticles => "manage_articles",
    ManageEvents => "manage_events",
    SendNotifications => "send_notifications",
    ViewHistory => "view_history",
});

const EDITOR_PERMISSIONS: &[Permission] = &[
    Permission::ManageAnnouncements,
    Permission::ManageCategories,
    Permission::ManageResources,
    Permission::ManageTrainingVideos,
    Permission::ManageArticles,
    Permission::ManageEvents,
    Permission::SendNotifications,
];

const TEACHER_PERMISSIONS: &[Permission] = &[
    Permission::ManageResources,
    Permission::ManageTrainingVideos,
    Permission::ManageEvents,
];

/// Static role → permission table
pub fn role_permissions(role: UserRole) -> &'static [Permission] {
    match role {
        UserRole::Admin => Permission::ALL,
        UserRole::Editor => EDITOR_PERMISSIONS,
        UserRole::Teacher => TEACHER_PERMISSIONS,
        UserRole::Staff => &[],
    }
}

/// Union of the role's permissions and the user's overrides, without
/// duplicates, in declaration order.
pub fn effective_permissions(role: UserRole, overrides: &[Permission]) -> Vec<Permission> {
    role_permissions(role)
        .iter()
        .chain(overrides.iter())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Parse the stored override column.
///
/// Unknown names are dropped (and logged); malformed JSON yields no overrides
/// so a corrupted row never grants anything.
pub fn parse_overrides(raw: &str) -> Vec<Permission> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let names: Vec<String> = match serde_json::from_str(trimmed) {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!("Ignoring malformed permission overrides {:?}: {}", raw, e);
            return Vec::new();
        }
    };

    let mut permissions = BTreeSet::new();
    for name in names {
        match name.parse::<Permission>() {
            Ok(p) => {
                permissions.insert(p);
            }
            Err(_) => tracing::warn!("Ignoring unknown permission override: {}", name),
        }
    }
    permissions.into_iter().collect()
}

/// Serialize overrides for storage
pub fn overrides_to_json(permissions: &[Permission]) -> String {
    let names: BTreeSet<&'static str> = permissions.iter().map(Permission::as_str).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_role_table() {
        assert_eq!(role_permissions(UserRole::Admin).len(), Permission::ALL.len());
        assert!(role_permissions(UserRole::Staff).is_empty());

        let editor = role_permissions(UserRole::Editor);
        assert!(!editor.contains(&Permission::ManageUsers));
        assert!(!editor.contains(&Permission::ViewHistory));
        assert!(editor.contains(&Permission::SendNotifications));

        let teacher = role_permissions(UserRole::Teacher);
        assert_eq!(
            teacher,
            &[
                Permission::ManageResources,
                Permission::ManageTrainingVideos,
                Permission::ManageEvents
            ]
        );
    }

    #[test]
    fn test_effective_permissions_union() {
        let perms = effective_permissions(
            UserRole::Teacher,
            &[Permission::SendNotifications, Permission::ManageEvents],
        );
        assert_eq!(
            perms,
            vec![
                Permission::ManageResources,
                Permission::ManageTrainingVideos,
                Permission::ManageEvents,
                Permission::SendNotifications,
            ]
        );
    }

    #[test]
    fn test_parse_overrides() {
        assert_eq!(
            parse_overrides(r#"["view_history", "bogus", "manage_users", "view_history"]"#),
            vec![Permission::ManageUsers, Permission::ViewHistory]
        );
        assert!(parse_overrides("").is_empty());
        assert!(parse_overrides("[]").is_empty());
        assert!(parse_overrides("{not json").is_empty());
        assert!(parse_overrides(r#"{"manage_users": true}"#).is_empty());
    }

    #[test]
    fn test_overrides_json_round_trip() {
        let json = overrides_to_json(&[Permission::ViewHistory, Permission::ManageUsers]);
        assert_eq!(json, r#"["manage_users","view_history"]"#);
        assert_eq!(
            parse_overrides(&json),
            vec![Permission::ManageUsers, Permission::ViewHistory]
        );
    }

    #[test]
    fn test_permission_serde_names() {
        let json = serde_json::to_string(&Permission::ManageTrainingVideos).unwrap();
        assert_eq!(json, "\"manage_training_videos\"");
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), *p);
        }
    }

    fn any_role() -> impl Strategy<Value = UserRole> {
        prop::sample::select(UserRole::ALL.to_vec())
    }

    fn any_permissions() -> impl Strategy<Value = Vec<Permission>> {
        prop::collection::vec(prop::sample::select(Permission::ALL.to_vec()), 0..12)
    }

    proptest! {
        #[test]
        fn prop_effective_is_superset_of_both(role in any_role(), overrides in any_permissions()) {
            let perms = effective_permissions(role, &overrides);
            for p in role_permissions(role) {
                prop_assert!(perms.contains(p));
            }
            for p in &overrides {
                prop_assert!(perms.contains(p));
            }
        }

        #[test]
        fn prop_effective_is_sorted_and_unique(role in any_role(), overrides in any_permissions()) {
            let perms = effective_permissions(role, &overrides);
            prop_assert!(perms.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn prop_effective_contains_nothing_else(role in any_role(), overrides in any_permissions()) {
            let perms = effective_permissions(role, &overrides);
            for p in &perms {
                prop_assert!(role_permissions(role).contains(p) || overrides.contains(p));
            }
        }

        #[test]
        fn prop_parse_overrides_never_panics(raw in ".*") {
            let _ = parse_overrides(&raw);
        }
    }
}
