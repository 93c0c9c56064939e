//! Dashboard summary for the signed-in user

use std::sync::Arc;

use serde::Serialize;

use crate::models::{Permission, ResourceKind, User};

use super::announcement::AnnouncementService;
use super::calendar::CalendarService;
use super::error::ServiceResult;
use super::notification::NotificationService;
use super::resource::ResourceService;

/// How far ahead "upcoming events" looks
pub const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub visible_announcements: i64,
    pub upcoming_events: i64,
    /// Links and documents
    pub resources: i64,
    pub training_videos: i64,
    pub unread_notifications: i64,
    pub permissions: Vec<Permission>,
}

pub struct DashboardService {
    announcements: Arc<AnnouncementService>,
    calendar: Arc<CalendarService>,
    resources: Arc<ResourceService>,
    notifications: Arc<NotificationService>,
}

impl DashboardService {
    pub fn new(
        announcements: Arc<AnnouncementService>,
        calendar: Arc<CalendarService>,
        resources: Arc<ResourceService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            announcements,
            calendar,
            resources,
            notifications,
        }
    }

    pub async fn summary(&self, user: &User) -> ServiceResult<DashboardSummary> {
        let links = self.resources.count_by_kind(ResourceKind::Link).await?;
        let documents = self.resources.count_by_kind(ResourceKind::Document).await?;

        Ok(DashboardSummary {
            visible_announcements: self.announcements.count_visible().await?,
            upcoming_events: self.calendar.count_upcoming(UPCOMING_DAYS).await?,
            resources: links + documents,
            training_videos: self.resources.count_by_kind(ResourceKind::Video).await?,
            unread_notifications: self.notifications.unread_count(user).await?,
            permissions: user.effective_permissions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{build_services, create_user, setup_pool};
    use crate::models::{CreateAnnouncementInput, CreateEventInput, CreateResourceInput, UserRole};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_summary_counts() {
        let pool = setup_pool().await;
        let admin = create_user(&pool, "admin", UserRole::Admin).await;
        let staff = create_user(&pool, "staff", UserRole::Staff).await;
        let services = build_services(pool);

        services
            .announcements
            .create(
                &admin,
                CreateAnnouncementInput {
                    title: "Welcome back".into(),
                    content: "Term starts Monday".into(),
                    publish: true,
                    notify: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        for (title, kind, duration) in [
            ("Handbook", ResourceKind::Document, None),
            ("Portal", ResourceKind::Link, None),
            ("Induction", ResourceKind::Video, Some(300)),
        ] {
            services
                .resources
                .create(
                    &admin,
                    CreateResourceInput {
                        title: title.into(),
                        url: "https://school.example/r".into(),
                        kind,
                        duration_seconds: duration,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        services
            .calendar
            .create(
                &admin,
                CreateEventInput {
                    title: "Assembly".into(),
                    description: None,
                    location: None,
                    starts_at: Utc::now() + Duration::days(1),
                    ends_at: None,
                    all_day: false,
                },
            )
            .await
            .unwrap();

        let summary = services.dashboard.summary(&staff).await.unwrap();
        assert_eq!(summary.visible_announcements, 1);
        assert_eq!(summary.upcoming_events, 1);
        assert_eq!(summary.resources, 2);
        assert_eq!(summary.training_videos, 1);
        assert_eq!(summary.unread_notifications, 1);
        assert!(summary.permissions.is_empty());

        let admin_summary = services.dashboard.summary(&admin).await.unwrap();
        assert_eq!(admin_summary.permissions, Permission::ALL.to_vec());
    }
}
