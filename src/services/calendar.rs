//! Calendar service
//!
//! Internal events (staff meetings, exam weeks, trips). Queries select the
//! events that overlap a time window; an event without an end is treated
//! as an instant.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::db::repositories::EventRepository;
use crate::models::{CreateEventInput, EventWindow, HistoryAction, HistoryEntity, InternalEvent, UpdateEventInput, User};

use super::error::{ServiceError, ServiceResult};
use super::history::HistoryService;
use super::validation::{optional_text, required_text, MAX_TITLE_LENGTH};

/// Longest window a single query may span
pub const MAX_WINDOW_DAYS: i64 = 366;

pub struct CalendarService {
    repo: Arc<dyn EventRepository>,
    history: Arc<HistoryService>,
}

impl CalendarService {
    pub fn new(repo: Arc<dyn EventRepository>, history: Arc<HistoryService>) -> Self {
        Self { repo, history }
    }

    /// Events overlapping `[from, to)`, ordered by start
    pub async fn list(&self, window: &EventWindow) -> ServiceResult<Vec<InternalEvent>> {
        check_window(window)?;
        Ok(self.repo.list_in_window(window).await?)
    }

    /// Number of events overlapping the next `days` days
    pub async fn count_upcoming(&self, days: i64) -> ServiceResult<i64> {
        let from = Utc::now();
        let window = EventWindow {
            from,
            to: from + Duration::days(days),
        };
        Ok(self.repo.count_in_window(&window).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<InternalEvent> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Event {}", id)))
    }

    pub async fn create(&self, actor: &User, input: CreateEventInput) -> ServiceResult<InternalEvent> {
        let title = required_text("Title", &input.title, MAX_TITLE_LENGTH)?;
        let (starts_at, ends_at) = normalize_times(input.starts_at, input.ends_at, input.all_day)?;

        let now = Utc::now();
        let event = InternalEvent {
            id: 0,
            title,
            description: optional_text(input.description),
            location: optional_text(input.location),
            starts_at,
            ends_at,
            all_day: input.all_day,
            created_by: Some(actor.id),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&event)
            .await
            .map_err(|e| ServiceError::from_write(e, "Event"))?;

        tracing::info!(id = created.id, starts_at = %created.starts_at, "Event created");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Create,
                HistoryEntity::Event,
                Some(created.id),
                format!("Scheduled \"{}\"", created.title),
            )
            .await;
        Ok(created)
    }

    pub async fn update(&self, actor: &User, id: i64, input: UpdateEventInput) -> ServiceResult<InternalEvent> {
        let mut event = self.get(id).await?;

        if let Some(title) = input.title {
            event.title = required_text("Title", &title, MAX_TITLE_LENGTH)?;
        }
        if input.description.is_some() {
            event.description = optional_text(input.description);
        }
        if input.location.is_some() {
            event.location = optional_text(input.location);
        }

        let all_day = input.all_day.unwrap_or(event.all_day);
        let starts_at = input.starts_at.unwrap_or(event.starts_at);
        let ends_at = if input.clear_end {
            None
        } else {
            input.ends_at.or(event.ends_at)
        };
        let (starts_at, ends_at) = normalize_times(starts_at, ends_at, all_day)?;
        event.starts_at = starts_at;
        event.ends_at = ends_at;
        event.all_day = all_day;

        let updated = self.repo.update(&event).await?;

        tracing::info!(id, "Event updated");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Update,
                HistoryEntity::Event,
                Some(id),
                format!("Updated \"{}\"", updated.title),
            )
            .await;
        Ok(updated)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        let event = self.get(id).await?;
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found(format!("Event {}", id)));
        }

        tracing::info!(id, "Event deleted");
        self.history
            .record(
                Some(actor.id),
                HistoryAction::Delete,
                HistoryEntity::Event,
                Some(id),
                format!("Cancelled \"{}\"", event.title),
            )
            .await;
        Ok(())
    }
}

fn check_window(window: &EventWindow) -> ServiceResult<()> {
    if !window.is_valid() {
        return Err(ServiceError::validation("'from' must be before 'to'"));
    }
    if window.to - window.from > Duration::days(MAX_WINDOW_DAYS) {
        return Err(ServiceError::validation(format!(
            "Window may span at most {} days",
            MAX_WINDOW_DAYS
        )));
    }
    Ok(())
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Reject an end before the start. All-day events span whole UTC days:
/// the start moves to midnight and the end to the midnight after its day.
pub fn normalize_times(
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    all_day: bool,
) -> ServiceResult<(DateTime<Utc>, Option<DateTime<Utc>>)> {
    if let Some(end) = ends_at {
        if end < starts_at {
            return Err(ServiceError::validation("End must not be before start"));
        }
    }

    if !all_day {
        return Ok((starts_at, ends_at));
    }

    let start = start_of_day(starts_at);
    let last_day = start_of_day(ends_at.unwrap_or(starts_at));
    let end = if ends_at.is_some_and(|e| e == last_day && e > start) {
        // already on a boundary: treat as exclusive end
        last_day
    } else {
        last_day + Duration::days(1)
    };
    Ok((start, Some(end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxEventRepository, SqlxHistoryRepository};
    use crate::models::UserRole;
    use crate::services::test_support::{create_user, setup_pool};
    use chrono::TimeZone;

    async fn setup_test_service() -> (CalendarService, User) {
        let pool = setup_pool().await;
        let teacher = create_user(&pool, "teacher", UserRole::Teacher).await;
        let history = Arc::new(HistoryService::new(SqlxHistoryRepository::boxed(pool.clone())));
        (CalendarService::new(SqlxEventRepository::boxed(pool), history), teacher)
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn input(title: &str, starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> CreateEventInput {
        CreateEventInput {
            title: title.to_string(),
            description: None,
            location: Some("Hall".to_string()),
            starts_at,
            ends_at,
            all_day: false,
        }
    }

    #[test]
    fn test_normalize_all_day() {
        let (start, end) = normalize_times(at(2024, 3, 4, 9, 30), None, true).unwrap();
        assert_eq!(start, at(2024, 3, 4, 0, 0));
        assert_eq!(end, Some(at(2024, 3, 5, 0, 0)));

        let (start, end) = normalize_times(at(2024, 3, 4, 9, 30), Some(at(2024, 3, 6, 12, 0)), true).unwrap();
        assert_eq!(start, at(2024, 3, 4, 0, 0));
        assert_eq!(end, Some(at(2024, 3, 7, 0, 0)));

        // already normalised values are stable
        let (start2, end2) = normalize_times(start, end, true).unwrap();
        assert_eq!((start2, end2), (start, end));
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let err = normalize_times(at(2024, 3, 4, 10, 0), Some(at(2024, 3, 4, 9, 0)), false).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let (start, end) = normalize_times(at(2024, 3, 4, 10, 0), Some(at(2024, 3, 4, 10, 0)), false).unwrap();
        assert_eq!(Some(start), end);
    }

    #[tokio::test]
    async fn test_window_queries() {
        let (service, teacher) = setup_test_service().await;
        service
            .create(&teacher, input("Staff meeting", at(2024, 5, 6, 15, 0), Some(at(2024, 5, 6, 16, 0))))
            .await
            .unwrap();
        service
            .create(&teacher, input("Exam week", at(2024, 5, 1, 8, 0), Some(at(2024, 5, 10, 17, 0))))
            .await
            .unwrap();
        service.create(&teacher, input("Open day", at(2024, 6, 1, 10, 0), None)).await.unwrap();

        let window = EventWindow {
            from: at(2024, 5, 6, 0, 0),
            to: at(2024, 5, 7, 0, 0),
        };
        let titles: Vec<_> = service.list(&window).await.unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["Exam week", "Staff meeting"]);

        let backwards = EventWindow {
            from: window.to,
            to: window.from,
        };
        assert!(matches!(service.list(&backwards).await, Err(ServiceError::Validation(_))));

        let huge = EventWindow {
            from: at(2020, 1, 1, 0, 0),
            to: at(2024, 1, 1, 0, 0),
        };
        assert!(matches!(service.list(&huge).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_all_day_event_stays_on_its_day() {
        let (service, teacher) = setup_test_service().await;
        let sports_day = CreateEventInput {
            all_day: true,
            ..input("Sports day", at(2030, 3, 4, 9, 0), None)
        };
        let created = service.create(&teacher, sports_day).await.unwrap();
        assert_eq!(created.ends_at, Some(at(2030, 3, 5, 0, 0)));

        let same_day = EventWindow {
            from: at(2030, 3, 4, 0, 0),
            to: at(2030, 3, 5, 0, 0),
        };
        assert_eq!(service.list(&same_day).await.unwrap().len(), 1);

        let next_day = EventWindow {
            from: at(2030, 3, 5, 0, 0),
            to: at(2030, 3, 6, 0, 0),
        };
        assert!(service.list(&next_day).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_upcoming() {
        let (service, teacher) = setup_test_service().await;
        let soon = Utc::now() + Duration::days(2);
        let later = Utc::now() + Duration::days(20);
        service.create(&teacher, input("Soon", soon, None)).await.unwrap();
        service.create(&teacher, input("Later", later, None)).await.unwrap();

        assert_eq!(service.count_upcoming(7).await.unwrap(), 1);
        assert_eq!(service.count_upcoming(30).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (service, teacher) = setup_test_service().await;
        let event = service
            .create(&teacher, input("Trip", at(2024, 9, 2, 8, 0), Some(at(2024, 9, 2, 18, 0))))
            .await
            .unwrap();

        let bad = UpdateEventInput {
            ends_at: Some(at(2024, 9, 1, 8, 0)),
            ..Default::default()
        };
        assert!(matches!(service.update(&teacher, event.id, bad).await, Err(ServiceError::Validation(_))));

        let make_all_day = UpdateEventInput {
            all_day: Some(true),
            location: Some(String::new()),
            ..Default::default()
        };
        let updated = service.update(&teacher, event.id, make_all_day).await.unwrap();
        assert!(updated.all_day);
        assert_eq!(updated.starts_at, at(2024, 9, 2, 0, 0));
        assert_eq!(updated.ends_at, Some(at(2024, 9, 3, 0, 0)));
        assert_eq!(updated.location, None);

        service.delete(&teacher, event.id).await.unwrap();
        assert!(matches!(service.get(event.id).await, Err(ServiceError::NotFound(_))));
    }
}
