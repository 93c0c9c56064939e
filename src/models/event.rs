//! Calendar (internal) event model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalEvent {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    /// Open-ended events only occupy their start instant
    pub ends_at: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InternalEvent {
    /// Whether the event overlaps the half-open window `[from, to)`
    pub fn overlaps(&self, window: &EventWindow) -> bool {
        let end = self.ends_at.unwrap_or(self.starts_at);
        self.starts_at < window.to && end >= window.from
    }
}

/// Half-open time window `[from, to)` for calendar queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl EventWindow {
    /// Days covered by the default window
    pub const DEFAULT_DAYS: i64 = 30;

    /// Window starting at `from` (or now) and ending at `to` (or
    /// `DEFAULT_DAYS` after the start)
    pub fn resolve(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        let from = from.unwrap_or_else(Utc::now);
        let to = to.unwrap_or(from + Duration::days(Self::DEFAULT_DAYS));
        Self { from, to }
    }

    pub fn is_valid(&self) -> bool {
        self.from < self.to
    }
}

/// Input for creating an event
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
}

/// Partial update of an event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEventInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clear_end: bool,
    #[serde(default)]
    pub all_day: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> InternalEvent {
        InternalEvent {
            id: 1,
            title: "Parents evening".to_string(),
            description: None,
            location: None,
            starts_at: start,
            ends_at: end,
            all_day: false,
            created_by: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_overlaps() {
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap();
        let window = EventWindow { from: at(10, 0), to: at(11, 0) };

        assert!(event(at(10, 9), None).overlaps(&window));
        assert!(event(at(9, 9), Some(at(10, 1))).overlaps(&window));
        assert!(!event(at(9, 9), Some(at(9, 18))).overlaps(&window));
        assert!(!event(at(11, 0), None).overlaps(&window));
    }

    #[test]
    fn test_window_defaults() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let window = EventWindow::resolve(Some(from), None);
        assert_eq!(window.to - window.from, Duration::days(EventWindow::DEFAULT_DAYS));
        assert!(window.is_valid());
        assert!(!EventWindow::resolve(Some(from), Some(from)).is_valid());
    }
}
