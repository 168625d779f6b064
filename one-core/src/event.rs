//! Events as stored in the local mirror.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::color::EventColor;
use crate::error::{OneError, OneResult};

/// A mirrored copy of one remote event, owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorEvent {
    /// Remote event id
    pub id: String,
    pub user_id: String,
    /// Calendar the event was fetched from
    pub calendar_id: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub attendees: Vec<Attendee>,
    pub status: EventStatus,
    pub color_id: Option<String>,
    pub color: EventColor,
    /// Best-effort attribution to one of the user's calendars, by organizer
    pub source: Option<EventSource>,
    /// Provider-side creation/modification timestamps
    pub event_created_at: Option<DateTime<Utc>>,
    pub event_updated_at: Option<DateTime<Utc>>,
    /// Local row timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An event attendee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub response_status: ResponseStatus,
    pub optional: bool,
    pub organizer: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
}

impl ResponseStatus {
    pub fn from_google(status: &str) -> Self {
        match status {
            "accepted" => ResponseStatus::Accepted,
            "declined" => ResponseStatus::Declined,
            "tentative" => ResponseStatus::Tentative,
            _ => ResponseStatus::NeedsAction,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn from_google(status: &str) -> Self {
        match status {
            "tentative" => EventStatus::Tentative,
            "cancelled" => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "confirmed",
            EventStatus::Tentative => "tentative",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

/// Display metadata of the calendar an event is attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    pub calendar_id: String,
    pub name: String,
    pub background_color: Option<String>,
}

/// Fields a caller supplies to create or update one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInput {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl EventInput {
    /// Reject ranges where the end is not strictly after the start.
    pub fn validate(&self) -> OneResult<()> {
        if self.end <= self.start {
            return Err(OneError::InvalidDateRange {
                start: self.start.to_rfc3339(),
                end: self.end.to_rfc3339(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(start: &str, end: &str) -> EventInput {
        EventInput {
            summary: "Standup".into(),
            description: None,
            start: DateTime::parse_from_rfc3339(start).unwrap(),
            end: DateTime::parse_from_rfc3339(end).unwrap(),
        }
    }

    #[test]
    fn test_validate_rejects_end_before_start() {
        let err = input("2025-06-01T10:00:00Z", "2025-06-01T09:00:00Z")
            .validate()
            .unwrap_err();
        assert_eq!(err.reason(), "invalid-date-range");
    }

    #[test]
    fn test_validate_rejects_zero_length() {
        assert!(
            input("2025-06-01T10:00:00Z", "2025-06-01T10:00:00Z")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validate_compares_instants_across_offsets() {
        // 10:00+02:00 is 08:00Z, so an 09:00Z end is after it
        assert!(
            input("2025-06-01T10:00:00+02:00", "2025-06-01T09:00:00Z")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_response_status_serializes_camel_case() {
        let json = serde_json::to_string(&ResponseStatus::NeedsAction).unwrap();
        assert_eq!(json, "\"needsAction\"");
        assert_eq!(ResponseStatus::from_google("bogus"), ResponseStatus::NeedsAction);
    }
}
