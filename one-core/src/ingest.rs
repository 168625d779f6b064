//! Turning fetched remote events into mirror rows.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::color::EventColor;
use crate::date_range::parse_all_day;
use crate::event::{Attendee, EventSource, EventStatus, MirrorEvent, ResponseStatus};
use crate::holiday::is_holiday_calendar;
use crate::remote::{RemoteAttendee, RemoteCalendar, RemoteEvent, RemoteEventTime};

const UNTITLED: &str = "(No title)";

/// The user's calendars, used to attribute events to a source.
pub struct CalendarDirectory<'a> {
    pub calendars: &'a [RemoteCalendar],
    pub primary_id: &'a str,
}

impl CalendarDirectory<'_> {
    /// Match the organizer against the calendar list, else fall back to the primary calendar.
    pub fn source_for(&self, organizer_email: Option<&str>) -> Option<EventSource> {
        organizer_email
            .and_then(|email| self.calendars.iter().find(|c| c.id == email))
            .or_else(|| {
                self.calendars
                    .iter()
                    .find(|c| c.primary || c.id == self.primary_id)
            })
            .map(|c| EventSource {
                calendar_id: c.id.clone(),
                name: c.summary.clone(),
                background_color: c.background_color.clone(),
            })
    }
}

/// Why a remote event was not ingested.
#[derive(Debug, Clone, PartialEq)]
pub enum Skipped {
    /// Start or end carries neither a date nor a date-time
    MissingTime,
    /// Start or end failed to parse
    InvalidTime(String),
}

/// Parse a remote start/end. Date-times must be RFC 3339; dates become midnight UTC.
pub fn parse_event_time(time: &RemoteEventTime) -> Option<DateTime<Utc>> {
    if let Some(date_time) = &time.date_time {
        return DateTime::parse_from_rfc3339(date_time)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }
    time.date.as_deref().and_then(parse_all_day)
}

fn describe(time: &RemoteEventTime) -> String {
    time.date_time
        .clone()
        .or_else(|| time.date.clone())
        .unwrap_or_default()
}

fn to_attendee(remote: &RemoteAttendee) -> Option<Attendee> {
    let email = remote.email.as_deref().filter(|e| !e.is_empty())?;
    Some(Attendee {
        email: email.to_string(),
        display_name: remote.display_name.clone(),
        response_status: remote
            .response_status
            .as_deref()
            .map(ResponseStatus::from_google)
            .unwrap_or_default(),
        optional: remote.optional.unwrap_or(false),
        organizer: remote.organizer.unwrap_or(false),
    })
}

/// Derive the mirror row for one remote event fetched from `calendar_id`.
pub fn to_mirror_event(
    user_id: &str,
    calendar_id: &str,
    remote: RemoteEvent,
    directory: &CalendarDirectory,
    now: DateTime<Utc>,
) -> Result<MirrorEvent, Skipped> {
    let (Some(start), Some(end)) = (
        remote.start.as_ref().filter(|t| t.is_present()),
        remote.end.as_ref().filter(|t| t.is_present()),
    ) else {
        return Err(Skipped::MissingTime);
    };

    let start_time =
        parse_event_time(start).ok_or_else(|| Skipped::InvalidTime(describe(start)))?;
    let end_time = parse_event_time(end).ok_or_else(|| Skipped::InvalidTime(describe(end)))?;
    let all_day = start.date_time.is_none() && start.date.is_some();

    let organizer_email = remote.organizer.as_ref().and_then(|o| o.email.as_deref());
    let color = EventColor::resolve(
        remote.color_id.as_deref(),
        organizer_email.is_some_and(is_holiday_calendar),
    );

    Ok(MirrorEvent {
        user_id: user_id.to_string(),
        calendar_id: calendar_id.to_string(),
        summary: remote
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        description: remote.description,
        location: remote.location,
        start_time,
        end_time,
        all_day,
        attendees: remote.attendees.iter().filter_map(to_attendee).collect(),
        status: remote
            .status
            .as_deref()
            .map(EventStatus::from_google)
            .unwrap_or_default(),
        color,
        source: directory.source_for(organizer_email),
        color_id: remote.color_id,
        event_created_at: remote.created.as_deref().and_then(parse_instant),
        event_updated_at: remote.updated.as_deref().and_then(parse_instant),
        created_at: now,
        updated_at: now,
        id: remote.id,
    })
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Rows ready for the mirror plus what was dropped on the way.
#[derive(Debug, Default)]
pub struct IngestBatch {
    pub events: Vec<MirrorEvent>,
    pub missing_time: usize,
    pub invalid_time: usize,
}

impl IngestBatch {
    pub fn skipped(&self) -> usize {
        self.missing_time + self.invalid_time
    }
}

/// Convert every event fetched from one calendar, dropping the unusable ones.
pub fn ingest_calendar(
    user_id: &str,
    calendar_id: &str,
    remote_events: Vec<RemoteEvent>,
    directory: &CalendarDirectory,
    now: DateTime<Utc>,
) -> IngestBatch {
    let mut batch = IngestBatch::default();

    for remote in remote_events {
        let id = remote.id.clone();
        match to_mirror_event(user_id, calendar_id, remote, directory, now) {
            Ok(event) => batch.events.push(event),
            Err(Skipped::MissingTime) => batch.missing_time += 1,
            Err(Skipped::InvalidTime(value)) => {
                warn!(event_id = %id, calendar_id, %value, "Skipping event with unparseable date");
                batch.invalid_time += 1;
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holiday::INDIAN_HOLIDAYS;
    use crate::remote::RemotePerson;

    fn timed(s: &str) -> Option<RemoteEventTime> {
        Some(RemoteEventTime {
            date_time: Some(s.into()),
            ..Default::default()
        })
    }

    fn dated(s: &str) -> Option<RemoteEventTime> {
        Some(RemoteEventTime {
            date: Some(s.into()),
            ..Default::default()
        })
    }

    fn calendars() -> Vec<RemoteCalendar> {
        vec![
            RemoteCalendar {
                id: "alice@example.com".into(),
                summary: "Alice".into(),
                description: None,
                time_zone: Some("Asia/Kolkata".into()),
                background_color: Some("#9fe1e7".into()),
                primary: true,
            },
            RemoteCalendar {
                id: "team@group.calendar.google.com".into(),
                summary: "Team".into(),
                description: None,
                time_zone: None,
                background_color: Some("#f83a22".into()),
                primary: false,
            },
        ]
    }

    fn convert(remote: RemoteEvent) -> Result<MirrorEvent, Skipped> {
        let calendars = calendars();
        let directory = CalendarDirectory {
            calendars: &calendars,
            primary_id: "alice@example.com",
        };
        to_mirror_event("u1", "alice@example.com", remote, &directory, Utc::now())
    }

    #[test]
    fn test_timed_event() {
        let event = convert(RemoteEvent {
            id: "e1".into(),
            summary: Some("Review".into()),
            start: timed("2025-06-01T10:00:00+05:30"),
            end: timed("2025-06-01T11:00:00+05:30"),
            color_id: Some("2".into()),
            ..Default::default()
        })
        .unwrap();

        assert!(!event.all_day);
        assert_eq!(event.start_time.to_rfc3339(), "2025-06-01T04:30:00+00:00");
        assert_eq!(event.color, EventColor::Green);
        assert_eq!(event.status, EventStatus::Confirmed);
    }

    #[test]
    fn test_all_day_event_is_midnight_utc() {
        let event = convert(RemoteEvent {
            id: "e1".into(),
            start: dated("2025-12-25"),
            end: dated("2025-12-26"),
            ..Default::default()
        })
        .unwrap();

        assert!(event.all_day);
        assert_eq!(event.start_time.to_rfc3339(), "2025-12-25T00:00:00+00:00");
        assert_eq!(event.summary, UNTITLED);
    }

    #[test]
    fn test_missing_and_invalid_times() {
        let missing = convert(RemoteEvent {
            id: "e1".into(),
            start: Some(RemoteEventTime::default()),
            end: timed("2025-06-01T11:00:00Z"),
            ..Default::default()
        });
        assert_eq!(missing.unwrap_err(), Skipped::MissingTime);

        let invalid = convert(RemoteEvent {
            id: "e2".into(),
            start: timed("2025-06-01T10:00:00Z"),
            end: timed("not-a-date"),
            ..Default::default()
        });
        assert_eq!(
            invalid.unwrap_err(),
            Skipped::InvalidTime("not-a-date".into())
        );
    }

    #[test]
    fn test_holiday_organizer_gets_holiday_color() {
        let event = convert(RemoteEvent {
            id: "diwali".into(),
            start: dated("2025-10-20"),
            end: dated("2025-10-21"),
            organizer: Some(RemotePerson {
                email: Some(INDIAN_HOLIDAYS.into()),
                display_name: Some("Holidays in India".into()),
            }),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(event.color, crate::color::HOLIDAY_COLOR);
        // Not in the calendar list, so attributed to the primary calendar
        assert_eq!(event.source.unwrap().calendar_id, "alice@example.com");
    }

    #[test]
    fn test_attendee_defaults_and_source_attribution() {
        let event = convert(RemoteEvent {
            id: "e1".into(),
            start: timed("2025-06-01T10:00:00Z"),
            end: timed("2025-06-01T11:00:00Z"),
            organizer: Some(RemotePerson {
                email: Some("team@group.calendar.google.com".into()),
                display_name: None,
            }),
            attendees: vec![
                RemoteAttendee {
                    email: Some("bob@example.com".into()),
                    ..Default::default()
                },
                RemoteAttendee {
                    email: Some("carol@example.com".into()),
                    display_name: Some("Carol".into()),
                    response_status: Some("accepted".into()),
                    optional: Some(true),
                    organizer: Some(true),
                },
                RemoteAttendee::default(),
            ],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(event.attendees.len(), 2);
        assert_eq!(event.attendees[0].response_status, ResponseStatus::NeedsAction);
        assert!(!event.attendees[0].optional);
        assert!(!event.attendees[0].organizer);
        assert_eq!(event.attendees[1].response_status, ResponseStatus::Accepted);
        assert!(event.attendees[1].optional && event.attendees[1].organizer);

        let source = event.source.unwrap();
        assert_eq!(source.name, "Team");
        assert_eq!(source.background_color.as_deref(), Some("#f83a22"));
    }

    #[test]
    fn test_ingest_counts_skips() {
        let calendars = calendars();
        let directory = CalendarDirectory {
            calendars: &calendars,
            primary_id: "alice@example.com",
        };
        let batch = ingest_calendar(
            "u1",
            "alice@example.com",
            vec![
                RemoteEvent {
                    id: "ok".into(),
                    start: timed("2025-06-01T10:00:00Z"),
                    end: timed("2025-06-01T11:00:00Z"),
                    ..Default::default()
                },
                RemoteEvent {
                    id: "bad".into(),
                    start: timed("2025-06-01T25:00:00Z"),
                    end: timed("2025-06-01T11:00:00Z"),
                    ..Default::default()
                },
                RemoteEvent {
                    id: "empty".into(),
                    ..Default::default()
                },
            ],
            &directory,
            Utc::now(),
        );

        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.invalid_time, 1);
        assert_eq!(batch.missing_time, 1);
        assert_eq!(batch.skipped(), 2);
    }
}
