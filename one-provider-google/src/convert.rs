//! Conversions between Google wire types and the provider-neutral remote types.

use one_core::remote::{
    EventDraft, RemoteAttendee, RemoteCalendar, RemoteCalendarDetails, RemoteEvent,
    RemoteEventTime, RemotePerson,
};

use crate::types::{
    GoogleCalendar, GoogleCalendarListEntry, GoogleEvent, GoogleEventBody, GoogleEventDateTime,
};

impl From<GoogleCalendarListEntry> for RemoteCalendar {
    fn from(entry: GoogleCalendarListEntry) -> Self {
        RemoteCalendar {
            summary: entry
                .summary_override
                .filter(|s| !s.is_empty())
                .unwrap_or(entry.summary),
            id: entry.id,
            description: entry.description,
            time_zone: entry.time_zone,
            background_color: entry.background_color,
            primary: entry.primary,
        }
    }
}

impl From<GoogleCalendar> for RemoteCalendarDetails {
    fn from(calendar: GoogleCalendar) -> Self {
        RemoteCalendarDetails {
            id: calendar.id,
            summary: calendar.summary,
            description: calendar.description,
            time_zone: calendar.time_zone,
        }
    }
}

impl From<GoogleEventDateTime> for RemoteEventTime {
    fn from(time: GoogleEventDateTime) -> Self {
        RemoteEventTime {
            date_time: time.date_time,
            date: time.date,
            time_zone: time.time_zone,
        }
    }
}

impl From<GoogleEvent> for RemoteEvent {
    fn from(event: GoogleEvent) -> Self {
        RemoteEvent {
            id: event.id,
            summary: event.summary,
            description: event.description,
            location: event.location,
            start: event.start.map(Into::into),
            end: event.end.map(Into::into),
            status: event.status,
            color_id: event.color_id,
            organizer: event.organizer.map(|o| RemotePerson {
                email: o.email,
                display_name: o.display_name,
            }),
            attendees: event
                .attendees
                .into_iter()
                .map(|a| RemoteAttendee {
                    email: a.email,
                    display_name: a.display_name,
                    response_status: a.response_status,
                    optional: a.optional,
                    organizer: a.organizer,
                })
                .collect(),
            created: event.created,
            updated: event.updated,
        }
    }
}

impl From<&EventDraft> for GoogleEventBody {
    fn from(draft: &EventDraft) -> Self {
        let time = |date_time: &str| GoogleEventDateTime {
            date_time: Some(date_time.to_string()),
            date: None,
            time_zone: draft.time_zone.clone(),
        };

        GoogleEventBody {
            summary: draft.summary.clone(),
            description: draft.description.clone(),
            start: time(&draft.start),
            end: time(&draft.end),
        }
    }
}
