//! The remote calendar provider seam.
//!
//! A provider crate (e.g. `one-provider-google`) implements these traits.
//! Times are kept as the provider's raw strings here; parsing and validation
//! happen in the sync engine so bad data is dropped in one place.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::TokenGrant;
use crate::error::OneResult;

/// Google's alias for the user's main calendar
pub const PRIMARY_CALENDAR_ID: &str = "primary";

/// An entry of the user's calendar list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCalendar {
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub time_zone: Option<String>,
    pub background_color: Option<String>,
    pub primary: bool,
}

/// Metadata of a single calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCalendarDetails {
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemoteEventTime {
    pub date_time: Option<String>,
    /// All-day events only carry a date (YYYY-MM-DD)
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

impl RemoteEventTime {
    pub fn is_present(&self) -> bool {
        self.date_time.is_some() || self.date.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemotePerson {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemoteAttendee {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub response_status: Option<String>,
    pub optional: Option<bool>,
    pub organizer: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemoteEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<RemoteEventTime>,
    pub end: Option<RemoteEventTime>,
    pub status: Option<String>,
    pub color_id: Option<String>,
    pub organizer: Option<RemotePerson>,
    pub attendees: Vec<RemoteAttendee>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

/// Parameters of one `events.list` page request.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    /// Expand recurring events into instances
    pub single_events: bool,
    pub order_by_start_time: bool,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl EventQuery {
    pub fn with_page_token(&self, token: Option<String>) -> Self {
        EventQuery {
            page_token: token,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    pub events: Vec<RemoteEvent>,
    pub next_page_token: Option<String>,
}

/// An event body sent to the provider on insert/update.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub summary: String,
    /// `None` leaves the remote description as is; an empty string clears it
    pub description: Option<String>,
    /// RFC 3339
    pub start: String,
    pub end: String,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorDefinition {
    pub background: String,
    pub foreground: String,
}

/// Calendar operations bound to one access token.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn calendar(&self, calendar_id: &str) -> OneResult<RemoteCalendarDetails>;

    async fn calendar_list(&self) -> OneResult<Vec<RemoteCalendar>>;

    /// Fetch a single page of events.
    async fn events(&self, calendar_id: &str, query: &EventQuery) -> OneResult<EventPage>;

    async fn insert_event(&self, calendar_id: &str, draft: &EventDraft) -> OneResult<RemoteEvent>;

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
    ) -> OneResult<RemoteEvent>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> OneResult<()>;

    /// Event color id -> RGB palette
    async fn event_colors(&self) -> OneResult<HashMap<String, ColorDefinition>>;
}

/// Token endpoint plus a factory for token-bound API handles.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Exchange a refresh token for a new access token.
    /// A rejected refresh token must surface as `OneError::RefreshFailed`.
    async fn refresh_access_token(&self, refresh_token: &str) -> OneResult<TokenGrant>;

    fn calendar_api(&self, access_token: &str) -> Arc<dyn CalendarApi>;
}
