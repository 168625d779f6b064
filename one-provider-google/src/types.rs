//! Wire types of the Google Calendar v3 and OAuth2 JSON bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Calendars
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    /// User-chosen display name, preferred over `summary` when set
    pub summary_override: Option<String>,
    pub description: Option<String>,
    pub time_zone: Option<String>,
    pub background_color: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarList {
    #[serde(default)]
    pub items: Vec<GoogleCalendarListEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendar {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub description: Option<String>,
    pub time_zone: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePerson {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAttendee {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub response_status: Option<String>,
    pub optional: Option<bool>,
    pub organizer: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<GoogleEventDateTime>,
    pub end: Option<GoogleEventDateTime>,
    pub status: Option<String>,
    pub color_id: Option<String>,
    pub organizer: Option<GooglePerson>,
    #[serde(default)]
    pub attendees: Vec<GoogleAttendee>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

/// Body of an insert or patch request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventBody {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: GoogleEventDateTime,
    pub end: GoogleEventDateTime,
}

// =============================================================================
// Colors
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleColor {
    pub background: String,
    pub foreground: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleColors {
    #[serde(default)]
    pub event: HashMap<String, GoogleColor>,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleErrorReason {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleErrorDetail {
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
    #[serde(default)]
    pub errors: Vec<GoogleErrorReason>,
    #[serde(default)]
    pub details: Vec<GoogleErrorReason>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub error: GoogleErrorDetail,
}

// =============================================================================
// OAuth2
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenErrorResponse {
    #[serde(default)]
    pub error: String,
    pub error_description: Option<String>,
}
