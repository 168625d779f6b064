//! Calendar metadata cached per user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a user's primary calendar.
///
/// `time_zone` drives holiday calendar selection and the zone attached to
/// new events, so it is cached to save a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarMetadata {
    /// Remote calendar id
    pub id: String,
    pub user_id: String,
    pub summary: String,
    pub description: Option<String>,
    pub time_zone: String,
    pub created_at: DateTime<Utc>,
    /// Doubles as the time of the last full sync
    pub updated_at: DateTime<Utc>,
}
