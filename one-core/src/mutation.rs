//! The mutation gateway: single-event writes against the primary calendar.
//!
//! Writes go to the remote calendar only. The mirror catches up on the next sync.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::client::CalendarClient;
use crate::error::{OneError, OneResult};
use crate::event::EventInput;
use crate::remote::{CalendarProvider, EventDraft, PRIMARY_CALENDAR_ID, RemoteEvent};
use crate::store::{CredentialStore, EventMirror};

pub struct EventGateway {
    credentials: Arc<dyn CredentialStore>,
    mirror: Arc<dyn EventMirror>,
    provider: Arc<dyn CalendarProvider>,
}

impl EventGateway {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        mirror: Arc<dyn EventMirror>,
        provider: Arc<dyn CalendarProvider>,
    ) -> Self {
        EventGateway {
            credentials,
            mirror,
            provider,
        }
    }

    async fn connect(&self, user_id: &str) -> OneResult<CalendarClient> {
        let connected =
            CalendarClient::connect(user_id, self.credentials.clone(), self.provider.clone())
                .await?;
        Ok(connected.client)
    }

    /// Create one event on the primary calendar.
    pub async fn create(&self, user_id: &str, input: &EventInput) -> OneResult<RemoteEvent> {
        validate(input)?;

        let client = self.connect(user_id).await?;
        let draft = self.draft(user_id, &client, input).await?;
        let created = client.insert_event(PRIMARY_CALENDAR_ID, &draft).await?;

        info!(user_id, event_id = %created.id, "Created event");
        Ok(created)
    }

    /// Replace the fields of an existing event. `NotFound` if it does not exist remotely.
    pub async fn update(
        &self,
        user_id: &str,
        event_id: &str,
        input: &EventInput,
    ) -> OneResult<RemoteEvent> {
        validate(input)?;
        require_event_id(event_id)?;

        let client = self.connect(user_id).await?;
        let draft = self.draft(user_id, &client, input).await?;
        let updated = client
            .update_event(PRIMARY_CALENDAR_ID, event_id, &draft)
            .await?;

        info!(user_id, event_id, "Updated event");
        Ok(updated)
    }

    /// Delete an event. An event that is already gone counts as deleted.
    pub async fn delete(&self, user_id: &str, event_id: &str) -> OneResult<()> {
        require_event_id(event_id)?;

        let client = self.connect(user_id).await?;
        match client.delete_event(PRIMARY_CALENDAR_ID, event_id).await {
            Ok(()) => {
                info!(user_id, event_id, "Deleted event");
                Ok(())
            }
            Err(OneError::NotFound(_)) => {
                debug!(user_id, event_id, "Event already deleted");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn draft(
        &self,
        user_id: &str,
        client: &CalendarClient,
        input: &EventInput,
    ) -> OneResult<EventDraft> {
        let time_zone = self.primary_time_zone(user_id, client).await?;
        Ok(draft_in_zone(input, &time_zone))
    }

    /// The cached primary calendar zone, else the remote one.
    async fn primary_time_zone(&self, user_id: &str, client: &CalendarClient) -> OneResult<String> {
        if let Some(calendar) = self.mirror.calendar_for_user(user_id).await? {
            if !calendar.time_zone.trim().is_empty() {
                return Ok(calendar.time_zone);
            }
        }

        let details = client.calendar(PRIMARY_CALENDAR_ID).await?;
        Ok(details.time_zone.unwrap_or_default())
    }
}

fn validate(input: &EventInput) -> OneResult<()> {
    input.validate()?;
    if input.summary.trim().is_empty() {
        return Err(OneError::InvalidInput("Event summary is required".into()));
    }
    Ok(())
}

fn require_event_id(event_id: &str) -> OneResult<()> {
    if event_id.trim().is_empty() {
        return Err(OneError::InvalidInput("Event id is required".into()));
    }
    Ok(())
}

/// Express start and end in the calendar's zone and name the zone explicitly.
/// Unknown zones keep the caller's offsets and send no zone name.
fn draft_in_zone(input: &EventInput, time_zone: &str) -> EventDraft {
    let (start, end, time_zone) = match time_zone.parse::<Tz>() {
        Ok(tz) => (
            input.start.with_timezone(&tz).to_rfc3339(),
            input.end.with_timezone(&tz).to_rfc3339(),
            Some(tz.name().to_string()),
        ),
        Err(_) => {
            if !time_zone.is_empty() {
                warn!(time_zone, "Unknown calendar time zone, sending offsets only");
            }
            (input.start.to_rfc3339(), input.end.to_rfc3339(), None)
        }
    };

    EventDraft {
        summary: input.summary.trim().to_string(),
        description: input.description.clone(),
        start,
        end,
        time_zone,
    }
}
