//! Google Calendar v3 REST calls bound to one access token.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::SecondsFormat;
use one_core::remote::{
    CalendarApi, ColorDefinition, EventDraft, EventPage, EventQuery, RemoteCalendar,
    RemoteCalendarDetails, RemoteEvent,
};
use one_core::{OneError, OneResult};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error;
use crate::types::{GoogleCalendar, GoogleCalendarList, GoogleColors, GoogleEvent, GoogleEventBody, GoogleEventList};

pub struct GoogleCalendarApi {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl GoogleCalendarApi {
    pub fn new(http: reqwest::Client, base_url: Url, access_token: &str) -> Self {
        GoogleCalendarApi {
            http,
            base_url,
            access_token: access_token.to_string(),
        }
    }

    /// Append percent-encoded path segments to the API base URL.
    fn endpoint(&self, segments: &[&str]) -> OneResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OneError::Provider(format!("Invalid API base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> OneResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| error::transport(e, what))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(%status, what, "Google API request failed");
        Err(error::classify(status, &body, what))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> OneResult<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| OneError::Provider(format!("{what}: unexpected response: {e}")))
    }
}

fn timestamp(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl CalendarApi for GoogleCalendarApi {
    async fn calendar(&self, calendar_id: &str) -> OneResult<RemoteCalendarDetails> {
        let url = self.endpoint(&["calendars", calendar_id])?;
        let calendar: GoogleCalendar = self
            .send_json(self.http.get(url), &format!("Calendar {calendar_id}"))
            .await?;
        Ok(calendar.into())
    }

    async fn calendar_list(&self) -> OneResult<Vec<RemoteCalendar>> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(url.clone());
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: GoogleCalendarList = self.send_json(request, "Calendar list").await?;
            calendars.extend(page.items.into_iter().map(RemoteCalendar::from));

            match page.next_page_token {
                Some(next) if page_token.as_ref() != Some(&next) => page_token = Some(next),
                Some(next) => {
                    return Err(OneError::Provider(format!(
                        "Calendar list: page token {next} repeated"
                    )));
                }
                None => break,
            }
        }

        Ok(calendars)
    }

    async fn events(&self, calendar_id: &str, query: &EventQuery) -> OneResult<EventPage> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;

        let mut params: Vec<(&str, String)> = vec![
            ("timeMin", timestamp(&query.time_min)),
            ("timeMax", timestamp(&query.time_max)),
            ("singleEvents", query.single_events.to_string()),
        ];
        if query.order_by_start_time {
            params.push(("orderBy", "startTime".to_string()));
        }
        if let Some(max) = query.max_results {
            params.push(("maxResults", max.to_string()));
        }
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.clone()));
        }

        let list: GoogleEventList = self
            .send_json(
                self.http.get(url).query(&params),
                &format!("Events of {calendar_id}"),
            )
            .await?;

        Ok(EventPage {
            events: list.items.into_iter().map(RemoteEvent::from).collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn insert_event(&self, calendar_id: &str, draft: &EventDraft) -> OneResult<RemoteEvent> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let event: GoogleEvent = self
            .send_json(
                self.http.post(url).json(&GoogleEventBody::from(draft)),
                &format!("Create event {}", draft.summary),
            )
            .await?;
        Ok(event.into())
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
    ) -> OneResult<RemoteEvent> {
        let url = self.endpoint(&["calendars", calendar_id, "events", event_id])?;
        // PATCH keeps attendees, reminders and the rest of the remote event intact
        let event: GoogleEvent = self
            .send_json(
                self.http.patch(url).json(&GoogleEventBody::from(draft)),
                &format!("Event {event_id}"),
            )
            .await?;
        Ok(event.into())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> OneResult<()> {
        let url = self.endpoint(&["calendars", calendar_id, "events", event_id])?;
        self.send(self.http.delete(url), &format!("Event {event_id}"))
            .await?;
        Ok(())
    }

    async fn event_colors(&self) -> OneResult<HashMap<String, ColorDefinition>> {
        let url = self.endpoint(&["colors"])?;
        let colors: GoogleColors = self.send_json(self.http.get(url), "Colors").await?;

        Ok(colors
            .event
            .into_iter()
            .map(|(id, c)| {
                (
                    id,
                    ColorDefinition {
                        background: c.background,
                        foreground: c.foreground,
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> GoogleCalendarApi {
        GoogleCalendarApi::new(reqwest::Client::new(), Url::parse(base).unwrap(), "token")
    }

    #[test]
    fn test_endpoint_encodes_calendar_ids() {
        let api = api("https://www.googleapis.com/calendar/v3");

        let url = api
            .endpoint(&["calendars", "en.usa#holiday@group.v.calendar.google.com", "events"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/en.usa%23holiday@group.v.calendar.google.com/events"
        );
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let api = api("http://127.0.0.1:1234/");

        let url = api.endpoint(&["colors"]).unwrap();

        assert_eq!(url.as_str(), "http://127.0.0.1:1234/colors");
    }
}
