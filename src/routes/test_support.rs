//! In-memory state and a canned calendar provider for route tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use one_core::credential::{Credential, TokenGrant};
use one_core::remote::{
    CalendarApi, CalendarProvider, ColorDefinition, EventDraft, EventPage, EventQuery,
    RemoteCalendar, RemoteCalendarDetails, RemoteEvent, RemoteEventTime, RemotePerson,
};
use one_core::store::Database;
use one_core::{OneError, OneResult};
use tower::ServiceExt;

use crate::session::USER_ID_HEADER;
use crate::state::AppState;

pub const USER: &str = "user-1";
pub const PRIMARY: &str = "alice@example.com";

/// Accepts any token and serves one calendar with one event.
pub struct StubProvider;

#[async_trait]
impl CalendarProvider for StubProvider {
    async fn refresh_access_token(&self, _refresh_token: &str) -> OneResult<TokenGrant> {
        Ok(TokenGrant {
            access_token: "access-refreshed".into(),
            refresh_token: None,
            expires_in: Some(3600),
        })
    }

    fn calendar_api(&self, _access_token: &str) -> Arc<dyn CalendarApi> {
        Arc::new(StubApi)
    }
}

struct StubApi;

fn time(value: &str) -> Option<RemoteEventTime> {
    Some(RemoteEventTime {
        date_time: Some(value.to_string()),
        ..Default::default()
    })
}

#[async_trait]
impl CalendarApi for StubApi {
    async fn calendar(&self, _calendar_id: &str) -> OneResult<RemoteCalendarDetails> {
        Ok(RemoteCalendarDetails {
            id: PRIMARY.into(),
            summary: "Alice".into(),
            description: None,
            time_zone: Some("Europe/Berlin".into()),
        })
    }

    async fn calendar_list(&self) -> OneResult<Vec<RemoteCalendar>> {
        Ok(vec![RemoteCalendar {
            id: PRIMARY.into(),
            summary: "Alice".into(),
            description: None,
            time_zone: Some("Europe/Berlin".into()),
            background_color: Some("#9fe1e7".into()),
            primary: true,
        }])
    }

    async fn events(&self, calendar_id: &str, _query: &EventQuery) -> OneResult<EventPage> {
        if calendar_id != PRIMARY {
            return Ok(EventPage::default());
        }
        Ok(EventPage {
            events: vec![RemoteEvent {
                id: "evt-1".into(),
                summary: Some("Planning".into()),
                start: time("2025-06-02T09:00:00+02:00"),
                end: time("2025-06-02T10:00:00+02:00"),
                organizer: Some(RemotePerson {
                    email: Some(PRIMARY.into()),
                    display_name: None,
                }),
                ..Default::default()
            }],
            next_page_token: None,
        })
    }

    async fn insert_event(&self, _calendar_id: &str, draft: &EventDraft) -> OneResult<RemoteEvent> {
        Ok(RemoteEvent {
            id: "created-1".into(),
            summary: Some(draft.summary.clone()),
            description: draft.description.clone(),
            start: time(&draft.start),
            end: time(&draft.end),
            ..Default::default()
        })
    }

    async fn update_event(
        &self,
        _calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
    ) -> OneResult<RemoteEvent> {
        if event_id == "ghost" {
            return Err(OneError::NotFound(format!("Event {event_id}")));
        }
        Ok(RemoteEvent {
            id: event_id.into(),
            summary: Some(draft.summary.clone()),
            start: time(&draft.start),
            end: time(&draft.end),
            ..Default::default()
        })
    }

    async fn delete_event(&self, _calendar_id: &str, event_id: &str) -> OneResult<()> {
        Err(OneError::NotFound(format!("Event {event_id}")))
    }

    async fn event_colors(&self) -> OneResult<HashMap<String, ColorDefinition>> {
        Ok(HashMap::from([(
            "11".to_string(),
            ColorDefinition {
                background: "#dc2127".into(),
                foreground: "#1d1d1d".into(),
            },
        )]))
    }
}

pub fn test_state() -> AppState {
    let db = Database::open_in_memory().unwrap();
    AppState::from_parts(
        Arc::new(db.credential_store()),
        Arc::new(db.event_mirror()),
        Arc::new(StubProvider),
        Duration::minutes(5),
    )
}

/// State with a linked Google account for `USER`.
pub async fn linked_state(refresh_token: Option<&str>) -> AppState {
    let state = test_state();
    state
        .credentials
        .link(&Credential {
            user_id: USER.into(),
            access_token: "access-0".into(),
            refresh_token: refresh_token.map(String::from),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    state
}

pub fn app(state: AppState) -> Router {
    super::router().with_state(state)
}

/// Send one request as `user` (anonymous when `None`) and decode the JSON body.
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header(USER_ID_HEADER, user);
    }
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    respond(app, request).await
}

/// Send a JSON-typed request with a raw, possibly malformed, body.
pub async fn send_raw(
    app: Router,
    method: Method,
    uri: &str,
    user: &str,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_ID_HEADER, user)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    respond(app, request).await
}

async fn respond(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
