//! Scripted in-memory calendar provider and fixtures for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use chrono::{DateTime, Duration, TimeZone, Utc};

use one_core::credential::{Credential, TokenGrant};
use one_core::remote::{
    CalendarApi, CalendarProvider, ColorDefinition, EventDraft, EventPage, EventQuery,
    RemoteCalendar, RemoteCalendarDetails, RemoteEvent, RemoteEventTime, RemotePerson,
};
use one_core::store::{CredentialStore, Database, EventMirror};
use one_core::{OneError, OneResult};

pub const USER: &str = "user-1";
pub const PRIMARY: &str = "alice@example.com";

/// Fixed "now" so the sync window is predictable: 2025-01-01 .. 2026-12-31
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Refresh(String),
    Calendar(String),
    CalendarList,
    Events {
        calendar_id: String,
        query: EventQuery,
    },
    Insert(String, EventDraft),
    Update(String, String, EventDraft),
    Delete(String, String),
    Colors,
}

#[derive(Default)]
pub struct FakeState {
    pub calls: Vec<Call>,
    /// Access tokens the fake API accepts
    pub valid_tokens: HashSet<String>,
    /// Scripted refresh outcomes; when empty a fresh token is issued
    pub refresh_results: VecDeque<OneResult<TokenGrant>>,
    pub issued: usize,
    pub time_zone: Option<String>,
    pub calendar_list: Vec<RemoteCalendar>,
    /// Pages of events per calendar id
    pub pages: HashMap<String, Vec<Vec<RemoteEvent>>>,
    pub failing: HashMap<String, OneError>,
    /// Event ids known to the remote calendar, for update/delete
    pub remote_ids: HashSet<String>,
    /// Reject every access token, even freshly issued ones
    pub reject_all: bool,
}

#[derive(Clone, Default)]
pub struct FakeProvider {
    pub state: Arc<Mutex<FakeState>>,
    /// `events` calls wait while this is held
    pub gate: Arc<tokio::sync::Mutex<()>>,
    /// Notified whenever an `events` call arrives
    pub entered: Arc<Notify>,
}

impl FakeProvider {
    pub fn new(time_zone: &str) -> Self {
        let provider = FakeProvider::default();
        {
            let mut state = provider.state();
            state.time_zone = Some(time_zone.to_string());
            state.valid_tokens.insert("access-0".into());
            state.calendar_list = vec![listed(PRIMARY, "Alice", true)];
        }
        provider
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn network_calls(&self) -> usize {
        self.state().calls.len()
    }

    pub fn refresh_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Refresh(_)))
            .count()
    }

    pub fn set_events(&self, calendar_id: &str, pages: Vec<Vec<RemoteEvent>>) {
        self.state().pages.insert(calendar_id.to_string(), pages);
    }

    pub fn fail_calendar(&self, calendar_id: &str, err: OneError) {
        self.state().failing.insert(calendar_id.to_string(), err);
    }

    pub fn revoke_all_tokens(&self) {
        self.state().valid_tokens.clear();
    }

    pub fn as_provider(&self) -> Arc<dyn CalendarProvider> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl CalendarProvider for FakeProvider {
    async fn refresh_access_token(&self, refresh_token: &str) -> OneResult<TokenGrant> {
        let mut state = self.state();
        state.calls.push(Call::Refresh(refresh_token.to_string()));

        let result = match state.refresh_results.pop_front() {
            Some(result) => result,
            None => {
                state.issued += 1;
                Ok(TokenGrant {
                    access_token: format!("access-{}", state.issued),
                    refresh_token: None,
                    expires_in: Some(3600),
                })
            }
        };
        if let Ok(grant) = &result {
            state.valid_tokens.insert(grant.access_token.clone());
        }
        result
    }

    fn calendar_api(&self, access_token: &str) -> Arc<dyn CalendarApi> {
        Arc::new(FakeApi {
            token: access_token.to_string(),
            state: self.state.clone(),
            gate: self.gate.clone(),
            entered: self.entered.clone(),
        })
    }
}

struct FakeApi {
    token: String,
    state: Arc<Mutex<FakeState>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    entered: Arc<Notify>,
}

impl FakeApi {
    /// Record the call and reject unknown tokens.
    fn enter(&self, call: Call) -> OneResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.reject_all || !state.valid_tokens.contains(&self.token) {
            return Err(OneError::AccessTokenRejected("401 Unauthorized".into()));
        }
        Ok(state)
    }

    fn echo(id: &str, draft: &EventDraft) -> RemoteEvent {
        RemoteEvent {
            id: id.to_string(),
            summary: Some(draft.summary.clone()),
            description: draft.description.clone(),
            start: Some(RemoteEventTime {
                date_time: Some(draft.start.clone()),
                date: None,
                time_zone: draft.time_zone.clone(),
            }),
            end: Some(RemoteEventTime {
                date_time: Some(draft.end.clone()),
                date: None,
                time_zone: draft.time_zone.clone(),
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CalendarApi for FakeApi {
    async fn calendar(&self, calendar_id: &str) -> OneResult<RemoteCalendarDetails> {
        let state = self.enter(Call::Calendar(calendar_id.to_string()))?;
        Ok(RemoteCalendarDetails {
            id: PRIMARY.into(),
            summary: "Alice".into(),
            description: None,
            time_zone: state.time_zone.clone(),
        })
    }

    async fn calendar_list(&self) -> OneResult<Vec<RemoteCalendar>> {
        let state = self.enter(Call::CalendarList)?;
        Ok(state.calendar_list.clone())
    }

    async fn events(&self, calendar_id: &str, query: &EventQuery) -> OneResult<EventPage> {
        self.entered.notify_one();
        drop(self.gate.lock().await);

        let state = self.enter(Call::Events {
            calendar_id: calendar_id.to_string(),
            query: query.clone(),
        })?;
        if let Some(err) = state.failing.get(calendar_id) {
            return Err(err.clone());
        }

        let pages = state.pages.get(calendar_id).cloned().unwrap_or_default();
        let index = query
            .page_token
            .as_deref()
            .and_then(|t| t.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        Ok(EventPage {
            events: pages.get(index).cloned().unwrap_or_default(),
            next_page_token: (index + 1 < pages.len()).then(|| format!("page-{}", index + 1)),
        })
    }

    async fn insert_event(&self, calendar_id: &str, draft: &EventDraft) -> OneResult<RemoteEvent> {
        let mut state = self.enter(Call::Insert(calendar_id.to_string(), draft.clone()))?;
        let id = format!("created-{}", state.remote_ids.len() + 1);
        state.remote_ids.insert(id.clone());
        Ok(FakeApi::echo(&id, draft))
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
    ) -> OneResult<RemoteEvent> {
        let state = self.enter(Call::Update(
            calendar_id.to_string(),
            event_id.to_string(),
            draft.clone(),
        ))?;
        if !state.remote_ids.contains(event_id) {
            return Err(OneError::NotFound(format!("Event {event_id}")));
        }
        Ok(FakeApi::echo(event_id, draft))
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> OneResult<()> {
        let mut state = self.enter(Call::Delete(calendar_id.to_string(), event_id.to_string()))?;
        if !state.remote_ids.remove(event_id) {
            return Err(OneError::NotFound(format!("Event {event_id}")));
        }
        Ok(())
    }

    async fn event_colors(&self) -> OneResult<HashMap<String, ColorDefinition>> {
        self.enter(Call::Colors)?;
        Ok(HashMap::from([(
            "11".to_string(),
            ColorDefinition {
                background: "#dc2127".into(),
                foreground: "#1d1d1d".into(),
            },
        )]))
    }
}

pub fn listed(id: &str, summary: &str, primary: bool) -> RemoteCalendar {
    RemoteCalendar {
        id: id.into(),
        summary: summary.into(),
        description: None,
        time_zone: None,
        background_color: Some("#9fe1e7".into()),
        primary,
    }
}

pub fn timed_event(id: &str, summary: &str, start: DateTime<Utc>) -> RemoteEvent {
    RemoteEvent {
        id: id.into(),
        summary: Some(summary.into()),
        start: Some(RemoteEventTime {
            date_time: Some(start.to_rfc3339()),
            ..Default::default()
        }),
        end: Some(RemoteEventTime {
            date_time: Some((start + Duration::hours(1)).to_rfc3339()),
            ..Default::default()
        }),
        organizer: Some(RemotePerson {
            email: Some(PRIMARY.into()),
            display_name: None,
        }),
        ..Default::default()
    }
}

pub fn all_day_event(id: &str, summary: &str, date: &str, organizer: &str) -> RemoteEvent {
    let next = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .succ_opt()
        .unwrap();
    RemoteEvent {
        id: id.into(),
        summary: Some(summary.into()),
        start: Some(RemoteEventTime {
            date: Some(date.into()),
            ..Default::default()
        }),
        end: Some(RemoteEventTime {
            date: Some(next.format("%Y-%m-%d").to_string()),
            ..Default::default()
        }),
        organizer: Some(RemotePerson {
            email: Some(organizer.into()),
            display_name: None,
        }),
        ..Default::default()
    }
}

/// Five events on the primary calendar, one per day from June 2.
pub fn five_primary_events() -> Vec<RemoteEvent> {
    (0..5)
        .map(|i| {
            timed_event(
                &format!("evt-{i}"),
                &format!("Meeting {i}"),
                Utc.with_ymd_and_hms(2025, 6, 2 + i, 9, 0, 0).unwrap(),
            )
        })
        .collect()
}

pub struct Harness {
    pub db: Database,
    pub credentials: Arc<dyn CredentialStore>,
    pub mirror: Arc<dyn EventMirror>,
    pub provider: FakeProvider,
}

impl Harness {
    pub fn new(time_zone: &str) -> Self {
        let db = Database::open_in_memory().unwrap();
        Harness {
            credentials: Arc::new(db.credential_store()),
            mirror: Arc::new(db.event_mirror()),
            db,
            provider: FakeProvider::new(time_zone),
        }
    }

    /// Store a credential whose access token the fake accepts.
    pub async fn link(&self, refresh_token: Option<&str>) -> Credential {
        self.link_with(Credential {
            user_id: USER.into(),
            access_token: "access-0".into(),
            refresh_token: refresh_token.map(String::from),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            updated_at: Utc::now(),
        })
        .await
    }

    pub async fn link_with(&self, credential: Credential) -> Credential {
        self.credentials.link(&credential).await.unwrap()
    }
}
