//! The sync engine: pulls every relevant remote calendar into the mirror.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join, try_join_all};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::calendar::CalendarMetadata;
use crate::client::{CalendarClient, Connected};
use crate::date_range::SyncWindow;
use crate::error::{OneError, OneResult};
use crate::event::MirrorEvent;
use crate::holiday::{holiday_calendar_for, is_holiday_calendar};
use crate::ingest::{CalendarDirectory, ingest_calendar};
use crate::remote::{
    CalendarProvider, ColorDefinition, EventQuery, PRIMARY_CALENDAR_ID, RemoteCalendar,
    RemoteEvent,
};
use crate::store::{CredentialStore, EventMirror};

/// Page size requested for the primary calendar
const PRIMARY_PAGE_SIZE: u32 = 2500;

/// Zone assumed when the provider reports none
const DEFAULT_TIME_ZONE: &str = "UTC";

/// Mirror contents after a sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub events: Vec<MirrorEvent>,
    pub calendar: CalendarMetadata,
    #[serde(skip)]
    pub report: SyncReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub calendars: usize,
    pub fetched: usize,
    pub stored: usize,
    pub skipped: usize,
    pub pruned: usize,
    pub holiday_available: bool,
}

/// The user's calendar list alongside the cached primary calendar metadata.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarListing {
    pub calendars: Vec<RemoteCalendar>,
    pub primary: Option<CalendarMetadata>,
}

/// A calendar to fetch during a sync.
#[derive(Debug, Clone, PartialEq)]
struct Target {
    calendar_id: String,
    primary: bool,
    /// Holiday calendars are best effort
    holiday: bool,
}

struct Fetched {
    calendar_id: String,
    events: Vec<RemoteEvent>,
}

/// One async mutex per user so syncs for the same user run one after another.
#[derive(Default)]
struct UserLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn for_user(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop locks nobody is holding or waiting on
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

pub struct SyncEngine {
    credentials: Arc<dyn CredentialStore>,
    mirror: Arc<dyn EventMirror>,
    provider: Arc<dyn CalendarProvider>,
    locks: UserLocks,
}

impl SyncEngine {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        mirror: Arc<dyn EventMirror>,
        provider: Arc<dyn CalendarProvider>,
    ) -> Self {
        SyncEngine {
            credentials,
            mirror,
            provider,
            locks: UserLocks::default(),
        }
    }

    pub fn mirror(&self) -> &Arc<dyn EventMirror> {
        &self.mirror
    }

    async fn connect(&self, user_id: &str) -> OneResult<CalendarClient> {
        let Connected { client, rotated } =
            CalendarClient::connect(user_id, self.credentials.clone(), self.provider.clone())
                .await?;
        if rotated.is_some() {
            debug!(user_id, "Credential refreshed on connect");
        }
        Ok(client)
    }

    /// Sync the user's calendars into the mirror and return the fresh mirror contents.
    pub async fn sync(&self, user_id: &str) -> OneResult<SyncOutcome> {
        self.sync_at(user_id, Utc::now()).await
    }

    /// Sync with the window computed around `now`.
    pub async fn sync_at(&self, user_id: &str, now: DateTime<Utc>) -> OneResult<SyncOutcome> {
        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        let client = self.connect(user_id).await?;

        let details = client.calendar(PRIMARY_CALENDAR_ID).await?;
        let time_zone = details
            .time_zone
            .clone()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());
        let holiday_id = holiday_calendar_for(&time_zone);

        let calendars = client.calendar_list().await?;
        let window = SyncWindow::around(now);
        let targets = plan_targets(&details.id, &calendars, holiday_id);
        debug!(user_id, %time_zone, holiday_id, targets = targets.len(), "Planned sync");

        let (required, best_effort): (Vec<&Target>, Vec<&Target>) =
            targets.iter().partition(|t| !t.holiday);

        let required_fetch = try_join_all(
            required
                .iter()
                .map(|target| fetch_calendar(&client, target, &window)),
        );
        // Holiday failures never fail the join; they are sorted out below
        let best_effort_fetch = async {
            Ok::<_, OneError>(
                join_all(
                    best_effort
                        .iter()
                        .map(|target| fetch_calendar(&client, target, &window)),
                )
                .await,
            )
        };
        let (mut fetched, holiday_results) = try_join(required_fetch, best_effort_fetch).await?;

        let mut holiday_available = true;
        for (target, result) in best_effort.iter().zip(holiday_results) {
            match result {
                Ok(calendar) => fetched.push(calendar),
                // A dead credential fails the whole sync, holiday or not
                Err(
                    err @ (OneError::AccountNotConnected
                    | OneError::RefreshTokenMissing
                    | OneError::RefreshFailed(_)),
                ) => return Err(err),
                Err(err) => {
                    let err = OneError::Transient(err.to_string());
                    warn!(
                        user_id,
                        calendar_id = %target.calendar_id,
                        error = %err,
                        "Holiday calendar unavailable, continuing without it"
                    );
                    holiday_available = false;
                }
            }
        }

        let directory = CalendarDirectory {
            calendars: &calendars,
            primary_id: &details.id,
        };

        let mut report = SyncReport {
            calendars: fetched.len(),
            holiday_available,
            ..Default::default()
        };
        let mut rows = Vec::new();
        let mut returned: Vec<(String, HashSet<String>)> = Vec::with_capacity(fetched.len());

        for Fetched {
            calendar_id,
            events,
        } in fetched
        {
            report.fetched += events.len();
            let batch = ingest_calendar(user_id, &calendar_id, events, &directory, now);
            report.skipped += batch.skipped();
            returned.push((
                calendar_id,
                batch.events.iter().map(|e| e.id.clone()).collect(),
            ));
            rows.extend(batch.events);
        }

        report.stored = self.mirror.upsert_events(user_id, &rows).await?;
        for (calendar_id, keep) in &returned {
            report.pruned += self
                .mirror
                .prune_calendar(user_id, calendar_id, &window, keep)
                .await?;
        }
        // Calendars that left the plan; a degraded holiday calendar stays in it
        let planned: HashSet<String> = targets.iter().map(|t| t.calendar_id.clone()).collect();
        report.pruned += self
            .mirror
            .prune_except(user_id, &planned, &window)
            .await?;

        let calendar = self
            .mirror
            .upsert_calendar(&CalendarMetadata {
                id: details.id,
                user_id: user_id.to_string(),
                summary: details.summary,
                description: details.description,
                time_zone,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let events = self.mirror.events_for_user(user_id).await?;

        info!(
            user_id,
            calendars = report.calendars,
            fetched = report.fetched,
            stored = report.stored,
            skipped = report.skipped,
            pruned = report.pruned,
            holiday_available = report.holiday_available,
            "Calendar sync complete"
        );

        Ok(SyncOutcome {
            events,
            calendar,
            report,
        })
    }

    /// Unlink the user's account and clear their mirror.
    ///
    /// Waits for any in-flight sync of the user so its writes cannot land
    /// after the clear. Returns whether a credential existed.
    pub async fn forget(&self, user_id: &str) -> OneResult<bool> {
        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        let removed = self.credentials.unlink(user_id).await?;
        self.mirror.clear_user(user_id).await?;
        info!(user_id, removed, "Forgot user");
        Ok(removed)
    }

    /// The user's remote calendar list and cached primary calendar metadata.
    pub async fn list_calendars(&self, user_id: &str) -> OneResult<CalendarListing> {
        let client = self.connect(user_id).await?;
        let calendars = client.calendar_list().await?;
        let primary = self.mirror.calendar_for_user(user_id).await?;
        Ok(CalendarListing { calendars, primary })
    }

    /// The provider's event color palette.
    pub async fn colors(&self, user_id: &str) -> OneResult<HashMap<String, ColorDefinition>> {
        let client = self.connect(user_id).await?;
        client.event_colors().await
    }
}

/// Primary calendar first, then the rest of the calendar list, then the
/// holiday calendar. Each calendar id appears once.
fn plan_targets(primary_id: &str, calendars: &[RemoteCalendar], holiday_id: &str) -> Vec<Target> {
    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(calendars.len() + 2);

    let primary = std::iter::once((primary_id, true));
    let listed = calendars.iter().map(|c| (c.id.as_str(), c.primary));
    let holiday = std::iter::once((holiday_id, false));

    for (calendar_id, primary) in primary.chain(listed).chain(holiday) {
        if calendar_id.is_empty() || !seen.insert(calendar_id) {
            continue;
        }
        targets.push(Target {
            calendar_id: calendar_id.to_string(),
            primary,
            holiday: is_holiday_calendar(calendar_id),
        });
    }

    targets
}

/// Fetch every page of a calendar's events inside the window.
async fn fetch_calendar(
    client: &CalendarClient,
    target: &Target,
    window: &SyncWindow,
) -> OneResult<Fetched> {
    let query = EventQuery {
        time_min: window.time_min,
        time_max: window.time_max,
        single_events: true,
        order_by_start_time: true,
        max_results: target.primary.then_some(PRIMARY_PAGE_SIZE),
        page_token: None,
    };

    let mut events = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = client
            .events(&target.calendar_id, &query.with_page_token(page_token.clone()))
            .await?;
        pages += 1;
        events.extend(page.events);

        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(next) if Some(&next) == page_token.as_ref() => {
                return Err(OneError::Provider(format!(
                    "Calendar {} returned the same page token twice",
                    target.calendar_id
                )));
            }
            Some(next) => page_token = Some(next),
            None => break,
        }
    }

    debug!(calendar_id = %target.calendar_id, pages, events = events.len(), "Fetched calendar");

    Ok(Fetched {
        calendar_id: target.calendar_id.clone(),
        events,
    })
}
