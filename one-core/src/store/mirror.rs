use std::collections::HashSet;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, Transaction, named_params, params};

use super::{Database, EventMirror, format_timestamp, parse_timestamp, parse_timestamp_opt};
use crate::calendar::CalendarMetadata;
use crate::color::EventColor;
use crate::date_range::SyncWindow;
use crate::error::OneResult;
use crate::event::{EventSource, EventStatus, MirrorEvent};

/// Rows Google returns for a `timeMin`/`timeMax` query: ending after the
/// start of the window and starting before its end.
const OVERLAPS_WINDOW: &str = "end_time > :min AND start_time < :max";

const EVENT_COLUMNS: &str = "id, user_id, calendar_id, summary, description, location, start_time, end_time, \
     all_day, attendees, status, color_id, color, source, event_created_at, event_updated_at, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteEventMirror {
    db: Database,
}

impl SqliteEventMirror {
    pub fn new(db: Database) -> Self {
        SqliteEventMirror { db }
    }
}

fn json_column<T: serde::de::DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_event(row: &Row) -> rusqlite::Result<MirrorEvent> {
    let start_time: String = row.get(6)?;
    let end_time: String = row.get(7)?;
    let attendees: String = row.get(9)?;
    let status: String = row.get(10)?;
    let color: String = row.get(12)?;
    let source: Option<String> = row.get(13)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;

    Ok(MirrorEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        calendar_id: row.get(2)?,
        summary: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        start_time: parse_timestamp(6, &start_time)?,
        end_time: parse_timestamp(7, &end_time)?,
        all_day: row.get(8)?,
        attendees: json_column(9, &attendees)?,
        status: EventStatus::from_google(&status),
        color_id: row.get(11)?,
        color: EventColor::parse(&color).unwrap_or_default(),
        source: source
            .map(|s| json_column::<EventSource>(13, &s))
            .transpose()?,
        event_created_at: parse_timestamp_opt(14, row.get(14)?)?,
        event_updated_at: parse_timestamp_opt(15, row.get(15)?)?,
        created_at: parse_timestamp(16, &created_at)?,
        updated_at: parse_timestamp(17, &updated_at)?,
    })
}

fn delete_ids(tx: &Transaction, user_id: &str, ids: &[String]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare("DELETE FROM events WHERE user_id = ?1 AND id = ?2")?;
    for id in ids {
        stmt.execute(params![user_id, id])?;
    }
    Ok(())
}

fn row_to_calendar(row: &Row) -> rusqlite::Result<CalendarMetadata> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(CalendarMetadata {
        id: row.get(0)?,
        user_id: row.get(1)?,
        summary: row.get(2)?,
        description: row.get(3)?,
        time_zone: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
        updated_at: parse_timestamp(6, &updated_at)?,
    })
}

#[async_trait]
impl EventMirror for SqliteEventMirror {
    async fn upsert_events(&self, user_id: &str, events: &[MirrorEvent]) -> OneResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let user_id = user_id.to_string();
        let events = events.to_vec();

        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                let mut written = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO events (id, user_id, calendar_id, summary, description, location,
                             start_time, end_time, all_day, attendees, status, color_id, color, source,
                             event_created_at, event_updated_at, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                         ON CONFLICT(user_id, id) DO UPDATE SET
                             calendar_id = excluded.calendar_id,
                             summary = excluded.summary,
                             description = excluded.description,
                             location = excluded.location,
                             start_time = excluded.start_time,
                             end_time = excluded.end_time,
                             all_day = excluded.all_day,
                             attendees = excluded.attendees,
                             status = excluded.status,
                             color_id = excluded.color_id,
                             color = excluded.color,
                             source = excluded.source,
                             event_created_at = excluded.event_created_at,
                             event_updated_at = excluded.event_updated_at,
                             updated_at = excluded.updated_at",
                    )?;

                    for event in &events {
                        let source = event.source.as_ref().map(serde_json::to_string).transpose()?;
                        written += stmt.execute(params![
                            event.id,
                            user_id,
                            event.calendar_id,
                            event.summary,
                            event.description,
                            event.location,
                            format_timestamp(&event.start_time),
                            format_timestamp(&event.end_time),
                            event.all_day,
                            serde_json::to_string(&event.attendees)?,
                            event.status.as_str(),
                            event.color_id,
                            event.color.as_str(),
                            source,
                            event.event_created_at.as_ref().map(format_timestamp),
                            event.event_updated_at.as_ref().map(format_timestamp),
                            format_timestamp(&event.created_at),
                            format_timestamp(&event.updated_at),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(written)
            })
            .await
    }

    async fn prune_calendar(
        &self,
        user_id: &str,
        calendar_id: &str,
        window: &SyncWindow,
        keep: &HashSet<String>,
    ) -> OneResult<usize> {
        let user_id = user_id.to_string();
        let calendar_id = calendar_id.to_string();
        let window = *window;
        let keep = keep.clone();

        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                let stale: Vec<String> = {
                    let mut stmt = tx.prepare(&format!(
                        "SELECT id FROM events
                         WHERE user_id = :user AND calendar_id = :calendar AND {OVERLAPS_WINDOW}"
                    ))?;
                    let ids = stmt.query_map(
                        named_params! {
                            ":user": user_id,
                            ":calendar": calendar_id,
                            ":min": format_timestamp(&window.time_min),
                            ":max": format_timestamp(&window.time_max),
                        },
                        |row| row.get::<_, String>(0),
                    )?;
                    ids.filter(|id| !matches!(id, Ok(id) if keep.contains(id)))
                        .collect::<rusqlite::Result<_>>()?
                };

                delete_ids(&tx, &user_id, &stale)?;
                tx.commit()?;
                Ok(stale.len())
            })
            .await
    }

    async fn prune_except(
        &self,
        user_id: &str,
        calendar_ids: &HashSet<String>,
        window: &SyncWindow,
    ) -> OneResult<usize> {
        let user_id = user_id.to_string();
        let calendar_ids = calendar_ids.clone();
        let window = *window;

        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                let stale: Vec<String> = {
                    let mut stmt = tx.prepare(&format!(
                        "SELECT id, calendar_id FROM events WHERE user_id = :user AND {OVERLAPS_WINDOW}"
                    ))?;
                    let rows = stmt.query_map(
                        named_params! {
                            ":user": user_id,
                            ":min": format_timestamp(&window.time_min),
                            ":max": format_timestamp(&window.time_max),
                        },
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                    )?;
                    rows.filter(|row| {
                        !matches!(row, Ok((_, calendar_id)) if calendar_ids.contains(calendar_id))
                    })
                    .map(|row| row.map(|(id, _)| id))
                    .collect::<rusqlite::Result<_>>()?
                };

                delete_ids(&tx, &user_id, &stale)?;
                tx.commit()?;
                if !stale.is_empty() {
                    tracing::debug!(user_id = %user_id, pruned = stale.len(), "Pruned rows of unsynced calendars");
                }
                Ok(stale.len())
            })
            .await
    }

    async fn events_for_user(&self, user_id: &str) -> OneResult<Vec<MirrorEvent>> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE user_id = ?1 ORDER BY start_time DESC, id"
                ))?;
                let events = stmt
                    .query_map([user_id], row_to_event)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(events)
            })
            .await
    }

    async fn upsert_calendar(&self, calendar: &CalendarMetadata) -> OneResult<CalendarMetadata> {
        let calendar = calendar.clone();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO calendars (user_id, id, summary, description, time_zone, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(user_id) DO UPDATE SET
                         id = excluded.id,
                         summary = excluded.summary,
                         description = excluded.description,
                         time_zone = excluded.time_zone,
                         updated_at = excluded.updated_at",
                    params![
                        calendar.user_id,
                        calendar.id,
                        calendar.summary,
                        calendar.description,
                        calendar.time_zone,
                        format_timestamp(&calendar.created_at),
                        format_timestamp(&calendar.updated_at),
                    ],
                )?;
                let stored = conn.query_row(
                    "SELECT id, user_id, summary, description, time_zone, created_at, updated_at
                     FROM calendars WHERE user_id = ?1",
                    [&calendar.user_id],
                    row_to_calendar,
                )?;
                Ok(stored)
            })
            .await
    }

    async fn calendar_for_user(&self, user_id: &str) -> OneResult<Option<CalendarMetadata>> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let calendar = conn
                    .query_row(
                        "SELECT id, user_id, summary, description, time_zone, created_at, updated_at
                         FROM calendars WHERE user_id = ?1",
                        [user_id],
                        row_to_calendar,
                    )
                    .optional()?;
                Ok(calendar)
            })
            .await
    }

    async fn clear_user(&self, user_id: &str) -> OneResult<()> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                let events = tx.execute("DELETE FROM events WHERE user_id = ?1", [&user_id])?;
                tx.execute("DELETE FROM calendars WHERE user_id = ?1", [&user_id])?;
                tx.commit()?;
                tracing::debug!(user_id = %user_id, events, "Cleared mirror");
                Ok(())
            })
            .await
    }
}
