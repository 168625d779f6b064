//! Durable state: OAuth credentials and the per-user event mirror.
//!
//! Both stores sit behind traits so the engines can be driven by fakes in
//! tests. The SQLite implementations share one r2d2 pool and run every
//! statement on the blocking thread pool.

mod credentials;
mod migrations;
mod mirror;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite::types::Type;

use crate::calendar::CalendarMetadata;
use crate::credential::{Credential, TokenRotation};
use crate::date_range::SyncWindow;
use crate::error::{OneError, OneResult};
use crate::event::MirrorEvent;

pub use credentials::SqliteCredentialStore;
pub use mirror::SqliteEventMirror;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Persisted OAuth credentials, one row per user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fails with `AccountNotConnected` when the user never linked an account.
    async fn get(&self, user_id: &str) -> OneResult<Credential>;

    /// Partial update after a refresh. The stored refresh token is only
    /// replaced when the rotation carries a new one.
    async fn rotate(&self, user_id: &str, rotation: &TokenRotation) -> OneResult<Credential>;

    async fn link(&self, credential: &Credential) -> OneResult<Credential>;

    /// Returns whether a credential existed.
    async fn unlink(&self, user_id: &str) -> OneResult<bool>;
}

/// Local copy of remote events and the primary calendar's metadata.
#[async_trait]
pub trait EventMirror: Send + Sync {
    /// Insert or overwrite by `(user_id, id)`. Returns the number of rows written.
    async fn upsert_events(&self, user_id: &str, events: &[MirrorEvent]) -> OneResult<usize>;

    /// Remove rows of `calendar_id` overlapping `window` whose id is not in `keep`.
    async fn prune_calendar(
        &self,
        user_id: &str,
        calendar_id: &str,
        window: &SyncWindow,
        keep: &HashSet<String>,
    ) -> OneResult<usize>;

    /// Remove rows overlapping `window` whose calendar is not in `calendar_ids`.
    async fn prune_except(
        &self,
        user_id: &str,
        calendar_ids: &HashSet<String>,
        window: &SyncWindow,
    ) -> OneResult<usize>;

    /// All mirrored events of a user, most recent start first.
    async fn events_for_user(&self, user_id: &str) -> OneResult<Vec<MirrorEvent>>;

    async fn upsert_calendar(&self, calendar: &CalendarMetadata) -> OneResult<CalendarMetadata>;

    async fn calendar_for_user(&self, user_id: &str) -> OneResult<Option<CalendarMetadata>>;

    /// Drop every mirrored event and the calendar metadata of a user.
    async fn clear_user(&self, user_id: &str) -> OneResult<()>;
}

/// Handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (creating if needed) the database file and apply migrations.
    pub fn open(path: &Path) -> OneResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                OneError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(8).build(manager)?;

        {
            let conn = pool.get()?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            migrations::run_migrations(&conn)?;
        }

        tracing::debug!(path = %path.display(), "Opened database");
        Ok(Database { pool })
    }

    /// In-memory database. A single connection, so every caller sees the same data.
    pub fn open_in_memory() -> OneResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;

        {
            let conn = pool.get()?;
            migrations::run_migrations(&conn)?;
        }

        Ok(Database { pool })
    }

    pub fn credential_store(&self) -> SqliteCredentialStore {
        SqliteCredentialStore::new(self.clone())
    }

    pub fn event_mirror(&self) -> SqliteEventMirror {
        SqliteEventMirror::new(self.clone())
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    pub(crate) async fn run<T, F>(&self, f: F) -> OneResult<T>
    where
        F: FnOnce(&mut Connection) -> OneResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| OneError::Storage(format!("Storage task failed: {e}")))?
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_timestamp_opt(
    idx: usize,
    s: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_timestamp(idx, &s)).transpose()
}
