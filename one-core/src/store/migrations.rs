use rusqlite::Connection;

use crate::error::OneResult;

/// Apply every migration not yet recorded in `_migrations`.
pub fn run_migrations(conn: &Connection) -> OneResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    let migrations: [(&str, &str); 2] = [
        ("001_initial_schema", MIGRATION_001_INITIAL_SCHEMA),
        ("002_indexes", MIGRATION_002_INDEXES),
    ];

    for (name, sql) in migrations {
        if !migration_applied(conn, name)? {
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::debug!(migration = name, "Applied migration");
        }
    }

    Ok(())
}

fn migration_applied(conn: &Connection, name: &str) -> OneResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM _migrations WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

const MIGRATION_001_INITIAL_SCHEMA: &str = r#"
CREATE TABLE credentials (
    user_id TEXT PRIMARY KEY,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    expires_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Primary calendar metadata, one row per user
CREATE TABLE calendars (
    user_id TEXT PRIMARY KEY,
    id TEXT NOT NULL,
    summary TEXT NOT NULL,
    description TEXT,
    time_zone TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE events (
    user_id TEXT NOT NULL,
    id TEXT NOT NULL,
    calendar_id TEXT NOT NULL,
    summary TEXT NOT NULL,
    description TEXT,
    location TEXT,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    all_day INTEGER NOT NULL DEFAULT 0,
    attendees TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL,
    color_id TEXT,
    color TEXT NOT NULL,
    source TEXT,
    event_created_at TEXT,
    event_updated_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, id)
);
"#;

const MIGRATION_002_INDEXES: &str = r#"
CREATE INDEX idx_events_user_start ON events(user_id, start_time);
CREATE INDEX idx_events_user_calendar ON events(user_id, calendar_id, start_time);
"#;
