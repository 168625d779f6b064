use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{CredentialStore, Database, format_timestamp, parse_timestamp, parse_timestamp_opt};
use crate::credential::{Credential, TokenRotation};
use crate::error::{OneError, OneResult};

const SELECT_CREDENTIAL: &str =
    "SELECT user_id, access_token, refresh_token, expires_at, updated_at FROM credentials WHERE user_id = ?1";

#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: Database,
}

impl SqliteCredentialStore {
    pub fn new(db: Database) -> Self {
        SqliteCredentialStore { db }
    }
}

fn row_to_credential(row: &Row) -> rusqlite::Result<Credential> {
    let expires_at: Option<String> = row.get(3)?;
    let updated_at: String = row.get(4)?;

    Ok(Credential {
        user_id: row.get(0)?,
        access_token: row.get(1)?,
        refresh_token: row.get(2)?,
        expires_at: parse_timestamp_opt(3, expires_at)?,
        updated_at: parse_timestamp(4, &updated_at)?,
    })
}

fn load(conn: &Connection, user_id: &str) -> OneResult<Credential> {
    conn.query_row(SELECT_CREDENTIAL, [user_id], row_to_credential)
        .optional()?
        .ok_or(OneError::AccountNotConnected)
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, user_id: &str) -> OneResult<Credential> {
        let user_id = user_id.to_string();
        self.db.run(move |conn| load(conn, &user_id)).await
    }

    async fn rotate(&self, user_id: &str, rotation: &TokenRotation) -> OneResult<Credential> {
        let user_id = user_id.to_string();
        let rotation = rotation.clone();

        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    "UPDATE credentials
                     SET access_token = ?1,
                         refresh_token = COALESCE(?2, refresh_token),
                         expires_at = ?3,
                         updated_at = ?4
                     WHERE user_id = ?5",
                    params![
                        rotation.access_token,
                        rotation.refresh_token.as_deref().filter(|t| !t.is_empty()),
                        rotation.expires_at.as_ref().map(format_timestamp),
                        format_timestamp(&Utc::now()),
                        user_id,
                    ],
                )?;
                if updated == 0 {
                    return Err(OneError::AccountNotConnected);
                }
                let credential = load(&tx, &user_id)?;
                tx.commit()?;
                Ok(credential)
            })
            .await
    }

    async fn link(&self, credential: &Credential) -> OneResult<Credential> {
        let credential = credential.clone();

        self.db
            .run(move |conn| {
                let now = format_timestamp(&Utc::now());
                // Google only issues a refresh token on first consent, so a
                // relink without one keeps the stored token
                conn.execute(
                    "INSERT INTO credentials (user_id, access_token, refresh_token, expires_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(user_id) DO UPDATE SET
                         access_token = excluded.access_token,
                         refresh_token = COALESCE(excluded.refresh_token, credentials.refresh_token),
                         expires_at = excluded.expires_at,
                         updated_at = excluded.updated_at",
                    params![
                        credential.user_id,
                        credential.access_token,
                        credential.refresh_token(),
                        credential.expires_at.as_ref().map(format_timestamp),
                        now,
                    ],
                )?;
                load(conn, &credential.user_id)
            })
            .await
    }

    async fn unlink(&self, user_id: &str) -> OneResult<bool> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let deleted = conn.execute("DELETE FROM credentials WHERE user_id = ?1", [user_id])?;
                Ok(deleted > 0)
            })
            .await
    }
}
