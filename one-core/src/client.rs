//! Calendar client adapter: a token-bound calendar handle that refreshes
//! and persists credentials as it goes.
//!
//! A `CalendarClient` is built per logical operation with [`CalendarClient::connect`]
//! and must not outlive it. Credentials can change between operations.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::credential::{Credential, TokenRotation};
use crate::error::{OneError, OneResult};
use crate::remote::{
    CalendarApi, CalendarProvider, ColorDefinition, EventDraft, EventPage, EventQuery,
    RemoteCalendar, RemoteCalendarDetails, RemoteEvent,
};
use crate::store::CredentialStore;

/// Result of [`CalendarClient::connect`].
pub struct Connected {
    pub client: CalendarClient,
    /// The credential after an eager refresh, already persisted.
    /// None when the stored access token was still valid.
    pub rotated: Option<Credential>,
}

struct Session {
    credential: Credential,
    api: Arc<dyn CalendarApi>,
}

pub struct CalendarClient {
    user_id: String,
    provider: Arc<dyn CalendarProvider>,
    store: Arc<dyn CredentialStore>,
    session: Mutex<Session>,
}

impl CalendarClient {
    /// Load the user's credential and bind a calendar handle to it.
    ///
    /// Fails fast with `AccountNotConnected` or `RefreshTokenMissing` before
    /// any network call. Refreshes eagerly when the access token is about to expire.
    pub async fn connect(
        user_id: &str,
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn CalendarProvider>,
    ) -> OneResult<Connected> {
        let credential = store.get(user_id).await?;
        if credential.refresh_token().is_none() {
            return Err(OneError::RefreshTokenMissing);
        }

        let (credential, rotated) = if credential.needs_refresh(Utc::now()) {
            debug!(user_id, "Access token expired, refreshing before use");
            let fresh = refresh(&*provider, &*store, &credential).await?;
            (fresh.clone(), Some(fresh))
        } else {
            (credential, None)
        };

        let api = provider.calendar_api(&credential.access_token);

        Ok(Connected {
            client: CalendarClient {
                user_id: user_id.to_string(),
                provider,
                store,
                session: Mutex::new(Session { credential, api }),
            },
            rotated,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Snapshot of the credential currently in use.
    pub async fn credential(&self) -> Credential {
        self.session.lock().await.credential.clone()
    }

    /// Run `op` against the current handle. A rejected access token triggers
    /// exactly one refresh and retry; a second rejection is `RefreshFailed`.
    async fn call<T, F, Fut>(&self, op: F) -> OneResult<T>
    where
        F: Fn(Arc<dyn CalendarApi>) -> Fut,
        Fut: Future<Output = OneResult<T>>,
    {
        let (api, token) = {
            let session = self.session.lock().await;
            (session.api.clone(), session.credential.access_token.clone())
        };

        match op(api).await {
            Err(OneError::AccessTokenRejected(msg)) => {
                debug!(user_id = %self.user_id, %msg, "Access token rejected, refreshing");
                let api = self.refresh_after_rejection(&token).await?;
                op(api).await.map_err(|err| match err {
                    OneError::AccessTokenRejected(msg) => OneError::RefreshFailed(msg),
                    other => other,
                })
            }
            other => other,
        }
    }

    /// Refresh unless a concurrent call already replaced the rejected token.
    async fn refresh_after_rejection(&self, rejected: &str) -> OneResult<Arc<dyn CalendarApi>> {
        let mut session = self.session.lock().await;
        if session.credential.access_token != rejected {
            return Ok(session.api.clone());
        }

        let fresh = refresh(&*self.provider, &*self.store, &session.credential).await?;
        session.api = self.provider.calendar_api(&fresh.access_token);
        session.credential = fresh;
        Ok(session.api.clone())
    }

    pub async fn calendar(&self, calendar_id: &str) -> OneResult<RemoteCalendarDetails> {
        self.call(|api| async move { api.calendar(calendar_id).await })
            .await
    }

    pub async fn calendar_list(&self) -> OneResult<Vec<RemoteCalendar>> {
        self.call(|api| async move { api.calendar_list().await }).await
    }

    /// One page of events.
    pub async fn events(&self, calendar_id: &str, query: &EventQuery) -> OneResult<EventPage> {
        self.call(|api| async move { api.events(calendar_id, query).await })
            .await
    }

    pub async fn insert_event(&self, calendar_id: &str, draft: &EventDraft) -> OneResult<RemoteEvent> {
        self.call(|api| async move { api.insert_event(calendar_id, draft).await })
            .await
    }

    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
    ) -> OneResult<RemoteEvent> {
        self.call(|api| async move { api.update_event(calendar_id, event_id, draft).await })
            .await
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> OneResult<()> {
        self.call(|api| async move { api.delete_event(calendar_id, event_id).await })
            .await
    }

    pub async fn event_colors(&self) -> OneResult<HashMap<String, ColorDefinition>> {
        self.call(|api| async move { api.event_colors().await }).await
    }
}

/// Exchange the refresh token and persist the rotation before returning it.
async fn refresh(
    provider: &dyn CalendarProvider,
    store: &dyn CredentialStore,
    credential: &Credential,
) -> OneResult<Credential> {
    let refresh_token = credential
        .refresh_token()
        .ok_or(OneError::RefreshTokenMissing)?;

    let grant = provider
        .refresh_access_token(refresh_token)
        .await
        .map_err(|err| match err {
            OneError::AccessTokenRejected(msg) => OneError::RefreshFailed(msg),
            other => other,
        })?;

    let rotation = TokenRotation::from_grant(grant, Utc::now());
    let reissued = rotation.refresh_token.is_some();
    let stored = store.rotate(&credential.user_id, &rotation).await?;

    info!(
        user_id = %credential.user_id,
        refresh_token_reissued = reissued,
        expires_at = ?stored.expires_at,
        "Rotated Google credential"
    );

    Ok(stored)
}
