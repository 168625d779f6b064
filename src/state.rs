use std::sync::Arc;

use anyhow::{Context, Result};
use one_core::assistant::AssistantTools;
use one_core::mutation::EventGateway;
use one_core::remote::CalendarProvider;
use one_core::store::{CredentialStore, Database, EventMirror};
use one_core::sync::SyncEngine;
use one_provider_google::GoogleProvider;

use crate::settings::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<dyn CredentialStore>,
    pub mirror: Arc<dyn EventMirror>,
    pub sync: Arc<SyncEngine>,
    pub gateway: Arc<EventGateway>,
    pub assistant: Arc<AssistantTools>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Result<Self> {
        let path = settings.database_path();
        let db = Database::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let provider = GoogleProvider::new(settings.google.clone())
            .context("Failed to set up the Google Calendar provider")?;

        Ok(AppState::from_parts(
            Arc::new(db.credential_store()),
            Arc::new(db.event_mirror()),
            Arc::new(provider),
            settings.max_staleness(),
        ))
    }

    pub fn from_parts(
        credentials: Arc<dyn CredentialStore>,
        mirror: Arc<dyn EventMirror>,
        provider: Arc<dyn CalendarProvider>,
        max_staleness: chrono::Duration,
    ) -> Self {
        let sync = Arc::new(SyncEngine::new(
            credentials.clone(),
            mirror.clone(),
            provider.clone(),
        ));
        let gateway = Arc::new(EventGateway::new(
            credentials.clone(),
            mirror.clone(),
            provider,
        ));
        let assistant = Arc::new(AssistantTools::new(
            sync.clone(),
            gateway.clone(),
            max_staleness,
        ));

        AppState {
            credentials,
            mirror,
            sync,
            gateway,
            assistant,
        }
    }
}
