//! Google Calendar provider for One.
//!
//! Implements the core's `CalendarProvider`/`CalendarApi` seams over the
//! Calendar v3 REST API and Google's OAuth2 token endpoint.

mod api;
mod convert;
mod error;
mod oauth;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use one_core::credential::TokenGrant;
use one_core::remote::{CalendarApi, CalendarProvider};
use one_core::{OneError, OneResult};
use serde::Deserialize;
use tracing::debug;
use url::Url;

pub use api::GoogleCalendarApi;

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth client and endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

pub struct GoogleProvider {
    http: reqwest::Client,
    api_base_url: Url,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> OneResult<Self> {
        let api_base_url = Url::parse(&config.api_base_url).map_err(|e| {
            OneError::InvalidInput(format!("google.api_base_url {}: {e}", config.api_base_url))
        })?;

        Ok(GoogleProvider {
            http: reqwest::Client::new(),
            api_base_url,
            token_url: config.token_url,
            client_id: config.client_id,
            client_secret: config.client_secret,
        })
    }
}

#[async_trait]
impl CalendarProvider for GoogleProvider {
    async fn refresh_access_token(&self, refresh_token: &str) -> OneResult<TokenGrant> {
        debug!(token_url = %self.token_url, "Refreshing Google access token");
        oauth::refresh(
            &self.http,
            &self.token_url,
            &self.client_id,
            &self.client_secret,
            refresh_token,
        )
        .await
    }

    fn calendar_api(&self, access_token: &str) -> Arc<dyn CalendarApi> {
        Arc::new(GoogleCalendarApi::new(
            self.http.clone(),
            self.api_base_url.clone(),
            access_token,
        ))
    }
}
