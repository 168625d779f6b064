//! Linking and unlinking the user's Google account

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::put,
};
use chrono::{DateTime, Utc};
use one_core::OneError;
use one_core::credential::Credential;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::routes::AppError;
use crate::routes::extract::AppJson;
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/account", put(link_account).delete(unlink_account))
}

/// Tokens handed over by the auth provider after the OAuth consent
#[derive(Deserialize)]
pub struct LinkAccountRequest {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct AccountStatus {
    pub user_id: String,
    pub email: Option<String>,
    pub has_refresh_token: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// PUT /account - Store the user's Google credential
async fn link_account(
    session: Session,
    State(state): State<AppState>,
    AppJson(req): AppJson<LinkAccountRequest>,
) -> Result<Json<AccountStatus>, AppError> {
    if req.access_token.trim().is_empty() {
        return Err(OneError::InvalidInput("access_token must not be empty".into()).into());
    }

    let stored = state
        .credentials
        .link(&Credential {
            user_id: session.user_id.clone(),
            access_token: req.access_token,
            refresh_token: req.refresh_token.filter(|t| !t.is_empty()),
            expires_at: req.expires_at,
            updated_at: Utc::now(),
        })
        .await?;

    info!(user_id = %session.user_id, "Linked Google account");
    Ok(Json(AccountStatus {
        has_refresh_token: stored.refresh_token().is_some(),
        user_id: stored.user_id,
        email: session.email,
        expires_at: stored.expires_at,
        updated_at: stored.updated_at,
    }))
}

/// DELETE /account - Forget the credential and everything mirrored for the user
async fn unlink_account(
    session: Session,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let removed = state.sync.forget(&session.user_id).await?;

    info!(user_id = %session.user_id, removed, "Unlinked Google account");
    Ok(StatusCode::NO_CONTENT)
}
