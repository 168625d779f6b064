//! OAuth2 refresh-token grant against Google's token endpoint.

use one_core::credential::TokenGrant;
use one_core::{OneError, OneResult};
use reqwest::StatusCode;

use crate::error;
use crate::types::{TokenErrorResponse, TokenResponse};

/// Exchange a refresh token for a new access token.
///
/// A refresh token the endpoint refuses (revoked, expired, wrong client)
/// is reported as `RefreshFailed`; transport and server failures are not.
pub async fn refresh(
    http: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> OneResult<TokenGrant> {
    let response = http
        .post(token_url)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .map_err(|e| error::transport(e, "Token refresh"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(refresh_error(status, &body));
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .map_err(|e| error::transport(e, "Token refresh response"))?;

    Ok(TokenGrant {
        access_token: tokens.access_token,
        // Google typically doesn't return a new refresh_token on refresh
        refresh_token: tokens.refresh_token.filter(|t| !t.is_empty()),
        expires_in: tokens.expires_in,
    })
}

fn refresh_error(status: StatusCode, body: &str) -> OneError {
    let parsed: TokenErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| parsed.error.clone());

    match (status, parsed.error.as_str()) {
        (_, "invalid_grant" | "invalid_client" | "unauthorized_client") => {
            OneError::RefreshFailed(message)
        }
        (StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED, _) => {
            OneError::RefreshFailed(format!("HTTP {status}: {message}"))
        }
        _ => OneError::Provider(format!("Token refresh: HTTP {status}: {message}")),
    }
}
