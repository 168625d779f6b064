//! Mapping of Google HTTP failures onto `OneError`.

use one_core::OneError;
use reqwest::StatusCode;

use crate::types::GoogleErrorBody;

const SCOPE_REASONS: &[&str] = &["insufficientPermissions", "ACCESS_TOKEN_SCOPE_INSUFFICIENT"];

/// Classify a non-success response. `what` names the resource for messages.
pub fn classify(status: StatusCode, body: &str, what: &str) -> OneError {
    let parsed: GoogleErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = if parsed.error.message.is_empty() {
        format!("{what}: HTTP {status}")
    } else {
        format!("{what}: {}", parsed.error.message)
    };

    match status {
        StatusCode::UNAUTHORIZED => OneError::AccessTokenRejected(message),
        StatusCode::FORBIDDEN if is_scope_error(&parsed) => OneError::InsufficientScope(message),
        StatusCode::NOT_FOUND | StatusCode::GONE => OneError::NotFound(what.to_string()),
        _ => OneError::Provider(message),
    }
}

fn is_scope_error(body: &GoogleErrorBody) -> bool {
    let detail = &body.error;
    detail
        .errors
        .iter()
        .chain(detail.details.iter())
        .filter_map(|e| e.reason.as_deref())
        .chain(detail.status.as_deref())
        .any(|reason| SCOPE_REASONS.contains(&reason))
}

pub fn transport(err: reqwest::Error, what: &str) -> OneError {
    OneError::Provider(format!("{what}: {err}"))
}
