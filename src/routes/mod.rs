pub mod account;
pub mod assistant;
pub mod calendars;
pub mod events;
pub mod extract;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use one_core::OneError;
use serde::Serialize;
use tracing::error;

use crate::state::AppState;

/// Action the UI should offer for credential errors
const RECONNECT_ACTION: &str = "reconnect-google-calendar";

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(events::router())
        .merge(calendars::router())
        .merge(account::router())
        .merge(assistant::router())
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub reason: &'static str,
    pub action: Option<&'static str>,
}

/// Convert core errors to HTTP responses
#[derive(Debug)]
pub struct AppError(pub OneError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            OneError::Unauthenticated => StatusCode::UNAUTHORIZED,
            e if e.requires_reconnect() => StatusCode::FORBIDDEN,
            OneError::InvalidDateRange { .. } | OneError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            OneError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "Request failed");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            reason: self.0.reason(),
            action: self.0.requires_reconnect().then_some(RECONNECT_ACTION),
        });
        (status, body).into_response()
    }
}

impl From<OneError> for AppError {
    fn from(err: OneError) -> Self {
        Self(err)
    }
}
