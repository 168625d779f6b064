//! Error types for One.

use thiserror::Error;

/// Errors that can occur while syncing or mutating calendar data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OneError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("No Google account connected")]
    AccountNotConnected,

    #[error("Stored Google credential has no refresh token; disconnect and reconnect the account")]
    RefreshTokenMissing,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Missing calendar permission: {0}")]
    InsufficientScope(String),

    #[error("Event end ({end}) must be after its start ({start})")]
    InvalidDateRange { start: String, end: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider rejected the access token. Recovered by one refresh + retry.
    #[error("Access token rejected: {0}")]
    AccessTokenRejected(String),

    /// A non-critical fetch failed. Absorbed by the caller, never surfaced.
    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),
}

impl OneError {
    /// Machine-readable reason string carried in API error responses.
    pub fn reason(&self) -> &'static str {
        match self {
            OneError::Unauthenticated => "not-authenticated",
            OneError::AccountNotConnected => "account-not-connected",
            OneError::RefreshTokenMissing => "refresh-token-missing",
            OneError::RefreshFailed(_) => "token-refresh-failed",
            OneError::InsufficientScope(_) => "insufficient-scope",
            OneError::InvalidDateRange { .. } => "invalid-date-range",
            OneError::NotFound(_) => "not-found",
            OneError::InvalidInput(_) => "invalid-request",
            OneError::AccessTokenRejected(_)
            | OneError::Transient(_)
            | OneError::Provider(_)
            | OneError::Storage(_) => "generic-failure",
        }
    }

    /// Whether the only remedy is reconnecting the Google account.
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            OneError::AccountNotConnected
                | OneError::RefreshTokenMissing
                | OneError::RefreshFailed(_)
                | OneError::InsufficientScope(_)
        )
    }
}

impl From<rusqlite::Error> for OneError {
    fn from(err: rusqlite::Error) -> Self {
        OneError::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for OneError {
    fn from(err: r2d2::Error) -> Self {
        OneError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for OneError {
    fn from(err: serde_json::Error) -> Self {
        OneError::Storage(format!("Serialization failed: {err}"))
    }
}

/// Result type alias for One operations.
pub type OneResult<T> = Result<T, OneError>;
