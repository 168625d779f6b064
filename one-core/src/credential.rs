//! OAuth credential record for a user's Google account.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Refresh this long before the provider-reported expiry.
const EXPIRY_SKEW_SECS: i64 = 300;

/// Access/refresh token pair stored per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Tokens issued by the provider on a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Google usually omits this; only present when the provider rotates it.
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Partial update applied to a stored credential.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRotation {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRotation {
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        TokenRotation {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.filter(|t| !t.is_empty()),
            expires_at: grant
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| now + Duration::seconds(secs)),
        }
    }
}

impl Credential {
    /// The refresh token, if one is present and non-empty.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// True when the access token is expired or about to expire.
    /// An unknown expiry is treated as valid; a 401 will trigger the refresh instead.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|exp| exp - Duration::seconds(EXPIRY_SKEW_SECS) <= now)
            .unwrap_or(false)
    }

    /// Apply a rotation in memory. The refresh token is only replaced when a new one was issued.
    pub fn rotated(&self, rotation: &TokenRotation, now: DateTime<Utc>) -> Credential {
        Credential {
            user_id: self.user_id.clone(),
            access_token: rotation.access_token.clone(),
            refresh_token: rotation
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            expires_at: rotation.expires_at,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credential(expires_at: Option<DateTime<Utc>>) -> Credential {
        Credential {
            user_id: "u1".into(),
            access_token: "old-access".into(),
            refresh_token: Some("refresh-1".into()),
            expires_at,
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_rotation_keeps_refresh_token_when_not_reissued() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let rotation = TokenRotation::from_grant(
            TokenGrant {
                access_token: "new-access".into(),
                refresh_token: None,
                expires_in: Some(3600),
            },
            now,
        );

        let rotated = credential(None).rotated(&rotation, now);

        assert_eq!(rotated.access_token, "new-access");
        assert_eq!(rotated.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(rotated.expires_at, Some(now + Duration::hours(1)));
        assert_eq!(rotated.updated_at, now);
    }

    #[test]
    fn test_rotation_replaces_refresh_token_when_reissued() {
        let now = Utc::now();
        let rotation = TokenRotation::from_grant(
            TokenGrant {
                access_token: "new-access".into(),
                refresh_token: Some("refresh-2".into()),
                expires_in: None,
            },
            now,
        );

        let rotated = credential(None).rotated(&rotation, now);
        assert_eq!(rotated.refresh_token.as_deref(), Some("refresh-2"));
        assert_eq!(rotated.expires_at, None);
    }

    #[test]
    fn test_empty_reissued_refresh_token_is_ignored() {
        let rotation = TokenRotation::from_grant(
            TokenGrant {
                access_token: "a".into(),
                refresh_token: Some(String::new()),
                expires_in: Some(0),
            },
            Utc::now(),
        );
        assert_eq!(rotation.refresh_token, None);
        assert_eq!(rotation.expires_at, None);
    }

    #[test]
    fn test_needs_refresh_uses_skew() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        assert!(credential(Some(now - Duration::minutes(1))).needs_refresh(now));
        assert!(credential(Some(now + Duration::minutes(2))).needs_refresh(now));
        assert!(!credential(Some(now + Duration::minutes(30))).needs_refresh(now));
        assert!(!credential(None).needs_refresh(now));
    }
}
