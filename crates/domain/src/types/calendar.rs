//! Calendar provider types
//!
//! Credentials, busy intervals and push-notification channels mirrored from
//! the external calendar service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth token pair returned by a code exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
}

impl TokenSet {
    /// True when the access token expires within `margin_secs` of `now`.
    pub fn expires_within(&self, margin_secs: i64, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= chrono::Duration::seconds(margin_secs)
    }
}

/// Stored OAuth credential for a companion's calendar account.
///
/// Owned exclusively by the credential vault; mutated only through refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarCredential {
    pub companion_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
}

impl CalendarCredential {
    /// Build a credential from a freshly exchanged token set.
    ///
    /// Returns `None` when the provider issued no refresh token (the grant
    /// cannot be kept alive without one).
    pub fn from_token_set(companion_id: Uuid, tokens: &TokenSet) -> Option<Self> {
        Some(Self {
            companion_id,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone()?,
            expires_at: tokens.expires_at,
            scopes: tokens.scopes.clone(),
        })
    }

    /// True when the access token expires within `margin_secs` of `now`.
    pub fn expires_within(&self, margin_secs: i64, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= chrono::Duration::seconds(margin_secs)
    }

    /// Apply a refresh result, keeping the old refresh token when the
    /// provider did not rotate it.
    pub fn refreshed(&self, tokens: &TokenSet) -> Self {
        Self {
            companion_id: self.companion_id,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens
                .refresh_token
                .clone()
                .unwrap_or_else(|| self.refresh_token.clone()),
            expires_at: tokens.expires_at,
            scopes: if tokens.scopes.is_empty() {
                self.scopes.clone()
            } else {
                tokens.scopes.clone()
            },
        }
    }
}

/// A busy block mirrored from the external calendar.
///
/// Ephemeral: recomputed on every reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub companion_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    /// Half-open interval overlap check against `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Push-notification channel registered with the provider.
///
/// One active channel per companion; a new registration replaces the
/// previous record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChannel {
    pub companion_id: Uuid,
    pub channel_id: String,
    pub resource_id: Option<String>,
    pub validation_token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).single().expect("valid time")
    }

    #[test]
    fn busy_interval_overlap_is_half_open() {
        let busy =
            BusyInterval { companion_id: Uuid::new_v4(), start: at(10, 0), end: at(10, 30) };

        assert!(busy.overlaps(at(10, 0), at(10, 30)));
        assert!(busy.overlaps(at(9, 45), at(10, 15)));
        // Touching boundaries do not overlap
        assert!(!busy.overlaps(at(9, 30), at(10, 0)));
        assert!(!busy.overlaps(at(10, 30), at(11, 0)));
    }

    #[test]
    fn refresh_keeps_old_refresh_token_when_not_rotated() {
        let credential = CalendarCredential {
            companion_id: Uuid::new_v4(),
            access_token: "old-access".into(),
            refresh_token: "long-lived".into(),
            expires_at: at(10, 0),
            scopes: vec!["calendar.readonly".into()],
        };

        let refreshed = credential.refreshed(&TokenSet {
            access_token: "new-access".into(),
            refresh_token: None,
            expires_at: at(11, 0),
            scopes: vec![],
        });

        assert_eq!(refreshed.access_token, "new-access");
        assert_eq!(refreshed.refresh_token, "long-lived");
        assert_eq!(refreshed.expires_at, at(11, 0));
        assert_eq!(refreshed.scopes, credential.scopes);
    }

    #[test]
    fn expiry_margin_check() {
        let tokens = TokenSet {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: at(10, 0),
            scopes: vec![],
        };

        assert!(tokens.expires_within(300, at(9, 56)));
        assert!(!tokens.expires_within(300, at(9, 54)));
    }
}
