//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a stored calendar credential can no longer be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialErrorKind {
    /// The provider rejected the refresh token; the companion must reconnect.
    ExpiredRefreshToken,
    /// The provider rejected the grant during code exchange or refresh.
    InvalidGrant,
}

impl std::fmt::Display for CredentialErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExpiredRefreshToken => write!(f, "EXPIRED_REFRESH_TOKEN"),
            Self::InvalidGrant => write!(f, "INVALID_GRANT"),
        }
    }
}

/// Reason a booking attempt could not commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// The slot was taken between availability read and commit.
    SlotTaken,
    /// The slot guarantee could not be acquired within the bounded wait.
    Busy,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SlotTaken => write!(f, "SLOT_TAKEN"),
            Self::Busy => write!(f, "BUSY"),
        }
    }
}

/// Main error type for Amity
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AmityError {
    /// Stored credential is unusable; surfaced as "reconnect calendar".
    #[error("Credential error: {0}")]
    Credential(CredentialErrorKind),

    /// Calendar provider failure after the retry budget was spent.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Invalid webhook notification; acknowledged, never propagated.
    #[error("Webhook validation error: {0}")]
    WebhookValidation(String),

    /// Booking precondition no longer holds.
    #[error("Booking conflict: {0}")]
    Conflict(ConflictKind),

    /// The user's interaction quota is exhausted.
    #[error("Interaction quota exceeded")]
    QuotaExceeded,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AmityError {
    /// True when the failure is a transient provider error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ExternalService(_) | Self::Network(_))
    }
}

/// Result type alias for Amity operations
pub type Result<T> = std::result::Result<T, AmityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_kinds_serialize_screaming_snake() {
        let json = serde_json::to_string(&CredentialErrorKind::ExpiredRefreshToken)
            .expect("serializes");
        assert_eq!(json, "\"EXPIRED_REFRESH_TOKEN\"");
    }

    #[test]
    fn conflict_error_is_tagged() {
        let err = AmityError::Conflict(ConflictKind::SlotTaken);
        let json = serde_json::to_value(&err).expect("serializes");
        assert_eq!(json["type"], "Conflict");
        assert_eq!(json["message"], "SLOT_TAKEN");
    }

    #[test]
    fn transient_classification() {
        assert!(AmityError::ExternalService("503".into()).is_transient());
        assert!(AmityError::Network("timeout".into()).is_transient());
        assert!(!AmityError::QuotaExceeded.is_transient());
        assert!(!AmityError::Conflict(ConflictKind::Busy).is_transient());
    }
}
