//! Infrastructure error conversions
//!
//! Newtype wrapper so external error types can be converted into
//! [`AmityError`] without violating the orphan rule.

use amity_domain::AmityError;

/// Wrapper for infrastructure-layer errors
#[derive(Debug)]
pub struct InfraError(pub AmityError);

impl From<InfraError> for AmityError {
    fn from(err: InfraError) -> Self {
        err.0
    }
}

impl From<rusqlite::Error> for InfraError {
    fn from(err: rusqlite::Error) -> Self {
        Self(AmityError::Database(err.to_string()))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(err: r2d2::Error) -> Self {
        Self(AmityError::Database(format!("connection pool: {err}")))
    }
}

impl From<reqwest::Error> for InfraError {
    fn from(err: reqwest::Error) -> Self {
        Self(AmityError::Network(err.to_string()))
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

/// Map a rusqlite error straight into the domain error type.
pub(crate) fn db_err(err: rusqlite::Error) -> AmityError {
    InfraError::from(err).into()
}

/// Map a pool error straight into the domain error type.
pub(crate) fn pool_err(err: r2d2::Error) -> AmityError {
    InfraError::from(err).into()
}
