//! HTTP error mapping

use amity_domain::AmityError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Error wrapper that renders a domain error as a JSON response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: AmityError,
}

impl ApiError {
    /// 401 for requests without a usable identity header.
    pub fn unauthenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: AmityError::InvalidInput("missing or invalid x-amity-user-id header".into()),
        }
    }
}

impl From<AmityError> for ApiError {
    fn from(error: AmityError) -> Self {
        let status = match &error {
            // Legitimate business outcomes, surfaced to the caller
            AmityError::Conflict(_) => StatusCode::CONFLICT,
            AmityError::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
            // "Reconnect calendar"
            AmityError::Credential(_) => StatusCode::CONFLICT,
            AmityError::ExternalService(_) | AmityError::Network(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AmityError::NotFound(_) => StatusCode::NOT_FOUND,
            AmityError::InvalidInput(_) | AmityError::WebhookValidation(_) => {
                StatusCode::BAD_REQUEST
            }
            AmityError::Database(_) | AmityError::Config(_) | AmityError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self { status, error }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use amity_domain::ConflictKind;

    use super::*;

    #[test]
    fn business_outcomes_map_to_client_statuses() {
        let conflict = ApiError::from(AmityError::Conflict(ConflictKind::SlotTaken));
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let quota = ApiError::from(AmityError::QuotaExceeded);
        assert_eq!(quota.status, StatusCode::PAYMENT_REQUIRED);

        let provider = ApiError::from(AmityError::ExternalService("down".into()));
        assert_eq!(provider.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
