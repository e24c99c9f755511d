//! HTTP routes

pub mod availability;
pub mod billing;
pub mod booking;
pub mod health;
pub mod oauth;
pub mod quota;
pub mod webhook;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::Router;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::ApiError;

/// Build the application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/oauth/authorize", get(oauth::authorize))
        .route("/oauth/callback", get(oauth::callback))
        .route("/webhooks/calendar", get(webhook::verify).post(webhook::notify))
        .route("/bookings", post(booking::create))
        .route("/bookings/{id}", delete(booking::cancel))
        .route("/availability/{companion_id}", get(availability::for_date))
        .route("/quota", get(quota::usage))
        .route("/billing/events", post(billing::ingest_event))
        .with_state(ctx)
}

/// Caller identity from the `x-amity-user-id` header.
///
/// Session handling is out of scope; the upstream edge injects the header.
pub(crate) fn require_user(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    headers
        .get("x-amity-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or_else(ApiError::unauthenticated)
}
