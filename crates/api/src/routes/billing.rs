//! Subscription event intake
//!
//! The payment flow is out of scope; this endpoint only consumes its
//! "subscription activated/cancelled" events: verify, then dispatch into
//! the quota ledger.

use std::sync::Arc;

use amity_domain::SubscriptionEvent;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct BillingEventRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub event: SubscriptionEvent,
}

/// `POST /billing/events`
pub async fn ingest_event(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(request): Json<BillingEventRequest>,
) -> Result<StatusCode, ApiError> {
    if let Some(secret) = &ctx.config.webhook.shared_secret {
        let presented = headers.get("x-amity-billing-secret").and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("billing event secret mismatch");
            return Ok(StatusCode::UNAUTHORIZED);
        }
    }

    ctx.quota.apply_subscription_event(request.user_id, request.event).await?;
    Ok(StatusCode::NO_CONTENT)
}
