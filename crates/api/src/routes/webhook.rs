//! Calendar webhook endpoint
//!
//! `GET` answers the provider's verification handshake by echoing the
//! challenge. `POST` always acknowledges with 200 (providers retry
//! indefinitely otherwise) except when a shared secret is configured and
//! the request fails to present it.

use std::collections::HashMap;
use std::sync::Arc;

use amity_domain::AmityError;
use amity_infra::WebhookNotification;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::context::AppContext;

/// `GET /webhooks/calendar?challenge=...`: echo the challenge verbatim.
pub async fn verify(Query(params): Query<HashMap<String, String>>) -> (StatusCode, String) {
    let challenge = params.get("challenge").cloned().unwrap_or_default();
    (StatusCode::OK, challenge)
}

#[derive(Debug, Deserialize)]
pub struct NotificationBody {
    pub channel: ChannelRef,
    #[serde(rename = "resourceState")]
    pub resource_state: String,
    #[serde(rename = "messageNumber")]
    pub message_number: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelRef {
    pub id: String,
}

/// `POST /webhooks/calendar`: validate, deduplicate, schedule resync.
pub async fn notify(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = &ctx.config.webhook.shared_secret {
        let presented = headers.get("x-webhook-secret").and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("webhook shared secret mismatch");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let body: NotificationBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            // Acknowledge malformed payloads too; there is nothing to retry.
            warn!(error = %err, "unparseable webhook payload");
            return StatusCode::OK;
        }
    };

    let notification = WebhookNotification {
        channel_id: body.channel.id,
        channel_token: headers
            .get("x-goog-channel-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        resource_state: body.resource_state,
        message_number: body.message_number,
    };

    match ctx.ingester.ingest(notification).await {
        Ok(Some(_handle)) => debug!("reconciliation scheduled"),
        Ok(None) => debug!("notification required no reconciliation"),
        // Invalid notifications are acknowledged so the provider stops
        // retrying; they are never surfaced as fatal.
        Err(AmityError::WebhookValidation(msg)) => warn!(%msg, "webhook validation failed"),
        Err(err) => error!(error = %err, "webhook ingestion failed"),
    }

    StatusCode::OK
}
