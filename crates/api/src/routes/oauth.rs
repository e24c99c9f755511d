//! OAuth authorize and callback endpoints
//!
//! Failure branches never throw at the caller: every outcome is a redirect
//! to the dashboard with a machine-readable `error` query parameter.

use std::collections::HashMap;
use std::sync::Arc;

use amity_core::companion_ports::CompanionRepository;
use amity_core::credentials::ports::CalendarAuthApi;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use rand::RngCore;
use tracing::{info, warn};
use uuid::Uuid;

use super::require_user;
use crate::context::AppContext;

/// `GET /oauth/authorize?companion_id=…`
///
/// Binds the companion to a random state nonce and hands the browser to
/// the provider's consent URL.
pub async fn authorize(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    let Ok(user_id) = require_user(&headers) else {
        return Redirect::to(&ctx.config.server.login_url);
    };

    let Some(companion_id) =
        params.get("companion_id").and_then(|raw| Uuid::parse_str(raw).ok())
    else {
        return dashboard_error(&ctx, "missing_params");
    };

    let companion = match ctx.companions.get(companion_id).await {
        Ok(Some(companion)) => companion,
        Ok(None) => return dashboard_error(&ctx, "unauthorized"),
        Err(err) => {
            warn!(%companion_id, error = %err, "companion lookup failed");
            return dashboard_error(&ctx, "oauth_failed");
        }
    };
    if companion.owner_user_id != user_id {
        return dashboard_error(&ctx, "unauthorized");
    }

    let state = random_state();
    ctx.oauth_states.insert(state.clone(), companion_id);

    match ctx.calendar_client.authorization_url(&callback_uri(&ctx), &state) {
        Ok(consent_url) => Redirect::to(&consent_url),
        Err(err) => {
            warn!(error = %err, "failed to build consent URL");
            dashboard_error(&ctx, "oauth_failed")
        }
    }
}

/// `GET /oauth/callback?code&state[&error]`
///
/// Exchanges the code, stores the credential and registers a webhook
/// channel for the companion the state nonce was bound to.
pub async fn callback(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    if params.contains_key("error") {
        return dashboard_error(&ctx, "oauth_failed");
    }

    let (Some(code), Some(state)) = (params.get("code"), params.get("state")) else {
        return dashboard_error(&ctx, "missing_params");
    };

    let Some(companion_id) = ctx.oauth_states.get(state) else {
        return dashboard_error(&ctx, "invalid_state");
    };
    // State nonces are single use.
    ctx.oauth_states.invalidate(state);

    // When the session identity survived the provider round-trip, verify
    // companion ownership; the nonce binding is otherwise authoritative.
    if let Ok(user_id) = require_user(&headers) {
        match ctx.companions.get(companion_id).await {
            Ok(Some(companion)) if companion.owner_user_id == user_id => {}
            Ok(_) => return dashboard_error(&ctx, "unauthorized"),
            Err(err) => {
                warn!(%companion_id, error = %err, "companion lookup failed");
                return dashboard_error(&ctx, "oauth_failed");
            }
        }
    }

    let tokens = match ctx.calendar_client.exchange_code(code, &callback_uri(&ctx)).await {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!(%companion_id, error = %err, "authorization code exchange failed");
            return dashboard_error(&ctx, "oauth_failed");
        }
    };

    if let Err(err) = ctx.vault.store(companion_id, &tokens).await {
        warn!(%companion_id, error = %err, "failed to store calendar credential");
        return dashboard_error(&ctx, "connection_failed");
    }

    if let Err(err) = ctx.gateway.register_webhook_channel(companion_id).await {
        warn!(%companion_id, error = %err, "webhook channel registration failed");
        return dashboard_error(&ctx, "connection_failed");
    }

    info!(%companion_id, "calendar connected");
    Redirect::to(&format!("{}?calendar=connected", ctx.config.server.dashboard_url))
}

fn callback_uri(ctx: &AppContext) -> String {
    format!("{}/oauth/callback", ctx.config.server.public_url)
}

fn dashboard_error(ctx: &AppContext, error: &str) -> Redirect {
    Redirect::to(&format!("{}?error={}", ctx.config.server.dashboard_url, error))
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
