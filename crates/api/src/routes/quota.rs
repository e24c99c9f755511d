//! Quota check API
//!
//! Consumed by the conversation handler before it reserves an interaction.

use std::sync::Arc;

use amity_domain::SubscriptionQuota;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use super::require_user;
use crate::context::AppContext;
use crate::error::ApiError;

/// `GET /quota`: current usage and ceiling for the calling user.
pub async fn usage(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionQuota>, ApiError> {
    let user_id = require_user(&headers)?;
    let quota = ctx.quota.usage(user_id).await?;
    Ok(Json(quota))
}
