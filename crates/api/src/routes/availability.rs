//! Availability read API

use std::collections::HashMap;
use std::sync::Arc;

use amity_domain::{AmityError, AvailabilitySlot};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::ApiError;

/// `GET /availability/{companion_id}?date=YYYY-MM-DD`
///
/// Reconciles and returns the slot sequence for the date.
pub async fn for_date(
    State(ctx): State<Arc<AppContext>>,
    Path(companion_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<AvailabilitySlot>>, ApiError> {
    let date = params
        .get("date")
        .ok_or_else(|| AmityError::InvalidInput("missing date parameter".into()))
        .and_then(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AmityError::InvalidInput(format!("invalid date: {raw}")))
        })?;

    let slots = ctx.reconciler.reconcile(companion_id, date).await?;
    Ok(Json(slots))
}
