//! Booking API

use std::sync::Arc;

use amity_domain::Appointment;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::require_user;
use crate::context::AppContext;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub companion_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// `POST /bookings`: commit one slot for the calling user.
pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let user_id = require_user(&headers)?;

    let appointment = ctx
        .booking
        .book(request.companion_id, user_id, request.start, request.end)
        .await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `DELETE /bookings/{id}`: cancel an appointment owned by the caller.
pub async fn cancel(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user_id = require_user(&headers)?;
    ctx.booking.cancel(appointment_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
