//! Health check

use std::sync::Arc;

use axum::extract::State;

use crate::context::AppContext;
use crate::error::ApiError;

/// `GET /health`: verify database connectivity.
pub async fn health(State(ctx): State<Arc<AppContext>>) -> Result<&'static str, ApiError> {
    ctx.db.health_check()?;
    Ok("ok")
}
