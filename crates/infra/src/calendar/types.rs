//! Wire types for the Google Calendar API

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified provider call failure, used to pick the recovery path:
/// transient errors are retried with backoff, a 401 triggers one forced
/// token refresh, everything else fails immediately.
#[derive(Debug, Error)]
pub enum ProviderCallError {
    /// Access token rejected (HTTP 401)
    #[error("provider rejected access token")]
    Unauthorized,

    /// Worth retrying: 5xx, timeout, connect failure
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Not worth retrying: other 4xx, malformed payload
    #[error("provider request failed: {0}")]
    Fatal(String),
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeBusyRequest {
    pub time_min: String,
    pub time_max: String,
    pub items: Vec<FreeBusyRequestItem>,
}

#[derive(Debug, Serialize)]
pub struct FreeBusyRequestItem {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct FreeBusyResponse {
    pub calendars: std::collections::HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FreeBusyCalendar {
    #[serde(default)]
    pub busy: Vec<FreeBusyPeriod>,
}

#[derive(Debug, Deserialize)]
pub struct FreeBusyPeriod {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub address: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub id: String,
    pub resource_id: Option<String>,
    /// Milliseconds since epoch, as a string.
    pub expiration: Option<String>,
}
