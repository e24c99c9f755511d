//! Thin protocol client for the Google Calendar API
//!
//! Speaks the token, freeBusy and push-channel endpoints. Carries no retry
//! logic of its own; the gateway decides what to do with classified
//! failures.

use amity_core::credentials::ports::CalendarAuthApi;
use amity_domain::constants::PROVIDER_TIMEOUT_SECS;
use amity_domain::{
    AmityError, CredentialErrorKind, GoogleConfig, Result, TokenSet,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::types::{
    FreeBusyPeriod, FreeBusyRequest, FreeBusyRequestItem, FreeBusyResponse, ProviderCallError,
    TokenResponse, WatchRequest, WatchResponse,
};

/// Push channels expire on the provider side; this default applies when no
/// expiration is echoed back.
const DEFAULT_CHANNEL_LIFETIME_DAYS: i64 = 7;

/// Google Calendar protocol client
pub struct GoogleCalendarClient {
    http: Client,
    config: GoogleConfig,
}

impl GoogleCalendarClient {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|err| AmityError::Config(format!("http client: {err}")))?;
        Ok(Self { http, config })
    }

    /// Scopes requested during the consent flow.
    pub fn scopes(&self) -> &[String] {
        &self.config.scopes
    }

    /// Provider consent URL for the authorize redirect.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = url::Url::parse(&self.config.authorization_endpoint)
            .map_err(|err| AmityError::Config(format!("authorization endpoint: {err}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Ordered busy periods for a calendar within `[time_min, time_max)`.
    pub async fn free_busy(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> std::result::Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, ProviderCallError> {
        let request = FreeBusyRequest {
            time_min: time_min.to_rfc3339(),
            time_max: time_max.to_rfc3339(),
            items: vec![FreeBusyRequestItem { id: calendar_id.to_string() }],
        };

        let response = self
            .http
            .post(format!("{}/freeBusy", self.config.api_base))
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let response = check_status(response).await?;
        let mut payload: FreeBusyResponse = response
            .json()
            .await
            .map_err(|err| ProviderCallError::Fatal(format!("freeBusy response: {err}")))?;

        let busy =
            payload.calendars.remove(calendar_id).map(|calendar| calendar.busy).unwrap_or_default();
        let mut periods = Vec::with_capacity(busy.len());
        for FreeBusyPeriod { start, end } in busy {
            periods.push((parse_rfc3339(&start)?, parse_rfc3339(&end)?));
        }
        periods.sort_by_key(|(start, end)| (*start, *end));

        debug!(calendar_id, busy_count = periods.len(), "freeBusy fetched");
        Ok(periods)
    }

    /// Register a push-notification channel for a calendar's events.
    pub async fn watch_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        channel_id: &str,
        channel_token: &str,
        address: &str,
    ) -> std::result::Result<WatchedChannel, ProviderCallError> {
        let request = WatchRequest {
            id: channel_id.to_string(),
            channel_type: "web_hook".to_string(),
            address: address.to_string(),
            token: channel_token.to_string(),
        };

        let response = self
            .http
            .post(format!(
                "{}/calendars/{}/events/watch",
                self.config.api_base,
                urlencode(calendar_id)
            ))
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let response = check_status(response).await?;
        let payload: WatchResponse = response
            .json()
            .await
            .map_err(|err| ProviderCallError::Fatal(format!("watch response: {err}")))?;

        let expires_at = payload
            .expiration
            .as_deref()
            .and_then(|millis| millis.parse::<i64>().ok())
            .and_then(|millis| DateTime::<Utc>::from_timestamp_millis(millis))
            .unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_CHANNEL_LIFETIME_DAYS));

        Ok(WatchedChannel { resource_id: payload.resource_id, expires_at })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet> {
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|err| AmityError::Network(format!("token endpoint: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("invalid_grant") {
                warn!(%status, "provider rejected grant");
                return Err(AmityError::Credential(CredentialErrorKind::InvalidGrant));
            }
            return Err(AmityError::ExternalService(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|err| AmityError::ExternalService(format!("token response: {err}")))?;

        Ok(TokenSet {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            expires_at: Utc::now() + Duration::seconds(payload.expires_in),
            scopes: payload
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

/// Result of a successful channel registration.
pub struct WatchedChannel {
    pub resource_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
impl CalendarAuthApi for GoogleCalendarClient {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet> {
        self.token_request(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet> {
        self.token_request(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}

async fn check_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, ProviderCallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ProviderCallError::Unauthorized);
    }
    if status.is_server_error() {
        return Err(ProviderCallError::Transient(format!("{status}: {body}")));
    }
    Err(ProviderCallError::Fatal(format!("{status}: {body}")))
}

fn classify_transport_error(err: reqwest::Error) -> ProviderCallError {
    if err.is_timeout() || err.is_connect() {
        ProviderCallError::Transient(err.to_string())
    } else {
        ProviderCallError::Fatal(err.to_string())
    }
}

fn parse_rfc3339(value: &str) -> std::result::Result<DateTime<Utc>, ProviderCallError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| ProviderCallError::Fatal(format!("bad timestamp {value}: {err}")))
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
