//! Vault-aware calendar gateway
//!
//! Implements the core availability port on top of the protocol client:
//! tokens come from the credential vault, transient failures are retried
//! with exponential backoff, and a 401 triggers exactly one forced token
//! refresh before giving up.

use std::sync::Arc;

use amity_common::resilience::{retry_with_policy, BackoffStrategy, RetryConfig, RetryDecision};
use amity_core::availability::ports::BusyIntervalSource;
use amity_core::companion_ports::CompanionRepository;
use amity_core::credentials::CredentialVault;
use amity_core::webhook_ports::WebhookChannelRepository;
use amity_domain::constants::{PROVIDER_MAX_ATTEMPTS, PROVIDER_RETRY_BASE_MS};
use amity_domain::{
    AmityError, BusyInterval, CredentialErrorKind, Result, WebhookChannel,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::client::GoogleCalendarClient;
use super::types::ProviderCallError;

/// Calendar gateway
pub struct CalendarGateway {
    client: Arc<GoogleCalendarClient>,
    vault: Arc<CredentialVault>,
    companions: Arc<dyn CompanionRepository>,
    channels: Arc<dyn WebhookChannelRepository>,
    webhook_address: String,
    retry: RetryConfig,
}

impl CalendarGateway {
    pub fn new(
        client: Arc<GoogleCalendarClient>,
        vault: Arc<CredentialVault>,
        companions: Arc<dyn CompanionRepository>,
        channels: Arc<dyn WebhookChannelRepository>,
        webhook_address: String,
    ) -> Self {
        Self {
            client,
            vault,
            companions,
            channels,
            webhook_address,
            retry: RetryConfig {
                max_attempts: PROVIDER_MAX_ATTEMPTS,
                backoff: BackoffStrategy::Exponential {
                    base: std::time::Duration::from_millis(PROVIDER_RETRY_BASE_MS),
                    max_delay: std::time::Duration::from_secs(10),
                },
            },
        }
    }

    /// Override the retry configuration (tests use no backoff delay).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Register a push-notification channel for the companion, replacing
    /// any existing registration.
    ///
    /// The channel carries a random validation token the ingester checks
    /// notifications against. Renewal before the provider-side expiry is
    /// the job of an external scheduler.
    #[instrument(skip(self))]
    pub async fn register_webhook_channel(&self, companion_id: Uuid) -> Result<WebhookChannel> {
        let companion = self.require_companion(companion_id).await?;
        let access_token = self.vault.get_valid_token(companion_id).await?;

        let channel_id = Uuid::new_v4().to_string();
        let validation_token = random_token();

        let watched = self
            .client
            .watch_events(
                &access_token,
                &companion.calendar_id,
                &channel_id,
                &validation_token,
                &self.webhook_address,
            )
            .await
            .map_err(provider_error)?;

        let channel = WebhookChannel {
            companion_id,
            channel_id,
            resource_id: watched.resource_id,
            validation_token,
            expires_at: watched.expires_at,
        };
        self.channels.replace_for_companion(&channel).await?;

        info!(%companion_id, channel_id = %channel.channel_id, "webhook channel registered");
        Ok(channel)
    }

    async fn require_companion(
        &self,
        companion_id: Uuid,
    ) -> Result<amity_domain::CompanionProfile> {
        self.companions.get(companion_id).await?.ok_or_else(|| {
            AmityError::NotFound(format!("companion {companion_id} not found"))
        })
    }

    /// Fetch busy periods with the transient-retry budget applied.
    async fn fetch_busy(
        &self,
        access_token: &str,
        calendar_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> std::result::Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, ProviderCallError> {
        let transient_only = |error: &ProviderCallError, _attempt: u32| match error {
            ProviderCallError::Transient(_) => RetryDecision::Retry,
            _ => RetryDecision::Stop,
        };

        retry_with_policy(&self.retry, &transient_only, || {
            self.client.free_busy(access_token, calendar_id, range_start, range_end)
        })
        .await
    }
}

#[async_trait]
impl BusyIntervalSource for CalendarGateway {
    #[instrument(skip(self))]
    async fn list_busy_intervals(
        &self,
        companion_id: Uuid,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>> {
        let companion = self.require_companion(companion_id).await?;
        let access_token = self.vault.get_valid_token(companion_id).await?;

        let periods = match self
            .fetch_busy(&access_token, &companion.calendar_id, range_start, range_end)
            .await
        {
            Ok(periods) => periods,
            Err(ProviderCallError::Unauthorized) => {
                // One forced refresh, one retry. A second 401 is fatal.
                warn!(%companion_id, "access token rejected, forcing refresh");
                let token =
                    self.vault.refresh_after_rejection(companion_id, &access_token).await?;
                match self
                    .fetch_busy(&token, &companion.calendar_id, range_start, range_end)
                    .await
                {
                    Ok(periods) => periods,
                    Err(ProviderCallError::Unauthorized) => {
                        return Err(AmityError::Credential(
                            CredentialErrorKind::ExpiredRefreshToken,
                        ));
                    }
                    Err(err) => return Err(provider_error(err)),
                }
            }
            Err(err) => return Err(provider_error(err)),
        };

        Ok(periods
            .into_iter()
            .map(|(start, end)| BusyInterval { companion_id, start, end })
            .collect())
    }
}

fn provider_error(err: ProviderCallError) -> AmityError {
    match err {
        ProviderCallError::Unauthorized => {
            AmityError::Credential(CredentialErrorKind::ExpiredRefreshToken)
        }
        ProviderCallError::Transient(msg) | ProviderCallError::Fatal(msg) => {
            AmityError::ExternalService(msg)
        }
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
