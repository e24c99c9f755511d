//! Credential vault with single-flight refresh
//!
//! Owns OAuth access/refresh tokens per companion:
//! - Token retrieval with auto-refresh before expiry (5 min margin)
//! - Single-flight: concurrent callers share one in-flight refresh
//! - Provider-rejected refresh clears the stored credential

use std::sync::Arc;

use amity_common::time::Clock;
use amity_domain::constants::TOKEN_REFRESH_MARGIN_SECS;
use amity_domain::{
    AmityError, CalendarCredential, CredentialErrorKind, Result, TokenSet,
};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ports::{CalendarAuthApi, CredentialStore};

/// Credential vault
///
/// The only owner of [`CalendarCredential`] records; all mutation goes
/// through [`store`](Self::store), refresh, or [`revoke`](Self::revoke).
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    auth: Arc<dyn CalendarAuthApi>,
    clock: Arc<dyn Clock>,
    refresh_margin_secs: i64,
    refresh_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl CredentialVault {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        auth: Arc<dyn CalendarAuthApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            auth,
            clock,
            refresh_margin_secs: TOKEN_REFRESH_MARGIN_SECS,
            refresh_locks: DashMap::new(),
        }
    }

    /// Override the refresh safety margin (tests use a tighter window).
    pub fn with_refresh_margin(mut self, margin_secs: i64) -> Self {
        self.refresh_margin_secs = margin_secs;
        self
    }

    /// Get a non-expired access token for the companion.
    ///
    /// Refreshes when the stored token expires within the safety margin.
    /// Concurrent callers for the same companion share one in-flight
    /// refresh instead of issuing duplicates.
    #[instrument(skip(self))]
    pub async fn get_valid_token(&self, companion_id: Uuid) -> Result<String> {
        let credential = self.load_required(companion_id).await?;

        if !credential.expires_within(self.refresh_margin_secs, self.clock.now_utc()) {
            return Ok(credential.access_token);
        }

        let lock = self.refresh_lock(companion_id);
        let _guard = lock.lock().await;

        // Re-check under the lock: a concurrent caller may have already
        // refreshed while this one was waiting.
        let credential = self.load_required(companion_id).await?;
        if !credential.expires_within(self.refresh_margin_secs, self.clock.now_utc()) {
            debug!(%companion_id, "token refreshed by concurrent caller");
            return Ok(credential.access_token);
        }

        let refreshed = self.refresh_locked(credential).await?;
        Ok(refreshed.access_token)
    }

    /// Refresh after the provider rejected `rejected_token` with a 401.
    ///
    /// Shares the same single-flight guarantee: if another caller already
    /// replaced the rejected token, its result is reused.
    #[instrument(skip(self, rejected_token))]
    pub async fn refresh_after_rejection(
        &self,
        companion_id: Uuid,
        rejected_token: &str,
    ) -> Result<String> {
        let lock = self.refresh_lock(companion_id);
        let _guard = lock.lock().await;

        let credential = self.load_required(companion_id).await?;
        if credential.access_token != rejected_token {
            debug!(%companion_id, "rejected token already rotated");
            return Ok(credential.access_token);
        }

        let refreshed = self.refresh_locked(credential).await?;
        Ok(refreshed.access_token)
    }

    /// Idempotent upsert after an OAuth code exchange.
    pub async fn store(&self, companion_id: Uuid, tokens: &TokenSet) -> Result<CalendarCredential> {
        let credential =
            CalendarCredential::from_token_set(companion_id, tokens).ok_or_else(|| {
                warn!(%companion_id, "provider issued no refresh token");
                AmityError::Credential(CredentialErrorKind::InvalidGrant)
            })?;

        self.store.upsert(&credential).await?;
        info!(%companion_id, "calendar credential stored");
        Ok(credential)
    }

    /// Clear the stored credential. Best-effort: the provider-side grant is
    /// not revoked.
    pub async fn revoke(&self, companion_id: Uuid) -> Result<()> {
        self.store.delete(companion_id).await?;
        info!(%companion_id, "calendar credential revoked");
        Ok(())
    }

    /// True when a credential is stored for the companion.
    pub async fn is_connected(&self, companion_id: Uuid) -> Result<bool> {
        Ok(self.store.load(companion_id).await?.is_some())
    }

    async fn load_required(&self, companion_id: Uuid) -> Result<CalendarCredential> {
        self.store.load(companion_id).await?.ok_or_else(|| {
            AmityError::NotFound(format!("no calendar credential for companion {companion_id}"))
        })
    }

    /// Execute the provider refresh. Caller must hold the companion's
    /// refresh lock.
    async fn refresh_locked(&self, credential: CalendarCredential) -> Result<CalendarCredential> {
        let companion_id = credential.companion_id;

        let tokens = match self.auth.refresh_access_token(&credential.refresh_token).await {
            Ok(tokens) => tokens,
            Err(AmityError::Credential(kind)) => {
                // The grant is dead: surface as "reconnect calendar" and
                // drop the stored credential so we stop hammering the
                // provider with it.
                warn!(%companion_id, %kind, "provider rejected refresh token");
                self.store.delete(companion_id).await?;
                return Err(AmityError::Credential(CredentialErrorKind::ExpiredRefreshToken));
            }
            Err(err) => return Err(err),
        };

        let updated = credential.refreshed(&tokens);
        self.store.upsert(&updated).await?;
        info!(%companion_id, "access token refreshed");
        Ok(updated)
    }

    fn refresh_lock(&self, companion_id: Uuid) -> Arc<Mutex<()>> {
        self.refresh_locks.entry(companion_id).or_default().clone()
    }
}
