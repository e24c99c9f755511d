//! Port interfaces for the credential vault
//!
//! These traits define the boundaries between the vault's business rules
//! and the credential store / calendar provider implementations.

use async_trait::async_trait;
use amity_domain::{CalendarCredential, Result, TokenSet};
use uuid::Uuid;

/// Trait for persisting calendar credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored credential for a companion
    async fn load(&self, companion_id: Uuid) -> Result<Option<CalendarCredential>>;

    /// Insert or replace the credential for a companion
    async fn upsert(&self, credential: &CalendarCredential) -> Result<()>;

    /// Remove the stored credential, if any
    async fn delete(&self, companion_id: Uuid) -> Result<()>;
}

/// Trait for the provider's OAuth token endpoints
#[async_trait]
pub trait CalendarAuthApi: Send + Sync {
    /// Exchange an authorization code for tokens. One-shot: authorization
    /// codes are single-use, so this is never retried.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet>;

    /// Refresh an access token using a refresh token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet>;
}
