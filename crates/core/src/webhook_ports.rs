//! Webhook channel registry port interface
//!
//! The channel registry is the authoritative join between provider channel
//! ids and companions: lookups go through it, never free-form.

use async_trait::async_trait;
use amity_domain::{Result, WebhookChannel};
use uuid::Uuid;

/// Trait for the keyed webhook channel registry
#[async_trait]
pub trait WebhookChannelRepository: Send + Sync {
    /// Find the channel record by provider channel id
    async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<WebhookChannel>>;

    /// Find the active channel for a companion
    async fn find_by_companion(&self, companion_id: Uuid) -> Result<Option<WebhookChannel>>;

    /// Register a channel, replacing any existing record for the companion
    async fn replace_for_companion(&self, channel: &WebhookChannel) -> Result<()>;

    /// Remove the channel for a companion
    async fn delete_for_companion(&self, companion_id: Uuid) -> Result<()>;
}
