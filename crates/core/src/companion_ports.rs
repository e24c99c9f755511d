//! Companion profile port interface

use async_trait::async_trait;
use amity_domain::{CompanionProfile, Result};
use uuid::Uuid;

/// Trait for companion profile lookups
#[async_trait]
pub trait CompanionRepository: Send + Sync {
    /// Fetch one companion by id
    async fn get(&self, companion_id: Uuid) -> Result<Option<CompanionProfile>>;

    /// Insert a new companion profile
    async fn insert(&self, profile: &CompanionProfile) -> Result<()>;

    /// Ids of companions with a connected calendar, for the periodic
    /// reconciliation poll
    async fn list_connected_ids(&self) -> Result<Vec<Uuid>>;
}
