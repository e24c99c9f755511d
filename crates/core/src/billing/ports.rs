//! Port interfaces for quota persistence

use async_trait::async_trait;
use amity_domain::{PlanType, Result, SubscriptionQuota};
use uuid::Uuid;

/// Trait for persisting subscription quotas
///
/// `try_reserve` is the concurrency-critical operation: the
/// check-and-increment must be a single atomic unit with respect to
/// concurrent reservations for the same user.
#[async_trait]
pub trait QuotaRepository: Send + Sync {
    /// Fetch the quota row for a user
    async fn get(&self, user_id: Uuid) -> Result<Option<SubscriptionQuota>>;

    /// Atomically increment usage when headroom remains. Returns false
    /// when the ceiling is reached (or no row exists).
    async fn try_reserve(&self, user_id: Uuid) -> Result<bool>;

    /// Decrement usage, floored at zero. Rollback only.
    async fn release(&self, user_id: Uuid) -> Result<()>;

    /// Create the quota row with the plan's ceiling if none exists yet.
    /// Existing rows are left untouched.
    async fn ensure_plan(&self, user_id: Uuid, plan: PlanType) -> Result<()>;

    /// Upsert the plan and its ceiling, preserving current usage.
    async fn set_plan(&self, user_id: Uuid, plan: PlanType) -> Result<()>;
}
