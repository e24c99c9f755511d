//! Quota ledger
//!
//! Tracks per-subscription interaction counts. Reservation is an atomic
//! check-and-increment against the plan ceiling; release exists only to
//! roll a failed booking back.

use std::sync::Arc;

use amity_domain::{AmityError, PlanType, Result, SubscriptionEvent, SubscriptionQuota};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::ports::QuotaRepository;

/// Quota ledger service
pub struct QuotaLedger {
    repository: Arc<dyn QuotaRepository>,
}

impl QuotaLedger {
    pub fn new(repository: Arc<dyn QuotaRepository>) -> Self {
        Self { repository }
    }

    /// Reserve one interaction for the user.
    ///
    /// Users without a quota row are given the free plan on first use.
    /// Fails with `QuotaExceeded` when the ceiling is reached; the
    /// check-and-increment is atomic with respect to concurrent
    /// reservations for the same user.
    #[instrument(skip(self))]
    pub async fn reserve(&self, user_id: Uuid) -> Result<()> {
        self.repository.ensure_plan(user_id, PlanType::Free).await?;

        if self.repository.try_reserve(user_id).await? {
            debug!(%user_id, "interaction reserved");
            Ok(())
        } else {
            Err(AmityError::QuotaExceeded)
        }
    }

    /// Roll back a reservation. Never drives usage below zero.
    pub async fn release(&self, user_id: Uuid) -> Result<()> {
        self.repository.release(user_id).await
    }

    /// Current usage for the quota check API.
    pub async fn usage(&self, user_id: Uuid) -> Result<SubscriptionQuota> {
        self.repository.ensure_plan(user_id, PlanType::Free).await?;
        self.repository.get(user_id).await?.ok_or_else(|| {
            AmityError::Internal(format!("quota row missing for user {user_id}"))
        })
    }

    /// Consume a subscription lifecycle event from the payment flow.
    ///
    /// Usage is preserved across plan changes; it resets only on the
    /// billing-cycle rollover, which is out of scope here.
    #[instrument(skip(self))]
    pub async fn apply_subscription_event(
        &self,
        user_id: Uuid,
        event: SubscriptionEvent,
    ) -> Result<()> {
        let plan = match event {
            SubscriptionEvent::Activated { plan } => plan,
            SubscriptionEvent::Cancelled => PlanType::Free,
        };
        self.repository.set_plan(user_id, plan).await?;
        info!(%user_id, plan = plan.as_str(), "subscription plan applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;

    /// In-memory quota store whose reserve mirrors the SQL conditional
    /// UPDATE: one locked check-and-increment.
    #[derive(Default)]
    struct InMemoryQuotaRepository {
        rows: StdMutex<HashMap<Uuid, SubscriptionQuota>>,
    }

    #[async_trait]
    impl QuotaRepository for InMemoryQuotaRepository {
        async fn get(&self, user_id: Uuid) -> Result<Option<SubscriptionQuota>> {
            Ok(self.rows.lock().unwrap().get(&user_id).cloned())
        }

        async fn try_reserve(&self, user_id: Uuid) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&user_id) {
                Some(quota) if quota.has_headroom() => {
                    quota.interactions_used += 1;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn release(&self, user_id: Uuid) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(quota) = rows.get_mut(&user_id) {
                quota.interactions_used = quota.interactions_used.saturating_sub(1);
            }
            Ok(())
        }

        async fn ensure_plan(&self, user_id: Uuid, plan: PlanType) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .entry(user_id)
                .or_insert_with(|| SubscriptionQuota::for_plan(user_id, plan));
            Ok(())
        }

        async fn set_plan(&self, user_id: Uuid, plan: PlanType) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            let quota =
                rows.entry(user_id).or_insert_with(|| SubscriptionQuota::for_plan(user_id, plan));
            quota.plan = plan;
            quota.interactions_allowed = plan.interactions_allowed();
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_use_creates_free_plan_row() {
        let ledger = QuotaLedger::new(Arc::new(InMemoryQuotaRepository::default()));
        let user_id = Uuid::new_v4();

        ledger.reserve(user_id).await.unwrap();

        let usage = ledger.usage(user_id).await.unwrap();
        assert_eq!(usage.plan, PlanType::Free);
        assert_eq!(usage.interactions_used, 1);
    }

    #[tokio::test]
    async fn ceiling_is_never_exceeded_under_concurrency() {
        let ledger = Arc::new(QuotaLedger::new(Arc::new(InMemoryQuotaRepository::default())));
        let user_id = Uuid::new_v4();

        // Free plan allows 10; fire 25 concurrent reservations.
        let attempts: Vec<_> = (0..25)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.reserve(user_id).await })
            })
            .collect();

        let results = futures::future::try_join_all(attempts).await.unwrap();
        let granted = results.iter().filter(|r| r.is_ok()).count();
        let denied = results.iter().filter(|r| r.is_err()).count();

        assert_eq!(granted, 10);
        assert_eq!(denied, 15);

        let usage = ledger.usage(user_id).await.unwrap();
        assert_eq!(usage.interactions_used, 10);
        assert_eq!(usage.interactions_allowed, Some(10));
    }

    #[tokio::test]
    async fn release_floors_at_zero() {
        let ledger = QuotaLedger::new(Arc::new(InMemoryQuotaRepository::default()));
        let user_id = Uuid::new_v4();

        ledger.usage(user_id).await.unwrap();
        ledger.release(user_id).await.unwrap();

        let usage = ledger.usage(user_id).await.unwrap();
        assert_eq!(usage.interactions_used, 0);
    }

    #[tokio::test]
    async fn activation_lifts_the_ceiling_and_keeps_usage() {
        let ledger = QuotaLedger::new(Arc::new(InMemoryQuotaRepository::default()));
        let user_id = Uuid::new_v4();

        for _ in 0..10 {
            ledger.reserve(user_id).await.unwrap();
        }
        assert!(matches!(ledger.reserve(user_id).await.unwrap_err(), AmityError::QuotaExceeded));

        ledger
            .apply_subscription_event(
                user_id,
                SubscriptionEvent::Activated { plan: PlanType::Premium },
            )
            .await
            .unwrap();

        // Usage carried over; the new ceiling admits more interactions.
        let usage = ledger.usage(user_id).await.unwrap();
        assert_eq!(usage.interactions_used, 10);
        ledger.reserve(user_id).await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_downgrades_to_free() {
        let ledger = QuotaLedger::new(Arc::new(InMemoryQuotaRepository::default()));
        let user_id = Uuid::new_v4();

        ledger
            .apply_subscription_event(
                user_id,
                SubscriptionEvent::Activated { plan: PlanType::Unlimited },
            )
            .await
            .unwrap();
        assert_eq!(ledger.usage(user_id).await.unwrap().interactions_allowed, None);

        ledger.apply_subscription_event(user_id, SubscriptionEvent::Cancelled).await.unwrap();
        assert_eq!(
            ledger.usage(user_id).await.unwrap().interactions_allowed,
            Some(amity_domain::constants::FREE_PLAN_INTERACTIONS)
        );
    }
}
