//! Subscription and quota types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::FREE_PLAN_INTERACTIONS;

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Free,
    Premium,
    Unlimited,
}

impl PlanType {
    /// Interaction ceiling for the plan; `None` means unlimited.
    pub fn interactions_allowed(self) -> Option<u32> {
        match self {
            Self::Free => Some(FREE_PLAN_INTERACTIONS),
            Self::Premium => Some(100),
            Self::Unlimited => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
            Self::Unlimited => "unlimited",
        }
    }
}

impl std::str::FromStr for PlanType {
    type Err = crate::errors::AmityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            "unlimited" => Ok(Self::Unlimited),
            other => {
                Err(crate::errors::AmityError::InvalidInput(format!("unknown plan: {other}")))
            }
        }
    }
}

/// Per-user interaction quota for the current billing period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionQuota {
    pub user_id: Uuid,
    pub plan: PlanType,
    pub interactions_allowed: Option<u32>,
    pub interactions_used: u32,
}

impl SubscriptionQuota {
    /// Fresh quota row for a plan with zero usage.
    pub fn for_plan(user_id: Uuid, plan: PlanType) -> Self {
        Self { user_id, plan, interactions_allowed: plan.interactions_allowed(), interactions_used: 0 }
    }

    /// True when another interaction can be reserved.
    pub fn has_headroom(&self) -> bool {
        match self.interactions_allowed {
            Some(allowed) => self.interactions_used < allowed,
            None => true,
        }
    }
}

/// Subscription lifecycle event consumed from the payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Activated { plan: PlanType },
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_ceilings() {
        assert_eq!(PlanType::Free.interactions_allowed(), Some(FREE_PLAN_INTERACTIONS));
        assert_eq!(PlanType::Unlimited.interactions_allowed(), None);
    }

    #[test]
    fn headroom_respects_unlimited() {
        let mut quota = SubscriptionQuota::for_plan(Uuid::new_v4(), PlanType::Unlimited);
        quota.interactions_used = 1_000_000;
        assert!(quota.has_headroom());

        let mut quota = SubscriptionQuota::for_plan(Uuid::new_v4(), PlanType::Free);
        quota.interactions_used = FREE_PLAN_INTERACTIONS;
        assert!(!quota.has_headroom());
    }
}
