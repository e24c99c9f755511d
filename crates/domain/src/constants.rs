//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Availability slotting
pub const SLOT_LENGTH_MINUTES: i64 = 30;

// Credential lifecycle
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

// Calendar provider calls
pub const PROVIDER_TIMEOUT_SECS: u64 = 10;
pub const PROVIDER_MAX_ATTEMPTS: u32 = 3;
pub const PROVIDER_RETRY_BASE_MS: u64 = 500;

// Booking commit protocol
pub const SLOT_LOCK_WAIT_SECS: u64 = 5;

// Webhook-driven resync
pub const WEBHOOK_RESYNC_DAYS: i64 = 7;
pub const WEBHOOK_DEDUP_TTL_SECS: u64 = 600;

// Reconciliation
pub const RECONCILE_RUN_BUDGET_SECS: u64 = 60;
pub const SLOT_SNAPSHOT_TTL_SECS: u64 = 86_400;

// OAuth flow
pub const OAUTH_STATE_TTL_SECS: u64 = 600;

// Billing
pub const FREE_PLAN_INTERACTIONS: u32 = 10;
