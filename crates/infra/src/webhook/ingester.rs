//! Webhook ingestion worker
//!
//! Receives provider push notifications, validates them against the
//! channel registry, deduplicates, and schedules targeted reconciliation
//! across the provider's guaranteed notification window. Scheduling is
//! asynchronous: the webhook response is never delayed by reconciliation.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use amity_common::time::Clock;
use amity_core::availability::ReconcilerService;
use amity_core::webhook_ports::WebhookChannelRepository;
use amity_domain::constants::{WEBHOOK_DEDUP_TTL_SECS, WEBHOOK_RESYNC_DAYS};
use amity_domain::{AmityError, AvailabilitySlot, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use moka::sync::Cache;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A provider push notification, as delivered to the webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotification {
    pub channel_id: String,
    pub channel_token: Option<String>,
    pub resource_state: String,
    /// Provider-supplied change marker used for deduplication.
    pub message_number: Option<u64>,
}

/// Reconciliation entry point the ingester schedules against.
#[async_trait]
pub trait ReconcileSink: Send + Sync {
    async fn reconcile_date(
        &self,
        companion_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>>;
}

#[async_trait]
impl ReconcileSink for ReconcilerService {
    async fn reconcile_date(
        &self,
        companion_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>> {
        self.reconcile(companion_id, date).await
    }
}

/// Webhook ingestion worker
pub struct WebhookIngester {
    channels: Arc<dyn WebhookChannelRepository>,
    reconciler: Arc<dyn ReconcileSink>,
    clock: Arc<dyn Clock>,
    seen: Cache<String, ()>,
    resync_days: u64,
}

impl WebhookIngester {
    pub fn new(
        channels: Arc<dyn WebhookChannelRepository>,
        reconciler: Arc<dyn ReconcileSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            channels,
            reconciler,
            clock,
            seen: Cache::builder()
                .time_to_live(StdDuration::from_secs(WEBHOOK_DEDUP_TTL_SECS))
                .max_capacity(100_000)
                .build(),
            resync_days: WEBHOOK_RESYNC_DAYS as u64,
        }
    }

    /// Validate, deduplicate and schedule.
    ///
    /// Returns the join handle of the scheduled reconciliation sweep so
    /// callers that need completion (tests, shutdown draining) can await
    /// it; the webhook endpoint just drops it. Validation failures come
    /// back as `WebhookValidation` and must be acknowledged to the
    /// provider with a 200, never surfaced as fatal.
    #[instrument(skip(self, notification), fields(channel_id = %notification.channel_id))]
    pub async fn ingest(
        &self,
        notification: WebhookNotification,
    ) -> Result<Option<JoinHandle<()>>> {
        let channel =
            self.channels.find_by_channel_id(&notification.channel_id).await?.ok_or_else(
                || {
                    AmityError::WebhookValidation(format!(
                        "unknown channel id {}",
                        notification.channel_id
                    ))
                },
            )?;

        if notification.channel_token.as_deref() != Some(channel.validation_token.as_str()) {
            return Err(AmityError::WebhookValidation(format!(
                "channel token mismatch for channel {}",
                notification.channel_id
            )));
        }

        let dedup_key = format!(
            "{}:{}:{}",
            notification.channel_id,
            notification.resource_state,
            notification.message_number.unwrap_or(0)
        );
        if self.seen.contains_key(&dedup_key) {
            debug!(dedup_key, "duplicate notification ignored");
            return Ok(None);
        }
        self.seen.insert(dedup_key, ());

        match notification.resource_state.as_str() {
            "sync" | "exists" => {
                Ok(Some(self.schedule_resync(channel.companion_id)))
            }
            other => {
                debug!(resource_state = other, "resource state needs no reconciliation");
                Ok(None)
            }
        }
    }

    /// Spawn the reconciliation sweep over today plus the following days
    /// of the notification window. Per-companion ordering comes from the
    /// reconciler's keyed lock.
    fn schedule_resync(&self, companion_id: Uuid) -> JoinHandle<()> {
        let reconciler = Arc::clone(&self.reconciler);
        let today = self.clock.now_utc().date_naive();
        let days = self.resync_days;

        info!(%companion_id, days, "scheduling webhook-driven resync");
        tokio::spawn(async move {
            for offset in 0..days {
                let Some(date) = today.checked_add_days(Days::new(offset)) else {
                    break;
                };
                if let Err(err) = reconciler.reconcile_date(companion_id, date).await {
                    warn!(%companion_id, %date, error = %err, "webhook-driven reconciliation failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    use amity_common::time::MockClock;
    use amity_domain::WebhookChannel;
    use chrono::{TimeZone, Utc};

    use super::*;

    #[derive(Default)]
    struct InMemoryChannels {
        rows: StdMutex<HashMap<Uuid, WebhookChannel>>,
    }

    #[async_trait]
    impl WebhookChannelRepository for InMemoryChannels {
        async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<WebhookChannel>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .find(|c| c.channel_id == channel_id)
                .cloned())
        }

        async fn find_by_companion(&self, companion_id: Uuid) -> Result<Option<WebhookChannel>> {
            Ok(self.rows.lock().unwrap().get(&companion_id).cloned())
        }

        async fn replace_for_companion(&self, channel: &WebhookChannel) -> Result<()> {
            self.rows.lock().unwrap().insert(channel.companion_id, channel.clone());
            Ok(())
        }

        async fn delete_for_companion(&self, companion_id: Uuid) -> Result<()> {
            self.rows.lock().unwrap().remove(&companion_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSink {
        runs: AtomicU32,
    }

    #[async_trait]
    impl ReconcileSink for CountingSink {
        async fn reconcile_date(
            &self,
            _companion_id: Uuid,
            _date: NaiveDate,
        ) -> Result<Vec<AvailabilitySlot>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).single().expect("valid time")
    }

    async fn harness() -> (WebhookIngester, Arc<CountingSink>, Uuid) {
        let channels = Arc::new(InMemoryChannels::default());
        let sink = Arc::new(CountingSink::default());
        let companion_id = Uuid::new_v4();

        channels
            .replace_for_companion(&WebhookChannel {
                companion_id,
                channel_id: "chan-1".into(),
                resource_id: None,
                validation_token: "secret-token".into(),
                expires_at: now() + chrono::Duration::days(7),
            })
            .await
            .expect("channel seeded");

        let ingester =
            WebhookIngester::new(channels, sink.clone(), Arc::new(MockClock::new(now())));
        (ingester, sink, companion_id)
    }

    fn notification(message_number: u64) -> WebhookNotification {
        WebhookNotification {
            channel_id: "chan-1".into(),
            channel_token: Some("secret-token".into()),
            resource_state: "exists".into(),
            message_number: Some(message_number),
        }
    }

    #[tokio::test]
    async fn valid_notification_schedules_full_window() {
        let (ingester, sink, _companion_id) = harness().await;

        let handle = ingester.ingest(notification(1)).await.expect("ingested").expect("scheduled");
        handle.await.expect("sweep finished");

        assert_eq!(sink.runs.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn duplicate_notification_is_a_no_op() {
        let (ingester, sink, _companion_id) = harness().await;

        let handle = ingester.ingest(notification(7)).await.expect("ingested").expect("scheduled");
        handle.await.expect("sweep finished");

        let second = ingester.ingest(notification(7)).await.expect("ingested");
        assert!(second.is_none());
        assert_eq!(sink.runs.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn distinct_markers_schedule_separately() {
        let (ingester, sink, _companion_id) = harness().await;

        let first = ingester.ingest(notification(1)).await.expect("ingested").expect("scheduled");
        first.await.expect("sweep finished");
        let second = ingester.ingest(notification(2)).await.expect("ingested").expect("scheduled");
        second.await.expect("sweep finished");

        assert_eq!(sink.runs.load(Ordering::SeqCst), 14);
    }

    #[tokio::test]
    async fn token_mismatch_is_a_validation_error() {
        let (ingester, sink, _companion_id) = harness().await;

        let mut bad = notification(1);
        bad.channel_token = Some("wrong".into());

        let err = ingester.ingest(bad).await.expect_err("rejected");
        assert!(matches!(err, AmityError::WebhookValidation(_)));
        assert_eq!(sink.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_channel_is_a_validation_error() {
        let (ingester, sink, _companion_id) = harness().await;

        let mut unknown = notification(1);
        unknown.channel_id = "chan-unknown".into();

        let err = ingester.ingest(unknown).await.expect_err("rejected");
        assert!(matches!(err, AmityError::WebhookValidation(_)));
        assert_eq!(sink.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn other_resource_states_are_acknowledged_without_work() {
        let (ingester, sink, _companion_id) = harness().await;

        let mut gone = notification(1);
        gone.resource_state = "not_exists".into();

        let scheduled = ingester.ingest(gone).await.expect("ingested");
        assert!(scheduled.is_none());
        assert_eq!(sink.runs.load(Ordering::SeqCst), 0);
    }
}
