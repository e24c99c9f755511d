//! Webhook ingestion

pub mod ingester;

pub use ingester::{ReconcileSink, WebhookIngester, WebhookNotification};
