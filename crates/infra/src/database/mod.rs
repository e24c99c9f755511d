//! Database implementations

pub mod appointment_repository;
pub mod companion_repository;
pub mod credential_repository;
pub mod manager;
pub mod quota_repository;
pub mod webhook_channel_repository;
pub mod working_hours_repository;

pub use appointment_repository::SqliteAppointmentRepository;
pub use companion_repository::SqliteCompanionRepository;
pub use credential_repository::SqliteCredentialStore;
pub use manager::{DbConnection, DbManager};
pub use quota_repository::SqliteQuotaRepository;
pub use webhook_channel_repository::SqliteWebhookChannelRepository;
pub use working_hours_repository::SqliteWorkingHoursRepository;
