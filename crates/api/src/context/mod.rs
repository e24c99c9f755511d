//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use amity_common::time::SystemClock;
use amity_core::availability::ReconcilerService;
use amity_core::billing::QuotaLedger;
use amity_core::booking::BookingCoordinator;
use amity_core::companion_ports::CompanionRepository as CompanionRepositoryPort;
use amity_core::credentials::CredentialVault;
use amity_core::webhook_ports::WebhookChannelRepository as WebhookChannelRepositoryPort;
use amity_core::{AppointmentRepository, WorkingHoursRepository};
use amity_domain::constants::OAUTH_STATE_TTL_SECS;
use amity_domain::{Config, Result};
use amity_infra::{
    CalendarGateway, DbManager, GoogleCalendarClient, SqliteAppointmentRepository,
    SqliteCompanionRepository, SqliteCredentialStore, SqliteQuotaRepository,
    SqliteWebhookChannelRepository, SqliteWorkingHoursRepository, WebhookIngester,
};
use moka::sync::Cache;
use uuid::Uuid;

/// Type alias for companion repository trait object
type DynCompanionRepository = dyn CompanionRepositoryPort + 'static;

/// Type alias for working hours repository trait object
type DynWorkingHoursRepository = dyn WorkingHoursRepository + 'static;

/// Type alias for appointment repository trait object
type DynAppointmentRepository = dyn AppointmentRepository + 'static;

/// Type alias for webhook channel repository trait object
type DynWebhookChannelRepository = dyn WebhookChannelRepositoryPort + 'static;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,

    // Repositories
    pub companions: Arc<DynCompanionRepository>,
    pub working_hours: Arc<DynWorkingHoursRepository>,
    pub appointments: Arc<DynAppointmentRepository>,
    pub channels: Arc<DynWebhookChannelRepository>,

    // Services
    pub calendar_client: Arc<GoogleCalendarClient>,
    pub vault: Arc<CredentialVault>,
    pub gateway: Arc<CalendarGateway>,
    pub reconciler: Arc<ReconcilerService>,
    pub booking: Arc<BookingCoordinator>,
    pub quota: Arc<QuotaLedger>,
    pub ingester: Arc<WebhookIngester>,

    /// In-flight OAuth state nonces, bound to the companion they authorize.
    pub oauth_states: Cache<String, Uuid>,
}

impl AppContext {
    /// Build the full dependency graph from configuration.
    ///
    /// Runs database migrations as part of startup.
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let companions: Arc<DynCompanionRepository> =
            Arc::new(SqliteCompanionRepository::new(db.clone()));
        let working_hours: Arc<DynWorkingHoursRepository> =
            Arc::new(SqliteWorkingHoursRepository::new(db.clone()));
        let appointments: Arc<DynAppointmentRepository> =
            Arc::new(SqliteAppointmentRepository::new(db.clone()));
        let channels: Arc<DynWebhookChannelRepository> =
            Arc::new(SqliteWebhookChannelRepository::new(db.clone()));
        let credential_store = Arc::new(SqliteCredentialStore::new(db.clone()));
        let quota_repository = Arc::new(SqliteQuotaRepository::new(db.clone()));

        let clock = Arc::new(SystemClock);
        let calendar_client = Arc::new(GoogleCalendarClient::new(config.google.clone())?);

        let vault = Arc::new(CredentialVault::new(
            credential_store,
            calendar_client.clone(),
            clock.clone(),
        ));

        let webhook_address = format!("{}/webhooks/calendar", config.server.public_url);
        let gateway = Arc::new(CalendarGateway::new(
            calendar_client.clone(),
            vault.clone(),
            companions.clone(),
            channels.clone(),
            webhook_address,
        ));

        let reconciler = Arc::new(ReconcilerService::new(
            companions.clone(),
            working_hours.clone(),
            appointments.clone(),
            gateway.clone(),
        ));

        let quota = Arc::new(QuotaLedger::new(quota_repository));
        let booking = Arc::new(BookingCoordinator::new(
            appointments.clone(),
            quota.clone(),
            clock.clone(),
        ));

        let ingester =
            Arc::new(WebhookIngester::new(channels.clone(), reconciler.clone(), clock));

        let oauth_states = Cache::builder()
            .time_to_live(Duration::from_secs(OAUTH_STATE_TTL_SECS))
            .max_capacity(10_000)
            .build();

        Ok(Arc::new(Self {
            config,
            db,
            companions,
            working_hours,
            appointments,
            channels,
            calendar_client,
            vault,
            gateway,
            reconciler,
            booking,
            quota,
            ingester,
            oauth_states,
        }))
    }
}
