//! Google Calendar integration
//!
//! - [`GoogleCalendarClient`]: thin protocol client for the token, freeBusy
//!   and push-channel endpoints
//! - [`CalendarGateway`]: vault-aware wrapper implementing the core
//!   availability ports with retry and forced-refresh semantics

pub mod client;
pub mod gateway;
pub mod types;

pub use client::GoogleCalendarClient;
pub use gateway::CalendarGateway;
pub use types::ProviderCallError;
