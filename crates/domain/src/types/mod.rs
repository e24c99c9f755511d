//! Domain types and models

pub mod billing;
pub mod booking;
pub mod calendar;
pub mod companion;

pub use billing::{PlanType, SubscriptionEvent, SubscriptionQuota};
pub use booking::{
    Appointment, AppointmentState, AvailabilitySlot, SlotState, WorkingHoursRule,
};
pub use calendar::{BusyInterval, CalendarCredential, TokenSet, WebhookChannel};
pub use companion::CompanionProfile;
