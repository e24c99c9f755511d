//! Calendar-derived availability reconciliation

pub mod ports;
pub mod reconciler;
pub mod slots;

pub use reconciler::ReconcilerService;
pub use slots::{build_slots, day_bounds};
