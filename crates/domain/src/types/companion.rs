//! Companion profile

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable companion.
///
/// Cross-entity references (owner, credential, appointments) are id-based
/// lookups into their owning stores, never embedded object graphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionProfile {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub display_name: String,
    /// IANA timezone the companion's working hours are expressed in.
    pub timezone: String,
    /// Provider calendar queried for busy intervals.
    pub calendar_id: String,
}
