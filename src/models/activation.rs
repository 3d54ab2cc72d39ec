use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A running instance consuming one seat of a license.
///
/// Deactivation flips `is_active` and stamps `deactivated_at`; rows are never
/// deleted so the activation history is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub id: String,
    pub license_id: String,
    /// Caller-supplied identifier such as a site URL or machine id
    pub instance_id: String,
    pub instance_name: Option<String>,
    pub is_active: bool,
    pub activated_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewActivation {
    pub license_id: String,
    pub instance_id: String,
    pub instance_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of atomically acquiring a seat for an instance.
#[derive(Debug, Clone)]
pub enum ActivationAcquisition {
    /// The instance already holds an active seat
    Existing(Activation),
    /// A new seat was taken
    Created(Activation),
    /// Every seat is in use
    SeatsExhausted { max_seats: i64, used_seats: i64 },
}
