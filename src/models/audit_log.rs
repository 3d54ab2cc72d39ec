use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    LicenseKeyCreated,
    LicenseCreated,
    LicenseRenewed,
    LicenseSuspended,
    LicenseResumed,
    LicenseCancelled,
    ActivationCreated,
    ActivationDeactivated,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActorType {
    /// A brand's backend system
    Brand,
    /// An end-user product installation
    Product,
    Customer,
    System,
    Admin,
}

/// Append-only record of a domain event.
///
/// The license and license key references are weak: they become None if the
/// referenced rows are ever removed, and the entry itself survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    pub action: AuditAction,
    pub actor_type: ActorType,
    pub actor_id: String,
    pub license_id: Option<String>,
    pub license_key_id: Option<String>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub action: AuditAction,
    pub actor_type: ActorType,
    pub actor_id: String,
    pub license_id: Option<String>,
    pub license_key_id: Option<String>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
}

impl NewAuditLog {
    pub fn new(action: AuditAction, actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            action,
            actor_type,
            actor_id: actor_id.into(),
            license_id: None,
            license_key_id: None,
            details: serde_json::Value::Object(Default::default()),
            ip_address: None,
        }
    }

    pub fn license(mut self, license_id: &str) -> Self {
        self.license_id = Some(license_id.to_string());
        self
    }

    pub fn license_key(mut self, license_key_id: &str) -> Self {
        self.license_key_id = Some(license_key_id.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn ip_address(mut self, ip: Option<&str>) -> Self {
        self.ip_address = ip.map(String::from);
        self
    }
}
