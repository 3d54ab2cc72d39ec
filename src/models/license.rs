use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::AuditAction;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseStatus {
    Valid,
    Suspended,
    Cancelled,
    Expired,
}

/// The right to use one product, attached to a license key.
///
/// `product_slug` and `used_seats` are not stored on the license row; they are
/// resolved by the repository each time the license is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub license_key_id: String,
    pub product_id: String,
    pub product_slug: String,
    pub status: LicenseStatus,
    /// None = perpetual
    pub expires_at: Option<DateTime<Utc>>,
    /// None = unlimited seats
    pub max_seats: Option<i64>,
    pub used_seats: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl License {
    /// A license is valid while its status is `valid` and its expiration, if
    /// any, lies strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LicenseStatus::Valid && self.expires_at.is_none_or(|exp| exp > now)
    }

    /// Seats left before the cap is reached, floored at zero. None when unlimited.
    pub fn remaining_seats(&self) -> Option<i64> {
        self.max_seats
            .map(|max| max.saturating_sub(self.used_seats).max(0))
    }

    pub fn has_free_seat(&self) -> bool {
        self.max_seats.is_none_or(|max| self.used_seats < max)
    }
}

#[derive(Debug, Clone)]
pub struct NewLicense {
    pub license_key_id: String,
    pub product_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_seats: Option<i64>,
}

/// Brand-initiated change of a license's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseTransition {
    Suspend,
    Resume,
    Cancel,
    Renew,
}

impl LicenseTransition {
    /// Target status when the transition is allowed from `from`.
    pub fn apply(self, from: LicenseStatus) -> Option<LicenseStatus> {
        use LicenseStatus::*;
        match (self, from) {
            (Self::Suspend, Valid) => Some(Suspended),
            (Self::Resume, Suspended) => Some(Valid),
            (Self::Cancel, Valid | Suspended | Expired) => Some(Cancelled),
            (Self::Renew, Valid | Suspended | Expired) => Some(Valid),
            _ => None,
        }
    }

    pub fn audit_action(self) -> AuditAction {
        match self {
            Self::Suspend => AuditAction::LicenseSuspended,
            Self::Resume => AuditAction::LicenseResumed,
            Self::Cancel => AuditAction::LicenseCancelled,
            Self::Renew => AuditAction::LicenseRenewed,
        }
    }

    pub fn as_verb(self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
            Self::Renew => "renew",
        }
    }
}
