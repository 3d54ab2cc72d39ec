use chrono::{DateTime, Utc};
use serde::Serialize;

use super::resolve_license;
use crate::error::Result;
use crate::models::LicenseStatus;
use crate::repo::{ActivationRepo, LicenseKeyRepo, LicenseRepo, ProductRepo};

/// Point-in-time view of a license as seen by an end-user product.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseStatusSnapshot {
    pub license_key: String,
    pub customer_email: String,
    pub product_slug: String,
    pub status: LicenseStatus,
    pub is_valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_seats: Option<i64>,
    pub used_seats: i64,
    pub remaining_seats: Option<i64>,
    /// Whether the queried instance holds an active seat (false when no
    /// instance was given)
    pub instance_activated: bool,
}

/// Read-only license checks. Nothing here creates or changes activations.
pub struct StatusService<'a, R> {
    repos: &'a R,
}

impl<'a, R> StatusService<'a, R>
where
    R: LicenseKeyRepo + ProductRepo + LicenseRepo + ActivationRepo,
{
    pub fn new(repos: &'a R) -> Self {
        Self { repos }
    }

    pub fn get_status(
        &self,
        license_key: &str,
        product_slug: &str,
        instance_id: Option<&str>,
    ) -> Result<LicenseStatusSnapshot> {
        self.get_status_at(license_key, product_slug, instance_id, Utc::now())
    }

    pub fn get_status_at(
        &self,
        license_key: &str,
        product_slug: &str,
        instance_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<LicenseStatusSnapshot> {
        let resolved = resolve_license(self.repos, license_key, product_slug)?;
        let license = resolved.license;

        let instance_activated = match instance_id.filter(|id| !id.is_empty()) {
            Some(instance_id) => self
                .repos
                .get_active_activation(&license.id, instance_id)?
                .is_some(),
            None => false,
        };

        Ok(LicenseStatusSnapshot {
            license_key: resolved.license_key.key,
            customer_email: resolved.license_key.customer_email,
            product_slug: resolved.product.slug,
            status: license.status,
            is_valid: license.is_valid_at(now),
            expires_at: license.expires_at,
            max_seats: license.max_seats,
            used_seats: license.used_seats,
            remaining_seats: license.remaining_seats(),
            instance_activated,
        })
    }
}
