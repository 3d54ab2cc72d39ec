//! Data-access contracts consumed by the domain services.
//!
//! Each trait is pure persistence with no business rules. Lookups return
//! `Ok(None)` when the entity does not exist; the caller decides whether that
//! is an error. Every mutating method is a single atomic storage operation.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::*;

pub trait BrandRepo {
    fn get_brand_by_id(&self, id: &str) -> Result<Option<Brand>>;
    fn get_brand_by_slug(&self, slug: &str) -> Result<Option<Brand>>;
}

pub trait ProductRepo {
    fn get_product_by_id(&self, id: &str) -> Result<Option<Product>>;
    fn get_product_by_brand_and_slug(&self, brand_id: &str, slug: &str)
    -> Result<Option<Product>>;
}

pub trait LicenseKeyRepo {
    fn create_license_key(&self, input: &NewLicenseKey) -> Result<LicenseKey>;
    fn get_license_key_by_key(&self, key: &str) -> Result<Option<LicenseKey>>;
    fn get_license_key_by_id(&self, id: &str) -> Result<Option<LicenseKey>>;
    fn get_license_key_by_brand_and_key(
        &self,
        brand_id: &str,
        key: &str,
    ) -> Result<Option<LicenseKey>>;
    /// Case-insensitive match on the customer email, optionally limited to one brand.
    fn list_license_keys_by_email(
        &self,
        email: &str,
        brand_id: Option<&str>,
    ) -> Result<Vec<LicenseKey>>;
}

pub trait LicenseRepo {
    fn create_license(&self, input: &NewLicense) -> Result<License>;
    fn get_license_by_id(&self, id: &str) -> Result<Option<License>>;
    fn get_license_by_key_and_product(
        &self,
        license_key_id: &str,
        product_id: &str,
    ) -> Result<Option<License>>;
    fn list_licenses_by_license_key(&self, license_key_id: &str) -> Result<Vec<License>>;
    /// Move a license from `from` to `to`. Returns `Ok(None)` when the
    /// license is missing or no longer in `from`.
    fn update_license_status(
        &self,
        id: &str,
        from: LicenseStatus,
        to: LicenseStatus,
    ) -> Result<Option<License>>;
    /// Set a new expiration and status in one write, under the same
    /// `from` condition as `update_license_status`.
    fn renew_license(
        &self,
        id: &str,
        from: LicenseStatus,
        expires_at: Option<DateTime<Utc>>,
        to: LicenseStatus,
    ) -> Result<Option<License>>;
}

pub trait ActivationRepo {
    /// Take a seat for an instance.
    ///
    /// Implementations must perform the active-instance lookup, the seat count
    /// against `max_seats` and the insert as one atomic unit, so concurrent
    /// callers can neither exceed the cap nor create two active rows for the
    /// same instance.
    fn create_activation(
        &self,
        input: &NewActivation,
        max_seats: Option<i64>,
    ) -> Result<ActivationAcquisition>;
    fn get_active_activation(
        &self,
        license_id: &str,
        instance_id: &str,
    ) -> Result<Option<Activation>>;
    fn count_active_activations(&self, license_id: &str) -> Result<i64>;
    /// Flip an active activation to inactive. None if it was not active.
    fn deactivate_activation(&self, id: &str) -> Result<Option<Activation>>;
    fn list_activations_for_license(&self, license_id: &str) -> Result<Vec<Activation>>;
}

pub trait AuditLogRepo {
    fn append_audit_log(&self, entry: &NewAuditLog) -> Result<AuditLog>;
    fn list_audit_logs_for_license_key(&self, license_key_id: &str) -> Result<Vec<AuditLog>>;
}
