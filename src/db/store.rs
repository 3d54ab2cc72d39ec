//! SQLite implementation of the repository contracts.

use chrono::{DateTime, Utc};

use super::{DbPool, queries};
use crate::error::Result;
use crate::models::*;
use crate::repo::*;

/// Repository set backed by a pooled SQLite database. Each repository call
/// checks out its own connection, so each call is its own atomic unit.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
    audit_log_enabled: bool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            audit_log_enabled: true,
        }
    }

    pub fn with_audit_log(mut self, enabled: bool) -> Self {
        self.audit_log_enabled = enabled;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check out a connection and run a trivial query.
    pub fn ping(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

impl BrandRepo for SqliteStore {
    fn get_brand_by_id(&self, id: &str) -> Result<Option<Brand>> {
        queries::get_brand_by_id(&*self.pool.get()?, id)
    }

    fn get_brand_by_slug(&self, slug: &str) -> Result<Option<Brand>> {
        queries::get_brand_by_slug(&*self.pool.get()?, slug)
    }
}

impl ProductRepo for SqliteStore {
    fn get_product_by_id(&self, id: &str) -> Result<Option<Product>> {
        queries::get_product_by_id(&*self.pool.get()?, id)
    }

    fn get_product_by_brand_and_slug(
        &self,
        brand_id: &str,
        slug: &str,
    ) -> Result<Option<Product>> {
        queries::get_product_by_brand_and_slug(&*self.pool.get()?, brand_id, slug)
    }
}

impl LicenseKeyRepo for SqliteStore {
    fn create_license_key(&self, input: &NewLicenseKey) -> Result<LicenseKey> {
        queries::create_license_key(&*self.pool.get()?, input)
    }

    fn get_license_key_by_key(&self, key: &str) -> Result<Option<LicenseKey>> {
        queries::get_license_key_by_key(&*self.pool.get()?, key)
    }

    fn get_license_key_by_id(&self, id: &str) -> Result<Option<LicenseKey>> {
        queries::get_license_key_by_id(&*self.pool.get()?, id)
    }

    fn get_license_key_by_brand_and_key(
        &self,
        brand_id: &str,
        key: &str,
    ) -> Result<Option<LicenseKey>> {
        queries::get_license_key_by_brand_and_key(&*self.pool.get()?, brand_id, key)
    }

    fn list_license_keys_by_email(
        &self,
        email: &str,
        brand_id: Option<&str>,
    ) -> Result<Vec<LicenseKey>> {
        queries::list_license_keys_by_email(&*self.pool.get()?, email, brand_id)
    }
}

impl LicenseRepo for SqliteStore {
    fn create_license(&self, input: &NewLicense) -> Result<License> {
        queries::create_license(&*self.pool.get()?, input)
    }

    fn get_license_by_id(&self, id: &str) -> Result<Option<License>> {
        queries::get_license_by_id(&*self.pool.get()?, id)
    }

    fn get_license_by_key_and_product(
        &self,
        license_key_id: &str,
        product_id: &str,
    ) -> Result<Option<License>> {
        queries::get_license_by_key_and_product(&*self.pool.get()?, license_key_id, product_id)
    }

    fn list_licenses_by_license_key(&self, license_key_id: &str) -> Result<Vec<License>> {
        queries::list_licenses_by_license_key(&*self.pool.get()?, license_key_id)
    }

    fn update_license_status(
        &self,
        id: &str,
        from: LicenseStatus,
        to: LicenseStatus,
    ) -> Result<Option<License>> {
        queries::update_license_status(&*self.pool.get()?, id, from, to)
    }

    fn renew_license(
        &self,
        id: &str,
        from: LicenseStatus,
        expires_at: Option<DateTime<Utc>>,
        to: LicenseStatus,
    ) -> Result<Option<License>> {
        queries::renew_license(&*self.pool.get()?, id, from, expires_at, to)
    }
}

impl ActivationRepo for SqliteStore {
    fn create_activation(
        &self,
        input: &NewActivation,
        max_seats: Option<i64>,
    ) -> Result<ActivationAcquisition> {
        let mut conn = self.pool.get()?;
        queries::acquire_activation_atomic(&mut conn, input, max_seats)
    }

    fn get_active_activation(
        &self,
        license_id: &str,
        instance_id: &str,
    ) -> Result<Option<Activation>> {
        queries::get_active_activation(&*self.pool.get()?, license_id, instance_id)
    }

    fn count_active_activations(&self, license_id: &str) -> Result<i64> {
        queries::count_active_activations(&*self.pool.get()?, license_id)
    }

    fn deactivate_activation(&self, id: &str) -> Result<Option<Activation>> {
        queries::deactivate_activation(&*self.pool.get()?, id)
    }

    fn list_activations_for_license(&self, license_id: &str) -> Result<Vec<Activation>> {
        queries::list_activations_for_license(&*self.pool.get()?, license_id)
    }
}

impl AuditLogRepo for SqliteStore {
    fn append_audit_log(&self, entry: &NewAuditLog) -> Result<AuditLog> {
        queries::create_audit_log(&*self.pool.get()?, self.audit_log_enabled, entry)
    }

    fn list_audit_logs_for_license_key(&self, license_key_id: &str) -> Result<Vec<AuditLog>> {
        queries::list_audit_logs_for_license_key(&*self.pool.get()?, license_key_id)
    }
}
