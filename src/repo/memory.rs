//! In-memory implementation of every repository contract.
//!
//! Used by tests and for running the domain services without a database. A
//! single mutex guards all tables, which makes each repository call atomic in
//! the same way a storage transaction would.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::*;
use crate::error::{AppError, ErrorCode};

#[derive(Default)]
struct Tables {
    brands: Vec<Brand>,
    products: Vec<Product>,
    license_keys: Vec<LicenseKey>,
    licenses: Vec<License>,
    activations: Vec<Activation>,
    audit_logs: Vec<AuditLog>,
}

impl Tables {
    fn active_count(&self, license_id: &str) -> i64 {
        self.activations
            .iter()
            .filter(|a| a.license_id == license_id && a.is_active)
            .count() as i64
    }

    /// Fill in the read-time fields of a stored license.
    fn hydrate(&self, license: &License) -> License {
        License {
            used_seats: self.active_count(&license.id),
            ..license.clone()
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }

    /// Insert a brand record as-is (administrative setup).
    pub fn insert_brand(&self, brand: Brand) -> Result<Brand> {
        let mut t = self.tables()?;
        if t.brands.iter().any(|b| b.slug == brand.slug) {
            return Err(AppError::Internal(format!(
                "brand slug {} already exists",
                brand.slug
            )));
        }
        t.brands.push(brand.clone());
        Ok(brand)
    }

    /// Insert a product record as-is (administrative setup).
    pub fn insert_product(&self, product: Product) -> Result<Product> {
        let mut t = self.tables()?;
        if !t.brands.iter().any(|b| b.id == product.brand_id) {
            return Err(AppError::Internal("product references unknown brand".into()));
        }
        if t
            .products
            .iter()
            .any(|p| p.brand_id == product.brand_id && p.slug == product.slug)
        {
            return Err(AppError::Internal(format!(
                "product slug {} already exists for brand",
                product.slug
            )));
        }
        t.products.push(product.clone());
        Ok(product)
    }

    pub fn license_key_count(&self) -> Result<usize> {
        Ok(self.tables()?.license_keys.len())
    }

    pub fn license_count(&self) -> Result<usize> {
        Ok(self.tables()?.licenses.len())
    }

    pub fn activation_count(&self) -> Result<usize> {
        Ok(self.tables()?.activations.len())
    }

    pub fn set_brand_active(&self, brand_id: &str, is_active: bool) -> Result<()> {
        let mut t = self.tables()?;
        if let Some(brand) = t.brands.iter_mut().find(|b| b.id == brand_id) {
            brand.is_active = is_active;
        }
        Ok(())
    }

    pub fn set_product_active(&self, product_id: &str, is_active: bool) -> Result<()> {
        let mut t = self.tables()?;
        if let Some(product) = t.products.iter_mut().find(|p| p.id == product_id) {
            product.is_active = is_active;
        }
        Ok(())
    }
}

impl BrandRepo for MemoryStore {
    fn get_brand_by_id(&self, id: &str) -> Result<Option<Brand>> {
        Ok(self.tables()?.brands.iter().find(|b| b.id == id).cloned())
    }

    fn get_brand_by_slug(&self, slug: &str) -> Result<Option<Brand>> {
        Ok(self.tables()?.brands.iter().find(|b| b.slug == slug).cloned())
    }
}

impl ProductRepo for MemoryStore {
    fn get_product_by_id(&self, id: &str) -> Result<Option<Product>> {
        Ok(self.tables()?.products.iter().find(|p| p.id == id).cloned())
    }

    fn get_product_by_brand_and_slug(
        &self,
        brand_id: &str,
        slug: &str,
    ) -> Result<Option<Product>> {
        Ok(self
            .tables()?
            .products
            .iter()
            .find(|p| p.brand_id == brand_id && p.slug == slug)
            .cloned())
    }
}

impl LicenseKeyRepo for MemoryStore {
    fn create_license_key(&self, input: &NewLicenseKey) -> Result<LicenseKey> {
        let mut t = self.tables()?;
        if t.license_keys.iter().any(|k| k.key == input.key) {
            return Err(AppError::conflict(
                ErrorCode::KeyExists,
                "License key already exists",
            ));
        }
        let brand_slug = t
            .brands
            .iter()
            .find(|b| b.id == input.brand_id)
            .map(|b| b.slug.clone())
            .ok_or_else(|| AppError::Internal("license key references unknown brand".into()))?;

        let license_key = LicenseKey {
            id: gen_id(),
            key: input.key.clone(),
            brand_id: input.brand_id.clone(),
            brand_slug,
            customer_email: input.customer_email.clone(),
            external_reference: input.external_reference.clone(),
            created_at: Utc::now(),
        };
        t.license_keys.push(license_key.clone());
        Ok(license_key)
    }

    fn get_license_key_by_key(&self, key: &str) -> Result<Option<LicenseKey>> {
        Ok(self
            .tables()?
            .license_keys
            .iter()
            .find(|k| k.key == key)
            .cloned())
    }

    fn get_license_key_by_id(&self, id: &str) -> Result<Option<LicenseKey>> {
        Ok(self
            .tables()?
            .license_keys
            .iter()
            .find(|k| k.id == id)
            .cloned())
    }

    fn get_license_key_by_brand_and_key(
        &self,
        brand_id: &str,
        key: &str,
    ) -> Result<Option<LicenseKey>> {
        Ok(self
            .tables()?
            .license_keys
            .iter()
            .find(|k| k.brand_id == brand_id && k.key == key)
            .cloned())
    }

    fn list_license_keys_by_email(
        &self,
        email: &str,
        brand_id: Option<&str>,
    ) -> Result<Vec<LicenseKey>> {
        let email = email.trim().to_lowercase();
        let mut keys: Vec<LicenseKey> = self
            .tables()?
            .license_keys
            .iter()
            .filter(|k| k.customer_email.to_lowercase() == email)
            .filter(|k| brand_id.is_none_or(|b| k.brand_id == b))
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }
}

impl LicenseRepo for MemoryStore {
    fn create_license(&self, input: &NewLicense) -> Result<License> {
        let mut t = self.tables()?;
        if !t.license_keys.iter().any(|k| k.id == input.license_key_id) {
            return Err(AppError::Internal("license references unknown license key".into()));
        }
        let product_slug = t
            .products
            .iter()
            .find(|p| p.id == input.product_id)
            .map(|p| p.slug.clone())
            .ok_or_else(|| AppError::Internal("license references unknown product".into()))?;
        if t
            .licenses
            .iter()
            .any(|l| l.license_key_id == input.license_key_id && l.product_id == input.product_id)
        {
            return Err(AppError::conflict(
                ErrorCode::LicenseExists,
                "A license for this product already exists on this key",
            ));
        }

        let now = Utc::now();
        let license = License {
            id: gen_id(),
            license_key_id: input.license_key_id.clone(),
            product_id: input.product_id.clone(),
            product_slug,
            status: LicenseStatus::Valid,
            expires_at: input.expires_at,
            max_seats: input.max_seats,
            used_seats: 0,
            created_at: now,
            updated_at: now,
        };
        t.licenses.push(license.clone());
        Ok(license)
    }

    fn get_license_by_id(&self, id: &str) -> Result<Option<License>> {
        let t = self.tables()?;
        Ok(t.licenses.iter().find(|l| l.id == id).map(|l| t.hydrate(l)))
    }

    fn get_license_by_key_and_product(
        &self,
        license_key_id: &str,
        product_id: &str,
    ) -> Result<Option<License>> {
        let t = self.tables()?;
        Ok(t
            .licenses
            .iter()
            .find(|l| l.license_key_id == license_key_id && l.product_id == product_id)
            .map(|l| t.hydrate(l)))
    }

    fn list_licenses_by_license_key(&self, license_key_id: &str) -> Result<Vec<License>> {
        let t = self.tables()?;
        Ok(t.licenses
            .iter()
            .filter(|l| l.license_key_id == license_key_id)
            .map(|l| t.hydrate(l))
            .collect())
    }

    fn update_license_status(
        &self,
        id: &str,
        from: LicenseStatus,
        to: LicenseStatus,
    ) -> Result<Option<License>> {
        let mut t = self.tables()?;
        let Some(lic) = t
            .licenses
            .iter_mut()
            .find(|l| l.id == id && l.status == from)
        else {
            return Ok(None);
        };
        lic.status = to;
        lic.updated_at = Utc::now();
        let lic = lic.clone();
        Ok(Some(t.hydrate(&lic)))
    }

    fn renew_license(
        &self,
        id: &str,
        from: LicenseStatus,
        expires_at: Option<DateTime<Utc>>,
        to: LicenseStatus,
    ) -> Result<Option<License>> {
        let mut t = self.tables()?;
        let Some(lic) = t
            .licenses
            .iter_mut()
            .find(|l| l.id == id && l.status == from)
        else {
            return Ok(None);
        };
        lic.status = to;
        lic.expires_at = expires_at;
        lic.updated_at = Utc::now();
        let lic = lic.clone();
        Ok(Some(t.hydrate(&lic)))
    }
}

impl ActivationRepo for MemoryStore {
    fn create_activation(
        &self,
        input: &NewActivation,
        max_seats: Option<i64>,
    ) -> Result<ActivationAcquisition> {
        let mut t = self.tables()?;

        if let Some(existing) = t
            .activations
            .iter()
            .find(|a| {
                a.license_id == input.license_id && a.instance_id == input.instance_id && a.is_active
            })
        {
            return Ok(ActivationAcquisition::Existing(existing.clone()));
        }

        let used = t.active_count(&input.license_id);
        if let Some(max) = max_seats.filter(|&max| used >= max) {
            return Ok(ActivationAcquisition::SeatsExhausted {
                max_seats: max,
                used_seats: used,
            });
        }

        let activation = Activation {
            id: gen_id(),
            license_id: input.license_id.clone(),
            instance_id: input.instance_id.clone(),
            instance_name: input.instance_name.clone(),
            is_active: true,
            activated_at: Utc::now(),
            deactivated_at: None,
            ip_address: input.ip_address.clone(),
            user_agent: input.user_agent.clone(),
        };
        t.activations.push(activation.clone());
        Ok(ActivationAcquisition::Created(activation))
    }

    fn get_active_activation(
        &self,
        license_id: &str,
        instance_id: &str,
    ) -> Result<Option<Activation>> {
        Ok(self
            .tables()?
            .activations
            .iter()
            .find(|a| a.license_id == license_id && a.instance_id == instance_id && a.is_active)
            .cloned())
    }

    fn count_active_activations(&self, license_id: &str) -> Result<i64> {
        Ok(self.tables()?.active_count(license_id))
    }

    fn deactivate_activation(&self, id: &str) -> Result<Option<Activation>> {
        let mut t = self.tables()?;
        let Some(activation) = t.activations.iter_mut().find(|a| a.id == id && a.is_active) else {
            return Ok(None);
        };
        activation.is_active = false;
        activation.deactivated_at = Some(Utc::now());
        Ok(Some(activation.clone()))
    }

    fn list_activations_for_license(&self, license_id: &str) -> Result<Vec<Activation>> {
        let mut list: Vec<Activation> = self
            .tables()?
            .activations
            .iter()
            .filter(|a| a.license_id == license_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.activated_at.cmp(&a.activated_at));
        Ok(list)
    }
}

impl AuditLogRepo for MemoryStore {
    fn append_audit_log(&self, entry: &NewAuditLog) -> Result<AuditLog> {
        let log = AuditLog {
            id: gen_id(),
            action: entry.action,
            actor_type: entry.actor_type,
            actor_id: entry.actor_id.clone(),
            license_id: entry.license_id.clone(),
            license_key_id: entry.license_key_id.clone(),
            details: entry.details.clone(),
            ip_address: entry.ip_address.clone(),
            created_at: Utc::now(),
        };
        self.tables()?.audit_logs.push(log.clone());
        Ok(log)
    }

    fn list_audit_logs_for_license_key(&self, license_key_id: &str) -> Result<Vec<AuditLog>> {
        Ok(self
            .tables()?
            .audit_logs
            .iter()
            .filter(|l| l.license_key_id.as_deref() == Some(license_key_id))
            .cloned()
            .collect())
    }
}
