use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorCode, Result};
use crate::keygen::generate_license_key;
use crate::models::*;
use crate::repo::{AuditLogRepo, BrandRepo, LicenseKeyRepo, LicenseRepo, ProductRepo};

/// One product to license within a provisioning request.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductEntry {
    pub product_id: String,
    /// Required key; `null` means perpetual
    #[serde(deserialize_with = "crate::util::present_or_null")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Falls back to the product's default seat cap when absent
    #[serde(default)]
    pub max_seats: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    pub customer_email: String,
    pub products: Vec<ProductEntry>,
    #[serde(default)]
    pub external_reference: Option<String>,
    /// Use this key string instead of generating one
    #[serde(default)]
    pub license_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddLicenseRequest {
    pub product_id: String,
    #[serde(deserialize_with = "crate::util::present_or_null")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_seats: Option<i64>,
}

/// A license key together with every license attached to it.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseKeyDetails {
    #[serde(flatten)]
    pub license_key: LicenseKey,
    pub licenses: Vec<License>,
}

/// Issues license keys and manages the licenses attached to them.
///
/// Every operation is scoped to the calling brand: keys and products of other
/// brands are reported as not found or mismatched.
pub struct ProvisioningService<'a, R> {
    repos: &'a R,
}

impl<'a, R> ProvisioningService<'a, R>
where
    R: BrandRepo + ProductRepo + LicenseKeyRepo + LicenseRepo + AuditLogRepo,
{
    pub fn new(repos: &'a R) -> Self {
        Self { repos }
    }

    /// Create a license key for a customer with one license per requested
    /// product.
    ///
    /// All products are validated before anything is written, so a rejected
    /// request leaves no partial key behind.
    pub fn provision(&self, brand_id: &str, req: &ProvisionRequest) -> Result<LicenseKeyDetails> {
        let brand = self
            .repos
            .get_brand_by_id(brand_id)?
            .ok_or_else(|| {
                AppError::not_found(
                    ErrorCode::BrandNotFound,
                    format!("Brand {} not found", brand_id),
                )
            })?;
        if !brand.is_active {
            return Err(AppError::validation(
                ErrorCode::BrandInactive,
                format!("Brand {} is inactive", brand.slug),
            ));
        }

        if req.products.is_empty() {
            return Err(AppError::validation(
                ErrorCode::NoProducts,
                "At least one product is required",
            ));
        }

        let mut seen = HashSet::new();
        let mut products = Vec::with_capacity(req.products.len());
        for entry in &req.products {
            let product = self.licensable_product(&brand.id, &brand.slug, &entry.product_id)?;
            if !seen.insert(product.id.clone()) {
                return Err(AppError::conflict(
                    ErrorCode::LicenseExists,
                    format!("Product {} is listed more than once", product.slug),
                ));
            }
            products.push(product);
        }

        let key = match &req.license_key {
            Some(key) => key.clone(),
            None => generate_license_key(Some(&brand.slug.to_uppercase())),
        };

        if self.repos.get_license_key_by_key(&key)?.is_some() {
            return Err(AppError::conflict(
                ErrorCode::KeyExists,
                "License key already exists",
            ));
        }

        let license_key = self.repos.create_license_key(&NewLicenseKey {
            key,
            brand_id: brand.id.clone(),
            customer_email: req.customer_email.trim().to_string(),
            external_reference: req.external_reference.clone(),
        })?;

        self.repos.append_audit_log(
            &NewAuditLog::new(AuditAction::LicenseKeyCreated, ActorType::Brand, &brand.id)
                .license_key(&license_key.id)
                .details(serde_json::json!({
                    "customer_email": license_key.customer_email,
                    "external_reference": license_key.external_reference,
                    "product_count": products.len(),
                })),
        )?;

        let mut licenses = Vec::with_capacity(products.len());
        for (entry, product) in req.products.iter().zip(&products) {
            let license = self.repos.create_license(&NewLicense {
                license_key_id: license_key.id.clone(),
                product_id: product.id.clone(),
                expires_at: entry.expires_at,
                max_seats: entry.max_seats.or(product.default_max_seats),
            })?;
            self.audit_license_created(&brand.id, &license_key, &license)?;
            licenses.push(license);
        }

        tracing::info!(
            "Provisioned license key {} with {} license(s) for brand {}",
            license_key.id,
            licenses.len(),
            brand.slug
        );

        Ok(LicenseKeyDetails {
            license_key,
            licenses,
        })
    }

    /// Attach a license for another product to an existing key of this brand.
    pub fn add_license(
        &self,
        brand_id: &str,
        license_key: &str,
        req: &AddLicenseRequest,
    ) -> Result<License> {
        let key = self.brand_key(brand_id, license_key)?;
        let product = self.licensable_product(&key.brand_id, &key.brand_slug, &req.product_id)?;

        if self
            .repos
            .get_license_by_key_and_product(&key.id, &product.id)?
            .is_some()
        {
            return Err(AppError::conflict(
                ErrorCode::LicenseExists,
                format!(
                    "License for product {} already exists on this key",
                    product.slug
                ),
            ));
        }

        let license = self.repos.create_license(&NewLicense {
            license_key_id: key.id.clone(),
            product_id: product.id.clone(),
            expires_at: req.expires_at,
            max_seats: req.max_seats.or(product.default_max_seats),
        })?;
        self.audit_license_created(brand_id, &key, &license)?;

        tracing::info!(
            "Added {} license {} to key {}",
            product.slug,
            license.id,
            key.id
        );

        Ok(license)
    }

    pub fn get_details(&self, brand_id: &str, license_key: &str) -> Result<LicenseKeyDetails> {
        let key = self.brand_key(brand_id, license_key)?;
        let licenses = self.repos.list_licenses_by_license_key(&key.id)?;
        Ok(LicenseKeyDetails {
            license_key: key,
            licenses,
        })
    }

    /// The license for one product under a brand's key.
    pub fn get_license(&self, brand_id: &str, license_key: &str, product_id: &str) -> Result<License> {
        let key = self.brand_key(brand_id, license_key)?;
        self.key_license(&key, product_id)
    }

    /// Audit entries recorded against a brand's key, oldest first.
    pub fn audit_trail(&self, brand_id: &str, license_key: &str) -> Result<Vec<AuditLog>> {
        let key = self.brand_key(brand_id, license_key)?;
        self.repos.list_audit_logs_for_license_key(&key.id)
    }

    pub fn suspend(&self, brand_id: &str, license_key: &str, product_id: &str) -> Result<License> {
        self.transition(brand_id, license_key, product_id, LicenseTransition::Suspend, None)
    }

    pub fn resume(&self, brand_id: &str, license_key: &str, product_id: &str) -> Result<License> {
        self.transition(brand_id, license_key, product_id, LicenseTransition::Resume, None)
    }

    pub fn cancel(&self, brand_id: &str, license_key: &str, product_id: &str) -> Result<License> {
        self.transition(brand_id, license_key, product_id, LicenseTransition::Cancel, None)
    }

    /// Make the license valid again with a new expiration (None = perpetual).
    pub fn renew(
        &self,
        brand_id: &str,
        license_key: &str,
        product_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<License> {
        self.transition(
            brand_id,
            license_key,
            product_id,
            LicenseTransition::Renew,
            Some(expires_at),
        )
    }

    fn transition(
        &self,
        brand_id: &str,
        license_key: &str,
        product_id: &str,
        transition: LicenseTransition,
        renew_to: Option<Option<DateTime<Utc>>>,
    ) -> Result<License> {
        let key = self.brand_key(brand_id, license_key)?;
        let license = self.key_license(&key, product_id)?;

        let target = transition.apply(license.status).ok_or_else(|| {
            AppError::validation(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot {} a license with status {}",
                    transition.as_verb(),
                    license.status
                ),
            )
        })?;

        // Conditional on the status read above; a concurrent transition wins.
        let updated = match renew_to {
            Some(expires_at) => {
                self.repos
                    .renew_license(&license.id, license.status, expires_at, target)?
            }
            None => self
                .repos
                .update_license_status(&license.id, license.status, target)?,
        }
        .ok_or_else(|| {
            AppError::validation(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot {} the license: its status changed from {} concurrently",
                    transition.as_verb(),
                    license.status
                ),
            )
        })?;

        self.repos.append_audit_log(
            &NewAuditLog::new(transition.audit_action(), ActorType::Brand, brand_id)
                .license(&updated.id)
                .license_key(&key.id)
                .details(serde_json::json!({
                    "product_slug": updated.product_slug,
                    "from_status": license.status,
                    "to_status": updated.status,
                    "expires_at": updated.expires_at,
                })),
        )?;

        tracing::info!(
            "License {} {}: {} -> {}",
            updated.id,
            transition.as_verb(),
            license.status,
            updated.status
        );

        Ok(updated)
    }

    fn key_license(&self, key: &LicenseKey, product_id: &str) -> Result<License> {
        self.repos
            .get_license_by_key_and_product(&key.id, product_id)?
            .ok_or_else(|| {
                AppError::not_found(
                    ErrorCode::LicenseNotFound,
                    "No license for this product on this key",
                )
            })
    }

    fn brand_key(&self, brand_id: &str, license_key: &str) -> Result<LicenseKey> {
        self.repos
            .get_license_key_by_brand_and_key(brand_id, license_key)?
            .ok_or_else(|| AppError::not_found(ErrorCode::KeyNotFound, "License key not found"))
    }

    /// Product must exist, belong to the brand and be active.
    fn licensable_product(
        &self,
        brand_id: &str,
        brand_slug: &str,
        product_id: &str,
    ) -> Result<Product> {
        let product = self
            .repos
            .get_product_by_id(product_id)?
            .ok_or_else(|| {
                AppError::not_found(
                    ErrorCode::ProductNotFound,
                    format!("Product {} not found", product_id),
                )
            })?;
        if product.brand_id != brand_id {
            return Err(AppError::validation(
                ErrorCode::ProductBrandMismatch,
                format!(
                    "Product {} does not belong to brand {}",
                    product.slug, brand_slug
                ),
            ));
        }
        if !product.is_active {
            return Err(AppError::validation(
                ErrorCode::ProductInactive,
                format!("Product {} is inactive", product.slug),
            ));
        }
        Ok(product)
    }

    fn audit_license_created(
        &self,
        brand_id: &str,
        key: &LicenseKey,
        license: &License,
    ) -> Result<()> {
        self.repos.append_audit_log(
            &NewAuditLog::new(AuditAction::LicenseCreated, ActorType::Brand, brand_id)
                .license(&license.id)
                .license_key(&key.id)
                .details(serde_json::json!({
                    "product_slug": license.product_slug,
                    "expires_at": license.expires_at,
                    "max_seats": license.max_seats,
                })),
        )?;
        Ok(())
    }
}
