use serde::Serialize;

use crate::error::{AppError, ErrorCode, Result};
use crate::models::License;
use crate::repo::{BrandRepo, LicenseKeyRepo, LicenseRepo};

/// All licenses under one key, for support lookups by customer.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerLicenseInfo {
    pub license_key: String,
    pub brand_slug: String,
    pub customer_email: String,
    pub licenses: Vec<License>,
}

/// Cross-brand lookups. Callers must already be authenticated.
pub struct QueryService<'a, R> {
    repos: &'a R,
}

impl<'a, R> QueryService<'a, R>
where
    R: BrandRepo + LicenseKeyRepo + LicenseRepo,
{
    pub fn new(repos: &'a R) -> Self {
        Self { repos }
    }

    /// Every license key issued to `email` (case-insensitive), optionally
    /// limited to one brand.
    pub fn list_by_customer_email(
        &self,
        email: &str,
        brand_id: Option<&str>,
    ) -> Result<Vec<CustomerLicenseInfo>> {
        let keys = self.repos.list_license_keys_by_email(email, brand_id)?;

        keys.into_iter()
            .map(|key| {
                let licenses = self.repos.list_licenses_by_license_key(&key.id)?;
                Ok(CustomerLicenseInfo {
                    license_key: key.key,
                    brand_slug: key.brand_slug,
                    customer_email: key.customer_email,
                    licenses,
                })
            })
            .collect()
    }

    /// Turn an optional brand slug filter into a brand id. An unknown slug is
    /// an error rather than "no filter".
    pub fn resolve_brand_filter(&self, brand_slug: Option<&str>) -> Result<Option<String>> {
        let Some(slug) = brand_slug.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let brand = self.repos.get_brand_by_slug(slug)?.ok_or_else(|| {
            AppError::not_found(
                ErrorCode::BrandNotFound,
                format!("Brand {} not found", slug),
            )
        })?;
        Ok(Some(brand.id))
    }
}
