//! License domain services.
//!
//! Services are stateless: each borrows a store implementing the repository
//! contracts it needs and runs a synchronous sequence of repository calls.

mod activation;
mod provisioning;
mod query;
mod status;

pub use activation::*;
pub use provisioning::*;
pub use query::*;
pub use status::*;

use crate::error::{AppError, ErrorCode, Result};
use crate::models::{License, LicenseKey, Product};
use crate::repo::{LicenseKeyRepo, LicenseRepo, ProductRepo};

/// License reached through the public key / product-slug path.
pub(crate) struct ResolvedLicense {
    pub license_key: LicenseKey,
    pub product: Product,
    pub license: License,
}

/// Resolve key string -> product (within the key's brand) -> license.
///
/// The key lookup is global: activation and status checks come from end-user
/// products that hold only the key.
pub(crate) fn resolve_license<R>(
    repos: &R,
    license_key: &str,
    product_slug: &str,
) -> Result<ResolvedLicense>
where
    R: LicenseKeyRepo + ProductRepo + LicenseRepo + ?Sized,
{
    let key = repos
        .get_license_key_by_key(license_key)?
        .ok_or_else(|| AppError::not_found(ErrorCode::KeyNotFound, "License key not found"))?;

    let product = repos
        .get_product_by_brand_and_slug(&key.brand_id, product_slug)?
        .ok_or_else(|| {
            AppError::not_found(
                ErrorCode::ProductNotFound,
                format!("Product {} not found", product_slug),
            )
        })?;

    let license = repos
        .get_license_by_key_and_product(&key.id, &product.id)?
        .ok_or_else(|| {
            AppError::not_found(
                ErrorCode::LicenseNotFound,
                format!("No license for product {} on this key", product_slug),
            )
        })?;

    Ok(ResolvedLicense {
        license_key: key,
        product,
        license,
    })
}
