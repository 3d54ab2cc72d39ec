use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path, Validate, ValidatedJson, rules};
use crate::models::{Activation, AuditLog, License};
use crate::services::{
    ActivationService, AddLicenseRequest, LicenseKeyDetails, ProvisionRequest,
    ProvisioningService,
};

#[derive(Deserialize)]
pub struct BrandPath {
    pub brand_id: String,
}

#[derive(Deserialize)]
pub struct LicenseKeyPath {
    pub brand_id: String,
    pub key: String,
}

#[derive(Deserialize)]
pub struct LicensePath {
    pub brand_id: String,
    pub key: String,
    pub product_id: String,
}

impl Validate for ProvisionRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        rules::email(&self.customer_email)?;
        if let Some(key) = &self.license_key {
            rules::required("license_key", key, rules::MAX_LICENSE_KEY_LEN)?;
        }
        for entry in &self.products {
            rules::uuid("product_id", &entry.product_id)?;
            rules::seats("max_seats", entry.max_seats)?;
        }
        Ok(())
    }
}

impl Validate for AddLicenseRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        rules::uuid("product_id", &self.product_id)?;
        rules::seats("max_seats", self.max_seats)
    }
}

/// POST /brands/{brand_id}/license-keys
pub async fn provision_license_key(
    State(state): State<AppState>,
    Path(path): Path<BrandPath>,
    ValidatedJson(body): ValidatedJson<ProvisionRequest>,
) -> Result<(StatusCode, Json<LicenseKeyDetails>)> {
    let details = ProvisioningService::new(&state.store).provision(&path.brand_id, &body)?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// GET /brands/{brand_id}/license-keys/{key}
pub async fn get_license_key(
    State(state): State<AppState>,
    Path(path): Path<LicenseKeyPath>,
) -> Result<Json<LicenseKeyDetails>> {
    let details = ProvisioningService::new(&state.store).get_details(&path.brand_id, &path.key)?;
    Ok(Json(details))
}

/// POST /brands/{brand_id}/license-keys/{key}/licenses
pub async fn add_license(
    State(state): State<AppState>,
    Path(path): Path<LicenseKeyPath>,
    ValidatedJson(body): ValidatedJson<AddLicenseRequest>,
) -> Result<(StatusCode, Json<License>)> {
    let license =
        ProvisioningService::new(&state.store).add_license(&path.brand_id, &path.key, &body)?;
    Ok((StatusCode::CREATED, Json(license)))
}

/// GET /brands/{brand_id}/license-keys/{key}/audit-logs
pub async fn list_license_key_audit_logs(
    State(state): State<AppState>,
    Path(path): Path<LicenseKeyPath>,
) -> Result<Json<Vec<AuditLog>>> {
    let logs = ProvisioningService::new(&state.store).audit_trail(&path.brand_id, &path.key)?;
    Ok(Json(logs))
}

#[derive(Serialize)]
pub struct LicenseActivations {
    pub license: License,
    pub activations: Vec<Activation>,
}

/// GET /brands/{brand_id}/license-keys/{key}/licenses/{product_id}/activations
pub async fn list_license_activations(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<LicenseActivations>> {
    let license = ProvisioningService::new(&state.store).get_license(
        &path.brand_id,
        &path.key,
        &path.product_id,
    )?;
    let activations = ActivationService::new(&state.store).list_activations(&license.id)?;
    Ok(Json(LicenseActivations {
        license,
        activations,
    }))
}

/// POST /brands/{brand_id}/license-keys/{key}/licenses/{product_id}/suspend
pub async fn suspend_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<License>> {
    let license = ProvisioningService::new(&state.store).suspend(
        &path.brand_id,
        &path.key,
        &path.product_id,
    )?;
    Ok(Json(license))
}

/// POST /brands/{brand_id}/license-keys/{key}/licenses/{product_id}/resume
pub async fn resume_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<License>> {
    let license = ProvisioningService::new(&state.store).resume(
        &path.brand_id,
        &path.key,
        &path.product_id,
    )?;
    Ok(Json(license))
}

/// POST /brands/{brand_id}/license-keys/{key}/licenses/{product_id}/cancel
pub async fn cancel_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<License>> {
    let license = ProvisioningService::new(&state.store).cancel(
        &path.brand_id,
        &path.key,
        &path.product_id,
    )?;
    Ok(Json(license))
}

#[derive(Debug, Deserialize)]
pub struct RenewBody {
    /// New expiration; null for perpetual
    #[serde(deserialize_with = "crate::util::present_or_null")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// POST /brands/{brand_id}/license-keys/{key}/licenses/{product_id}/renew
pub async fn renew_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
    Json(body): Json<RenewBody>,
) -> Result<Json<License>> {
    let license = ProvisioningService::new(&state.store).renew(
        &path.brand_id,
        &path.key,
        &path.product_id,
        body.expires_at,
    )?;
    Ok(Json(license))
}
