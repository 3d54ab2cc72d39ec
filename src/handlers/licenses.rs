//! Public endpoints called by end-user products. The license key itself is the
//! credential.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query, Validate, ValidatedJson, rules};
use crate::models::Activation;
use crate::services::{
    ActivateRequest, ActivationService, DeactivateRequest, LicenseStatusSnapshot, StatusService,
};
use crate::util::extract_request_info;

fn validate_target(license_key: &str, product_slug: &str) -> std::result::Result<(), String> {
    rules::required("license_key", license_key, rules::MAX_LICENSE_KEY_LEN)?;
    rules::required("product_slug", product_slug, rules::MAX_SLUG_LEN)
}

impl Validate for ActivateRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        validate_target(&self.license_key, &self.product_slug)?;
        rules::required("instance_id", &self.instance_id, rules::MAX_INSTANCE_ID_LEN)?;
        if let Some(name) = &self.instance_name {
            rules::max_length("instance_name", name, rules::MAX_INSTANCE_NAME_LEN)?;
        }
        Ok(())
    }
}

impl Validate for DeactivateRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        validate_target(&self.license_key, &self.product_slug)?;
        rules::required("instance_id", &self.instance_id, rules::MAX_INSTANCE_ID_LEN)
    }
}

/// POST /licenses/activate
pub async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(mut body): ValidatedJson<ActivateRequest>,
) -> Result<(StatusCode, Json<Activation>)> {
    let (ip_address, user_agent) = extract_request_info(&headers);
    body.ip_address = ip_address;
    body.user_agent = user_agent;

    let activation = ActivationService::new(&state.store).activate(&body)?;
    Ok((StatusCode::CREATED, Json(activation)))
}

/// POST /licenses/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<DeactivateRequest>,
) -> Result<Json<Activation>> {
    let activation = ActivationService::new(&state.store).deactivate(&body)?;
    Ok(Json(activation))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub license_key: String,
    pub product_slug: String,
    #[serde(default)]
    pub instance_id: Option<String>,
}

/// GET /licenses/status
pub async fn license_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<LicenseStatusSnapshot>> {
    validate_target(&query.license_key, &query.product_slug).map_err(AppError::BadRequest)?;
    if let Some(instance_id) = &query.instance_id {
        rules::max_length("instance_id", instance_id, rules::MAX_INSTANCE_ID_LEN)
            .map_err(AppError::BadRequest)?;
    }

    let snapshot = StatusService::new(&state.store).get_status(
        &query.license_key,
        &query.product_slug,
        query.instance_id.as_deref(),
    )?;
    Ok(Json(snapshot))
}
