use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::resolve_license;
use crate::error::{AppError, ErrorCode, Result};
use crate::models::*;
use crate::repo::{ActivationRepo, AuditLogRepo, LicenseKeyRepo, LicenseRepo, ProductRepo};

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateRequest {
    pub license_key: String,
    pub product_slug: String,
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: Option<String>,
    /// Filled from the request, not the body
    #[serde(skip)]
    pub ip_address: Option<String>,
    #[serde(skip)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeactivateRequest {
    pub license_key: String,
    pub product_slug: String,
    pub instance_id: String,
}

/// Activates and deactivates product instances against licenses.
pub struct ActivationService<'a, R> {
    repos: &'a R,
}

impl<'a, R> ActivationService<'a, R>
where
    R: LicenseKeyRepo + ProductRepo + LicenseRepo + ActivationRepo + AuditLogRepo,
{
    pub fn new(repos: &'a R) -> Self {
        Self { repos }
    }

    pub fn activate(&self, req: &ActivateRequest) -> Result<Activation> {
        self.activate_at(req, Utc::now())
    }

    /// Take a seat for `req.instance_id`, evaluating validity at `now`.
    ///
    /// Re-activating an instance that already holds an active seat returns the
    /// existing activation, even when the license is otherwise full.
    pub fn activate_at(&self, req: &ActivateRequest, now: DateTime<Utc>) -> Result<Activation> {
        let resolved = resolve_license(self.repos, &req.license_key, &req.product_slug)?;
        let license = resolved.license;

        if !license.is_valid_at(now) {
            return Err(AppError::validation(
                ErrorCode::LicenseInvalid,
                format!("License is not valid (status: {})", license.status),
            ));
        }

        if let Some(existing) = self
            .repos
            .get_active_activation(&license.id, &req.instance_id)?
        {
            return Ok(existing);
        }

        if !license.has_free_seat() {
            return Err(no_seats(license.max_seats.unwrap_or(0), license.used_seats));
        }

        let input = NewActivation {
            license_id: license.id.clone(),
            instance_id: req.instance_id.clone(),
            instance_name: req.instance_name.clone(),
            ip_address: req.ip_address.clone(),
            user_agent: req.user_agent.clone(),
        };

        // The seat check above is advisory; the repository repeats it
        // atomically with the insert.
        let activation = match self.repos.create_activation(&input, license.max_seats)? {
            ActivationAcquisition::Created(activation) => activation,
            ActivationAcquisition::Existing(activation) => return Ok(activation),
            ActivationAcquisition::SeatsExhausted {
                max_seats,
                used_seats,
            } => return Err(no_seats(max_seats, used_seats)),
        };

        self.repos.append_audit_log(
            &NewAuditLog::new(
                AuditAction::ActivationCreated,
                ActorType::Product,
                &activation.instance_id,
            )
            .license(&license.id)
            .license_key(&resolved.license_key.id)
            .ip_address(activation.ip_address.as_deref())
            .details(serde_json::json!({
                "activation_id": activation.id,
                "product_slug": resolved.product.slug,
                "instance_name": activation.instance_name,
                "user_agent": activation.user_agent,
            })),
        )?;

        tracing::info!(
            "Activated instance {} on license {} ({})",
            activation.instance_id,
            license.id,
            resolved.product.slug
        );

        Ok(activation)
    }

    /// Release the seat held by an active instance.
    ///
    /// Unlike activation this is not idempotent: an instance without an active
    /// seat is reported as `activation_not_found`.
    pub fn deactivate(&self, req: &DeactivateRequest) -> Result<Activation> {
        let resolved = resolve_license(self.repos, &req.license_key, &req.product_slug)?;
        let license = resolved.license;

        let not_found =
            || AppError::not_found(ErrorCode::ActivationNotFound, "No active activation found");

        let existing = self
            .repos
            .get_active_activation(&license.id, &req.instance_id)?
            .ok_or_else(not_found)?;

        // None here means a concurrent call deactivated it first
        let activation = self
            .repos
            .deactivate_activation(&existing.id)?
            .ok_or_else(not_found)?;

        self.repos.append_audit_log(
            &NewAuditLog::new(
                AuditAction::ActivationDeactivated,
                ActorType::Product,
                &activation.instance_id,
            )
            .license(&license.id)
            .license_key(&resolved.license_key.id)
            .details(serde_json::json!({
                "activation_id": activation.id,
                "product_slug": resolved.product.slug,
            })),
        )?;

        tracing::info!(
            "Deactivated instance {} on license {}",
            activation.instance_id,
            license.id
        );

        Ok(activation)
    }

    /// Full activation history of a license, newest first.
    pub fn list_activations(&self, license_id: &str) -> Result<Vec<Activation>> {
        self.repos.list_activations_for_license(license_id)
    }
}

fn no_seats(max_seats: i64, used_seats: i64) -> AppError {
    AppError::validation(
        ErrorCode::NoSeatsAvailable,
        format!(
            "No seats available (max: {}, used: {})",
            max_seats, used_seats
        ),
    )
}
