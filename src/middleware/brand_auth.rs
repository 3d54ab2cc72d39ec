use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::models::Brand;
use crate::repo::BrandRepo;
use crate::util::{BRAND_API_KEY_HEADER, parse_brand_api_key, verify_secret};

/// The brand that authenticated the current request.
#[derive(Clone)]
pub struct BrandContext {
    pub brand: Brand,
}

/// Resolve the `X-Brand-Api-Key` header to an active brand.
fn authenticate(state: &AppState, request: &Request) -> Result<Brand> {
    let header = request
        .headers()
        .get(BRAND_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing brand API key".into()))?;

    let (slug, secret) = parse_brand_api_key(header)
        .ok_or_else(|| AppError::Unauthorized("Malformed brand API key".into()))?;

    let brand = match state.store.get_brand_by_slug(slug)? {
        Some(brand) if brand.is_active && verify_secret(secret, &brand.api_key_hash) => brand,
        _ => {
            tracing::warn!(brand_slug = %slug, "Rejected brand API key");
            return Err(AppError::Unauthorized("Invalid brand API key".into()));
        }
    };

    Ok(brand)
}

/// Any authenticated brand. Used for cross-brand lookups.
pub async fn brand_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let brand = authenticate(&state, &request)?;
    request.extensions_mut().insert(BrandContext { brand });
    Ok(next.run(request).await)
}

/// Authenticated brand that must also match the `{brand_id}` path segment.
pub async fn brand_scope_auth(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let brand_id = params
        .get("brand_id")
        .ok_or_else(|| AppError::BadRequest("Missing brand id".into()))?;

    let brand = authenticate(&state, &request)?;

    if brand.id != *brand_id {
        tracing::warn!(
            brand_id = %brand.id,
            requested = %brand_id,
            "Brand attempted to access another brand's resources"
        );
        return Err(AppError::Forbidden(
            "API key does not grant access to this brand".into(),
        ));
    }

    request.extensions_mut().insert(BrandContext { brand });
    Ok(next.run(request).await)
}
