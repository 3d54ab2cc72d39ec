use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query, rules};
use crate::services::{CustomerLicenseInfo, QueryService};

#[derive(Debug, Deserialize)]
pub struct ByEmailQuery {
    pub email: String,
    #[serde(default)]
    pub brand_slug: Option<String>,
}

/// GET /licenses/by-email
///
/// Any authenticated brand may look up a customer across all brands unless
/// `brand_slug` narrows the search.
pub async fn list_by_email(
    State(state): State<AppState>,
    Query(query): Query<ByEmailQuery>,
) -> Result<Json<Vec<CustomerLicenseInfo>>> {
    rules::email(&query.email).map_err(AppError::BadRequest)?;

    let service = QueryService::new(&state.store);
    let brand_id = service.resolve_brand_filter(query.brand_slug.as_deref())?;
    let results = service.list_by_customer_email(&query.email, brand_id.as_deref())?;
    Ok(Json(results))
}
