mod customers;
mod license_keys;
mod licenses;

pub use customers::*;
pub use license_keys::*;
pub use licenses::*;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::AppState;
use crate::middleware::{brand_auth, brand_scope_auth};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Readiness: the database must answer `SELECT 1`, otherwise 503.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = match state.store.ping() {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Routes mounted under `/api/v1`.
pub fn router(state: AppState) -> Router<AppState> {
    let brand_routes = Router::new()
        .route("/brands/{brand_id}/license-keys", post(provision_license_key))
        .route("/brands/{brand_id}/license-keys/{key}", get(get_license_key))
        .route(
            "/brands/{brand_id}/license-keys/{key}/audit-logs",
            get(list_license_key_audit_logs),
        )
        .route(
            "/brands/{brand_id}/license-keys/{key}/licenses",
            post(add_license),
        )
        .route(
            "/brands/{brand_id}/license-keys/{key}/licenses/{product_id}/activations",
            get(list_license_activations),
        )
        .route(
            "/brands/{brand_id}/license-keys/{key}/licenses/{product_id}/suspend",
            post(suspend_license),
        )
        .route(
            "/brands/{brand_id}/license-keys/{key}/licenses/{product_id}/resume",
            post(resume_license),
        )
        .route(
            "/brands/{brand_id}/license-keys/{key}/licenses/{product_id}/cancel",
            post(cancel_license),
        )
        .route(
            "/brands/{brand_id}/license-keys/{key}/licenses/{product_id}/renew",
            post(renew_license),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            brand_scope_auth,
        ));

    let lookup_routes = Router::new()
        .route("/licenses/by-email", get(list_by_email))
        .layer(middleware::from_fn_with_state(state, brand_auth));

    let public_routes = Router::new()
        .route("/licenses/activate", post(activate))
        .route("/licenses/deactivate", post(deactivate))
        .route("/licenses/status", get(license_status))
        .layer(CorsLayer::permissive());

    brand_routes.merge(lookup_routes).merge(public_routes)
}

/// Full application: health checks at the root, API under `/api/v1`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(health))
        .route("/health/live", get(liveness))
        .nest("/api/v1", router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
