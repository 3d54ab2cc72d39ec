use axum::http::StatusCode;
use serde_json::json;

use super::helpers::{TestApp, error_code};

#[tokio::test]
async fn provision_returns_created_key() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            &format!("/api/v1/brands/{}/license-keys", app.brand.id),
            Some(&app.api_key),
            json!({
                "customer_email": "user@example.com",
                "external_reference": "order-7",
                "products": [{ "product_id": app.product.id, "expires_at": null }],
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["key"].as_str().unwrap().starts_with("ACME-"));
    assert_eq!(body["brand_slug"], "acme");
    assert_eq!(body["external_reference"], "order-7");
    assert_eq!(body["licenses"][0]["status"], "valid");
    // Product default applies when the entry has no cap
    assert_eq!(body["licenses"][0]["max_seats"], 3);
    assert_eq!(body["licenses"][0]["used_seats"], 0);
}

#[tokio::test]
async fn provision_rejects_malformed_input() {
    let app = TestApp::new();
    let uri = format!("/api/v1/brands/{}/license-keys", app.brand.id);

    let cases = [
        json!({ "customer_email": "not-an-email", "products": [{ "product_id": app.product.id, "expires_at": null }] }),
        json!({ "customer_email": "user@example.com", "products": [{ "product_id": app.product.id, "expires_at": null, "max_seats": 0 }] }),
        json!({ "customer_email": "user@example.com", "license_key": "K".repeat(65), "products": [{ "product_id": app.product.id, "expires_at": null }] }),
        json!({ "customer_email": "user@example.com" }),
        // expiration must be stated, even if only as null
        json!({ "customer_email": "user@example.com", "products": [{ "product_id": app.product.id }] }),
        json!({ "customer_email": "user@example.com", "products": [{ "product_id": "widget", "expires_at": null }] }),
    ];
    for case in cases {
        let (status, body) = app.post(&uri, Some(&app.api_key), case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", case);
        assert_eq!(error_code(&body), "invalid_request", "{}", case);
    }
}

#[tokio::test]
async fn domain_errors_render_code_and_status() {
    let app = TestApp::new();
    let uri = format!("/api/v1/brands/{}/license-keys", app.brand.id);

    let (status, body) = app
        .post(
            &uri,
            Some(&app.api_key),
            json!({ "customer_email": "user@example.com", "products": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "no_products");
    assert!(body["error"]["message"].is_string());

    let explicit = json!({
        "customer_email": "user@example.com",
        "license_key": "FIXED-KEY",
        "products": [{ "product_id": app.product.id, "expires_at": null }],
    });
    let (status, _) = app.post(&uri, Some(&app.api_key), explicit.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.post(&uri, Some(&app.api_key), explicit).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "key_exists");

    let (status, body) = app
        .get(&format!("{}/MISSING", uri), Some(&app.api_key))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "key_not_found");
}

#[tokio::test]
async fn add_license_and_fetch_details() {
    let app = TestApp::new();
    let key = app.provision(Some(1)).await;
    let base = format!("/api/v1/brands/{}/license-keys/{}", app.brand.id, key);

    let (status, body) = app
        .post(
            &format!("{}/licenses", base),
            Some(&app.api_key),
            json!({ "product_id": app.product.id, "expires_at": null }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "license_exists");

    let (status, body) = app.get(&base, Some(&app.api_key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], key.as_str());
    assert_eq!(body["licenses"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn add_license_requires_uuid_and_expiration() {
    let app = TestApp::new();
    let key = app.provision(Some(1)).await;
    let uri = format!("/api/v1/brands/{}/license-keys/{}/licenses", app.brand.id, key);

    let cases = [
        json!({ "product_id": app.product.id }),
        json!({ "product_id": "not-a-uuid", "expires_at": null }),
        json!({ "product_id": "", "expires_at": "2999-01-01T00:00:00Z" }),
    ];
    for case in cases {
        let (status, body) = app.post(&uri, Some(&app.api_key), case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", case);
        assert_eq!(error_code(&body), "invalid_request", "{}", case);
    }

    // A well-formed id for a product that does not exist is a lookup miss
    let (status, body) = app
        .post(
            &uri,
            Some(&app.api_key),
            json!({ "product_id": uuid::Uuid::new_v4(), "expires_at": null }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "product_not_found");
}

#[tokio::test]
async fn lifecycle_endpoints() {
    let app = TestApp::new();
    let key = app.provision(Some(2)).await;
    let base = format!(
        "/api/v1/brands/{}/license-keys/{}/licenses/{}",
        app.brand.id, key, app.product.id
    );

    let (status, body) = app
        .post(&format!("{}/suspend", base), Some(&app.api_key), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "suspended");

    let (status, body) = app
        .post(&format!("{}/suspend", base), Some(&app.api_key), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid_state_transition");

    let (status, body) = app
        .post(&format!("{}/renew", base), Some(&app.api_key), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid_request");

    let (status, body) = app
        .post(
            &format!("{}/renew", base),
            Some(&app.api_key),
            json!({ "expires_at": "2999-01-01T00:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "valid");
    assert!(body["expires_at"].as_str().unwrap().starts_with("2999-01-01"));

    let (status, body) = app
        .post(&format!("{}/cancel", base), Some(&app.api_key), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = app
        .get(
            &format!("/api/v1/brands/{}/license-keys/{}/audit-logs", app.brand.id, key),
            Some(&app.api_key),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        actions,
        vec![
            "license_key_created",
            "license_created",
            "license_suspended",
            "license_renewed",
            "license_cancelled"
        ]
    );
}
