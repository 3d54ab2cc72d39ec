use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

use crate::common::*;
use seatwarden::handlers;
use seatwarden::util::BRAND_API_KEY_HEADER;

pub struct TestApp {
    pub app: Router,
    pub store: SqliteStore,
    pub brand: Brand,
    pub api_key: String,
    pub product: Product,
}

impl TestApp {
    /// Brand `acme` with product `widget`.
    pub fn new() -> Self {
        Self::with_store(sqlite_store())
    }

    /// Seed `acme` / `widget` into an already initialised store.
    pub fn with_store(store: SqliteStore) -> Self {
        let (brand, api_key, product) = {
            let conn = store.pool().get().unwrap();
            let (brand, api_key) = queries::create_brand(
                &conn,
                &CreateBrand {
                    slug: "acme".into(),
                    name: "Acme".into(),
                },
            )
            .unwrap();
            let product = queries::create_product(
                &conn,
                &brand.id,
                &CreateProduct {
                    slug: "widget".into(),
                    name: "Widget".into(),
                    default_max_seats: Some(3),
                },
            )
            .unwrap();
            (brand, api_key, product)
        };

        let app = handlers::app(AppState {
            store: store.clone(),
        });
        Self {
            app,
            store,
            brand,
            api_key,
            product,
        }
    }

    /// Create another brand and return `(brand, api_key)`.
    pub fn other_brand(&self, slug: &str) -> (Brand, String) {
        let conn = self.store.pool().get().unwrap();
        queries::create_brand(
            &conn,
            &CreateBrand {
                slug: slug.into(),
                name: slug.into(),
            },
        )
        .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn post(&self, uri: &str, api_key: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = api_key {
            builder = builder.header(BRAND_API_KEY_HEADER, key);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(key) = api_key {
            builder = builder.header(BRAND_API_KEY_HEADER, key);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Provision one widget license and return the key string.
    pub async fn provision(&self, max_seats: Option<i64>) -> String {
        let (status, body) = self
            .post(
                &format!("/api/v1/brands/{}/license-keys", self.brand.id),
                Some(&self.api_key),
                serde_json::json!({
                    "customer_email": "user@example.com",
                    "products": [{
                        "product_id": self.product.id,
                        "expires_at": null,
                        "max_seats": max_seats,
                    }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["key"].as_str().unwrap().to_string()
    }
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
