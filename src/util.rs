//! Shared utility functions.

use axum::http::HeaderMap;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Header carrying `<brand-slug>:<secret>` on brand-authenticated routes.
pub const BRAND_API_KEY_HEADER: &str = "x-brand-api-key";

/// SHA-256 hex digest of an API secret, as stored on the brand row.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Constant-time check of a presented secret against a stored hash.
pub fn verify_secret(secret: &str, expected_hash: &str) -> bool {
    let provided = hash_secret(secret);
    provided.as_bytes().ct_eq(expected_hash.as_bytes()).into()
}

/// Random secret for a new brand API key.
pub fn generate_brand_secret() -> String {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    format!("sw_{}", hex::encode(bytes))
}

/// Split a brand API key into `(slug, secret)`.
pub fn parse_brand_api_key(value: &str) -> Option<(&str, &str)> {
    let (slug, secret) = value.trim().split_once(':')?;
    if slug.is_empty() || secret.is_empty() {
        return None;
    }
    Some((slug, secret))
}

/// Extract client IP address and user-agent from request headers.
///
/// Tries `x-forwarded-for` first (for proxied requests, first hop only), then
/// `x-real-ip`.
pub fn extract_request_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        });

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    (ip, user_agent)
}

/// Serde helper for fields that must be present but may be `null`.
///
/// Use with `deserialize_with` and without `#[serde(default)]`: a missing
/// key fails deserialization, an explicit `null` becomes `None`.
pub fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}
