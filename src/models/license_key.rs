use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer-facing credential grouping one license per product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseKey {
    pub id: String,
    pub key: String,
    pub brand_id: String,
    /// Joined from the owning brand on read
    pub brand_slug: String,
    pub customer_email: String,
    /// Brand-side reference such as an order id
    pub external_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLicenseKey {
    pub key: String,
    pub brand_id: String,
    pub customer_email: String,
    pub external_reference: Option<String>,
}
