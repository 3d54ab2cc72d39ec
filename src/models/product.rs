use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub brand_id: String,
    /// Unique within the owning brand only
    pub slug: String,
    pub name: String,
    pub is_active: bool,
    /// Seat cap applied when a license is created without an explicit one.
    /// None = unlimited.
    pub default_max_seats: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub default_max_seats: Option<i64>,
}
