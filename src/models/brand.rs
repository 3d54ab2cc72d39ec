use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant issuing license keys under its own namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub slug: String,
    pub name: String,
    /// SHA-256 hex digest of the brand's API secret
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBrand {
    pub slug: String,
    pub name: String,
}
