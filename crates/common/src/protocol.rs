//! JSON views placed in the envelope `data` field by the endpoints.
//!
//! Internal records (password hashes, token owner ids, row timestamps) never
//! appear here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Users / tokens
// ---------------------------------------------------------------------------

/// Bearer token as handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenView {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Profile returned by registration and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub phone: Option<String>,
    pub permissions: Vec<String>,
    pub avatar: Option<String>,
    pub ml_id: Option<String>,
    pub data: serde_json::Value,
    pub access_token: AccessTokenView,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of create/update responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemId {
    pub id: String,
}

// ---------------------------------------------------------------------------
// Mercado Livre
// ---------------------------------------------------------------------------

/// Grant obtained from the marketplace after the OAuth code exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry, computed from the relative `expires_in` seconds.
    pub expires_in: DateTime<Utc>,
    pub user_id: i64,
    pub scopes: Vec<String>,
}
