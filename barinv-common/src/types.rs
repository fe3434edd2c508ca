//! Data model shared by the client cores

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How a product is sold; drives the `type` discriminant on count commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellingMethod {
    /// Sold by the piece (bottles, cans)
    Unit,
    /// Sold by pour / open volume
    Bulk,
}

impl SellingMethod {
    /// Wire discriminant for `product/update`: bulk → 0, unit → 1.
    pub fn type_code(&self) -> u8 {
        match self {
            SellingMethod::Bulk => 0,
            SellingMethod::Unit => 1,
        }
    }

    /// Map the backend's Slovak selling-method strings. Unknown values
    /// default to `Unit`, matching how the backend treats them.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "rozlievane" => SellingMethod::Bulk,
            _ => SellingMethod::Unit,
        }
    }
}

/// Remote-owned product read model, fetched per lookup and never cached
/// beyond the current scan transaction.
///
/// Numeric-looking fields arrive as strings from the backend and are kept
/// that way; only the stock quantity is parsed, leniently, for prefill.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub ean: String,
    pub name: String,
    pub brand: Option<String>,
    pub selling_method: SellingMethod,
    pub volume: Option<String>,
    pub alcohol_content: Option<String>,
    pub quantity_on_stock: Option<String>,
    pub scan_id: Option<String>,
}

impl ProductRecord {
    /// Stock quantity suitable for prefilling the count field.
    pub fn stock_quantity(&self) -> u32 {
        self.quantity_on_stock
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Operator identity and inventory binding returned by login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorProfile {
    pub operator_id: String,
    pub user_name: String,
    pub inventory_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_color: Option<String>,
}

/// An authenticated session. Owned exclusively by the session manager;
/// persisted on creation/refresh, erased on logout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Server-declared token lifetime in seconds; a refresh re-extends
    /// expiry by this amount (the refresh reply carries no ttl).
    pub ttl_seconds: i64,
    pub profile: OperatorProfile,
}

impl Session {
    /// Build a session issued at `now` with the server-declared ttl.
    pub fn create(
        token: String,
        ttl_seconds: i64,
        profile: OperatorProfile,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if ttl_seconds <= 0 {
            return Err(Error::Validation(format!(
                "non-positive token ttl: {ttl_seconds}"
            )));
        }
        Ok(Self {
            token,
            issued_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
            ttl_seconds,
            profile,
        })
    }

    /// Re-issue this session with a fresh token, extending expiry by the
    /// original ttl.
    pub fn renewed(&self, token: String, now: DateTime<Utc>) -> Self {
        Self {
            token,
            issued_at: now,
            expires_at: now + Duration::seconds(self.ttl_seconds),
            ttl_seconds: self.ttl_seconds,
            profile: self.profile.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Instant at which the refresh timer should fire.
    pub fn refresh_due_at(&self, margin: Duration) -> DateTime<Utc> {
        self.expires_at - margin
    }
}

/// Local ledger entry for a counted product. EAN is the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub ean: String,
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alcohol_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A product the backend reports as not yet counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingProduct {
    pub name: String,
    pub ean: String,
}

/// Last observed "not yet counted" view. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MissingSnapshot {
    pub products: Vec<MissingProduct>,
    pub count: usize,
    /// None until the first successful poll.
    pub updated_at: Option<DateTime<Utc>>,
}
