//! Typed gateway to the inventory backend
//!
//! Owns the HTTP client, injects the bearer token on every call except
//! login, and normalizes every non-2xx reply into the shared error
//! taxonomy. The backend's reply shapes are inconsistent across
//! deployments (refresh and missing-products each have two observed
//! variants); all variants are normalized here so callers never see them.

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use barinv_common::config::ClientConfig;
use barinv_common::ean::is_valid_ean;
use barinv_common::types::{MissingProduct, ProductRecord, SellingMethod};
use barinv_common::{Error, Result};

const USER_AGENT: &str = "barinv/0.1.0";

/// Shared token slot. Written only by the session manager; read by the
/// gateway when building each request, so a refresh completing mid-lookup
/// takes effect on the next request without failing the one in flight.
pub type TokenCell = Arc<RwLock<Option<String>>>;

/// Fresh, empty token cell.
pub fn new_token_cell() -> TokenCell {
    Arc::new(RwLock::new(None))
}

/// Login reply, already normalized from the wire.
#[derive(Debug, Clone)]
pub struct LoginReply {
    pub token: String,
    pub ttl_seconds: i64,
    pub user_name: String,
    pub inventory_id: String,
    pub news_message: Option<String>,
    pub news_color: Option<String>,
}

/// Outcome of a product lookup. `NotFound` is a business result the scan
/// flow branches on, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(ProductRecord),
    NotFound,
}

/// Typed request/response layer with auth injection.
pub struct ApiGateway {
    http: reqwest::Client,
    base_url: String,
    token: TokenCell,
}

impl ApiGateway {
    pub fn new(config: &ClientConfig, token: TokenCell) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn bearer(&self) -> Result<String> {
        self.token
            .read()
            .await
            .as_deref()
            .map(|t| format!("Bearer {t}"))
            .ok_or(Error::Unauthorized)
    }

    /// `POST /auth/login` with a pre-hashed password. The only call that
    /// carries no bearer token.
    pub async fn login(&self, user_id: &str, password_hash: &str) -> Result<LoginReply> {
        let url = self.url("/auth/login");
        tracing::debug!(%url, %user_id, "login request");

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "user_id": user_id,
                "password": password_hash,
            }))
            .send()
            .await
            .map_err(net_err)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, true).await);
        }

        let wire: LoginWire = response
            .json()
            .await
            .map_err(|e| Error::ServerError(format!("parse login reply: {e}")))?;

        Ok(LoginReply {
            token: wire.token,
            ttl_seconds: wire.token_expire,
            user_name: wire.user_name,
            inventory_id: wire.inv_id,
            news_message: wire.news_message,
            news_color: wire.news_color,
        })
    }

    /// `POST /auth/logout`. Callers treat failures as best-effort.
    pub async fn logout(&self) -> Result<()> {
        let bearer = self.bearer().await?;
        let response = self
            .http
            .post(self.url("/auth/logout"))
            .header(reqwest::header::AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(net_err)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, false).await);
        }
        Ok(())
    }

    /// `POST /auth/refresh`, exchanging the current token for a new one.
    /// Tolerates both observed reply shapes: `{authorisation:{token}}`
    /// and `{token}`.
    pub async fn refresh(&self) -> Result<String> {
        let bearer = self.bearer().await?;
        let response = self
            .http
            .post(self.url("/auth/refresh"))
            .header(reqwest::header::AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(net_err)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, false).await);
        }

        let wire: RefreshWire = response
            .json()
            .await
            .map_err(|e| Error::ServerError(format!("parse refresh reply: {e}")))?;
        Ok(wire.into_token())
    }

    /// `POST /product/get-by-ean`. `product_found` may be a single record
    /// or an array (first entry wins); a missing or empty `product_found`
    /// maps to `Lookup::NotFound`.
    pub async fn lookup_by_ean(&self, ean: &str) -> Result<Lookup> {
        if !is_valid_ean(ean) {
            return Err(Error::Validation(format!("malformed EAN: {ean:?}")));
        }

        let bearer = self.bearer().await?;
        let url = self.url("/product/get-by-ean");
        tracing::debug!(%url, %ean, "product lookup");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, bearer)
            .json(&serde_json::json!({ "ean": ean }))
            .send()
            .await
            .map_err(net_err)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, false).await);
        }

        let wire: LookupWire = response
            .json()
            .await
            .map_err(|e| Error::ServerError(format!("parse get-by-ean reply: {e}")))?;

        let record = match wire.product_found {
            Some(ProductFoundWire::One(p)) => Some(p),
            Some(ProductFoundWire::Many(list)) => list.into_iter().next(),
            None => None,
        };

        match record {
            Some(p) => Ok(Lookup::Found(p.into_record(ean))),
            None => {
                tracing::debug!(%ean, "product not found");
                Ok(Lookup::NotFound)
            }
        }
    }

    /// `POST /product/update`, committing a counted quantity.
    ///
    /// The `weight` field is always zero (unused by this client but
    /// required by the wire format) and `type` derives from the selling
    /// method. Returns the server-issued scan id when the reply carries
    /// one.
    pub async fn commit_count(
        &self,
        product: &ProductRecord,
        quantity: u32,
    ) -> Result<Option<String>> {
        let bearer = self.bearer().await?;
        let url = self.url("/product/update");
        tracing::debug!(%url, ean = %product.ean, quantity, "commit count");

        let body = UpdateWire {
            scan_id: product.scan_id.as_deref(),
            ean: &product.ean,
            full_pack: quantity.to_string(),
            weight: 0,
            type_code: product.selling_method.type_code(),
        };

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, bearer)
            .json(&body)
            .send()
            .await
            .map_err(net_err)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, false).await);
        }

        let wire: UpdateReplyWire = response
            .json()
            .await
            .map_err(|e| Error::ServerError(format!("parse update reply: {e}")))?;
        Ok(wire.scan_id)
    }

    /// `GET /product/get-missing-products`. Normalizes a bare array,
    /// `{products, count}`, and `{missing_products, total}` replies into
    /// one list + count.
    pub async fn list_missing_products(&self) -> Result<(Vec<MissingProduct>, usize)> {
        let bearer = self.bearer().await?;
        let response = self
            .http
            .get(self.url("/product/get-missing-products"))
            .header(reqwest::header::AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(net_err)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, false).await);
        }

        let wire: MissingWire = response
            .json()
            .await
            .map_err(|e| Error::ServerError(format!("parse missing-products reply: {e}")))?;
        Ok(wire.normalize())
    }
}

fn net_err(e: reqwest::Error) -> Error {
    Error::Network(e.to_string())
}

/// Map a non-2xx response to the error taxonomy, reading the
/// `{status:"error", message}` envelope when one is present.
async fn error_from_response(response: reqwest::Response, login: bool) -> Error {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .ok()
        .and_then(|body| serde_json::from_str::<ErrorEnvelope>(&body).ok())
        .map(|envelope| envelope.message)
        .unwrap_or_else(|| format!("HTTP {status}"));
    classify_status(status, message, login)
}

fn classify_status(status: u16, message: String, login: bool) -> Error {
    match status {
        401 | 403 if login => Error::InvalidCredentials,
        401 => Error::Unauthorized,
        404 => Error::NotFound(message),
        400 | 422 => Error::Validation(message),
        _ => Error::ServerError(message),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[allow(dead_code)]
    status: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LoginWire {
    token: String,
    token_expire: i64,
    inv_id: String,
    user_name: String,
    #[serde(default)]
    news_message: Option<String>,
    #[serde(default)]
    news_color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RefreshWire {
    Nested { authorisation: RefreshTokenWire },
    Flat { token: String },
}

#[derive(Debug, Deserialize)]
struct RefreshTokenWire {
    token: String,
}

impl RefreshWire {
    fn into_token(self) -> String {
        match self {
            RefreshWire::Nested { authorisation } => authorisation.token,
            RefreshWire::Flat { token } => token,
        }
    }
}

/// Product as the backend sends it. Numeric-looking fields arrive as
/// strings on some deployments and numbers on others.
#[derive(Debug, Deserialize)]
struct ProductWire {
    name: String,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    selling_method: Option<String>,
    #[serde(default, deserialize_with = "de_stringish")]
    volume: Option<String>,
    #[serde(default, deserialize_with = "de_stringish")]
    alcohol_content: Option<String>,
    #[serde(default, deserialize_with = "de_stringish")]
    quantity_on_stock: Option<String>,
    #[serde(default, deserialize_with = "de_stringish")]
    scan_id: Option<String>,
    #[serde(default)]
    ean: Option<String>,
}

impl ProductWire {
    /// Domain record; the ean is backfilled from the query because some
    /// deployments omit it in the reply.
    fn into_record(self, queried_ean: &str) -> ProductRecord {
        ProductRecord {
            ean: self.ean.unwrap_or_else(|| queried_ean.to_string()),
            name: self.name,
            brand: self.brand,
            selling_method: self
                .selling_method
                .as_deref()
                .map(SellingMethod::from_wire)
                .unwrap_or(SellingMethod::Unit),
            volume: self.volume,
            alcohol_content: self.alcohol_content,
            quantity_on_stock: self.quantity_on_stock,
            scan_id: self.scan_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProductFoundWire {
    One(ProductWire),
    Many(Vec<ProductWire>),
}

#[derive(Debug, Deserialize)]
struct LookupWire {
    #[serde(default)]
    product_found: Option<ProductFoundWire>,
    #[serde(default)]
    #[allow(dead_code)]
    product_not_found: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct UpdateWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    scan_id: Option<&'a str>,
    ean: &'a str,
    full_pack: String,
    weight: u32,
    #[serde(rename = "type")]
    type_code: u8,
}

#[derive(Debug, Deserialize)]
struct UpdateReplyWire {
    #[serde(default, deserialize_with = "de_stringish")]
    scan_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MissingWire {
    Wrapped {
        products: Vec<MissingProduct>,
        #[serde(default)]
        count: Option<usize>,
    },
    Legacy {
        missing_products: Vec<MissingProduct>,
        #[serde(default)]
        total: Option<usize>,
    },
    Plain(Vec<MissingProduct>),
}

impl MissingWire {
    fn normalize(self) -> (Vec<MissingProduct>, usize) {
        match self {
            MissingWire::Plain(products) => {
                let count = products.len();
                (products, count)
            }
            MissingWire::Wrapped { products, count } => {
                let count = count.unwrap_or(products.len());
                (products, count)
            }
            MissingWire::Legacy {
                missing_products,
                total,
            } => {
                let count = total.unwrap_or(missing_products.len());
                (missing_products, count)
            }
        }
    }
}

/// Accept a JSON string or number as an optional string.
fn de_stringish<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
