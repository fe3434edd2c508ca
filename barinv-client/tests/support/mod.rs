//! In-process mock of the inventory backend for integration tests.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use barinv_common::config::ClientConfig;

/// Behavior knobs and call records for the mock backend.
pub struct MockState {
    /// Accepted password hash; `None` accepts anything.
    pub valid_password_hash: Mutex<Option<String>>,
    pub ttl_seconds: Mutex<i64>,
    token_counter: Mutex<u32>,
    pub current_token: Mutex<Option<String>>,
    /// Reply to refresh with `{authorisation:{token}}` instead of `{token}`.
    pub refresh_nested: Mutex<bool>,
    pub refresh_calls: Mutex<u32>,
    pub fail_refresh: Mutex<bool>,
    pub fail_logout: Mutex<bool>,
    pub fail_update: Mutex<bool>,
    pub fail_missing: Mutex<bool>,
    /// Products by ean; the value is the `product_found` payload.
    pub products: Mutex<HashMap<String, Value>>,
    /// Raw reply body for the missing-products endpoint.
    pub missing_reply: Mutex<Value>,
    /// Artificial latency for product lookups.
    pub lookup_delay: Mutex<Option<Duration>>,
    /// Recorded `product/update` request bodies.
    pub update_bodies: Mutex<Vec<Value>>,
    pub logout_calls: Mutex<u32>,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid_password_hash: Mutex::new(None),
            ttl_seconds: Mutex::new(3600),
            token_counter: Mutex::new(0),
            current_token: Mutex::new(None),
            refresh_nested: Mutex::new(true),
            refresh_calls: Mutex::new(0),
            fail_refresh: Mutex::new(false),
            fail_logout: Mutex::new(false),
            fail_update: Mutex::new(false),
            fail_missing: Mutex::new(false),
            products: Mutex::new(HashMap::new()),
            missing_reply: Mutex::new(json!([])),
            lookup_delay: Mutex::new(None),
            update_bodies: Mutex::new(Vec::new()),
            logout_calls: Mutex::new(0),
        })
    }

    pub fn add_product(&self, ean: &str, payload: Value) {
        self.products.lock().unwrap().insert(ean.to_string(), payload);
    }

    fn mint_token(&self) -> String {
        let mut counter = self.token_counter.lock().unwrap();
        *counter += 1;
        let token = format!("tok-{}", *counter);
        *self.current_token.lock().unwrap() = Some(token.clone());
        token
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = match self.current_token.lock().unwrap().clone() {
            Some(token) => format!("Bearer {token}"),
            None => return false,
        };
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false)
    }
}

/// Start the mock backend on an ephemeral port; returns its base URL.
pub async fn spawn_backend(state: Arc<MockState>) -> String {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/product/get-by-ean", post(get_by_ean))
        .route("/product/update", post(update))
        .route("/product/get-missing-products", get(missing))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client config pointing at the mock, with timings tightened for tests.
pub fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        refresh_margin: Duration::from_millis(700),
        poll_interval: Duration::from_millis(50),
        rearm_delay: Duration::ZERO,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("barinv_client=debug,barinv_common=debug")
        .with_test_writer()
        .try_init();
}

fn error_body(message: &str) -> Json<Value> {
    Json(json!({ "status": "error", "message": message }))
}

async fn login(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some(expected) = state.valid_password_hash.lock().unwrap().clone() {
        if body["password"] != json!(expected) {
            return (StatusCode::UNAUTHORIZED, error_body("Invalid credentials"));
        }
    }
    let token = state.mint_token();
    let ttl = *state.ttl_seconds.lock().unwrap();
    (
        StatusCode::OK,
        Json(json!({
            "token": token,
            "token_type": "bearer",
            "token_expire": ttl,
            "inv_id": "inv-7",
            "multiple_products": false,
            "user_name": "Mock Operator",
        })),
    )
}

async fn logout(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, error_body("Unauthenticated"));
    }
    *state.logout_calls.lock().unwrap() += 1;
    if *state.fail_logout.lock().unwrap() {
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body("logout broke"));
    }
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn refresh(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    *state.refresh_calls.lock().unwrap() += 1;
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, error_body("Unauthenticated"));
    }
    if *state.fail_refresh.lock().unwrap() {
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body("refresh broke"));
    }
    let token = state.mint_token();
    let body = if *state.refresh_nested.lock().unwrap() {
        json!({ "authorisation": { "token": token } })
    } else {
        json!({ "token": token })
    };
    (StatusCode::OK, Json(body))
}

async fn get_by_ean(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, error_body("Unauthenticated"));
    }
    let delay = *state.lookup_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let ean = body["ean"].as_str().unwrap_or_default().to_string();
    let found = state.products.lock().unwrap().get(&ean).cloned();
    match found {
        Some(product) => (StatusCode::OK, Json(json!({ "product_found": product }))),
        None => (
            StatusCode::OK,
            Json(json!({ "product_not_found": { "create_option": "none" } })),
        ),
    }
}

async fn update(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, error_body("Unauthenticated"));
    }
    if *state.fail_update.lock().unwrap() {
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body("update broke"));
    }
    let mut bodies = state.update_bodies.lock().unwrap();
    bodies.push(body);
    let scan_id = format!("scan-{}", bodies.len());
    (StatusCode::OK, Json(json!({ "scan_id": scan_id })))
}

async fn missing(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, error_body("Unauthenticated"));
    }
    if *state.fail_missing.lock().unwrap() {
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body("missing broke"));
    }
    let reply = state.missing_reply.lock().unwrap().clone();
    (StatusCode::OK, Json(reply))
}
