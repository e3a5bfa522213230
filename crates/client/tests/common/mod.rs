//! In-process stand-in for the rental backend.
//!
//! Binds an axum router on `127.0.0.1:0` and counts the calls each route
//! receives so tests can assert on renewal and retry behavior.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use hotpot_client::ApiClient;
use hotpot_core::session::{Session, SessionHandle};

pub const FRESH_TOKEN: &str = "fresh-token";

/// Shared, inspectable state of the fake backend.
pub struct Backend {
    pub valid_token: Mutex<String>,
    pub refresh_succeeds: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub orders_calls: AtomicUsize,
    pub always_401_calls: AtomicUsize,
    pub forbidden_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub last_refresh_body: Mutex<Option<Value>>,
    pub upload_fields: Mutex<Vec<String>>,
}

impl Backend {
    fn new(valid_token: &str) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            refresh_succeeds: AtomicBool::new(true),
            refresh_calls: AtomicUsize::new(0),
            orders_calls: AtomicUsize::new(0),
            always_401_calls: AtomicUsize::new(0),
            forbidden_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            last_refresh_body: Mutex::new(None),
            upload_fields: Mutex::new(Vec::new()),
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn orders_calls(&self) -> usize {
        self.orders_calls.load(Ordering::SeqCst)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.valid_token.lock().unwrap());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

/// A running fake backend.
pub struct TestBackend {
    pub base_url: String,
    pub state: Arc<Backend>,
}

impl TestBackend {
    /// Start a backend that accepts `valid_token` as the current access token.
    pub async fn start(valid_token: &str) -> Self {
        let state = Arc::new(Backend::new(valid_token));

        let app = Router::new()
            .route("/orders", get(list_orders))
            .route("/always-401", get(always_401))
            .route("/admin/settings", get(forbidden))
            .route("/manager/report", get(server_error))
            .route("/missing", get(not_found))
            .route("/auth/refresh-token", post(refresh_token))
            .route("/auth/login", post(login))
            .route("/auth/logout", post(logout))
            .route(
                "/staff/shipments/{id}/delivery-proof",
                post(upload_delivery_proof),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// A client whose session holds `access_token` / `refresh-1`.
    pub fn client_with_token(&self, access_token: &str) -> ApiClient {
        let session = SessionHandle::in_memory();
        session
            .login(Session::new(access_token, "refresh-1"))
            .unwrap();
        ApiClient::with_client(reqwest::Client::new(), &self.base_url, session)
    }
}

async fn list_orders(State(state): State<Arc<Backend>>, headers: HeaderMap) -> impl IntoResponse {
    state.orders_calls.fetch_add(1, Ordering::SeqCst);
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "expired" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": [{ "id": 1, "status": "Pending" }] })),
    )
}

async fn always_401(State(state): State<Arc<Backend>>) -> impl IntoResponse {
    state.always_401_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::UNAUTHORIZED
}

async fn forbidden(State(state): State<Arc<Backend>>) -> impl IntoResponse {
    state.forbidden_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::FORBIDDEN, "staff cannot open admin settings")
}

async fn server_error() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable")
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "no such thing")
}

async fn refresh_token(
    State(state): State<Arc<Backend>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_refresh_body.lock().unwrap() = Some(body);

    if !state.refresh_succeeds.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "refresh token revoked" })),
        );
    }

    *state.valid_token.lock().unwrap() = FRESH_TOKEN.to_string();
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": { "accessToken": FRESH_TOKEN } })),
    )
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] != "correct horse" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "bad credentials" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "Success": true,
            "Data": {
                "TokenModel": { "AccessToken": "login-access", "RefreshToken": "login-refresh" },
                "UserId": 12,
                "Role": "Staff",
                "FullName": "Thao Tran"
            }
        })),
    )
}

async fn logout(State(state): State<Arc<Backend>>) -> impl IntoResponse {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn upload_delivery_proof(
    State(state): State<Arc<Backend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }

    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        fields.push(field.name().unwrap_or_default().to_string());
    }
    *state.upload_fields.lock().unwrap() = fields;

    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": { "shipmentId": id, "status": "Delivered" } })),
    )
}
