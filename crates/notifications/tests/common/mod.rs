//! In-process stand-in for the backend's notification endpoints.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use hotpot_client::ApiClient;
use hotpot_core::session::{Session, SessionHandle};
use hotpot_notifications::{NotificationService, NotificationStore};

pub struct Backend {
    pub page: Mutex<(StatusCode, Value)>,
    pub unread: Mutex<(StatusCode, Value)>,
    pub fail_marks: AtomicBool,
    pub read_calls: Mutex<Vec<i64>>,
    pub read_all_calls: AtomicUsize,
    pub last_query: Mutex<HashMap<String, String>>,
}

pub struct TestBackend {
    pub base_url: String,
    pub state: Arc<Backend>,
}

impl TestBackend {
    pub async fn start() -> Self {
        let state = Arc::new(Backend {
            page: Mutex::new((
                StatusCode::OK,
                json!({
                    "success": true,
                    "data": {
                        "Notifications": [
                            { "Id": 3, "Type": "OrderCreated", "Title": "Order #3", "IsRead": false },
                            { "Id": 2, "Type": "ShipmentAssigned", "Title": "Shipment #8", "IsRead": false },
                            { "Id": 1, "Type": "System", "Title": "Welcome", "IsRead": true }
                        ],
                        "CurrentPage": 1,
                        "PageSize": 20,
                        "TotalCount": 3,
                        "TotalPages": 1,
                        "HasPreviousPage": false,
                        "HasNextPage": false
                    }
                }),
            )),
            unread: Mutex::new((StatusCode::OK, json!({ "success": true, "data": { "unreadCount": 2 } }))),
            fail_marks: AtomicBool::new(false),
            read_calls: Mutex::new(Vec::new()),
            read_all_calls: AtomicUsize::new(0),
            last_query: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/notifications", get(list))
            .route("/notifications/unread-count", get(unread_count))
            .route("/notifications/read-all", put(read_all))
            .route("/notifications/{id}/read", put(read_one))
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

    pub fn set_page(&self, status: StatusCode, body: Value) {
        *self.state.page.lock().unwrap() = (status, body);
    }

    pub fn set_unread(&self, status: StatusCode, body: Value) {
        *self.state.unread.lock().unwrap() = (status, body);
    }

    pub fn service(&self) -> NotificationService {
        let session = SessionHandle::in_memory();
        session.login(Session::new("good", "refresh-1")).unwrap();
        NotificationService::new(ApiClient::with_client(
            reqwest::Client::new(),
            &self.base_url,
            session,
        ))
    }

    pub fn store(&self) -> NotificationStore {
        NotificationStore::new(self.service())
    }
}

async fn list(
    State(state): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    *state.last_query.lock().unwrap() = query;
    let (status, body) = state.page.lock().unwrap().clone();
    (status, Json(body))
}

async fn unread_count(State(state): State<Arc<Backend>>) -> (StatusCode, Json<Value>) {
    let (status, body) = state.unread.lock().unwrap().clone();
    (status, Json(body))
}

async fn read_one(State(state): State<Arc<Backend>>, Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    if state.fail_marks.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "db down" })));
    }
    state.read_calls.lock().unwrap().push(id);
    (StatusCode::OK, Json(json!({ "success": true, "data": null })))
}

async fn read_all(State(state): State<Arc<Backend>>) -> (StatusCode, Json<Value>) {
    if state.fail_marks.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "db down" })));
    }
    state.read_all_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, Json(json!({ "success": true })))
}
