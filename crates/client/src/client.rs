//! Bearer-authenticated HTTP client with single-retry token renewal.
//!
//! Every request goes through [`ApiClient::execute`]:
//!
//! | Response                    | Outcome                                            |
//! |-----------------------------|----------------------------------------------------|
//! | 2xx                         | envelope unwrapped, payload returned               |
//! | 401, request not yet `sent` | mark `sent`, renew token, replay once              |
//! | 401 after replay            | returned as-is (no second renewal)                 |
//! | 403                         | [`ResponseHooks::on_forbidden`], error returned    |
//! | 5xx                         | [`ResponseHooks::on_server_error`], error returned |
//! | anything else               | error returned unchanged                           |

use std::sync::Arc;

use hotpot_core::config::ClientConfig;
use hotpot_core::session::SessionHandle;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::envelope::unwrap_envelope;
use crate::error::ApiError;
use crate::hooks::{LoggingHooks, ResponseHooks};
use crate::refresh::TokenRefresher;
use crate::request::{PendingRequest, RequestBody};

/// HTTP client for the rental backend.
///
/// Cheap to clone; clones share the connection pool, session and hooks.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionHandle,
    hooks: Arc<dyn ResponseHooks>,
    refresher: TokenRefresher,
}

impl ApiClient {
    /// Build a client from configuration and a session handle.
    pub fn new(config: &ClientConfig, session: SessionHandle) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(http, &config.api_base_url, session))
    }

    /// Build a client reusing an existing [`reqwest::Client`].
    pub fn with_client(http: reqwest::Client, base_url: &str, session: SessionHandle) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let refresher = TokenRefresher::new(http.clone(), &base_url);
        Self {
            http,
            base_url,
            session,
            hooks: Arc::new(LoggingHooks),
            refresher,
        }
    }

    /// Replace the forbidden / server-error hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn ResponseHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Send a request and return its unwrapped payload.
    pub async fn execute(&self, mut request: PendingRequest) -> Result<Value, ApiError> {
        let err = match self.send_once(&request).await {
            Err(err) if err.is_unauthorized() && !request.sent => err,
            other => return other,
        };

        request.sent = true;

        match self.refresher.renew(&self.session).await {
            Ok(_) => {
                tracing::debug!(
                    method = %request.method,
                    path = %request.path,
                    "Access token renewed, replaying request",
                );
                self.send_once(&request).await
            }
            Err(renew_err) => {
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    error = %renew_err,
                    "Token renewal failed",
                );
                Err(err)
            }
        }
    }

    /// Send a request and deserialize its payload.
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
    ) -> Result<T, ApiError> {
        let payload = self.execute(request).await?;
        Ok(serde_json::from_value(payload)?)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.execute(PendingRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.execute(PendingRequest::post(path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.execute(PendingRequest::put(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.execute(PendingRequest::delete(path)).await
    }

    // ---- private helpers ----

    /// Build and send one attempt of `request`, reading the bearer token
    /// from the session at call time.
    async fn send_once(&self, request: &PendingRequest) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = self.session.access_token() {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(parts) => {
                builder.multipart(PendingRequest::build_form(parts)?)
            }
        };

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return unwrap_envelope(&response.bytes().await?);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let code = status.as_u16();

        if code == 403 {
            self.hooks.on_forbidden(&request.path);
        } else if status.is_server_error() {
            self.hooks.on_server_error(&request.path, code, &body);
        }

        Err(ApiError::Status { status: code, body })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .finish()
    }
}
