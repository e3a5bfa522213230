//! Silent access-token renewal.
//!
//! When a request comes back 401, [`ApiClient`](crate::ApiClient) asks the
//! [`TokenRefresher`] for a new access token exactly once, then replays the
//! request. The renewal call goes straight to the backend: it is never itself
//! intercepted, so a failing renewal cannot recurse.
//!
//! Concurrent 401s are not coalesced: each failing request runs its own
//! renewal, and the last successful one wins the session write.

use hotpot_core::session::SessionHandle;
use serde_json::Value;

use crate::envelope::{field, unwrap_envelope};
use crate::error::ApiError;

/// Path of the renewal endpoint under the API base URL.
pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// Issues token-renewal calls and writes the result into the session.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    http: reqwest::Client,
    endpoint: String,
}

impl TokenRefresher {
    pub fn new(http: reqwest::Client, api_base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{api_base_url}{REFRESH_PATH}"),
        }
    }

    /// Renew the access token using the session's refresh token.
    ///
    /// On success the new access token is persisted (the refresh token is
    /// left unchanged) and returned.
    pub async fn renew(&self, session: &SessionHandle) -> Result<String, ApiError> {
        let current = session
            .current()
            .ok_or_else(|| ApiError::Renewal("no session to renew".into()))?;

        let body = serde_json::json!({
            "accessToken": current.access_token(),
            "refreshToken": current.refresh_token(),
        });

        let response = self.http.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = unwrap_envelope(&response.bytes().await?)?;
        let access_token = extract_access_token(&payload)
            .ok_or_else(|| ApiError::Renewal("response carried no access token".into()))?;

        session.renew(access_token.clone())?;
        Ok(access_token)
    }
}

/// Find the new access token in a renewal payload.
///
/// Accepts `{accessToken}`, `{tokenModel:{accessToken}}` (either key casing)
/// or a bare token string.
fn extract_access_token(payload: &Value) -> Option<String> {
    let token = match payload {
        Value::String(s) => Some(s.as_str()),
        _ => field(payload, "accessToken")
            .or_else(|| field(payload, "tokenModel").and_then(|m| field(m, "accessToken")))
            .and_then(Value::as_str),
    };
    token.filter(|t| !t.is_empty()).map(str::to_string)
}
