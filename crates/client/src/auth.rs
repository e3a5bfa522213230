//! Login and logout: the session's creation and destruction paths.

use hotpot_core::session::{Session, SessionHandle};
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::request::PendingRequest;

/// Wrapper for the `/auth` endpoints.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn session(&self) -> &SessionHandle {
        self.client.session()
    }

    /// `POST /auth/login` and persist the resulting session.
    ///
    /// User id and role missing from the response are read from the access
    /// token's claims.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let payload = self
            .client
            .execute(PendingRequest::post("/auth/login").json(serde_json::json!({
                "email": email,
                "password": password,
            })))
            .await?;

        let mut session = parse_login(payload)?;
        session.fill_from_claims();
        self.session().login(session.clone())?;

        tracing::info!(user_id = ?session.user_id, role = ?session.role, "Logged in");
        Ok(session)
    }

    /// Best-effort `POST /auth/logout`, then drop the local session.
    ///
    /// The local session is cleared even if the backend call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Some(refresh_token) = self.session().refresh_token() {
            let request = PendingRequest::post("/auth/logout")
                .json(serde_json::json!({ "refreshToken": refresh_token }));
            if let Err(e) = self.client.execute(request).await {
                tracing::warn!(error = %e, "Logout call failed, clearing session anyway");
            }
        }
        self.session().logout()?;
        Ok(())
    }
}

/// Parse a login payload in either key casing.
///
/// The token pair is expected under `tokenModel`; a flat
/// `{accessToken, refreshToken, ...}` payload is accepted as well.
fn parse_login(payload: Value) -> Result<Session, ApiError> {
    let Value::Object(map) = payload else {
        return Err(ApiError::Shape("login response is not an object".into()));
    };

    let mut normalized = serde_json::Map::with_capacity(map.len());
    for (key, value) in map {
        let value = match value {
            Value::Object(inner) if key.eq_ignore_ascii_case("tokenModel") => {
                Value::Object(lower_first_keys(inner))
            }
            other => other,
        };
        normalized.insert(lower_first(&key), value);
    }

    if !normalized.contains_key("tokenModel") {
        let access = normalized.remove("accessToken");
        let refresh = normalized.remove("refreshToken");
        if let (Some(access), Some(refresh)) = (access, refresh) {
            normalized.insert(
                "tokenModel".into(),
                serde_json::json!({ "accessToken": access, "refreshToken": refresh }),
            );
        }
    }

    Ok(serde_json::from_value(Value::Object(normalized))?)
}

fn lower_first_keys(map: serde_json::Map<String, Value>) -> serde_json::Map<String, Value> {
    map.into_iter().map(|(k, v)| (lower_first(&k), v)).collect()
}

fn lower_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
