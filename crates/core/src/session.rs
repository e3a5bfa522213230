//! The logged-in session and the handle used to read and write it.
//!
//! [`SessionHandle`] is the only path through which tokens are written:
//! [`login`](SessionHandle::login), [`renew`](SessionHandle::renew) and
//! [`logout`](SessionHandle::logout). Readers (the HTTP client and the hub
//! token factory) call [`access_token`](SessionHandle::access_token) on every
//! request, which re-reads the backing [`SessionStore`] so a renewal made by
//! one request is seen by the next one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::claims::decode_access_claims;
use crate::error::CoreError;
use crate::store::{MemorySessionStore, SessionStore};
use crate::types::DbId;

/// Access / refresh token pair as persisted under `tokenModel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenModel {
    pub access_token: String,
    pub refresh_token: String,
}

/// Back-office role of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Manager,
    Staff,
    /// A role string the client does not know, kept verbatim.
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Staff => "Staff",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "staff" => Role::Staff,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// A logged-in user's credentials and profile.
///
/// Serializes to the persisted layout
/// `{ "tokenModel": { "accessToken", "refreshToken" }, "userId", "role", ... }`
/// where `...` are the remaining user fields returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token_model: TokenModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Any other user fields (name, email, avatar, ...), kept opaque.
    #[serde(flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            token_model: TokenModel {
                access_token: access_token.into(),
                refresh_token: refresh_token.into(),
            },
            user_id: None,
            role: None,
            profile: serde_json::Map::new(),
        }
    }

    pub fn with_user(mut self, user_id: DbId, role: Role) -> Self {
        self.user_id = Some(user_id);
        self.role = Some(role);
        self
    }

    pub fn access_token(&self) -> &str {
        &self.token_model.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.token_model.refresh_token
    }

    /// Fill `user_id` and `role` from the access-token claims where the
    /// login response left them out. Undecodable tokens are left alone.
    pub fn fill_from_claims(&mut self) {
        let claims = match decode_access_claims(self.access_token()) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, "Access token claims not readable");
                return;
            }
        };

        if self.user_id.is_none() {
            self.user_id = claims.user_id();
        }
        if self.role.is_none() {
            self.role = claims.role().map(|r| Role::from(r.to_string()));
        }
    }
}

/// Shared handle to the persisted session.
///
/// Cheap to clone; every clone reads and writes the same store.
#[derive(Clone)]
pub struct SessionHandle {
    store: Arc<dyn SessionStore>,
}

impl SessionHandle {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// A handle backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::default()))
    }

    /// Read the current session from the store.
    pub fn current(&self) -> Option<Session> {
        self.store.load()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// The access token as of right now.
    pub fn access_token(&self) -> Option<String> {
        self.current().map(|s| s.token_model.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current().map(|s| s.token_model.refresh_token)
    }

    /// Persist a freshly logged-in session.
    pub fn login(&self, session: Session) -> Result<(), CoreError> {
        self.store.save(&session)?;
        tracing::info!(user_id = ?session.user_id, role = ?session.role, "Session started");
        Ok(())
    }

    /// Replace the access token after a successful renewal.
    ///
    /// The refresh token and user fields are kept unchanged.
    pub fn renew(&self, access_token: String) -> Result<(), CoreError> {
        let mut session = self
            .current()
            .ok_or_else(|| CoreError::Unauthorized("no session to renew".into()))?;
        session.token_model.access_token = access_token;
        self.store.save(&session)?;
        tracing::debug!(user_id = ?session.user_id, "Access token renewed");
        Ok(())
    }

    /// Drop the session.
    pub fn logout(&self) -> Result<(), CoreError> {
        self.store.clear()?;
        tracing::info!("Session cleared");
        Ok(())
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
