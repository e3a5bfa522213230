//! Access-token claim decoding.
//!
//! The backend verifies token signatures; the client only reads the
//! claims it needs (subject, role, expiry), so signature validation is
//! disabled here.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::CoreError;
use crate::types::DbId;

/// The subset of access-token claims the client cares about.
///
/// ASP.NET identity tokens often carry the subject and role twice, under the
/// short name and under a long claim URI. Each spelling is read separately
/// and the first present one wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default, rename = "nameid")]
    pub name_id: Option<String>,
    #[serde(default, rename = "userId")]
    pub user_id_claim: Option<String>,
    #[serde(
        default,
        rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier"
    )]
    pub name_identifier: Option<String>,
    #[serde(default, rename = "role")]
    pub short_role: Option<String>,
    #[serde(
        default,
        rename = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role"
    )]
    pub role_uri: Option<String>,
    /// Expiry as Unix seconds.
    #[serde(default)]
    pub exp: Option<i64>,
}

impl AccessClaims {
    /// The subject under whichever claim name carries it.
    pub fn subject(&self) -> Option<&str> {
        [&self.sub, &self.name_id, &self.user_id_claim, &self.name_identifier]
            .into_iter()
            .find_map(|c| c.as_deref())
    }

    /// The subject parsed as a numeric user id, if it is one.
    pub fn user_id(&self) -> Option<DbId> {
        self.subject().and_then(|s| s.parse().ok())
    }

    pub fn role(&self) -> Option<&str> {
        self.short_role.as_deref().or(self.role_uri.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Whether the token has expired as of `now`. Tokens without `exp`
    /// never expire from the client's point of view.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

/// Decode the claims of an access token without verifying its signature.
pub fn decode_access_claims(token: &str) -> Result<AccessClaims, CoreError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| CoreError::InvalidToken(e.to_string()))
}
