use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST base URL; endpoint paths are appended to it.
    pub api_base_url: String,
    /// Base URL the hub paths (`/notificationHub`, ...) are resolved against.
    pub hub_base_url: String,
    /// Key-value file holding the persisted session.
    pub session_file: PathBuf,
    /// Timeout applied to every REST request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".into(),
            hub_base_url: "http://localhost:5000".into(),
            session_file: PathBuf::from(".hotpot/session.json"),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                       | Default                     |
    /// |-------------------------------|-----------------------------|
    /// | `HOTPOT_API_URL`              | `http://localhost:5000/api` |
    /// | `HOTPOT_HUB_URL`              | `http://localhost:5000`     |
    /// | `HOTPOT_SESSION_FILE`         | `.hotpot/session.json`      |
    /// | `HOTPOT_REQUEST_TIMEOUT_SECS` | `30`                        |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("HOTPOT_API_URL")
            .map(|v| normalize_base_url("HOTPOT_API_URL", &v))
            .transpose()?
            .unwrap_or(defaults.api_base_url);

        let hub_base_url = lookup("HOTPOT_HUB_URL")
            .map(|v| normalize_base_url("HOTPOT_HUB_URL", &v))
            .transpose()?
            .unwrap_or(defaults.hub_base_url);

        let session_file = lookup("HOTPOT_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_file);

        let request_timeout = match lookup("HOTPOT_REQUEST_TIMEOUT_SECS") {
            Some(v) => {
                let secs = v
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| {
                        CoreError::Validation(format!(
                            "HOTPOT_REQUEST_TIMEOUT_SECS must be a positive whole number of seconds, got {v:?}"
                        ))
                    })?;
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_base_url,
            hub_base_url,
            session_file,
            request_timeout,
        })
    }
}

/// Trim whitespace and trailing slashes; require an http(s) scheme.
fn normalize_base_url(var: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(CoreError::Validation(format!(
            "{var} must be an http(s) URL, got {value:?}"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn overrides_are_applied_and_trailing_slash_trimmed() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("HOTPOT_API_URL", "https://rent.example.com/api/"),
            ("HOTPOT_HUB_URL", "https://rent.example.com"),
            ("HOTPOT_SESSION_FILE", "/tmp/s.json"),
            ("HOTPOT_REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://rent.example.com/api");
        assert_eq!(config.hub_base_url, "https://rent.example.com");
        assert_eq!(config.session_file, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let result = ClientConfig::from_lookup(lookup_from(&[("HOTPOT_API_URL", "ftp://x")]));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let result =
            ClientConfig::from_lookup(lookup_from(&[("HOTPOT_REQUEST_TIMEOUT_SECS", "soon")]));
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("soon"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result =
            ClientConfig::from_lookup(lookup_from(&[("HOTPOT_REQUEST_TIMEOUT_SECS", "0")]));
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("positive"));
    }
}
