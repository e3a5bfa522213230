use hotpot_core::config::ClientConfig;
use hotpot_core::error::CoreError;

/// Default number of notifications fetched on startup.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Agent configuration: the shared client settings plus optional login
/// credentials.
#[derive(Clone, PartialEq)]
pub struct AgentConfig {
    pub client: ClientConfig,
    pub email: Option<String>,
    pub password: Option<String>,
    pub page_size: u32,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("client", &self.client)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl AgentConfig {
    /// Load from the process environment.
    ///
    /// | Env Var            | Default |
    /// |--------------------|---------|
    /// | `HOTPOT_EMAIL`     | --      |
    /// | `HOTPOT_PASSWORD`  | --      |
    /// | `HOTPOT_PAGE_SIZE` | `20`    |
    ///
    /// plus everything [`ClientConfig::from_env`] reads.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client = ClientConfig::from_lookup(&lookup)?;
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let email = non_empty("HOTPOT_EMAIL");
        let password = non_empty("HOTPOT_PASSWORD");
        if email.is_some() != password.is_some() {
            return Err(CoreError::Validation(
                "HOTPOT_EMAIL and HOTPOT_PASSWORD must be set together".into(),
            ));
        }

        let page_size = match non_empty("HOTPOT_PAGE_SIZE") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "HOTPOT_PAGE_SIZE must be a positive integer, got {v:?}"
                    ))
                })?,
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            client,
            email,
            password,
            page_size,
        })
    }

    /// Email and password, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.email.as_deref().zip(self.password.as_deref())
    }
}
