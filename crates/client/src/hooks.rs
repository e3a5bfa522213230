//! Side-effects for forbidden and server-error responses.
//!
//! The browser front-end navigates to a forbidden page on 403 and logs 5xx
//! responses. Headless clients plug their own behavior in through
//! [`ResponseHooks`]; the default only logs.

/// Callbacks invoked by [`ApiClient`](crate::ApiClient) before the error is
/// returned to the caller. Neither hook triggers a retry.
pub trait ResponseHooks: Send + Sync {
    /// The backend answered 403 for `path`.
    fn on_forbidden(&self, path: &str) {
        tracing::warn!(path, "Access forbidden");
    }

    /// The backend answered a 5xx status for `path`.
    fn on_server_error(&self, path: &str, status: u16, body: &str) {
        tracing::error!(path, status, body, "Server error");
    }
}

/// Default hooks: log and do nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl ResponseHooks for LoggingHooks {}
