//! Fixed-sequence reconnection backoff for hub connections.
//!
//! When an established connection drops, the manager calls
//! [`reconnect_loop`] to keep retrying until either the connection is
//! restored or the [`CancellationToken`] is triggered. There is no cap on
//! the number of attempts: once the sequence is exhausted its last delay
//! repeats forever.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::transport::{HubChannel, HubTransport};

/// Delay schedule between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delays: Vec<Duration>,
}

impl Default for ReconnectPolicy {
    /// Immediately, then 2 s, 5 s, 10 s, 30 s, then 30 s forever.
    fn default() -> Self {
        Self::new(vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(30),
        ])
    }
}

impl ReconnectPolicy {
    /// Build a policy from an explicit schedule. An empty schedule retries
    /// immediately every time.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Delay before the attempt with the given zero-based index.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let Some(last) = self.delays.last() else {
            return Duration::ZERO;
        };
        self.delays
            .get(attempt as usize)
            .copied()
            .unwrap_or(*last)
    }
}

/// Where and how to reconnect.
pub struct ReconnectTarget<'a> {
    pub transport: &'a dyn HubTransport,
    pub url: &'a str,
    /// Asked for a fresh access token before every attempt.
    pub token: &'a (dyn Fn() -> Option<String> + Send + Sync),
}

/// Retry the connection until it succeeds or `cancel` fires.
///
/// Returns `Some(channel)` once a connection succeeds, or `None` if the
/// `cancel` token is triggered first.
pub async fn reconnect_loop(
    target: &ReconnectTarget<'_>,
    policy: &ReconnectPolicy,
    cancel: &CancellationToken,
) -> Option<HubChannel> {
    let mut attempt = 0u32;

    loop {
        let delay = policy.delay_for(attempt);
        attempt += 1;
        tracing::info!(
            url = target.url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to hub",
        );

        // Wait before the attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        let token = (target.token)();

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(url = target.url, "Reconnect cancelled");
                return None;
            }
            result = target.transport.start(target.url, token.as_deref()) => {
                match result {
                    Ok(channel) => {
                        tracing::info!(url = target.url, attempt, "Reconnected to hub");
                        return Some(channel);
                    }
                    Err(e) => {
                        tracing::warn!(
                            url = target.url,
                            error = %e,
                            "Reconnect attempt {attempt} failed",
                        );
                    }
                }
            }
        }
    }
}
