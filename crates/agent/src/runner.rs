//! Agent lifecycle: session, initial fetch, live feed, shutdown.

use std::future::Future;
use std::sync::Arc;

use hotpot_client::auth::AuthApi;
use hotpot_client::{ApiClient, ApiError};
use hotpot_core::claims::decode_access_claims;
use hotpot_core::error::CoreError;
use hotpot_core::session::{Session, SessionHandle};
use hotpot_core::store::FileSessionStore;
use hotpot_hub::{HubConnectionManager, HubEndpoint};
use hotpot_notifications::{
    NotificationFeed, NotificationFilter, NotificationService, NotificationStore, StoreEvent,
};
use tokio::sync::broadcast::error::RecvError;

use crate::config::AgentConfig;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("No stored session; set HOTPOT_EMAIL and HOTPOT_PASSWORD to log in")]
    NoSession,

    #[error("Could not connect to the notification hub at {0}")]
    HubUnavailable(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Session handle backed by the configured session file.
pub fn session_handle(config: &AgentConfig) -> SessionHandle {
    SessionHandle::new(Arc::new(FileSessionStore::new(
        config.client.session_file.clone(),
    )))
}

/// Log in with configured credentials, or fall back to the stored session.
pub async fn establish_session(
    config: &AgentConfig,
    client: &ApiClient,
) -> Result<Session, AgentError> {
    if let Some((email, password)) = config.credentials() {
        let session = AuthApi::new(client.clone()).login(email, password).await?;
        tracing::info!(
            user_id = ?session.user_id,
            role = session.role.as_ref().map(|r| r.as_str()).unwrap_or("unknown"),
            "Logged in",
        );
        return Ok(session);
    }

    let session = client.session().current().ok_or(AgentError::NoSession)?;
    match decode_access_claims(session.access_token()) {
        Ok(claims) if claims.is_expired_at(chrono::Utc::now()) => {
            tracing::info!("Stored access token has expired; it will be renewed on first use");
        }
        Ok(claims) => {
            tracing::info!(expires_at = ?claims.expires_at(), "Reusing stored session");
        }
        Err(e) => tracing::debug!(error = %e, "Stored access token is not a readable JWT"),
    }
    Ok(session)
}

/// Run until `shutdown` resolves.
pub async fn run<S>(config: AgentConfig, shutdown: S) -> Result<(), AgentError>
where
    S: Future<Output = ()>,
{
    let session = session_handle(&config);
    let client = ApiClient::new(&config.client, session.clone())?;
    establish_session(&config, &client).await?;

    let store = Arc::new(NotificationStore::new(NotificationService::new(
        client.clone(),
    )));
    let page = store
        .refresh(&NotificationFilter {
            include_read: true,
            page: 1,
            page_size: config.page_size,
        })
        .await;
    tracing::info!(
        fetched = page.notifications.len(),
        total = page.total_count,
        unread = store.unread_count(),
        "Loaded notifications",
    );

    let manager =
        HubConnectionManager::for_endpoint(&config.client, HubEndpoint::Notifications, session);
    NotificationFeed::attach(&manager, Arc::clone(&store)).await;

    let mut states = manager.subscribe_state();
    let state_log = tokio::spawn(async move {
        loop {
            match states.recv().await {
                Ok(change) => {
                    tracing::info!(from = %change.previous, to = %change.current, "Notification hub state")
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "State log lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut events = store.subscribe();
    let unread_store = Arc::clone(&store);
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StoreEvent::Received(n)) => tracing::info!(
                    id = n.id,
                    kind = %n.kind,
                    title = %n.title,
                    unread = unread_store.unread_count(),
                    "New notification",
                ),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Notification log lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = if manager.connect().await {
        tracing::info!(url = manager.url(), "Listening for notifications");
        shutdown.await;
        tracing::info!("Shutting down");
        Ok(())
    } else {
        Err(AgentError::HubUnavailable(manager.url().to_string()))
    };

    manager.disconnect().await;
    state_log.abort();
    event_log.abort();
    result
}
