//! One logical, self-healing connection to a hub endpoint.
//!
//! [`HubConnectionManager`] owns the subscription registry and at most one
//! live connection. `connect` starts a background task that dispatches
//! server invocations to handlers and, when the connection drops, walks
//! the [`ReconnectPolicy`] until it is restored or `disconnect` is called.
//!
//! Handlers may be registered before `connect`; their event names are
//! wired onto the connection as soon as it opens. State transitions are
//! broadcast via [`HubConnectionManager::subscribe_state`].

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use hotpot_core::config::ClientConfig;
use hotpot_core::session::SessionHandle;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::endpoint::HubEndpoint;
use crate::error::HubError;
use crate::events::{ConnectionState, StateChange, StateTracker};
use crate::protocol::HubMessage;
use crate::reconnect::{reconnect_loop, ReconnectPolicy, ReconnectTarget};
use crate::registry::{normalize_event, Handler, HandlerId, SubscriptionRegistry};
use crate::transport::{HubChannel, HubTransport, WebSocketTransport};

/// How long `disconnect` waits for the connection task to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Supplies the current access token, asked before every (re)connect.
pub type TokenFactory = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Token factory reading the persisted session at call time.
pub fn session_token_factory(session: SessionHandle) -> TokenFactory {
    Arc::new(move || session.access_token())
}

type Outbound = Arc<RwLock<Option<mpsc::UnboundedSender<HubMessage>>>>;

/// Bookkeeping for the live connection task.
struct ActiveConnection {
    id: uuid::Uuid,
    /// Event names wired onto this connection.
    wired: Arc<RwLock<HashSet<String>>>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

pub struct HubConnectionManager {
    url: String,
    transport: Arc<dyn HubTransport>,
    token_factory: TokenFactory,
    policy: ReconnectPolicy,
    registry: Arc<RwLock<SubscriptionRegistry>>,
    /// Serializes `connect` calls; held across the transport start.
    connecting: Mutex<()>,
    /// Cancels the transport start of an in-flight `connect`.
    pending: std::sync::Mutex<Option<CancellationToken>>,
    connection: Mutex<Option<ActiveConnection>>,
    outbound: Outbound,
    state: Arc<StateTracker>,
}

impl HubConnectionManager {
    /// Manager for `url` using `transport`. Nothing connects until
    /// [`connect`](Self::connect).
    pub fn new(
        url: impl Into<String>,
        transport: Arc<dyn HubTransport>,
        token_factory: TokenFactory,
    ) -> Self {
        let url = url.into();
        Self {
            state: Arc::new(StateTracker::new(&url)),
            url,
            transport,
            token_factory,
            policy: ReconnectPolicy::default(),
            registry: Arc::new(RwLock::new(SubscriptionRegistry::new())),
            connecting: Mutex::new(()),
            pending: std::sync::Mutex::new(None),
            connection: Mutex::new(None),
            outbound: Arc::new(RwLock::new(None)),
        }
    }

    /// WebSocket manager for one of the backend's hubs, authenticated from
    /// the persisted session.
    pub fn for_endpoint(
        config: &ClientConfig,
        endpoint: HubEndpoint,
        session: SessionHandle,
    ) -> Self {
        Self::new(
            endpoint.url(&config.hub_base_url),
            Arc::new(WebSocketTransport::default()),
            session_token_factory(session),
        )
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// True only while a connection is open (not while reconnecting).
    pub fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Connected
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<StateChange> {
        self.state.subscribe()
    }

    fn pending(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open the connection if none is live.
    ///
    /// Returns `true` when a connection is live afterwards. A failed first
    /// attempt is logged and returns `false`; it is not retried. Handlers
    /// can be added or removed while the transport is starting, and
    /// `disconnect` aborts the start.
    pub async fn connect(&self) -> bool {
        let _connecting = self.connecting.lock().await;

        if let Some(active) = self.connection.lock().await.as_ref() {
            if !active.task.is_finished() {
                tracing::debug!(url = %self.url, connection_id = %active.id, "Hub connection already live");
                return true;
            }
        }

        let cancel = CancellationToken::new();
        *self.pending() = Some(cancel.clone());
        self.state.set(ConnectionState::Connecting);
        let token = (self.token_factory)();

        let started = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.transport.start(&self.url, token.as_deref()) => Some(result),
        };
        self.pending().take();

        let channel = match started {
            Some(Ok(channel)) => channel,
            Some(Err(e)) => {
                tracing::error!(url = %self.url, error = %e, "Failed to connect to hub");
                if !cancel.is_cancelled() {
                    self.state.set(ConnectionState::Disconnected);
                }
                return false;
            }
            None => {
                tracing::info!(url = %self.url, "Hub connect aborted by disconnect");
                return false;
            }
        };

        let mut slot = self.connection.lock().await;
        if cancel.is_cancelled() {
            tracing::info!(url = %self.url, "Hub connect aborted by disconnect");
            return false;
        }

        let wired: HashSet<String> = self.registry.read().await.event_names().into_iter().collect();
        let wired = Arc::new(RwLock::new(wired));
        *self.outbound.write().await = Some(channel.outbound);

        let id = uuid::Uuid::new_v4();
        self.state.set(ConnectionState::Connected);

        let ctx = ConnectionContext {
            id,
            url: self.url.clone(),
            transport: Arc::clone(&self.transport),
            token_factory: Arc::clone(&self.token_factory),
            policy: self.policy.clone(),
            registry: Arc::clone(&self.registry),
            wired: Arc::clone(&wired),
            outbound: Arc::clone(&self.outbound),
            state: Arc::clone(&self.state),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(async move {
            tracing::info!(url = %ctx.url, connection_id = %ctx.id, "Starting hub connection task");
            run_connection(&ctx, channel.inbound).await;
            tracing::info!(url = %ctx.url, connection_id = %ctx.id, "Hub connection task exited");
        });

        *slot = Some(ActiveConnection {
            id,
            wired,
            cancel,
            task,
        });
        true
    }

    /// Register `handler` for server invocations of `event`.
    ///
    /// Handlers for the same event run in registration order. If a
    /// connection is live the event is wired onto it immediately; otherwise
    /// it is wired when the next connection opens.
    pub async fn on<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let id = self.registry.write().await.add(event, handler);

        if let Some(active) = self.connection.lock().await.as_ref() {
            active.wired.write().await.insert(normalize_event(event));
        }
        tracing::debug!(url = %self.url, event, "Registered hub handler");
        id
    }

    /// Remove one handler (`Some(id)`) or every handler (`None`) for
    /// `event`. The event is unwired once no handlers remain.
    pub async fn off(&self, event: &str, handler: Option<HandlerId>) {
        let now_empty = {
            let mut registry = self.registry.write().await;
            match handler {
                Some(id) => registry.remove(event, id),
                None => {
                    registry.remove_all(event);
                    true
                }
            }
        };

        if now_empty {
            if let Some(active) = self.connection.lock().await.as_ref() {
                active.wired.write().await.remove(&normalize_event(event));
            }
        }
    }

    /// Invoke `target` on the server without waiting for a result.
    pub async fn send(&self, target: &str, arguments: Vec<Value>) -> Result<(), HubError> {
        if !self.is_connected() {
            return Err(HubError::NotConnected);
        }
        let guard = self.outbound.read().await;
        let tx = guard.as_ref().ok_or(HubError::NotConnected)?;
        tx.send(HubMessage::invocation(target, arguments))
            .map_err(|_| HubError::NotConnected)
    }

    /// Stop the connection (including any reconnection in progress) and
    /// drop every registered handler.
    pub async fn disconnect(&self) {
        let pending = self.pending().take();
        if let Some(pending) = pending {
            pending.cancel();
        }

        let active = self.connection.lock().await.take();

        if let Some(active) = active {
            tracing::info!(url = %self.url, connection_id = %active.id, "Disconnecting from hub");
            active.cancel.cancel();
            // Dropping the sender closes the transport.
            self.outbound.write().await.take();
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, active.task).await;
        }

        self.registry.write().await.clear();
        self.state.set(ConnectionState::Disconnected);
    }
}

impl std::fmt::Debug for HubConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConnectionManager")
            .field("url", &self.url)
            .field("state", &self.state.get())
            .finish()
    }
}

/// Everything the background task needs, detached from the manager.
struct ConnectionContext {
    id: uuid::Uuid,
    url: String,
    transport: Arc<dyn HubTransport>,
    token_factory: TokenFactory,
    policy: ReconnectPolicy,
    registry: Arc<RwLock<SubscriptionRegistry>>,
    wired: Arc<RwLock<HashSet<String>>>,
    outbound: Outbound,
    state: Arc<StateTracker>,
    cancel: CancellationToken,
}

/// Why message processing stopped.
enum ReadOutcome {
    /// Transport dropped or the server allowed a reconnect.
    Lost,
    /// Server closed and forbade reconnecting.
    Closed(Option<String>),
    Cancelled,
}

/// Core connection loop: process messages -> reconnect.
///
/// Runs until cancelled or the server closes without allowing reconnect.
async fn run_connection(ctx: &ConnectionContext, mut inbound: mpsc::UnboundedReceiver<HubMessage>) {
    loop {
        match read_messages(ctx, &mut inbound).await {
            ReadOutcome::Cancelled => return,
            ReadOutcome::Closed(error) => {
                tracing::warn!(
                    url = %ctx.url,
                    error = error.as_deref().unwrap_or(""),
                    "Hub closed the connection without allowing reconnect",
                );
                ctx.outbound.write().await.take();
                ctx.state.set(ConnectionState::Disconnected);
                return;
            }
            ReadOutcome::Lost => {}
        }

        ctx.outbound.write().await.take();
        if ctx.cancel.is_cancelled() {
            return;
        }

        tracing::info!(url = %ctx.url, "Hub connection lost, entering reconnect loop");
        ctx.state.set(ConnectionState::Reconnecting);

        let target = ReconnectTarget {
            transport: ctx.transport.as_ref(),
            url: &ctx.url,
            token: ctx.token_factory.as_ref(),
        };
        let HubChannel {
            outbound,
            inbound: next_inbound,
        } = match reconnect_loop(&target, &ctx.policy, &ctx.cancel).await {
            Some(channel) => channel,
            None => return,
        };

        *ctx.outbound.write().await = Some(outbound);
        inbound = next_inbound;
        ctx.state.set(ConnectionState::Connected);
    }
}

async fn read_messages(
    ctx: &ConnectionContext,
    inbound: &mut mpsc::UnboundedReceiver<HubMessage>,
) -> ReadOutcome {
    loop {
        let message = tokio::select! {
            _ = ctx.cancel.cancelled() => return ReadOutcome::Cancelled,
            message = inbound.recv() => message,
        };

        match message {
            None => return ReadOutcome::Lost,
            Some(HubMessage::Invocation {
                target, arguments, ..
            }) => dispatch(ctx, &target, &arguments).await,
            Some(HubMessage::Close {
                error,
                allow_reconnect,
            }) => {
                if allow_reconnect {
                    tracing::info!(url = %ctx.url, error = error.as_deref().unwrap_or(""), "Hub asked client to reconnect");
                    return ReadOutcome::Lost;
                }
                return ReadOutcome::Closed(error);
            }
            Some(HubMessage::Completion { invocation_id, .. }) => {
                tracing::debug!(url = %ctx.url, invocation_id = %invocation_id, "Unexpected completion");
            }
            Some(HubMessage::Ping) => {}
            Some(HubMessage::Other(kind)) => {
                tracing::trace!(url = %ctx.url, kind, "Ignoring hub message");
            }
        }
    }
}

/// Run every handler for `target`, isolating handler panics.
async fn dispatch(ctx: &ConnectionContext, target: &str, arguments: &[Value]) {
    let key = normalize_event(target);
    if !ctx.wired.read().await.contains(&key) {
        tracing::debug!(url = %ctx.url, target, "No handler for hub method");
        return;
    }

    let handlers = ctx.registry.read().await.handlers_for(&key);
    for handler in handlers {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(arguments)));
        if result.is_err() {
            tracing::error!(url = %ctx.url, target, "Hub handler panicked");
        }
    }
}
