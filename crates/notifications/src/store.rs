//! In-memory notification list and unread counter.
//!
//! Local state only changes after the matching server call succeeds. Hub
//! pushes arrive through [`NotificationStore::dispatch`], which is
//! synchronous so it can run inside a hub handler.
//!
//! Every change is broadcast as a [`StoreEvent`]; call
//! [`NotificationStore::subscribe`] to observe them.

use std::sync::{Mutex, MutexGuard};

use hotpot_client::ApiError;
use hotpot_core::types::DbId;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::models::{Notification, NotificationFilter, NotificationPage, NotificationType};
use crate::normalize::normalize_casing;
use crate::service::NotificationService;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Change notifications emitted by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A pushed notification was added to the front of the list.
    Received(Notification),
    Read(DbId),
    AllRead,
    /// The list was replaced by a fresh page.
    Refreshed { count: usize, unread: u64 },
}

/// What [`NotificationStore::dispatch`] did with a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Added(DbId),
    /// `ConnectionRegistered` / `Error` control message.
    Control(NotificationType),
    /// Already in the list.
    Duplicate(DbId),
    /// Unparseable, non-positive id, or unrecognized type.
    Rejected,
}

#[derive(Default)]
struct StoreState {
    notifications: Vec<Notification>,
    unread_count: u64,
}

pub struct NotificationStore {
    service: NotificationService,
    state: Mutex<StoreState>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl NotificationStore {
    pub fn new(service: NotificationService) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            state: Mutex::new(StoreState::default()),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Snapshot of the list, newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.state().notifications.clone()
    }

    pub fn get(&self, id: DbId) -> Option<Notification> {
        self.state().notifications.iter().find(|n| n.id == id).cloned()
    }

    pub fn unread_count(&self) -> u64 {
        self.state().unread_count
    }

    /// Replace the list with `filter`'s page and re-read the unread count.
    pub async fn refresh(&self, filter: &NotificationFilter) -> NotificationPage {
        let page = self.service.fetch(filter).await;
        let unread = self.service.get_unread_count().await;

        {
            let mut state = self.state();
            state.notifications = page.notifications.clone();
            state.unread_count = unread;
        }

        tracing::debug!(count = page.notifications.len(), unread, "Notifications refreshed");
        self.emit(StoreEvent::Refreshed {
            count: page.notifications.len(),
            unread,
        });
        page
    }

    /// Handle one pushed payload (either key casing).
    ///
    /// Recognized notifications with a new positive id are prepended and,
    /// if unread, bump the unread counter. Control messages never enter the
    /// list.
    pub fn dispatch(&self, payload: Value) -> DispatchOutcome {
        let payload = normalize_casing(payload);
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .map_or(NotificationType::Unknown, NotificationType::parse);

        if kind.is_control() {
            let message = payload.get("message").and_then(Value::as_str).unwrap_or("");
            match kind {
                NotificationType::Error => {
                    tracing::warn!(detail = message, "Notification hub reported an error")
                }
                _ => tracing::info!(detail = message, "Notification hub registered connection"),
            }
            return DispatchOutcome::Control(kind);
        }

        let Some(notification) = Notification::from_value(payload) else {
            tracing::debug!("Dropping malformed notification push");
            return DispatchOutcome::Rejected;
        };
        if !notification.kind.is_recognized() {
            tracing::debug!(id = notification.id, "Dropping notification of unknown type");
            return DispatchOutcome::Rejected;
        }

        let id = notification.id;
        {
            let mut state = self.state();
            if state.notifications.iter().any(|n| n.id == id) {
                tracing::debug!(id, "Ignoring duplicate notification push");
                return DispatchOutcome::Duplicate(id);
            }
            if !notification.is_read {
                state.unread_count += 1;
            }
            state.notifications.insert(0, notification.clone());
        }

        tracing::info!(
            id,
            kind = %notification.kind,
            title = %notification.title,
            "Notification received",
        );
        self.emit(StoreEvent::Received(notification));
        DispatchOutcome::Added(id)
    }

    /// Mark one notification read on the server, then locally.
    ///
    /// On failure local state is untouched and the error is returned.
    pub async fn mark_as_read(&self, id: DbId) -> Result<(), ApiError> {
        self.service.mark_as_read(id).await?;

        {
            let mut state = self.state();
            let already_read = match state.notifications.iter_mut().find(|n| n.id == id) {
                Some(n) => std::mem::replace(&mut n.is_read, true),
                None => false,
            };
            if !already_read {
                state.unread_count = state.unread_count.saturating_sub(1);
            }
        }

        self.emit(StoreEvent::Read(id));
        Ok(())
    }

    /// Mark everything read on the server, then locally. Failures are
    /// logged and leave local state untouched.
    pub async fn mark_all_as_read(&self) {
        if let Err(e) = self.service.mark_all_as_read().await {
            tracing::warn!(error = %e, "Failed to mark all notifications as read");
            return;
        }

        {
            let mut state = self.state();
            for n in &mut state.notifications {
                n.is_read = true;
            }
            state.unread_count = 0;
        }

        self.emit(StoreEvent::AllRead);
    }
}
