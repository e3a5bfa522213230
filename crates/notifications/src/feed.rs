use std::sync::Arc;

use hotpot_hub::{HandlerId, HubConnectionManager};

use crate::store::NotificationStore;

/// Hub method the backend invokes for every pushed notification.
pub const RECEIVE_NOTIFICATION: &str = "ReceiveNotification";

/// Routes `ReceiveNotification` pushes from a hub into a store.
#[derive(Debug)]
pub struct NotificationFeed {
    handler: HandlerId,
}

impl NotificationFeed {
    /// Register the push handler on `manager`. Works before or after the
    /// manager connects.
    pub async fn attach(manager: &HubConnectionManager, store: Arc<NotificationStore>) -> Self {
        let handler = manager
            .on(RECEIVE_NOTIFICATION, move |args| match args.first() {
                Some(payload) => {
                    store.dispatch(payload.clone());
                }
                None => tracing::debug!("ReceiveNotification push without arguments"),
            })
            .await;

        tracing::debug!(url = manager.url(), "Notification feed attached");
        Self { handler }
    }

    /// Remove the push handler again.
    pub async fn detach(self, manager: &HubConnectionManager) {
        manager.off(RECEIVE_NOTIFICATION, Some(self.handler)).await;
    }
}
