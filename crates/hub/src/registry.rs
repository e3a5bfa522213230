//! Event-name to handler bookkeeping.
//!
//! Handlers are kept per event name in registration order. Event names are
//! matched case-insensitively, the same way the server's hub dispatcher
//! resolves client method names.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// Callback invoked with the arguments of a server invocation.
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Identifies one registration so it can be removed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    events: HashMap<String, Vec<(HandlerId, Handler)>>,
}

fn key(event: &str) -> String {
    event.to_ascii_lowercase()
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `event`.
    pub fn add(&mut self, event: &str, handler: Handler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.events.entry(key(event)).or_default().push((id, handler));
        id
    }

    /// Remove one handler. Returns `true` when `event` has no handlers left.
    pub fn remove(&mut self, event: &str, id: HandlerId) -> bool {
        let k = key(event);
        let Some(list) = self.events.get_mut(&k) else {
            return true;
        };
        list.retain(|(existing, _)| *existing != id);
        if list.is_empty() {
            self.events.remove(&k);
            true
        } else {
            false
        }
    }

    /// Remove every handler for `event`. Returns how many were dropped.
    pub fn remove_all(&mut self, event: &str) -> usize {
        self.events.remove(&key(event)).map_or(0, |list| list.len())
    }

    /// Snapshot of the handlers for `event`, in registration order.
    pub fn handlers_for(&self, event: &str) -> Vec<Handler> {
        self.events
            .get(&key(event))
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.contains_key(&key(event))
    }

    /// Normalized names of every event with at least one handler.
    pub fn event_names(&self) -> Vec<String> {
        self.events.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .events
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("SubscriptionRegistry")
            .field("events", &counts)
            .finish()
    }
}

/// Normalized form of an event name, as used for matching.
pub(crate) fn normalize_event(event: &str) -> String {
    key(event)
}
