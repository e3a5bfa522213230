//! User notifications: REST access, local store and hub push feed.
//!
//! [`NotificationService`] wraps the backend's notification endpoints with
//! tolerant response parsing. [`NotificationStore`] keeps the current list
//! and unread counter, and [`NotificationFeed`] pipes hub pushes into it.

pub mod feed;
pub mod models;
pub mod normalize;
pub mod service;
pub mod store;

pub use feed::NotificationFeed;
pub use models::{Notification, NotificationFilter, NotificationPage, NotificationType};
pub use normalize::normalize_casing;
pub use service::NotificationService;
pub use store::{DispatchOutcome, NotificationStore, StoreEvent};
