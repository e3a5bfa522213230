use chrono::{DateTime, NaiveDateTime, Utc};
use hotpot_core::types::{DbId, Timestamp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::normalize::normalize_casing;

/// Notification tag sent by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    OrderCreated,
    OrderStatusChanged,
    OrderCancelled,
    ShipmentAssigned,
    ShipmentStatusChanged,
    DeliveryCompleted,
    EquipmentLowStock,
    EquipmentMaintenance,
    FeedbackReceived,
    FeedbackResponded,
    ScheduleAssigned,
    ScheduleChanged,
    PaymentReceived,
    System,
    /// Control message confirming the hub registered this connection.
    ConnectionRegistered,
    /// Control message carrying a server-side error.
    Error,
    /// Any tag outside the enumeration.
    Unknown,
}

const NAMED: [(NotificationType, &str); 16] = [
    (NotificationType::OrderCreated, "OrderCreated"),
    (NotificationType::OrderStatusChanged, "OrderStatusChanged"),
    (NotificationType::OrderCancelled, "OrderCancelled"),
    (NotificationType::ShipmentAssigned, "ShipmentAssigned"),
    (NotificationType::ShipmentStatusChanged, "ShipmentStatusChanged"),
    (NotificationType::DeliveryCompleted, "DeliveryCompleted"),
    (NotificationType::EquipmentLowStock, "EquipmentLowStock"),
    (NotificationType::EquipmentMaintenance, "EquipmentMaintenance"),
    (NotificationType::FeedbackReceived, "FeedbackReceived"),
    (NotificationType::FeedbackResponded, "FeedbackResponded"),
    (NotificationType::ScheduleAssigned, "ScheduleAssigned"),
    (NotificationType::ScheduleChanged, "ScheduleChanged"),
    (NotificationType::PaymentReceived, "PaymentReceived"),
    (NotificationType::System, "System"),
    (NotificationType::ConnectionRegistered, "ConnectionRegistered"),
    (NotificationType::Error, "Error"),
];

impl NotificationType {
    /// Parse a wire tag, ignoring ASCII case. Unrecognized tags are `Unknown`.
    pub fn parse(tag: &str) -> Self {
        NAMED
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(tag))
            .map_or(NotificationType::Unknown, |(kind, _)| *kind)
    }

    pub fn as_str(self) -> &'static str {
        NAMED
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("Unknown", |(_, name)| name)
    }

    /// `ConnectionRegistered` and `Error` are hub control messages, not
    /// user notifications.
    pub fn is_control(self) -> bool {
        matches!(
            self,
            NotificationType::ConnectionRegistered | NotificationType::Error
        )
    }

    /// A user-facing type from the fixed enumeration.
    pub fn is_recognized(self) -> bool {
        !self.is_control() && self != NotificationType::Unknown
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NotificationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationType {
    /// Non-string tags deserialize as `Unknown` rather than failing.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map_or(NotificationType::Unknown, NotificationType::parse))
    }
}

/// A user notification, pushed by the hub or fetched from the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: DbId,
    #[serde(rename = "type", default = "unknown_type")]
    pub kind: NotificationType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, deserialize_with = "lenient_data")]
    pub data: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_read: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_delivered: bool,
}

fn unknown_type() -> NotificationType {
    NotificationType::Unknown
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Object payloads as-is. A string holding a JSON object is decoded; any
/// other non-null value is kept under a `value` key.
fn lenient_data<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, Value>, D::Error> {
    let raw = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(Map::new()),
        Value::Object(map) => return Ok(map),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => return Ok(map),
            _ => Value::String(text),
        },
        other => other,
    };
    Ok(Map::from_iter([("value".to_string(), raw)]))
}

/// RFC 3339, or a naive date-time taken as UTC. Anything else is `None`.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Timestamp>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer).ok().flatten() else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}

impl Notification {
    /// Parse a raw payload in either key casing.
    ///
    /// Returns `None` when the payload is not an object or has no positive
    /// integer `id`.
    pub fn from_value(raw: Value) -> Option<Notification> {
        let normalized = normalize_casing(raw);
        let notification: Notification = serde_json::from_value(normalized).ok()?;
        (notification.id > 0).then_some(notification)
    }
}

/// Query for one page of notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationFilter {
    pub include_read: bool,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for NotificationFilter {
    fn default() -> Self {
        Self {
            include_read: true,
            page: 1,
            page_size: 20,
        }
    }
}

/// One page of notifications with its paging metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl NotificationPage {
    /// The page returned when fetching fails.
    pub fn empty(filter: &NotificationFilter) -> Self {
        Self {
            notifications: Vec::new(),
            current_page: filter.page,
            page_size: filter.page_size,
            total_count: 0,
            total_pages: 0,
            has_previous_page: filter.page > 1,
            has_next_page: false,
        }
    }
}
