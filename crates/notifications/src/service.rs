//! REST access to the notification endpoints.
//!
//! The list and unread-count endpoints have returned several response
//! shapes over time, so both are parsed tolerantly and fall back to empty
//! defaults instead of failing.

use hotpot_client::{ApiClient, ApiError, PendingRequest};
use serde_json::Value;

use crate::models::{Notification, NotificationFilter, NotificationPage};
use crate::normalize::normalize_casing;

/// Keys under which a page may carry its notification array.
const LIST_KEYS: [&str; 3] = ["notifications", "items", "data"];

#[derive(Clone)]
pub struct NotificationService {
    client: ApiClient,
}

impl NotificationService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Fetch one page. Never fails: any error yields
    /// [`NotificationPage::empty`] for `filter`.
    pub async fn fetch(&self, filter: &NotificationFilter) -> NotificationPage {
        match self.try_fetch(filter).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    page = filter.page,
                    page_size = filter.page_size,
                    error = %e,
                    "Failed to fetch notifications",
                );
                NotificationPage::empty(filter)
            }
        }
    }

    /// Fetch one page, reporting transport and shape errors.
    pub async fn try_fetch(&self, filter: &NotificationFilter) -> Result<NotificationPage, ApiError> {
        let request = PendingRequest::get("/notifications")
            .query("includeRead", filter.include_read)
            .query("page", filter.page)
            .query("pageSize", filter.page_size);
        let payload = self.client.execute(request).await?;
        parse_page(payload, filter)
    }

    /// Current unread count, or 0 on any failure.
    pub async fn get_unread_count(&self) -> u64 {
        match self.client.get("/notifications/unread-count").await {
            Ok(payload) => parse_unread_count(&payload),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch unread notification count");
                0
            }
        }
    }

    pub async fn mark_as_read(&self, id: i64) -> Result<(), ApiError> {
        self.client
            .execute(PendingRequest::put(format!("/notifications/{id}/read")))
            .await?;
        Ok(())
    }

    pub async fn mark_all_as_read(&self) -> Result<(), ApiError> {
        self.client
            .execute(PendingRequest::put("/notifications/read-all"))
            .await?;
        Ok(())
    }
}

/// Parse a list payload: a bare array, or an object carrying the array
/// under one of [`LIST_KEYS`] plus optional paging metadata.
pub fn parse_page(payload: Value, filter: &NotificationFilter) -> Result<NotificationPage, ApiError> {
    let payload = normalize_casing(payload);

    let (items, meta) = match payload {
        Value::Array(items) => (items, None),
        Value::Object(mut map) => {
            let items = LIST_KEYS
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    Some(other) => {
                        map.insert((*key).to_string(), other);
                        None
                    }
                    None => None,
                })
                .ok_or_else(|| {
                    ApiError::Shape("notification page has no notification list".into())
                })?;
            (items, Some(map))
        }
        other => {
            return Err(ApiError::Shape(format!(
                "unexpected notification page payload: {other}"
            )))
        }
    };

    let received = items.len();
    let notifications: Vec<Notification> =
        items.into_iter().filter_map(Notification::from_value).collect();
    if notifications.len() < received {
        tracing::debug!(
            dropped = received - notifications.len(),
            "Skipped malformed notifications in page",
        );
    }

    let meta = meta.unwrap_or_default();
    let uint = |key: &str| meta.get(key).and_then(Value::as_u64);
    let flag = |key: &str| meta.get(key).and_then(Value::as_bool);

    let page_number = |key: &str| uint(key).and_then(|v| u32::try_from(v).ok());

    let current_page = page_number("currentPage").unwrap_or(filter.page);
    let page_size = page_number("pageSize").unwrap_or(filter.page_size);
    let total_count = uint("totalCount").unwrap_or(notifications.len() as u64);
    let total_pages = page_number("totalPages").unwrap_or_else(|| {
        if page_size == 0 {
            0
        } else {
            u32::try_from(total_count.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
        }
    });

    Ok(NotificationPage {
        has_previous_page: flag("hasPreviousPage").unwrap_or(current_page > 1),
        has_next_page: flag("hasNextPage").unwrap_or(current_page < total_pages),
        notifications,
        current_page,
        page_size,
        total_count,
        total_pages,
    })
}

/// Extract the unread count from any of the shapes the endpoint has used.
/// Returns 0 when none match. Never negative.
pub fn parse_unread_count(payload: &Value) -> u64 {
    fn as_count(value: &Value) -> Option<u64> {
        value
            .as_u64()
            .or_else(|| value.as_i64().map(|n| n.max(0) as u64))
            .or_else(|| value.as_f64().map(|n| n.max(0.0) as u64))
    }

    fn from_object(value: &Value) -> Option<u64> {
        ["count", "unreadCount"]
            .iter()
            .find_map(|key| value.get(*key).and_then(as_count))
    }

    let payload = normalize_casing(payload.clone());
    as_count(&payload)
        .or_else(|| from_object(&payload))
        .or_else(|| {
            let data = payload.get("data")?;
            as_count(data).or_else(|| from_object(data))
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn filter(page: u32, page_size: u32) -> NotificationFilter {
        NotificationFilter {
            include_read: true,
            page,
            page_size,
        }
    }

    #[test]
    fn unread_count_shapes() {
        assert_eq!(parse_unread_count(&json!(4)), 4);
        assert_eq!(parse_unread_count(&json!({ "count": 5 })), 5);
        assert_eq!(parse_unread_count(&json!({ "unreadCount": 6 })), 6);
        assert_eq!(parse_unread_count(&json!({ "UnreadCount": 7 })), 7);
        assert_eq!(parse_unread_count(&json!({ "data": { "unreadCount": 8 } })), 8);
        assert_eq!(parse_unread_count(&json!({ "data": { "count": 9 } })), 9);
        assert_eq!(parse_unread_count(&json!({ "data": 10 })), 10);
    }

    #[test]
    fn unread_count_defaults_to_zero() {
        assert_eq!(parse_unread_count(&json!(null)), 0);
        assert_eq!(parse_unread_count(&json!({})), 0);
        assert_eq!(parse_unread_count(&json!("3")), 0);
        assert_eq!(parse_unread_count(&json!({ "count": "lots" })), 0);
        assert_eq!(parse_unread_count(&json!(-2)), 0);
    }

    #[test]
    fn bare_array_page_uses_request_metadata() {
        let page = parse_page(
            json!([
                { "id": 1, "type": "OrderCreated", "title": "a" },
                { "id": 2, "type": "System", "title": "b" }
            ]),
            &filter(2, 10),
        )
        .unwrap();

        assert_eq!(page.notifications.len(), 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.page_size, 10);
        assert!(page.has_previous_page);
    }

    #[test]
    fn wrapped_page_reads_metadata() {
        let page = parse_page(
            json!({
                "Items": [{ "Id": 3, "Type": "PaymentReceived" }],
                "CurrentPage": 1,
                "PageSize": 1,
                "TotalCount": 4,
                "TotalPages": 4,
                "HasPreviousPage": false,
                "HasNextPage": true
            }),
            &filter(1, 20),
        )
        .unwrap();

        assert_eq!(page.notifications[0].id, 3);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_count, 4);
        assert_eq!(page.total_pages, 4);
        assert!(page.has_next_page);
    }

    #[test]
    fn list_under_data_key() {
        let page = parse_page(
            json!({ "data": [{ "id": 9, "type": "System" }], "totalCount": 41 }),
            &filter(1, 20),
        )
        .unwrap();
        assert_eq!(page.notifications.len(), 1);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next_page);
    }

    #[test]
    fn malformed_items_are_skipped() {
        let page = parse_page(
            json!({ "notifications": [{ "id": 1, "type": "System" }, { "title": "no id" }, 7] }),
            &filter(1, 20),
        )
        .unwrap();
        assert_eq!(page.notifications.len(), 1);
    }

    #[test]
    fn items_with_string_data_are_kept() {
        let page = parse_page(
            json!([{ "id": 4, "type": "OrderCreated", "data": "{\"orderId\":5}" }]),
            &filter(1, 20),
        )
        .unwrap();
        assert_eq!(page.notifications.len(), 1);
        assert_eq!(page.notifications[0].data["orderId"], 5);
    }

    #[test]
    fn out_of_range_paging_falls_back_to_request() {
        let page = parse_page(
            json!({
                "items": [],
                "currentPage": 4_294_967_297u64,
                "pageSize": 4_294_967_306u64,
                "totalCount": 0,
                "totalPages": 4_294_967_296u64
            }),
            &filter(2, 10),
        )
        .unwrap();

        assert_eq!(page.current_page, 2);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next_page);
    }

    #[test]
    fn shapeless_payloads_are_errors() {
        assert_matches!(parse_page(json!({ "total": 1 }), &filter(1, 20)), Err(ApiError::Shape(_)));
        assert_matches!(parse_page(json!(null), &filter(1, 20)), Err(ApiError::Shape(_)));
        assert_matches!(parse_page(json!("x"), &filter(1, 20)), Err(ApiError::Shape(_)));
    }
}
