/// The backend's real-time hubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HubEndpoint {
    Chat,
    Feedback,
    Notifications,
}

impl HubEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            HubEndpoint::Chat => "/chatHub",
            HubEndpoint::Feedback => "/feedbackHub",
            HubEndpoint::Notifications => "/notificationHub",
        }
    }

    /// Full hub URL below `hub_base_url` (which has no trailing slash).
    pub fn url(self, hub_base_url: &str) -> String {
        format!("{}{}", hub_base_url.trim_end_matches('/'), self.path())
    }
}

impl std::fmt::Display for HubEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path().trim_start_matches('/'))
    }
}

/// Map an `http(s)` hub URL onto its WebSocket scheme. Other schemes pass
/// through unchanged.
pub fn to_websocket_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
