/// Errors from the hub client layer.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Failed to open the underlying WebSocket.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server refused or garbled the protocol handshake.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// A frame could not be decoded as a hub message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An operation needed a live connection and there is none.
    #[error("Not connected")]
    NotConnected,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
