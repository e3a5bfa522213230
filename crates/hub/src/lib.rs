//! Real-time hub client for the rental backend.
//!
//! Provides the JSON hub wire protocol, a WebSocket transport, the fixed
//! reconnection backoff, the event subscription registry, and
//! [`HubConnectionManager`], which ties them together into one logical,
//! self-healing connection per hub endpoint.

pub mod endpoint;
pub mod error;
pub mod events;
pub mod manager;
pub mod protocol;
pub mod reconnect;
pub mod registry;
pub mod transport;

pub use endpoint::HubEndpoint;
pub use error::HubError;
pub use events::{ConnectionState, StateChange};
pub use manager::{session_token_factory, HubConnectionManager, TokenFactory};
pub use protocol::HubMessage;
pub use reconnect::ReconnectPolicy;
pub use registry::HandlerId;
pub use transport::{HubChannel, HubTransport, WebSocketTransport};
