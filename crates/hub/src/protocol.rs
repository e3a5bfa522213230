//! JSON hub protocol (version 1) framing and message types.
//!
//! Every record is a JSON object terminated by the ASCII record separator
//! `0x1E`; a single WebSocket text frame may carry several records. The
//! numeric `type` field selects the message kind:
//!
//! | type | kind       | handled as                           |
//! |------|------------|--------------------------------------|
//! | 1    | invocation | dispatched to registered handlers    |
//! | 3    | completion | logged                               |
//! | 6    | ping       | keep-alive                           |
//! | 7    | close      | reconnect or stop (`allowReconnect`) |
//! | 2/4/5| streaming  | [`HubMessage::Other`], ignored       |

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::HubError;

/// Terminates every protocol record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Protocol name sent in the handshake.
pub const PROTOCOL_NAME: &str = "json";

/// Protocol version sent in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

const TYPE_INVOCATION: u64 = 1;
const TYPE_COMPLETION: u64 = 3;
const TYPE_PING: u64 = 6;
const TYPE_CLOSE: u64 = 7;

/// A decoded hub protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Call `target` on the receiving side with `arguments`.
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    /// Result of an earlier invocation that carried an id.
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    /// The peer is closing the connection.
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// Any message kind this client does not act on.
    Other(u64),
}

impl HubMessage {
    /// A fire-and-forget invocation (no completion expected).
    pub fn invocation(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        HubMessage::Invocation {
            invocation_id: None,
            target: target.into(),
            arguments,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            HubMessage::Invocation {
                invocation_id,
                target,
                arguments,
            } => {
                let mut v = json!({
                    "type": TYPE_INVOCATION,
                    "target": target,
                    "arguments": arguments,
                });
                if let Some(id) = invocation_id {
                    v["invocationId"] = json!(id);
                }
                v
            }
            HubMessage::Completion {
                invocation_id,
                result,
                error,
            } => {
                let mut v = json!({ "type": TYPE_COMPLETION, "invocationId": invocation_id });
                if let Some(error) = error {
                    v["error"] = json!(error);
                } else if let Some(result) = result {
                    v["result"] = result.clone();
                }
                v
            }
            HubMessage::Ping => json!({ "type": TYPE_PING }),
            HubMessage::Close {
                error,
                allow_reconnect,
            } => {
                let mut v = json!({ "type": TYPE_CLOSE });
                if let Some(error) = error {
                    v["error"] = json!(error);
                }
                if *allow_reconnect {
                    v["allowReconnect"] = json!(true);
                }
                v
            }
            HubMessage::Other(kind) => json!({ "type": kind }),
        }
    }
}

/// Wire shape shared by every message kind.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u64,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<Value>>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: Option<bool>,
}

/// The handshake record the client sends right after the socket opens.
pub fn handshake_request() -> String {
    let body = json!({ "protocol": PROTOCOL_NAME, "version": PROTOCOL_VERSION });
    format!("{body}{RECORD_SEPARATOR}")
}

/// Check the server's handshake response record (`{}` or `{"error": ...}`).
pub fn parse_handshake_response(record: &str) -> Result<(), HubError> {
    let value: Value = serde_json::from_str(record)
        .map_err(|e| HubError::Handshake(format!("malformed handshake response: {e}")))?;
    match value.get("error").and_then(Value::as_str) {
        Some(error) => Err(HubError::Handshake(error.to_string())),
        None => Ok(()),
    }
}

/// Serialize one message as a terminated record.
pub fn encode(message: &HubMessage) -> String {
    format!("{}{RECORD_SEPARATOR}", message.to_json())
}

/// Split a text frame into its (non-empty) records.
pub fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
}

/// Decode one record (without its separator).
pub fn parse_message(record: &str) -> Result<HubMessage, HubError> {
    let raw: RawMessage = serde_json::from_str(record)
        .map_err(|e| HubError::Protocol(format!("malformed hub message: {e}")))?;

    let message = match raw.kind {
        TYPE_INVOCATION => HubMessage::Invocation {
            invocation_id: raw.invocation_id,
            target: raw
                .target
                .ok_or_else(|| HubError::Protocol("invocation without target".into()))?,
            arguments: raw.arguments.unwrap_or_default(),
        },
        TYPE_COMPLETION => HubMessage::Completion {
            invocation_id: raw.invocation_id.unwrap_or_default(),
            result: raw.result,
            error: raw.error,
        },
        TYPE_PING => HubMessage::Ping,
        TYPE_CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect.unwrap_or(false),
        },
        other => HubMessage::Other(other),
    };

    Ok(message)
}
