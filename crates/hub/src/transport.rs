//! Transports that carry hub protocol messages.
//!
//! A transport opens one physical connection and hands back a
//! [`HubChannel`]: an outbound sender and an inbound receiver of decoded
//! [`HubMessage`]s. The inbound side closing means the connection is gone.
//! Dropping the outbound sender asks the transport to close.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::endpoint::to_websocket_url;
use crate::error::HubError;
use crate::protocol::{
    encode, handshake_request, parse_handshake_response, parse_message, split_records, HubMessage,
};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Client side of an open hub connection.
#[derive(Debug)]
pub struct HubChannel {
    pub outbound: mpsc::UnboundedSender<HubMessage>,
    pub inbound: mpsc::UnboundedReceiver<HubMessage>,
}

/// Far side of a [`HubChannel`] created with [`HubChannel::pair`].
#[derive(Debug)]
pub struct ChannelPeer {
    /// Messages sent here arrive on the channel's `inbound`.
    pub to_client: mpsc::UnboundedSender<HubMessage>,
    /// Messages the client sent on `outbound`.
    pub from_client: mpsc::UnboundedReceiver<HubMessage>,
}

impl HubChannel {
    /// An in-memory channel and its peer, for custom transports.
    pub fn pair() -> (HubChannel, ChannelPeer) {
        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();
        (
            HubChannel { outbound, inbound },
            ChannelPeer {
                to_client,
                from_client,
            },
        )
    }
}

/// Opens physical hub connections.
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Connect to `url`, authenticate with `access_token` when present, and
    /// complete the protocol handshake.
    async fn start(&self, url: &str, access_token: Option<&str>) -> Result<HubChannel, HubError>;
}

/// JSON hub protocol over a WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    /// Interval between client pings while the connection is otherwise quiet.
    pub keep_alive: Duration,
    /// Silence from the server longer than this drops the connection.
    pub server_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(15),
            server_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(15),
        }
    }
}

/// Hub URL with the WebSocket scheme and the `access_token` query parameter.
///
/// Access tokens are JWTs, whose characters are all URL-safe.
pub fn connect_url(url: &str, access_token: Option<&str>) -> String {
    let ws_url = to_websocket_url(url);
    match access_token {
        Some(token) if !token.is_empty() => {
            let sep = if ws_url.contains('?') { '&' } else { '?' };
            format!("{ws_url}{sep}access_token={token}")
        }
        _ => ws_url,
    }
}

#[async_trait]
impl HubTransport for WebSocketTransport {
    async fn start(&self, url: &str, access_token: Option<&str>) -> Result<HubChannel, HubError> {
        let target = connect_url(url, access_token);

        let (mut ws, _response) =
            tokio::time::timeout(self.handshake_timeout, connect_async(target.as_str()))
                .await
                .map_err(|_| HubError::Connection(format!("Timed out connecting to hub at {url}")))?
                .map_err(|e| {
                    HubError::Connection(format!("Failed to connect to hub at {url}: {e}"))
                })?;

        let early = tokio::time::timeout(self.handshake_timeout, handshake(&mut ws))
            .await
            .map_err(|_| HubError::Handshake("timed out waiting for handshake response".into()))??;

        tracing::info!(url, "Connected to hub");

        let (channel, peer) = HubChannel::pair();
        for message in early {
            // Receiver is still held by `channel`.
            let _ = peer.to_client.send(message);
        }

        tokio::spawn(pump(
            ws,
            peer,
            self.keep_alive,
            self.server_timeout,
            url.to_string(),
        ));

        Ok(channel)
    }
}

/// Send the handshake and wait for the server's answer.
///
/// Returns any messages that arrived in the same frame as the response.
async fn handshake(ws: &mut WsStream) -> Result<Vec<HubMessage>, HubError> {
    ws.send(Message::Text(handshake_request())).await?;

    loop {
        let frame = ws
            .next()
            .await
            .ok_or_else(|| HubError::Handshake("connection closed during handshake".into()))??;

        match frame {
            Message::Text(text) => {
                let mut records = split_records(&text);
                let Some(first) = records.next() else {
                    continue;
                };
                parse_handshake_response(first)?;
                return Ok(records.filter_map(decode_logged).collect());
            }
            Message::Close(frame) => {
                let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                return Err(HubError::Handshake(format!(
                    "server closed during handshake: {reason}"
                )));
            }
            _ => {}
        }
    }
}

fn decode_logged(record: &str) -> Option<HubMessage> {
    match parse_message(record) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable hub record");
            None
        }
    }
}

/// Move frames between the socket and the channel until either side ends.
async fn pump(
    ws: WsStream,
    peer: ChannelPeer,
    keep_alive: Duration,
    server_timeout: Duration,
    url: String,
) {
    let ChannelPeer {
        to_client,
        mut from_client,
    } = peer;
    let (mut sink, mut stream) = ws.split();

    let mut ping = tokio::time::interval_at(Instant::now() + keep_alive, keep_alive);
    let idle = tokio::time::sleep(server_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            outgoing = from_client.recv() => match outgoing {
                Some(message) => {
                    if let Err(e) = sink.send(Message::Text(encode(&message))).await {
                        tracing::warn!(url = %url, error = %e, "Failed to send hub message");
                        break;
                    }
                    ping.reset();
                }
                None => {
                    tracing::debug!(url = %url, "Closing hub connection");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = stream.next() => {
                idle.as_mut().reset(Instant::now() + server_timeout);
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let mut delivered = true;
                        for message in split_records(&text).filter_map(decode_logged) {
                            if message == HubMessage::Ping {
                                tracing::trace!(url = %url, "Hub ping");
                                continue;
                            }
                            delivered &= to_client.send(message).is_ok();
                        }
                        if !delivered {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(url = %url, ?frame, "Hub WebSocket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(url = %url, error = %e, "Hub WebSocket error");
                        break;
                    }
                    None => break,
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Text(encode(&HubMessage::Ping))).await.is_err() {
                    break;
                }
            }
            _ = &mut idle => {
                tracing::warn!(
                    url = %url,
                    timeout_secs = server_timeout.as_secs(),
                    "No message from hub within server timeout",
                );
                break;
            }
        }
    }
}
