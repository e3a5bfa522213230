//! In-memory transport for driving [`HubConnectionManager`] in tests.
//!
//! Every successful `start` hands the far end of a fresh channel to the
//! test through `peers`, so tests can play the server: push invocations,
//! read what the client sent, or drop the peer to simulate a lost link.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use hotpot_hub::transport::ChannelPeer;
use hotpot_hub::{
    ConnectionState, HubChannel, HubConnectionManager, HubError, HubTransport, ReconnectPolicy,
    StateChange, TokenFactory,
};

pub const WAIT: Duration = Duration::from_secs(2);

pub struct ScriptedTransport {
    pub starts: AtomicUsize,
    pub tokens: Mutex<Vec<Option<String>>>,
    pub refuse: AtomicBool,
    /// When set, `start` never completes.
    pub stall: AtomicBool,
    peers: mpsc::UnboundedSender<ChannelPeer>,
}

impl ScriptedTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChannelPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            starts: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
            refuse: AtomicBool::new(false),
            stall: AtomicBool::new(false),
            peers,
        });
        (transport, rx)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HubTransport for ScriptedTransport {
    async fn start(&self, _url: &str, access_token: Option<&str>) -> Result<HubChannel, HubError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .push(access_token.map(str::to_string));

        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(HubError::Connection("connection refused".into()));
        }

        let (channel, peer) = HubChannel::pair();
        self.peers.send(peer).unwrap();
        Ok(channel)
    }
}

/// Wait until the transport has been started `count` times.
pub async fn wait_for_starts(transport: &ScriptedTransport, count: usize) {
    tokio::time::timeout(WAIT, async {
        while transport.starts() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("transport never reached {count} starts"));
}

/// Manager over a scripted transport with a fast reconnect schedule.
pub fn manager(transport: &Arc<ScriptedTransport>) -> HubConnectionManager {
    let issued = Arc::new(AtomicUsize::new(0));
    let token_factory: TokenFactory = Arc::new(move || {
        let n = issued.fetch_add(1, Ordering::SeqCst) + 1;
        Some(format!("token-{n}"))
    });

    HubConnectionManager::new(
        "http://localhost:5000/notificationHub",
        Arc::clone(transport) as Arc<dyn HubTransport>,
        token_factory,
    )
    .with_reconnect_policy(ReconnectPolicy::new(vec![
        Duration::ZERO,
        Duration::from_millis(10),
    ]))
}

/// Handler that forwards its arguments to the returned receiver.
pub fn forwarding() -> (
    impl Fn(&[Value]) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Vec<Value>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |args: &[Value]| {
            let _ = tx.send(args.to_vec());
        },
        rx,
    )
}

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<ChannelPeer>) -> ChannelPeer {
    tokio::time::timeout(WAIT, peers.recv())
        .await
        .expect("transport was never started")
        .expect("transport dropped")
}

pub async fn recv_args(rx: &mut mpsc::UnboundedReceiver<Vec<Value>>) -> Vec<Value> {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("handler was not called")
        .expect("handler channel closed")
}

/// Assert that nothing arrives within a short window.
pub async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<Vec<Value>>) {
    let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "handler was unexpectedly called: {got:?}");
}

pub async fn wait_for_state(rx: &mut broadcast::Receiver<StateChange>, wanted: ConnectionState) {
    tokio::time::timeout(WAIT, async {
        loop {
            let change = rx.recv().await.expect("state channel closed");
            if change.current == wanted {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never reached state {wanted}"));
}
