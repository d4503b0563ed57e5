//! In-process connector
//!
//! Hands the "server" end of every channel to whoever holds the peer
//! receiver. Used by tests and for running the client without a server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pairup_core::Identity;
use tokio::sync::mpsc;

use crate::connection::{Channel, Connector, CHANNEL_CAPACITY};
use crate::error::{Error, Result};
use crate::protocol::{Command, InboundFrame};

/// Server side of one in-memory channel
pub struct MemoryPeer {
    /// Identity the client connected with
    pub identity: Identity,
    pub to_client: mpsc::Sender<String>,
    pub from_client: mpsc::Receiver<String>,
}

impl MemoryPeer {
    /// Push a frame to the client. Ignored if the client end is gone.
    pub async fn send_frame(&self, frame: &InboundFrame) {
        if let Ok(text) = serde_json::to_string(frame) {
            let _ = self.to_client.send(text).await;
        }
    }

    /// Push raw text to the client
    pub async fn send_raw(&self, text: &str) {
        let _ = self.to_client.send(text.to_string()).await;
    }

    /// Next command from the client, `None` once the client closed
    pub async fn recv_command(&mut self) -> Option<Command> {
        while let Some(text) = self.from_client.recv().await {
            match serde_json::from_str(&text) {
                Ok(command) => return Some(command),
                Err(e) => tracing::warn!(error = %e, "Memory peer got undecodable command"),
            }
        }
        None
    }
}

/// Connector that opens in-memory channels
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    attempts: AtomicUsize,
    refusing: AtomicBool,
    delays: Mutex<VecDeque<Duration>>,
}

impl MemoryConnector {
    /// Returns the connector and the stream of server ends it opens
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: tx,
            attempts: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
            delays: Mutex::new(VecDeque::new()),
        };
        (connector, rx)
    }

    /// Make connect attempts fail until switched back
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Delay the next not-yet-started attempt by `delay`
    pub fn push_delay(&self, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push_back(delay);
        }
    }

    /// Number of connect attempts so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, identity: &Identity) -> Result<Channel> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.lock().ok().and_then(|mut d| d.pop_front());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.refusing.load(Ordering::SeqCst) {
            return Err(Error::Refused("memory connector refusing".into()));
        }

        let (to_client, inbound) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound, from_client) = mpsc::channel(CHANNEL_CAPACITY);

        let peer = MemoryPeer {
            identity: identity.clone(),
            to_client,
            from_client,
        };
        self.peers
            .send(peer)
            .map_err(|_| Error::Refused("no memory server listening".into()))?;

        Ok(Channel { outbound, inbound })
    }
}
