//! Connection manager
//!
//! Owns the one persistent channel to the chat server. Every connect
//! attempt gets a generation number; anything reported by an older
//! generation is dropped on the floor. A channel that closes is reopened
//! after a fixed delay, forever.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pairup_core::Identity;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::frame;
use crate::protocol::{Command, InboundFrame};

/// Delay between a channel closing and the next connect attempt
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Buffer size for the per-channel pumps
pub const CHANNEL_CAPACITY: usize = 64;

/// One open physical channel, as raw text frames.
///
/// Dropping `outbound` closes the channel. `inbound` yields `None` once the
/// remote side is gone.
pub struct Channel {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

/// Something that can open a channel for an identity
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, identity: &Identity) -> Result<Channel>;
}

/// Lifecycle and data events surfaced to the session runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Frame(InboundFrame),
    Closed,
    Error(String),
}

/// Observable link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    Open,
    Closed,
}

enum Control {
    Send(String),
    Reconnect,
    Shutdown,
}

enum Internal {
    Connected { generation: u64, result: Result<Channel> },
    Inbound { generation: u64, text: String },
    Dropped { generation: u64 },
    Retry { generation: u64 },
}

/// Handle to a running connection manager
#[derive(Clone)]
pub struct ConnectionHandle {
    control: mpsc::UnboundedSender<Control>,
    status: watch::Receiver<LinkStatus>,
}

impl ConnectionHandle {
    /// Queue a command for the open channel. Dropped silently when the
    /// channel is not open.
    pub fn send(&self, command: &Command) {
        match frame::encode(command) {
            Ok(text) => {
                let _ = self.control.send(Control::Send(text));
            }
            Err(e) => warn!(action = command.action(), error = %e, "Dropping unencodable command"),
        }
    }

    /// Close the current channel (if any) and open a fresh one
    pub fn reconnect(&self) {
        let _ = self.control.send(Control::Reconnect);
    }

    /// Close the channel and stop reconnecting
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }

    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }
}

/// Spawns and drives the connection task
pub struct ConnectionManager;

impl ConnectionManager {
    /// Start connecting immediately. Events are delivered to `events`
    /// converted into the consumer's own event type.
    pub fn spawn<C, E>(connector: Arc<C>, identity: Identity, events: mpsc::Sender<E>) -> ConnectionHandle
    where
        C: Connector,
        E: From<ConnectionEvent> + Send + 'static,
    {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::Connecting);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let task = ManagerTask {
            connector,
            identity,
            events,
            status: status_tx,
            internal_tx,
            generation: 0,
            outbound: None,
            connecting: None,
            reader: None,
        };
        tokio::spawn(task.run(control_rx, internal_rx));

        ConnectionHandle {
            control: control_tx,
            status: status_rx,
        }
    }
}

struct ManagerTask<C, E> {
    connector: Arc<C>,
    identity: Identity,
    events: mpsc::Sender<E>,
    status: watch::Sender<LinkStatus>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    generation: u64,
    outbound: Option<mpsc::Sender<String>>,
    /// Pending connect of the current generation
    connecting: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl<C, E> ManagerTask<C, E>
where
    C: Connector,
    E: From<ConnectionEvent> + Send + 'static,
{
    async fn run(
        mut self,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        self.start_attempt();

        loop {
            tokio::select! {
                control = control_rx.recv() => match control {
                    Some(Control::Send(text)) => self.transmit(text),
                    Some(Control::Reconnect) => {
                        info!("Reconnect requested");
                        let was_open = self.outbound.is_some();
                        self.start_attempt();
                        if was_open && !self.emit(ConnectionEvent::Closed).await {
                            break;
                        }
                    }
                    Some(Control::Shutdown) | None => break,
                },
                Some(internal) = internal_rx.recv() => {
                    if !self.handle_internal(internal).await {
                        break;
                    }
                }
            }
        }

        self.close_channel();
        self.generation += 1;
        let _ = self.status.send(LinkStatus::Closed);
        debug!("Connection manager stopped");
    }

    /// Supersede whatever is in flight and open a new channel
    fn start_attempt(&mut self) {
        self.close_channel();
        self.generation += 1;
        let generation = self.generation;
        let _ = self.status.send(LinkStatus::Connecting);
        debug!(generation, "Connecting");

        let connector = self.connector.clone();
        let identity = self.identity.clone();
        let internal_tx = self.internal_tx.clone();
        self.connecting = Some(tokio::spawn(async move {
            let result = connector.connect(&identity).await;
            let _ = internal_tx.send(Internal::Connected { generation, result });
        }));
    }

    /// Tear down the open channel and abandon any handshake in flight
    fn close_channel(&mut self) {
        self.outbound = None;
        if let Some(connecting) = self.connecting.take() {
            connecting.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    fn schedule_retry(&self) {
        let generation = self.generation;
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RECONNECT_DELAY).await;
            let _ = internal_tx.send(Internal::Retry { generation });
        });
    }

    fn transmit(&self, text: String) {
        match &self.outbound {
            Some(outbound) => {
                if let Err(e) = outbound.try_send(text) {
                    warn!(error = %e, "Outbound buffer unavailable, dropping frame");
                }
            }
            None => debug!("Channel not open, dropping frame"),
        }
    }

    /// Returns false once nobody is listening for events any more
    async fn emit(&self, event: ConnectionEvent) -> bool {
        self.events.send(E::from(event)).await.is_ok()
    }

    async fn handle_internal(&mut self, internal: Internal) -> bool {
        match internal {
            Internal::Connected { generation, result } => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "Discarding superseded attempt");
                    return true;
                }
                self.connecting = None;
                match result {
                    Ok(channel) => {
                        info!(generation, "Channel open");
                        self.outbound = Some(channel.outbound);
                        self.reader = Some(spawn_reader(
                            generation,
                            channel.inbound,
                            self.internal_tx.clone(),
                        ));
                        let _ = self.status.send(LinkStatus::Open);
                        self.emit(ConnectionEvent::Opened).await
                    }
                    Err(e) => {
                        warn!(generation, error = %e, "Connect failed");
                        let _ = self.status.send(LinkStatus::Closed);
                        self.schedule_retry();
                        self.emit(ConnectionEvent::Error(e.to_string())).await
                            && self.emit(ConnectionEvent::Closed).await
                    }
                }
            }
            Internal::Inbound { generation, text } => {
                if generation != self.generation {
                    return true;
                }
                match frame::decode(&text) {
                    Ok(frame) => self.emit(ConnectionEvent::Frame(frame)).await,
                    Err(e) => {
                        warn!(error = %e, "Ignoring malformed frame");
                        true
                    }
                }
            }
            Internal::Dropped { generation } => {
                if generation != self.generation {
                    return true;
                }
                info!(generation, "Channel closed");
                self.close_channel();
                let _ = self.status.send(LinkStatus::Closed);
                self.schedule_retry();
                self.emit(ConnectionEvent::Closed).await
            }
            Internal::Retry { generation } => {
                if generation == self.generation {
                    self.start_attempt();
                }
                true
            }
        }
    }
}

fn spawn_reader(
    generation: u64,
    mut inbound: mpsc::Receiver<String>,
    internal_tx: mpsc::UnboundedSender<Internal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = inbound.recv().await {
            if internal_tx.send(Internal::Inbound { generation, text }).is_err() {
                return;
            }
        }
        let _ = internal_tx.send(Internal::Dropped { generation });
    })
}
