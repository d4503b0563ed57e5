//! Session runtime
//!
//! A single task owns the session and consumes one event at a time from a
//! single queue fed by the user, the connection manager and the timers.
//! Effects returned by the session are executed here.

use std::sync::Arc;

use pairup_core::{Filter, Identity, SessionStorage};
use pairup_net::{ConnectionEvent, ConnectionHandle, ConnectionManager, Connector, LinkStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::session::{Effect, Event, Notice, Session, SessionView, TimerKind};
use crate::timers::Timers;

/// Capacity of the runtime event queue
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Everything the runtime task reacts to
#[derive(Debug)]
pub enum RuntimeEvent {
    Session(Event),
    Connection(ConnectionEvent),
    Timer { kind: TimerKind, seq: u64 },
    Reconnect,
    Shutdown,
}

impl From<ConnectionEvent> for RuntimeEvent {
    fn from(event: ConnectionEvent) -> Self {
        RuntimeEvent::Connection(event)
    }
}

/// Cloneable handle used by the presentation layer
#[derive(Clone)]
pub struct RuntimeHandle {
    events: mpsc::Sender<RuntimeEvent>,
    view: watch::Receiver<SessionView>,
    link: watch::Receiver<LinkStatus>,
}

impl RuntimeHandle {
    /// Feed a user action to the session. Returns false once the runtime
    /// has stopped.
    pub async fn dispatch(&self, event: Event) -> bool {
        self.events.send(RuntimeEvent::Session(event)).await.is_ok()
    }

    /// Latest session snapshot
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn link_status(&self) -> LinkStatus {
        *self.link.borrow()
    }

    pub fn subscribe_link(&self) -> watch::Receiver<LinkStatus> {
        self.link.clone()
    }

    /// Drop the current channel and open a fresh one
    pub async fn reconnect(&self) -> bool {
        self.events.send(RuntimeEvent::Reconnect).await.is_ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.events.send(RuntimeEvent::Shutdown).await;
    }
}

/// Owner of the session while it runs
pub struct Runtime<S> {
    session: Session,
    identity: Identity,
    storage: S,
    connection: ConnectionHandle,
    timers: Timers,
    events: mpsc::Receiver<RuntimeEvent>,
    view: watch::Sender<SessionView>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl<S> Runtime<S>
where
    S: SessionStorage + Send + 'static,
{
    /// Build the session from storage, open the connection and start the
    /// runtime task. Notices are delivered on the returned receiver.
    pub fn spawn<C: Connector>(
        connector: Arc<C>,
        identity: Identity,
        nickname: String,
        storage: S,
    ) -> (RuntimeHandle, mpsc::UnboundedReceiver<Notice>, JoinHandle<()>) {
        let history = storage.load_all_logs().unwrap_or_else(|e| {
            warn!(error = %e, "Could not load chat logs");
            Vec::new()
        });
        let last_filter = storage
            .last_filter(&identity)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not load last filter");
                None
            })
            .unwrap_or(Filter::Any);
        info!(peers = history.len(), filter = %last_filter, "Restored session data");

        let session = Session::new(nickname)
            .with_history(history)
            .with_filter(last_filter);

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (view_tx, view_rx) = watch::channel(session.view());
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let connection = ConnectionManager::spawn(connector, identity.clone(), event_tx.clone());
        let link = connection.subscribe_status();

        let runtime = Runtime {
            session,
            identity,
            storage,
            connection,
            timers: Timers::new(event_tx.clone()),
            events: event_rx,
            view: view_tx,
            notices: notice_tx,
        };
        let task = tokio::spawn(runtime.run());

        let handle = RuntimeHandle {
            events: event_tx,
            view: view_rx,
            link,
        };
        (handle, notice_rx, task)
    }

    async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            let session_event = match event {
                RuntimeEvent::Session(event) => event,
                RuntimeEvent::Connection(ConnectionEvent::Opened) => Event::ChannelOpened,
                RuntimeEvent::Connection(ConnectionEvent::Closed) => Event::ChannelClosed,
                RuntimeEvent::Connection(ConnectionEvent::Frame(frame)) => Event::Frame(frame),
                RuntimeEvent::Connection(ConnectionEvent::Error(message)) => {
                    debug!(error = %message, "Connection attempt failed");
                    continue;
                }
                RuntimeEvent::Timer { kind, seq } => {
                    if !self.timers.fired(kind, seq) {
                        continue;
                    }
                    Event::TimerFired(kind)
                }
                RuntimeEvent::Reconnect => {
                    info!("Reconnect requested");
                    self.connection.reconnect();
                    continue;
                }
                RuntimeEvent::Shutdown => break,
            };

            let effects = self.session.handle(session_event);
            self.apply(effects);
            self.view.send_replace(self.session.view());
        }

        self.timers.disarm_all();
        self.connection.shutdown();
        info!("Session runtime stopped");
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Transmit(command) => {
                    debug!(action = command.action(), "Transmit");
                    self.connection.send(&command);
                }
                Effect::StartTimer(kind) => self.timers.arm(kind),
                Effect::CancelTimer(kind) => self.timers.disarm(kind),
                Effect::PersistFilter(filter) => {
                    if let Err(e) = self.storage.save_last_filter(&self.identity, filter) {
                        error!(error = %e, "Failed to save last filter");
                    }
                }
                Effect::PersistMessage { peer, message } => {
                    if let Err(e) = self.storage.append_message(&peer, &message) {
                        error!(error = %e, peer = %peer.short(), "Failed to save message");
                    }
                }
                Effect::Notify(notice) => {
                    let _ = self.notices.send(notice);
                }
                Effect::Disconnect => {
                    info!("Closing connection for good");
                    self.timers.disarm_all();
                    self.connection.shutdown();
                    // a stopped manager reports nothing more, so close it here
                    let effects = self.session.handle(Event::ChannelClosed);
                    self.apply(effects);
                }
            }
        }
    }
}
