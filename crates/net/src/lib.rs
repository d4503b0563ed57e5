//! Pairup Network Library
//!
//! Talks to the matchmaking/chat server.
//!
//! # Architecture
//!
//! - **Protocol**: JSON commands (`action`) and frames (`type`), one per
//!   WebSocket text message
//! - **Connection manager**: one live channel per identity, reconnects
//!   after a fixed delay, discards events from superseded attempts
//! - **Connectors**: WebSocket for real use, in-memory for tests
//! - **Verify**: one-shot selfie upload
//!
//! # Usage
//!
//! ```ignore
//! let connector = Arc::new(WsConnector::new("ws://localhost:8000/ws")?);
//! let (tx, mut rx) = mpsc::channel::<ConnectionEvent>(64);
//! let handle = ConnectionManager::spawn(connector, identity, tx);
//!
//! while let Some(event) = rx.recv().await {
//!     if let ConnectionEvent::Opened = event {
//!         handle.send(&Command::Join { filter: Filter::Any, nickname });
//!     }
//! }
//! ```

pub mod connection;
pub mod error;
pub mod frame;
pub mod memory;
pub mod protocol;
pub mod verify;
pub mod ws;

pub use connection::{
    Channel, ConnectionEvent, ConnectionHandle, ConnectionManager, Connector, LinkStatus,
    RECONNECT_DELAY,
};
pub use error::{Error, Result};
pub use memory::{MemoryConnector, MemoryPeer};
pub use protocol::{resolve_peer_profile, Command, InboundFrame, ServerFrame, WireProfile};
pub use verify::{Verification, VerifyClient};
pub use ws::WsConnector;

/// Default chat server socket
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000/ws";

/// Default verification endpoint
pub const DEFAULT_VERIFY_URL: &str = "http://localhost:8000/verify";
