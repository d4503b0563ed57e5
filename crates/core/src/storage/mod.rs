//! SQLite storage layer for Pairup
//!
//! Everything here is a local, non-authoritative cache: our identity, the
//! cached verification result, the profile, the last chosen filter and the
//! per-peer chat logs.

mod chat_logs;
mod device;
mod migrations;
mod parse;
mod preferences;
mod profiles;
mod traits;

use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

use crate::error::Result;
use crate::models::{ChatMessage, Filter, Identity};

pub use chat_logs::ChatLogStore;
pub use device::DeviceStore;
pub use preferences::PreferencesStore;
pub use profiles::ProfileStore;
pub use traits::{ChatLogRepository, PreferenceRepository, SessionStorage};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Device identity and cached verification result
    pub fn device(&self) -> DeviceStore<'_> {
        DeviceStore::new(&self.conn)
    }

    pub fn profiles(&self) -> ProfileStore<'_> {
        ProfileStore::new(&self.conn)
    }

    /// Last chosen filter
    pub fn preferences(&self) -> PreferencesStore<'_> {
        PreferencesStore::new(&self.conn)
    }

    /// Per-peer chat logs
    pub fn chat_logs(&self) -> ChatLogStore<'_> {
        ChatLogStore::new(&self.conn)
    }
}

// Implement repository traits for Database so the session runtime can be
// driven through the trait interface

impl ChatLogRepository for Database {
    fn append_message(&self, peer: &Identity, message: &ChatMessage) -> Result<()> {
        self.chat_logs().append(peer, message)
    }

    fn load_log(&self, peer: &Identity) -> Result<Vec<ChatMessage>> {
        self.chat_logs().load(peer)
    }

    fn load_all_logs(&self) -> Result<Vec<(Identity, Vec<ChatMessage>)>> {
        self.chat_logs().load_all()
    }
}

impl PreferenceRepository for Database {
    fn save_last_filter(&self, identity: &Identity, filter: Filter) -> Result<()> {
        self.preferences().set_last_filter(identity, filter)
    }

    fn last_filter(&self, identity: &Identity) -> Result<Option<Filter>> {
        self.preferences().get_last_filter(identity)
    }
}
