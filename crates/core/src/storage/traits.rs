//! Storage repository traits
//!
//! The session runtime only needs a narrow slice of the database. These
//! traits describe that slice so the runtime can be driven by SQLite or
//! by anything else that satisfies them.

use crate::error::Result;
use crate::models::{ChatMessage, Filter, Identity};

/// Per-peer chat log persistence
pub trait ChatLogRepository {
    /// Append one message to a peer's log
    fn append_message(&self, peer: &Identity, message: &ChatMessage) -> Result<()>;

    /// Load a peer's log in the order it was written
    fn load_log(&self, peer: &Identity) -> Result<Vec<ChatMessage>>;

    /// Load every stored log, grouped by peer
    fn load_all_logs(&self) -> Result<Vec<(Identity, Vec<ChatMessage>)>>;
}

/// Preference persistence
pub trait PreferenceRepository {
    /// Remember the filter the user last joined with
    fn save_last_filter(&self, identity: &Identity, filter: Filter) -> Result<()>;

    /// Filter the user last joined with, if any
    fn last_filter(&self, identity: &Identity) -> Result<Option<Filter>>;
}

/// Combined storage interface used by the session runtime
pub trait SessionStorage: ChatLogRepository + PreferenceRepository {}

// Blanket implementation: any type implementing all traits implements SessionStorage
impl<T> SessionStorage for T where T: ChatLogRepository + PreferenceRepository {}
