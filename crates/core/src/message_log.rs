//! Per-peer message log
//!
//! Keeps a history of every conversation keyed by peer identity plus the
//! live view of the conversation on screen. Ending a conversation only
//! resets the live view; the history for that peer stays around so a
//! later re-match with the same peer picks up where it left off.

use std::collections::HashMap;

use crate::models::{ChatMessage, Identity};

#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    history: HashMap<Identity, Vec<ChatMessage>>,
    active: Option<Identity>,
    view: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a previously persisted log for a peer
    pub fn seed(&mut self, peer: Identity, messages: Vec<ChatMessage>) {
        if !messages.is_empty() {
            self.history.insert(peer, messages);
        }
    }

    /// Make `peer` the active conversation, restoring its history verbatim
    pub fn restore(&mut self, peer: &Identity) -> &[ChatMessage] {
        self.view = self.history.get(peer).cloned().unwrap_or_default();
        self.active = Some(peer.clone());
        &self.view
    }

    /// Append to the active conversation.
    ///
    /// Returns the peer the message was recorded under, or `None` when no
    /// conversation is active (the message is dropped).
    pub fn append(&mut self, message: ChatMessage) -> Option<&Identity> {
        let peer = self.active.as_ref()?;
        self.history
            .entry(peer.clone())
            .or_default()
            .push(message.clone());
        self.view.push(message);
        Some(peer)
    }

    /// End the active conversation. History is retained.
    pub fn clear_view(&mut self) {
        self.active = None;
        self.view.clear();
    }

    /// Messages currently on screen
    pub fn view(&self) -> &[ChatMessage] {
        &self.view
    }

    pub fn active_peer(&self) -> Option<&Identity> {
        self.active.as_ref()
    }

    /// Stored history for a peer
    pub fn history(&self, peer: &Identity) -> &[ChatMessage] {
        self.history.get(peer).map(Vec::as_slice).unwrap_or(&[])
    }
}
