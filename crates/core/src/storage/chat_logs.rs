//! Per-peer chat log storage
//!
//! Append-only. Rows come back in insertion order, which is also the order
//! the messages were shown on screen.

use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::models::{ChatMessage, Identity};
use crate::storage::parse::{parse_author, parse_datetime};

pub struct ChatLogStore<'a> {
    conn: &'a Connection,
}

fn row_to_message(row: &Row<'_>, offset: usize) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        author: parse_author(&row.get::<_, String>(offset)?)?,
        text: row.get(offset + 1)?,
        sent_at: parse_datetime(&row.get::<_, String>(offset + 2)?)?,
    })
}

impl<'a> ChatLogStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one message to a peer's log
    pub fn append(&self, peer: &Identity, message: &ChatMessage) -> Result<()> {
        self.conn.execute(
            "INSERT INTO chat_logs (peer_id, author, text, sent_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                peer.as_str(),
                message.author.as_str(),
                message.text,
                message.sent_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load a single peer's log
    pub fn load(&self, peer: &Identity) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT author, text, sent_at FROM chat_logs WHERE peer_id = ?1 ORDER BY id",
        )?;

        let messages = stmt
            .query_map(params![peer.as_str()], |row| row_to_message(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    /// Load every log, grouped by peer in order of first contact
    pub fn load_all(&self) -> Result<Vec<(Identity, Vec<ChatMessage>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT peer_id, author, text, sent_at FROM chat_logs ORDER BY id")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row_to_message(row, 1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut logs: Vec<(Identity, Vec<ChatMessage>)> = Vec::new();
        for (peer_id, message) in rows {
            match logs.iter_mut().find(|(peer, _)| peer.as_str() == peer_id) {
                Some((_, messages)) => messages.push(message),
                None => logs.push((Identity::new(peer_id), vec![message])),
            }
        }

        Ok(logs)
    }

    /// Number of stored messages for a peer
    pub fn count(&self, peer: &Identity) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chat_logs WHERE peer_id = ?1",
            params![peer.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
