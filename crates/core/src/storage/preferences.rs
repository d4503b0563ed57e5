//! User preferences persistence
//!
//! Remembers the filter the user last joined with.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{Filter, Identity};
use crate::storage::parse::{parse_filter, OptionalExt};

/// Preferences store
pub struct PreferencesStore<'a> {
    conn: &'a Connection,
}

impl<'a> PreferencesStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Set last filter for a user
    pub fn set_last_filter(&self, identity: &Identity, filter: Filter) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO preferences (identity, last_filter, updated_at)
             VALUES (?1, ?2, ?3)",
            params![identity.as_str(), filter.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Get last filter for a user
    pub fn get_last_filter(&self, identity: &Identity) -> Result<Option<Filter>> {
        let stored = self
            .conn
            .query_row(
                "SELECT last_filter FROM preferences WHERE identity = ?1",
                params![identity.as_str()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        Ok(match stored {
            Some(s) => Some(parse_filter(&s)?),
            None => None,
        })
    }
}
