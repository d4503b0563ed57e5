//! Chat message model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Who wrote a message, relative to this device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    Me,
    Peer,
}

impl Author {
    pub fn as_str(self) -> &'static str {
        match self {
            Author::Me => "me",
            Author::Peer => "peer",
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Author {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "me" => Ok(Author::Me),
            "peer" => Ok(Author::Peer),
            other => Err(Error::InvalidValue(format!("unknown author: {other}"))),
        }
    }
}

/// A chat message exchanged with the current peer.
///
/// Text is already sanitized when a message is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: Author,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(author: Author, text: String) -> Self {
        Self {
            author,
            text,
            sent_at: Utc::now(),
        }
    }

    pub fn format_timestamp(&self) -> String {
        self.sent_at.format("%H:%M").to_string()
    }
}
