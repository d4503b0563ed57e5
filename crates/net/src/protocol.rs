//! Wire protocol message types
//!
//! One JSON object per WebSocket text message. Commands we send are tagged
//! by `action`, frames the server sends are tagged by `type`. Any inbound
//! frame may also carry a `limits` snapshot.

use std::collections::HashMap;

use pairup_core::{Filter, Gender, Identity, PeerProfile};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Commands sent to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Enter the matchmaking queue
    Join { filter: Filter, nickname: String },

    /// Leave the queue or the current chat
    Leave,

    /// Drop the current peer
    Next,

    /// Chat message to the current peer
    Msg { text: String },

    /// "I am typing" notification
    Typing,

    /// Report the current peer
    Report { reported: Identity, reason: String },
}

impl Command {
    /// Action name, for logging
    pub fn action(&self) -> &'static str {
        match self {
            Command::Join { .. } => "join",
            Command::Leave => "leave",
            Command::Next => "next",
            Command::Msg { .. } => "msg",
            Command::Typing => "typing",
            Command::Report { .. } => "report",
        }
    }
}

/// Peer profile as the server sends it. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireProfile {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Frames pushed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// We are in the queue
    Queued {
        #[serde(default)]
        filter: Option<String>,
    },

    /// Paired with a peer
    Matched {
        peer: Identity,
        #[serde(default)]
        peer_profile: Option<WireProfile>,
        #[serde(default)]
        peer_gender: Option<String>,
    },

    /// Chat message from the peer
    Msg { from: Identity, text: String },

    /// Peer is typing
    Typing {
        #[serde(default)]
        from: Option<Identity>,
    },

    /// Peer ended the chat
    PeerLeft {
        #[serde(default)]
        peer: Option<Identity>,
    },

    /// Server-side rejection or failure
    Error { message: String },

    /// Carries only a limits snapshot
    DailyLimits,

    /// Acknowledges `next`
    Left,

    /// Acknowledges `report`
    Reported {
        #[serde(default)]
        target: Option<Identity>,
    },

    /// Anything this client does not understand
    #[serde(other)]
    Unknown,
}

/// A decoded inbound frame plus its optional limits snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(flatten)]
    pub kind: ServerFrame,
    #[serde(
        default,
        deserialize_with = "lenient_limits",
        skip_serializing_if = "Option::is_none"
    )]
    pub limits: Option<HashMap<String, i64>>,
}

/// Keep the whole-number entries of a limits snapshot. A malformed snapshot
/// never rejects the frame carrying it.
fn lenient_limits<'de, D>(deserializer: D) -> Result<Option<HashMap<String, i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Object(entries)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let limits: HashMap<String, i64> = entries
        .into_iter()
        .filter_map(|(category, count)| whole_number(&count).map(|n| (category, n)))
        .collect();
    Ok((!limits.is_empty()).then_some(limits))
}

fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

impl InboundFrame {
    pub fn new(kind: ServerFrame) -> Self {
        Self { kind, limits: None }
    }

    pub fn with_limits(mut self, limits: HashMap<String, i64>) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// Resolve what a `matched` frame tells us about the peer.
///
/// A full profile wins; otherwise the peer is an anonymous "Stranger" with
/// whatever gender hint came along. `?` and unknown labels mean unknown.
pub fn resolve_peer_profile(
    peer_profile: Option<&WireProfile>,
    peer_gender: Option<&str>,
) -> PeerProfile {
    let parse_gender = |label: Option<&str>| label.and_then(|l| l.parse::<Gender>().ok());

    match peer_profile {
        Some(wire) => PeerProfile {
            nickname: wire
                .nickname
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Stranger".to_string()),
            gender: parse_gender(wire.gender.as_deref()).or_else(|| parse_gender(peer_gender)),
            bio: wire.bio.clone().filter(|b| !b.is_empty()),
        },
        None => PeerProfile::anonymous(parse_gender(peer_gender)),
    }
}
