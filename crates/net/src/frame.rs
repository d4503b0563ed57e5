//! Text frame encoding/decoding
//!
//! Wire format: one JSON object per WebSocket text message.
//! Maximum frame size: 64KB (sanity limit, far above any legal message)

use crate::error::{Error, Result};
use crate::protocol::{Command, InboundFrame};

/// Maximum allowed frame size (64KB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Decode one inbound text frame
pub fn decode(text: &str) -> Result<InboundFrame> {
    let trimmed = text.trim();

    // Sanity check
    if trimmed.is_empty() {
        return Err(Error::Protocol("Empty frame".into()));
    }
    if trimmed.len() > MAX_FRAME_SIZE {
        return Err(Error::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            trimmed.len(),
            MAX_FRAME_SIZE
        )));
    }

    serde_json::from_str(trimmed).map_err(|e| Error::Protocol(format!("Invalid JSON: {}", e)))
}

/// Encode one outbound command
pub fn encode(command: &Command) -> Result<String> {
    let payload = serde_json::to_string(command)
        .map_err(|e| Error::Protocol(format!("Serialization failed: {}", e)))?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(Error::Protocol(format!(
            "Message too large: {} bytes (max {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    Ok(payload)
}
