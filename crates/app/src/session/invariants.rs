//! Developer guardrails for the session
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use super::machine::{Session, SessionState};
use super::COOLDOWN_SECS;

/// Validate that a session is internally consistent
pub fn assert_session_invariants(session: &Session) {
    let state = session.state();

    // The live view belongs to the current peer and nobody else
    debug_assert_eq!(
        session.log().active_peer(),
        session.peer(),
        "message view is attached to {:?} but the peer is {:?}",
        session.log().active_peer(),
        session.peer()
    );

    debug_assert!(
        state == SessionState::Chatting || session.messages().is_empty(),
        "{} session still shows {} messages",
        state.as_str(),
        session.messages().len()
    );

    debug_assert!(
        state == SessionState::Chatting || !session.is_peer_typing(),
        "peer typing flag set while {}",
        state.as_str()
    );

    debug_assert!(
        session.cooldown_remaining() <= COOLDOWN_SECS,
        "cooldown {} exceeds {}",
        session.cooldown_remaining(),
        COOLDOWN_SECS
    );

    debug_assert!(
        state == SessionState::Queued || session.queue_elapsed() == 0,
        "queue clock at {} while {}",
        session.queue_elapsed(),
        state.as_str()
    );
}
