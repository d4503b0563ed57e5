//! Session state machine
//!
//! A reducer: `Session::handle` takes one event and returns the effects to
//! run. It never touches the network, the clock or the disk itself.

use std::time::Duration;

mod event;
mod invariants;
mod machine;

pub use event::{Effect, Event, Notice, SessionError, TimerKind};
pub use machine::{Session, SessionState, SessionView};

/// Time in the queue after which we give up
pub const QUEUE_TIMEOUT_SECS: u32 = 60;

/// Cooldown after leaving before another join is allowed
pub const COOLDOWN_SECS: u32 = 5;

/// Tick for the queue clock and the cooldown
pub const QUEUE_TICK: Duration = Duration::from_secs(1);

/// How long the peer typing flag survives without a fresh typing frame
pub const TYPING_DECAY: Duration = Duration::from_secs(3);

/// Minimum gap between our own typing notifications
pub const TYPING_THROTTLE: Duration = Duration::from_secs(1);

/// Delay between `next` and the automatic re-join
pub const REQUEUE_DELAY: Duration = Duration::from_millis(200);

pub const DEFAULT_REPORT_REASON: &str = "Inappropriate behavior";
