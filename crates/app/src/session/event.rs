//! Session inputs and outputs

use std::fmt;
use std::time::Duration;

use pairup_core::{ChatMessage, Filter, Identity};
use pairup_net::{Command, InboundFrame};

use super::{QUEUE_TICK, REQUEUE_DELAY, TYPING_DECAY, TYPING_THROTTLE};

/// Independent timers the session arms and disarms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Counts seconds spent in the queue
    QueueClock,
    /// Counts down the post-leave cooldown
    Cooldown,
    /// Clears the peer typing flag
    TypingDecay,
    /// Limits outbound typing notifications
    TypingThrottle,
    /// Re-joins the queue shortly after `next`
    Requeue,
}

impl TimerKind {
    pub fn period(self) -> Duration {
        match self {
            TimerKind::QueueClock | TimerKind::Cooldown => QUEUE_TICK,
            TimerKind::TypingDecay => TYPING_DECAY,
            TimerKind::TypingThrottle => TYPING_THROTTLE,
            TimerKind::Requeue => REQUEUE_DELAY,
        }
    }

    /// Ticking timers fire every period until cancelled; the rest fire once
    pub fn repeats(self) -> bool {
        matches!(self, TimerKind::QueueClock | TimerKind::Cooldown)
    }
}

/// Everything the session reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Join(Filter),
    Leave,
    Next,
    Send(String),
    /// Report the current peer, with an optional reason
    Report(Option<String>),
    /// The user edited the message input
    InputEdited,
    Frame(InboundFrame),
    ChannelOpened,
    ChannelClosed,
    TimerFired(TimerKind),
}

/// Failure taxonomy surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Connection lost, reconnecting")]
    ConnectionLost,

    #[error("{0}")]
    AdmissionDenied(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    ServerError(String),

    #[error("Banned: {0}")]
    Banned(String),
}

/// Something worth telling the user about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Failure(SessionError),
    Info(String),
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Notice::Info(text.into())
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Failure(e) => write!(f, "{e}"),
            Notice::Info(text) => f.write_str(text),
        }
    }
}

/// Side effects requested by the session, run by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Transmit(Command),
    StartTimer(TimerKind),
    CancelTimer(TimerKind),
    PersistFilter(Filter),
    PersistMessage { peer: Identity, message: ChatMessage },
    Notify(Notice),
    /// Close the channel for good
    Disconnect,
}
