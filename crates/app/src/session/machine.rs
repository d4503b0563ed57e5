//! The session reducer

use std::collections::HashMap;

use pairup_core::validation::{sanitize, validate_message};
use pairup_core::{Author, ChatMessage, DailyLimits, Filter, Identity, MessageLog, PeerProfile};
use pairup_net::{resolve_peer_profile, Command, InboundFrame, ServerFrame};
use tracing::{debug, info, warn};

use super::event::{Effect, Event, Notice, SessionError, TimerKind};
use super::invariants::assert_session_invariants;
use super::{COOLDOWN_SECS, DEFAULT_REPORT_REASON, QUEUE_TIMEOUT_SECS};

/// Coarse session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Queued,
    Chatting,
    Banned,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Queued => "queued",
            SessionState::Chatting => "chatting",
            SessionState::Banned => "banned",
        }
    }
}

/// The peer lives inside the chatting phase, so it cannot outlive it
#[derive(Debug, Clone)]
enum Phase {
    Idle,
    /// `acknowledged` once the server confirmed the join with `queued`
    Queued { acknowledged: bool },
    Chatting { peer: Identity, profile: PeerProfile },
    Banned { reason: String },
}

/// Snapshot of the session for presentation
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub peer: Option<Identity>,
    pub peer_profile: Option<PeerProfile>,
    pub messages: Vec<ChatMessage>,
    pub cooldown_remaining: u32,
    pub queue_elapsed: u32,
    pub peer_typing: bool,
    pub limits: DailyLimits,
    pub filter: Filter,
    pub channel_open: bool,
    pub ban_reason: Option<String>,
}

/// One chat session over one connection
#[derive(Debug, Clone)]
pub struct Session {
    nickname: String,
    phase: Phase,
    log: MessageLog,
    cooldown_remaining: u32,
    queue_elapsed: u32,
    peer_typing: bool,
    typing_throttled: bool,
    limits: DailyLimits,
    filter: Filter,
    channel_open: bool,
}

impl Session {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            phase: Phase::Idle,
            log: MessageLog::new(),
            cooldown_remaining: 0,
            queue_elapsed: 0,
            peer_typing: false,
            typing_throttled: false,
            limits: DailyLimits::default(),
            filter: Filter::Any,
            channel_open: false,
        }
    }

    /// Seed per-peer history loaded from storage
    pub fn with_history(mut self, logs: Vec<(Identity, Vec<ChatMessage>)>) -> Self {
        for (peer, messages) in logs {
            self.log.seed(peer, messages);
        }
        self
    }

    /// Preselect the filter last used
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Queued { .. } => SessionState::Queued,
            Phase::Chatting { .. } => SessionState::Chatting,
            Phase::Banned { .. } => SessionState::Banned,
        }
    }

    pub fn peer(&self) -> Option<&Identity> {
        match &self.phase {
            Phase::Chatting { peer, .. } => Some(peer),
            _ => None,
        }
    }

    pub fn peer_profile(&self) -> Option<&PeerProfile> {
        match &self.phase {
            Phase::Chatting { profile, .. } => Some(profile),
            _ => None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.log.view()
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown_remaining
    }

    pub fn queue_elapsed(&self) -> u32 {
        self.queue_elapsed
    }

    pub fn is_peer_typing(&self) -> bool {
        self.peer_typing
    }

    #[cfg(test)]
    pub fn limits(&self) -> &DailyLimits {
        &self.limits
    }

    #[cfg(test)]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    #[cfg(test)]
    pub fn is_channel_open(&self) -> bool {
        self.channel_open
    }

    pub(super) fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state(),
            peer: self.peer().cloned(),
            peer_profile: self.peer_profile().cloned(),
            messages: self.log.view().to_vec(),
            cooldown_remaining: self.cooldown_remaining,
            queue_elapsed: self.queue_elapsed,
            peer_typing: self.peer_typing,
            limits: self.limits.clone(),
            filter: self.filter,
            channel_open: self.channel_open,
            ban_reason: match &self.phase {
                Phase::Banned { reason } => Some(reason.clone()),
                _ => None,
            },
        }
    }

    /// Apply one event and return the effects it requires
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            Event::Join(filter) => self.on_join(filter, &mut effects),
            Event::Leave => self.on_leave(&mut effects),
            Event::Next => self.on_next(&mut effects),
            Event::Send(text) => self.on_send(&text, &mut effects),
            Event::Report(reason) => self.on_report(reason, &mut effects),
            Event::InputEdited => self.on_input_edited(&mut effects),
            Event::Frame(frame) => self.on_frame(frame, &mut effects),
            Event::ChannelOpened => {
                self.channel_open = true;
                if !self.is_banned() {
                    effects.push(Effect::Notify(Notice::info("Connected")));
                }
            }
            Event::ChannelClosed => self.on_channel_closed(&mut effects),
            Event::TimerFired(kind) => self.on_timer(kind, &mut effects),
        }

        assert_session_invariants(self);
        effects
    }

    fn is_banned(&self) -> bool {
        matches!(self.phase, Phase::Banned { .. })
    }

    /// Common admission checks for local actions. Returns the rejection
    /// reason, if any.
    fn admission(&self, allowed: &[SessionState]) -> Option<String> {
        if self.is_banned() {
            return Some("You are banned".into());
        }
        if !allowed.contains(&self.state()) {
            return Some(format!("Not available while {}", self.state().as_str()));
        }
        if !self.channel_open {
            return Some("Not connected to server".into());
        }
        None
    }

    fn deny(reason: String, effects: &mut Vec<Effect>) {
        debug!(reason = %reason, "Action rejected");
        effects.push(Effect::Notify(Notice::Failure(SessionError::AdmissionDenied(
            reason,
        ))));
    }

    /// Drop the peer and the live view; history stays
    fn end_conversation(&mut self, effects: &mut Vec<Effect>) {
        self.log.clear_view();
        self.peer_typing = false;
        self.typing_throttled = false;
        effects.push(Effect::CancelTimer(TimerKind::TypingDecay));
        effects.push(Effect::CancelTimer(TimerKind::TypingThrottle));
    }

    fn stop_queue_clock(&mut self, effects: &mut Vec<Effect>) {
        self.queue_elapsed = 0;
        effects.push(Effect::CancelTimer(TimerKind::QueueClock));
    }

    fn enter_queue(&mut self, filter: Filter, effects: &mut Vec<Effect>) {
        self.phase = Phase::Queued {
            acknowledged: false,
        };
        self.filter = filter;
        self.queue_elapsed = 0;
        effects.push(Effect::Transmit(Command::Join {
            filter,
            nickname: self.nickname.clone(),
        }));
        effects.push(Effect::StartTimer(TimerKind::QueueClock));
        info!(filter = %filter, "Joining queue");
    }

    fn on_join(&mut self, filter: Filter, effects: &mut Vec<Effect>) {
        if let Some(reason) = self.admission(&[SessionState::Idle]) {
            return Self::deny(reason, effects);
        }
        if self.cooldown_remaining > 0 {
            return Self::deny(
                format!(
                    "Please wait {} seconds before joining again",
                    self.cooldown_remaining
                ),
                effects,
            );
        }

        // a pending re-join after `next` is superseded by an explicit one
        effects.push(Effect::CancelTimer(TimerKind::Requeue));
        self.enter_queue(filter, effects);
        effects.push(Effect::PersistFilter(filter));
    }

    fn on_leave(&mut self, effects: &mut Vec<Effect>) {
        if let Some(reason) = self.admission(&[SessionState::Queued, SessionState::Chatting]) {
            return Self::deny(reason, effects);
        }

        effects.push(Effect::Transmit(Command::Leave));
        self.stop_queue_clock(effects);
        self.end_conversation(effects);
        self.phase = Phase::Idle;
        self.cooldown_remaining = COOLDOWN_SECS;
        effects.push(Effect::StartTimer(TimerKind::Cooldown));
        info!("Left");
    }

    fn on_next(&mut self, effects: &mut Vec<Effect>) {
        if let Some(reason) = self.admission(&[SessionState::Chatting]) {
            return Self::deny(reason, effects);
        }

        effects.push(Effect::Transmit(Command::Next));
        self.end_conversation(effects);
        self.phase = Phase::Idle;
        effects.push(Effect::StartTimer(TimerKind::Requeue));
        info!("Skipping to next peer");
    }

    fn on_send(&mut self, text: &str, effects: &mut Vec<Effect>) {
        if let Some(reason) = self.admission(&[SessionState::Chatting]) {
            return Self::deny(reason, effects);
        }

        let text = match validate_message(text) {
            Ok(text) => text,
            Err(e) => {
                effects.push(Effect::Notify(Notice::Failure(SessionError::ValidationFailed(
                    e.to_string(),
                ))));
                return;
            }
        };

        effects.push(Effect::Transmit(Command::Msg { text: text.clone() }));
        self.record(ChatMessage::new(Author::Me, text), effects);
    }

    fn on_report(&mut self, reason: Option<String>, effects: &mut Vec<Effect>) {
        if let Some(denied) = self.admission(&[SessionState::Chatting]) {
            return Self::deny(denied, effects);
        }
        let Some(peer) = self.peer().cloned() else {
            return;
        };

        let reason = reason
            .map(|r| sanitize(&r).trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REPORT_REASON.to_string());

        info!(peer = %peer.short(), "Reporting peer");
        effects.push(Effect::Transmit(Command::Report {
            reported: peer,
            reason,
        }));
    }

    fn on_input_edited(&mut self, effects: &mut Vec<Effect>) {
        if self.typing_throttled || !self.channel_open || self.peer().is_none() {
            return;
        }
        self.typing_throttled = true;
        effects.push(Effect::Transmit(Command::Typing));
        effects.push(Effect::StartTimer(TimerKind::TypingThrottle));
    }

    /// Append to the active peer's log and ask for it to be persisted
    fn record(&mut self, message: ChatMessage, effects: &mut Vec<Effect>) {
        if let Some(peer) = self.log.append(message.clone()) {
            effects.push(Effect::PersistMessage {
                peer: peer.clone(),
                message,
            });
        }
    }

    fn on_frame(&mut self, frame: InboundFrame, effects: &mut Vec<Effect>) {
        if let Some(snapshot) = &frame.limits {
            self.apply_limits(snapshot);
        }
        if self.is_banned() {
            debug!(frame = ?frame.kind, "Ignoring frame while banned");
            return;
        }

        match frame.kind {
            ServerFrame::Queued { .. } => self.on_queued(effects),
            ServerFrame::Matched {
                peer,
                peer_profile,
                peer_gender,
            } => {
                let profile = resolve_peer_profile(peer_profile.as_ref(), peer_gender.as_deref());
                self.on_matched(peer, profile, effects);
            }
            ServerFrame::Msg { from, text } => self.on_peer_message(from, &text, effects),
            ServerFrame::Typing { from } => {
                let Some(peer) = self.peer() else {
                    return;
                };
                if from.as_ref().is_some_and(|f| f != peer) {
                    return;
                }
                self.peer_typing = true;
                effects.push(Effect::StartTimer(TimerKind::TypingDecay));
            }
            ServerFrame::PeerLeft { .. } => {
                if self.state() == SessionState::Queued {
                    self.stop_queue_clock(effects);
                }
                if self.state() == SessionState::Chatting {
                    effects.push(Effect::Notify(Notice::info("Your chat partner left")));
                }
                self.end_conversation(effects);
                self.phase = Phase::Idle;
            }
            ServerFrame::Error { message } => self.on_server_error(message, effects),
            ServerFrame::Reported { target } => {
                debug!(reported = ?target, "Report acknowledged");
                effects.push(Effect::Notify(Notice::info("Reported, thank you")));
            }
            ServerFrame::Left => debug!("Server acknowledged leave"),
            ServerFrame::DailyLimits => {}
            ServerFrame::Unknown => debug!("Ignoring unknown frame"),
        }
    }

    fn apply_limits(&mut self, snapshot: &HashMap<String, i64>) {
        self.limits.replace(snapshot);
    }

    fn on_queued(&mut self, effects: &mut Vec<Effect>) {
        match self.state() {
            SessionState::Queued => {
                // the server clock is authoritative: restart ours from zero
                self.phase = Phase::Queued { acknowledged: true };
                self.queue_elapsed = 0;
                effects.push(Effect::StartTimer(TimerKind::QueueClock));
            }
            SessionState::Idle if self.cooldown_remaining == 0 => {
                self.phase = Phase::Queued { acknowledged: true };
                self.queue_elapsed = 0;
                effects.push(Effect::StartTimer(TimerKind::QueueClock));
            }
            state => debug!(state = state.as_str(), "Ignoring queued frame"),
        }
    }

    fn on_matched(&mut self, peer: Identity, profile: PeerProfile, effects: &mut Vec<Effect>) {
        match self.state() {
            SessionState::Idle | SessionState::Queued => {}
            state => {
                warn!(state = state.as_str(), peer = %peer.short(), "Ignoring matched frame");
                return;
            }
        }

        self.stop_queue_clock(effects);
        effects.push(Effect::CancelTimer(TimerKind::Requeue));
        let restored = self.log.restore(&peer).len();
        info!(peer = %peer.short(), restored, "Matched");
        self.peer_typing = false;
        self.phase = Phase::Chatting { peer, profile };
    }

    fn on_peer_message(&mut self, from: Identity, text: &str, effects: &mut Vec<Effect>) {
        match self.peer() {
            Some(peer) if *peer == from => {}
            _ => {
                debug!(from = %from.short(), "Ignoring message from someone other than the peer");
                return;
            }
        }

        self.peer_typing = false;
        effects.push(Effect::CancelTimer(TimerKind::TypingDecay));
        self.record(ChatMessage::new(Author::Peer, sanitize(text)), effects);
    }

    fn on_server_error(&mut self, message: String, effects: &mut Vec<Effect>) {
        if !message.to_lowercase().contains("ban") {
            warn!(message = %message, "Server error");
            // an error before the queue ack means the join was refused
            if let Phase::Queued {
                acknowledged: false,
            } = self.phase
            {
                info!("Join refused by server");
                self.stop_queue_clock(effects);
                self.phase = Phase::Idle;
            }
            effects.push(Effect::Notify(Notice::Failure(SessionError::ServerError(
                message,
            ))));
            return;
        }

        warn!(message = %message, "Banned by server");
        self.end_conversation(effects);
        self.queue_elapsed = 0;
        self.cooldown_remaining = 0;
        for kind in [
            TimerKind::QueueClock,
            TimerKind::Cooldown,
            TimerKind::Requeue,
        ] {
            effects.push(Effect::CancelTimer(kind));
        }
        self.phase = Phase::Banned {
            reason: message.clone(),
        };
        effects.push(Effect::Notify(Notice::Failure(SessionError::Banned(message))));
        effects.push(Effect::Disconnect);
    }

    fn on_channel_closed(&mut self, effects: &mut Vec<Effect>) {
        let was_open = std::mem::replace(&mut self.channel_open, false);

        match self.state() {
            SessionState::Queued | SessionState::Chatting => {
                self.stop_queue_clock(effects);
                self.end_conversation(effects);
                self.phase = Phase::Idle;
            }
            SessionState::Idle | SessionState::Banned => {}
        }
        effects.push(Effect::CancelTimer(TimerKind::Requeue));

        if was_open && !self.is_banned() {
            effects.push(Effect::Notify(Notice::Failure(SessionError::ConnectionLost)));
        }
    }

    fn on_timer(&mut self, kind: TimerKind, effects: &mut Vec<Effect>) {
        match kind {
            TimerKind::QueueClock => {
                if self.state() != SessionState::Queued {
                    return;
                }
                self.queue_elapsed += 1;
                if self.queue_elapsed > QUEUE_TIMEOUT_SECS {
                    info!(elapsed = self.queue_elapsed, "Queue timed out");
                    effects.push(Effect::Transmit(Command::Leave));
                    self.stop_queue_clock(effects);
                    self.phase = Phase::Idle;
                    effects.push(Effect::Notify(Notice::info(
                        "No match found. Please try again.",
                    )));
                }
            }
            TimerKind::Cooldown => {
                self.cooldown_remaining = self.cooldown_remaining.saturating_sub(1);
                if self.cooldown_remaining == 0 {
                    effects.push(Effect::CancelTimer(TimerKind::Cooldown));
                }
            }
            TimerKind::TypingDecay => {
                self.peer_typing = false;
            }
            TimerKind::TypingThrottle => {
                self.typing_throttled = false;
            }
            TimerKind::Requeue => {
                if self.state() == SessionState::Idle
                    && self.channel_open
                    && self.cooldown_remaining == 0
                {
                    self.enter_queue(Filter::Any, effects);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairup_core::Gender;
    use pairup_net::WireProfile;

    fn frame(kind: ServerFrame) -> Event {
        Event::Frame(InboundFrame::new(kind))
    }

    fn matched(peer: &str) -> Event {
        frame(ServerFrame::Matched {
            peer: Identity::new(peer),
            peer_profile: None,
            peer_gender: Some("female".into()),
        })
    }

    fn peer_msg(peer: &str, text: &str) -> Event {
        frame(ServerFrame::Msg {
            from: Identity::new(peer),
            text: text.into(),
        })
    }

    fn online() -> Session {
        let mut session = Session::new("Nova");
        session.handle(Event::ChannelOpened);
        session
    }

    fn chatting_with(peer: &str) -> Session {
        let mut session = online();
        session.handle(Event::Join(Filter::Any));
        session.handle(matched(peer));
        session
    }

    fn transmitted(effects: &[Effect]) -> Vec<Command> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Transmit(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    fn denied(effects: &[Effect]) -> bool {
        effects.iter().any(|e| {
            matches!(
                e,
                Effect::Notify(Notice::Failure(SessionError::AdmissionDenied(_)))
            )
        })
    }

    fn texts(session: &Session) -> Vec<&str> {
        session.messages().iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn test_join_sends_command_and_queues() {
        let mut session = online();
        let effects = session.handle(Event::Join(Filter::Female));

        assert_eq!(session.state(), SessionState::Queued);
        assert_eq!(
            transmitted(&effects),
            vec![Command::Join {
                filter: Filter::Female,
                nickname: "Nova".into()
            }]
        );
        assert!(effects.contains(&Effect::PersistFilter(Filter::Female)));
        assert!(effects.contains(&Effect::StartTimer(TimerKind::QueueClock)));
    }

    #[test]
    fn test_join_rejected_when_channel_closed() {
        let mut session = Session::new("Nova");
        let effects = session.handle(Event::Join(Filter::Any));

        assert_eq!(session.state(), SessionState::Idle);
        assert!(transmitted(&effects).is_empty());
        assert!(denied(&effects));
    }

    #[test]
    fn test_match_without_history_starts_empty() {
        let session = chatting_with("p1");

        assert_eq!(session.state(), SessionState::Chatting);
        assert_eq!(session.peer(), Some(&Identity::new("p1")));
        assert_eq!(session.peer_profile().unwrap().nickname, "Stranger");
        assert_eq!(session.peer_profile().unwrap().gender, Some(Gender::Female));
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_match_restores_history_verbatim() {
        let mut session = chatting_with("p1");
        session.handle(peer_msg("p1", "hey"));
        session.handle(Event::Send("hello".into()));
        session.handle(Event::Leave);
        assert!(session.messages().is_empty());
        assert_eq!(session.peer(), None);

        // cooldown runs out, then the same peer comes around again
        for _ in 0..COOLDOWN_SECS {
            session.handle(Event::TimerFired(TimerKind::Cooldown));
        }
        session.handle(Event::Join(Filter::Any));
        session.handle(matched("p1"));

        assert_eq!(texts(&session), vec!["hey", "hello"]);
        assert_eq!(session.messages()[0].author, Author::Peer);
        assert_eq!(session.messages()[1].author, Author::Me);
    }

    #[test]
    fn test_seeded_history_restored_on_match() {
        let stored = vec![
            ChatMessage::new(Author::Me, "from last week".into()),
            ChatMessage::new(Author::Peer, "hi again".into()),
        ];
        let mut session =
            Session::new("Nova").with_history(vec![(Identity::new("p9"), stored.clone())]);
        session.handle(Event::ChannelOpened);
        session.handle(Event::Join(Filter::Any));
        session.handle(matched("p9"));

        assert_eq!(session.messages(), stored.as_slice());
    }

    #[test]
    fn test_full_profile_preferred() {
        let mut session = online();
        session.handle(Event::Join(Filter::Any));
        session.handle(frame(ServerFrame::Matched {
            peer: Identity::new("p1"),
            peer_profile: Some(WireProfile {
                nickname: Some("Kai".into()),
                gender: Some("male".into()),
                bio: Some("hi".into()),
            }),
            peer_gender: Some("female".into()),
        }));

        let profile = session.peer_profile().unwrap();
        assert_eq!(profile.nickname, "Kai");
        assert_eq!(profile.gender, Some(Gender::Male));
    }

    #[test]
    fn test_matched_accepted_from_idle() {
        let mut session = online();
        session.handle(matched("p1"));
        assert_eq!(session.state(), SessionState::Chatting);
    }

    #[test]
    fn test_matched_ignored_while_chatting() {
        let mut session = chatting_with("p1");
        session.handle(matched("p2"));
        assert_eq!(session.peer(), Some(&Identity::new("p1")));
    }

    #[test]
    fn test_leave_starts_cooldown_and_blocks_join() {
        let mut session = chatting_with("p1");
        let effects = session.handle(Event::Leave);

        assert_eq!(transmitted(&effects), vec![Command::Leave]);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.cooldown_remaining(), COOLDOWN_SECS);
        assert!(effects.contains(&Effect::StartTimer(TimerKind::Cooldown)));

        for remaining in (1..COOLDOWN_SECS).rev() {
            session.handle(Event::TimerFired(TimerKind::Cooldown));
            assert_eq!(session.cooldown_remaining(), remaining);

            let effects = session.handle(Event::Join(Filter::Any));
            assert!(transmitted(&effects).is_empty());
            assert!(denied(&effects));
            assert_eq!(session.state(), SessionState::Idle);
        }

        let effects = session.handle(Event::TimerFired(TimerKind::Cooldown));
        assert_eq!(session.cooldown_remaining(), 0);
        assert!(effects.contains(&Effect::CancelTimer(TimerKind::Cooldown)));

        // extra ticks never go below zero
        session.handle(Event::TimerFired(TimerKind::Cooldown));
        assert_eq!(session.cooldown_remaining(), 0);

        let effects = session.handle(Event::Join(Filter::Any));
        assert_eq!(transmitted(&effects).len(), 1);
        assert_eq!(session.state(), SessionState::Queued);
    }

    #[test]
    fn test_leave_from_queue() {
        let mut session = online();
        session.handle(Event::Join(Filter::Male));
        session.handle(Event::TimerFired(TimerKind::QueueClock));
        let effects = session.handle(Event::Leave);

        assert_eq!(transmitted(&effects), vec![Command::Leave]);
        assert!(effects.contains(&Effect::CancelTimer(TimerKind::QueueClock)));
        assert_eq!(session.queue_elapsed(), 0);
    }

    #[test]
    fn test_leave_rejected_when_idle() {
        let mut session = online();
        let effects = session.handle(Event::Leave);
        assert!(transmitted(&effects).is_empty());
        assert!(denied(&effects));
        assert_eq!(session.cooldown_remaining(), 0);
    }

    #[test]
    fn test_queue_timeout_sends_one_leave() {
        let mut session = online();
        session.handle(Event::Join(Filter::Any));
        session.handle(frame(ServerFrame::Queued { filter: None }));

        let mut leaves = 0;
        for _ in 0..61 {
            let effects = session.handle(Event::TimerFired(TimerKind::QueueClock));
            leaves += transmitted(&effects)
                .iter()
                .filter(|c| **c == Command::Leave)
                .count();
        }
        assert_eq!(leaves, 1);
        assert_eq!(session.state(), SessionState::Idle);

        // a straggling tick after the timeout changes nothing
        let effects = session.handle(Event::TimerFired(TimerKind::QueueClock));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_queue_not_timed_out_at_sixty() {
        let mut session = online();
        session.handle(Event::Join(Filter::Any));
        for _ in 0..60 {
            session.handle(Event::TimerFired(TimerKind::QueueClock));
        }
        assert_eq!(session.state(), SessionState::Queued);
        assert_eq!(session.queue_elapsed(), 60);
    }

    #[test]
    fn test_send_sanitizes_and_echoes() {
        let mut session = chatting_with("p1");
        let effects = session.handle(Event::Send(r#"Hello <script>"alert"</script>&"#.into()));

        assert_eq!(
            transmitted(&effects),
            vec![Command::Msg {
                text: "Hello scriptalert/script".into()
            }]
        );
        assert_eq!(texts(&session), vec!["Hello scriptalert/script"]);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::PersistMessage { peer, .. } if peer.as_str() == "p1")));
    }

    #[test]
    fn test_send_validation() {
        let mut session = chatting_with("p1");

        let effects = session.handle(Event::Send("<>&".into()));
        assert!(transmitted(&effects).is_empty());
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(Notice::Failure(SessionError::ValidationFailed(_)))]
        ));

        let effects = session.handle(Event::Send("x".repeat(501)));
        assert!(transmitted(&effects).is_empty());

        let effects = session.handle(Event::Send("x".repeat(500)));
        assert_eq!(transmitted(&effects).len(), 1);
    }

    #[test]
    fn test_send_rejected_when_not_chatting() {
        let mut session = online();
        let effects = session.handle(Event::Send("hi".into()));
        assert!(transmitted(&effects).is_empty());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_peer_message_clears_typing() {
        let mut session = chatting_with("p1");
        session.handle(frame(ServerFrame::Typing { from: None }));
        assert!(session.is_peer_typing());

        let effects = session.handle(peer_msg("p1", "yo"));
        assert!(!session.is_peer_typing());
        assert_eq!(texts(&session), vec!["yo"]);
        assert!(effects.contains(&Effect::CancelTimer(TimerKind::TypingDecay)));
    }

    #[test]
    fn test_message_from_stranger_ignored() {
        let mut session = chatting_with("p1");
        let effects = session.handle(peer_msg("p2", "psst"));
        assert!(effects.is_empty());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_typing_decay() {
        let mut session = chatting_with("p1");
        let effects = session.handle(frame(ServerFrame::Typing {
            from: Some(Identity::new("p1")),
        }));
        assert!(session.is_peer_typing());
        assert_eq!(effects, vec![Effect::StartTimer(TimerKind::TypingDecay)]);

        // re-arming is idempotent
        session.handle(frame(ServerFrame::Typing { from: None }));
        assert!(session.is_peer_typing());

        session.handle(Event::TimerFired(TimerKind::TypingDecay));
        assert!(!session.is_peer_typing());
    }

    #[test]
    fn test_typing_ignored_when_idle() {
        let mut session = online();
        let effects = session.handle(frame(ServerFrame::Typing { from: None }));
        assert!(effects.is_empty());
        assert!(!session.is_peer_typing());
    }

    #[test]
    fn test_outbound_typing_throttled() {
        let mut session = chatting_with("p1");

        let first = session.handle(Event::InputEdited);
        assert_eq!(transmitted(&first), vec![Command::Typing]);

        let second = session.handle(Event::InputEdited);
        assert!(second.is_empty());

        session.handle(Event::TimerFired(TimerKind::TypingThrottle));
        let third = session.handle(Event::InputEdited);
        assert_eq!(transmitted(&third), vec![Command::Typing]);
    }

    #[test]
    fn test_no_typing_without_peer() {
        let mut session = online();
        session.handle(Event::Join(Filter::Any));
        assert!(session.handle(Event::InputEdited).is_empty());
    }

    #[test]
    fn test_peer_left_returns_to_idle() {
        let mut session = chatting_with("p1");
        session.handle(peer_msg("p1", "bye"));
        session.handle(frame(ServerFrame::PeerLeft { peer: None }));

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.peer(), None);
        assert!(session.messages().is_empty());
        assert_eq!(session.cooldown_remaining(), 0);
    }

    #[test]
    fn test_next_requeues_after_delay() {
        let mut session = chatting_with("p1");
        let effects = session.handle(Event::Next);

        assert_eq!(transmitted(&effects), vec![Command::Next]);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(effects.contains(&Effect::StartTimer(TimerKind::Requeue)));

        let effects = session.handle(Event::TimerFired(TimerKind::Requeue));
        assert_eq!(
            transmitted(&effects),
            vec![Command::Join {
                filter: Filter::Any,
                nickname: "Nova".into()
            }]
        );
        assert_eq!(session.state(), SessionState::Queued);
    }

    #[test]
    fn test_requeue_skipped_when_channel_dropped() {
        let mut session = chatting_with("p1");
        session.handle(Event::Next);
        session.handle(Event::ChannelClosed);

        let effects = session.handle(Event::TimerFired(TimerKind::Requeue));
        assert!(transmitted(&effects).is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_report_defaults_reason() {
        let mut session = chatting_with("p1");
        let effects = session.handle(Event::Report(None));
        assert_eq!(
            transmitted(&effects),
            vec![Command::Report {
                reported: Identity::new("p1"),
                reason: DEFAULT_REPORT_REASON.into()
            }]
        );
        assert_eq!(session.state(), SessionState::Chatting);

        let effects = session.handle(Event::Report(Some("spam <links>".into())));
        assert_eq!(
            transmitted(&effects),
            vec![Command::Report {
                reported: Identity::new("p1"),
                reason: "spam links".into()
            }]
        );
    }

    #[test]
    fn test_report_rejected_without_peer() {
        let mut session = online();
        let effects = session.handle(Event::Report(None));
        assert!(transmitted(&effects).is_empty());
        assert!(denied(&effects));
    }

    #[test]
    fn test_limits_replaced_wholesale() {
        let mut session = online();
        let mut snapshot = HashMap::new();
        snapshot.insert("male".to_string(), 2);
        snapshot.insert("female".to_string(), 0);
        session.handle(Event::Frame(
            InboundFrame::new(ServerFrame::DailyLimits).with_limits(snapshot),
        ));
        assert_eq!(session.limits().remaining(Filter::Male), 2);
        assert_eq!(session.limits().remaining(Filter::Any), 0);

        // next snapshot omits female: back to the default
        let mut snapshot = HashMap::new();
        snapshot.insert("male".to_string(), 4);
        session.handle(Event::Frame(
            InboundFrame::new(ServerFrame::Left).with_limits(snapshot),
        ));
        assert_eq!(session.limits().remaining(Filter::Female), 5);
        assert_eq!(session.limits().remaining(Filter::Any), 4);
    }

    #[test]
    fn test_refused_join_returns_to_idle() {
        let mut session = online();
        session.handle(Event::Join(Filter::Female));
        let effects = session.handle(frame(ServerFrame::Error {
            message: "Daily limit reached for this filter".into(),
        }));

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.queue_elapsed(), 0);
        assert!(effects.contains(&Effect::CancelTimer(TimerKind::QueueClock)));
        assert!(effects.contains(&Effect::Notify(Notice::Failure(
            SessionError::ServerError("Daily limit reached for this filter".into())
        ))));

        // no phantom queue: a stray tick later sends nothing
        for _ in 0..61 {
            let effects = session.handle(Event::TimerFired(TimerKind::QueueClock));
            assert!(transmitted(&effects).is_empty());
        }

        // and joining again is allowed straight away
        let effects = session.handle(Event::Join(Filter::Any));
        assert_eq!(transmitted(&effects).len(), 1);
    }

    #[test]
    fn test_server_error_after_ack_keeps_queue() {
        let mut session = online();
        session.handle(Event::Join(Filter::Any));
        session.handle(frame(ServerFrame::Queued { filter: None }));
        let effects = session.handle(frame(ServerFrame::Error {
            message: "Rate limit exceeded. Try again in a moment.".into(),
        }));

        assert_eq!(session.state(), SessionState::Queued);
        assert_eq!(
            effects,
            vec![Effect::Notify(Notice::Failure(SessionError::ServerError(
                "Rate limit exceeded. Try again in a moment.".into()
            )))]
        );
    }

    #[test]
    fn test_server_error_while_chatting_is_notice_only() {
        let mut session = chatting_with("p1");
        session.handle(frame(ServerFrame::Error {
            message: "Rate limit exceeded. Try again in a moment.".into(),
        }));
        assert_eq!(session.state(), SessionState::Chatting);
        assert_eq!(session.peer(), Some(&Identity::new("p1")));
    }

    #[test]
    fn test_ban_is_terminal() {
        let mut session = chatting_with("p1");
        let effects = session.handle(frame(ServerFrame::Error {
            message: "You have been BANNED for 24 hours".into(),
        }));

        assert_eq!(session.state(), SessionState::Banned);
        assert_eq!(session.peer(), None);
        assert!(effects.contains(&Effect::Disconnect));
        assert!(effects.contains(&Effect::CancelTimer(TimerKind::QueueClock)));

        let effects = session.handle(Event::Join(Filter::Any));
        assert!(transmitted(&effects).is_empty());

        session.handle(matched("p2"));
        session.handle(frame(ServerFrame::Queued { filter: None }));
        assert_eq!(session.state(), SessionState::Banned);
        assert!(session.view().ban_reason.is_some());
    }

    #[test]
    fn test_channel_loss_resets_to_idle() {
        let mut session = chatting_with("p1");
        session.handle(peer_msg("p1", "still there?"));
        let effects = session.handle(Event::ChannelClosed);

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.messages().is_empty());
        assert!(effects.contains(&Effect::Notify(Notice::Failure(
            SessionError::ConnectionLost
        ))));

        // the log survives and comes back on re-match
        session.handle(Event::ChannelOpened);
        session.handle(Event::Join(Filter::Any));
        session.handle(matched("p1"));
        assert_eq!(texts(&session), vec!["still there?"]);
    }

    #[test]
    fn test_queued_frame_rearms_clock() {
        let mut session = online();
        session.handle(Event::Join(Filter::Any));
        for _ in 0..10 {
            session.handle(Event::TimerFired(TimerKind::QueueClock));
        }
        let effects = session.handle(frame(ServerFrame::Queued {
            filter: Some("any".into()),
        }));
        assert_eq!(session.queue_elapsed(), 0);
        assert!(effects.contains(&Effect::StartTimer(TimerKind::QueueClock)));
    }

    #[test]
    fn test_queued_frame_ignored_during_cooldown() {
        let mut session = chatting_with("p1");
        session.handle(Event::Leave);
        session.handle(frame(ServerFrame::Queued { filter: None }));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_peer_identity_set_only_while_chatting() {
        let mut session = online();
        let script = vec![
            Event::Join(Filter::Any),
            matched("p1"),
            peer_msg("p1", "a"),
            Event::Next,
            Event::TimerFired(TimerKind::Requeue),
            matched("p2"),
            frame(ServerFrame::PeerLeft { peer: None }),
            Event::Join(Filter::Male),
            Event::TimerFired(TimerKind::QueueClock),
            matched("p3"),
            Event::Leave,
        ];
        for event in script {
            session.handle(event);
            let view = session.view();
            assert_eq!(
                view.peer.is_some(),
                view.state == SessionState::Chatting,
                "peer/state mismatch in {:?}",
                view.state
            );
            assert_eq!(view.peer_profile.is_some(), view.peer.is_some());
        }
    }
}
