//! Line-oriented console host
//!
//! Parses what the user types and renders session changes as text. Lines
//! starting with `/` are commands, anything else is a chat message.

use pairup_core::{DailyLimits, Filter, Gender};
use pairup_net::LinkStatus;

use crate::session::{Event, Notice, SessionState, SessionView};

pub const HELP: &str = "\
Commands:
  /join [filter]     find a match (any, male, female, non-binary, prefer-not-to-say)
  /leave             leave the queue or the chat
  /next              skip to the next match
  /report [reason]   report the current match
  /typing            tell your match you are typing
  /limits            show remaining daily matches
  /status            show connection and session state
  /reconnect         drop the connection and open a fresh one
  /help              show this help
  /quit              exit
Anything else is sent as a message.";

/// One parsed line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Join(Option<Filter>),
    Leave,
    Next,
    Report(Option<String>),
    Typing,
    Limits,
    Status,
    Reconnect,
    Help,
    Quit,
    Say(String),
    Empty,
    Invalid(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let arg = (!rest.is_empty()).then(|| rest.to_string());

    match name.to_ascii_lowercase().as_str() {
        "join" => match arg {
            None => Input::Join(None),
            Some(filter) => match filter.parse::<Filter>() {
                Ok(filter) => Input::Join(Some(filter)),
                Err(_) => Input::Invalid(format!("unknown filter: {filter}")),
            },
        },
        "leave" => Input::Leave,
        "next" => Input::Next,
        "report" => Input::Report(arg),
        "typing" => Input::Typing,
        "limits" => Input::Limits,
        "status" => Input::Status,
        "reconnect" => Input::Reconnect,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Invalid(format!("unknown command: /{other}")),
    }
}

/// Session event for an input, if it maps to one. `/join` without a filter
/// reuses the filter last joined with.
pub fn to_event(input: &Input, view: &SessionView) -> Option<Event> {
    match input {
        Input::Join(filter) => Some(Event::Join(filter.unwrap_or(view.filter))),
        Input::Leave => Some(Event::Leave),
        Input::Next => Some(Event::Next),
        Input::Report(reason) => Some(Event::Report(reason.clone())),
        Input::Typing => Some(Event::InputEdited),
        Input::Say(text) => Some(Event::Send(text.clone())),
        _ => None,
    }
}

fn gender_label(gender: Option<Gender>) -> &'static str {
    gender.map(Gender::as_str).unwrap_or("?")
}

pub fn render_limits(limits: &DailyLimits) -> String {
    Filter::ALL
        .iter()
        .map(|f| format!("{}: {}", f, limits.remaining(*f)))
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn render_link(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Connecting => "Connecting...",
        LinkStatus::Open => "Connected",
        LinkStatus::Closed => "Disconnected (reconnecting)",
    }
}

pub fn render_status(view: &SessionView, link: LinkStatus) -> String {
    let mut status = format!("[{}] {}", render_link(link), view.state.as_str());
    match view.state {
        SessionState::Queued => status.push_str(&format!(" ({}s, filter {})", view.queue_elapsed, view.filter)),
        SessionState::Chatting => {
            if let Some(profile) = &view.peer_profile {
                status.push_str(&format!(" with {}", profile.nickname));
            }
        }
        SessionState::Idle if view.cooldown_remaining > 0 => {
            status.push_str(&format!(" (cooldown {}s)", view.cooldown_remaining));
        }
        _ => {}
    }
    status
}

pub fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::Failure(e) => format!("! {e}"),
        Notice::Info(text) => format!("* {text}"),
    }
}

/// Lines describing what changed between two snapshots
pub fn render_change(old: &SessionView, new: &SessionView) -> Vec<String> {
    let mut lines = Vec::new();

    if old.state != new.state {
        match new.state {
            SessionState::Queued => {
                lines.push(format!("Looking for a match (filter: {})...", new.filter));
            }
            SessionState::Chatting => {
                if let Some(profile) = &new.peer_profile {
                    let mut line = format!(
                        "Matched with {} ({})",
                        profile.nickname,
                        gender_label(profile.gender)
                    );
                    if let Some(bio) = &profile.bio {
                        line.push_str(&format!(": {bio}"));
                    }
                    lines.push(line);
                }
                for message in &new.messages {
                    lines.push(render_message(message));
                }
            }
            SessionState::Idle if old.state == SessionState::Chatting => {
                lines.push("Chat ended.".to_string());
            }
            SessionState::Banned => {
                lines.push(format!(
                    "Access restricted: {}",
                    new.ban_reason.as_deref().unwrap_or("banned")
                ));
            }
            _ => {}
        }
    } else if new.state == SessionState::Chatting && new.messages.len() > old.messages.len() {
        for message in &new.messages[old.messages.len()..] {
            lines.push(render_message(message));
        }
    }

    if new.peer_typing && !old.peer_typing {
        lines.push("(typing...)".to_string());
    }
    if old.cooldown_remaining > 0 && new.cooldown_remaining == 0 {
        lines.push("You can join again.".to_string());
    }

    lines
}

fn render_message(message: &pairup_core::ChatMessage) -> String {
    let who = match message.author {
        pairup_core::Author::Me => "you",
        pairup_core::Author::Peer => "them",
    };
    format!("[{}] {}: {}", message.format_timestamp(), who, message.text)
}
