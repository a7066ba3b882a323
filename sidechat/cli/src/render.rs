//! Terminal rendering of session output
//!
//! Pure formatting; the chat loop writes the returned text to stdout.

use sidechat_core::{ChatTurn, MessageRole, NotifyLevel, SessionEvent, SessionState, StreamStats};

/// Text to print for a controller event, if any
pub fn event_text(event: &SessionEvent, model: Option<&str>) -> Option<String> {
    match event {
        SessionEvent::State {
            state: SessionState::Sending,
        } => Some(format!("{}> ", model.unwrap_or("assistant"))),
        SessionEvent::Token { text } => Some(text.clone()),
        SessionEvent::Notify { level, message } => {
            Some(format!("\n{} {message}\n", notify_prefix(*level)))
        }
        SessionEvent::State { .. } | SessionEvent::ScrollToLatest => None,
    }
}

/// Text to print when a turn is appended, if any
///
/// User turns were already typed and streamed replies were already echoed,
/// so only the end of a reply is marked.
pub fn turn_text(turn: &ChatTurn) -> Option<String> {
    match turn.role {
        MessageRole::User => None,
        MessageRole::Assistant if turn.aborted => Some(" [aborted]\n".to_string()),
        MessageRole::Assistant => Some("\n".to_string()),
    }
}

/// Render a stored turn when replaying history
pub fn history_line(turn: &ChatTurn) -> String {
    let who = match turn.role {
        MessageRole::User => "you",
        MessageRole::Assistant => turn.model.as_str(),
    };
    let images = match turn.images.as_ref().map(Vec::len) {
        Some(n) if turn.role == MessageRole::User => format!(" [{n} image(s)]"),
        _ => String::new(),
    };
    let aborted = if turn.aborted { " [aborted]" } else { "" };
    format!("{who}> {}{images}{aborted}\n", turn.content)
}

/// One-line summary for `/status`
pub fn status_line(
    state: SessionState,
    model: Option<&str>,
    turns: usize,
    stats: &StreamStats,
) -> String {
    let mut line = format!(
        "{} | model: {} | {turns} turn(s)",
        state.description(),
        model.unwrap_or("none")
    );
    if stats.chunks_received > 0 {
        line.push_str(&format!(
            " | {} chunk(s), {} byte(s)",
            stats.chunks_received, stats.bytes_received
        ));
        if let Some(elapsed) = stats.duration() {
            line.push_str(&format!(" in {:.1}s", elapsed.as_secs_f64()));
        }
    }
    line
}

fn notify_prefix(level: NotifyLevel) -> &'static str {
    match level {
        NotifyLevel::Warning => "[warning]",
        NotifyLevel::Error => "[error]",
    }
}
