//! Terminal output.
//!
//! The terminal is append-only, so snapshots are turned into the lines that
//! changed since the previous one.

use std::collections::HashSet;

use parley_client::{DisplayMessage, Notification, NotificationLevel, SessionSnapshot, SessionStatus};
use parley_core::{MessageId, Scope};

/// Tracks what has been printed.
#[derive(Debug, Default)]
pub struct Renderer {
    status: Option<SessionStatus>,
    scope: Option<Scope>,
    printed: HashSet<MessageId>,
}

impl Renderer {
    /// Nothing printed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines for everything in `snapshot` not printed before.
    pub fn snapshot(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        if self.status != Some(snapshot.status) {
            self.status = Some(snapshot.status);
            lines.push(status_line(snapshot));
        }

        if self.scope != snapshot.scope {
            self.scope.clone_from(&snapshot.scope);
            if let Some(scope) = &snapshot.scope {
                lines.push(format!("-- now in {scope}"));
            }
        }

        // Ledger was cleared; ids may legitimately come back.
        if snapshot.messages.is_empty() {
            self.printed.clear();
        }
        for message in &snapshot.messages {
            if self.printed.insert(message.id.clone()) {
                lines.push(message_line(message));
            }
        }

        lines
    }
}

fn status_line(snapshot: &SessionSnapshot) -> String {
    let username = snapshot.username.as_deref().unwrap_or("?");
    let error = snapshot.last_error.as_deref();
    match (snapshot.status, error) {
        (SessionStatus::Disconnected, Some(reason)) => format!("-- disconnected: {reason}"),
        (SessionStatus::Disconnected, None) => "-- disconnected".to_string(),
        (SessionStatus::Connecting, _) => format!("-- connecting as {username}"),
        (SessionStatus::Connected, _) => format!("-- connected as {username}"),
        (SessionStatus::Reconnecting, _) => "-- reconnecting".to_string(),
        (SessionStatus::Error, reason) => format!("-- error: {}", reason.unwrap_or("unknown")),
    }
}

/// One message row.
pub fn message_line(message: &DisplayMessage) -> String {
    let time = message.timestamp.format("%H:%M:%S");
    let sender = if message.is_own { "you" } else { message.sender.as_str() };
    let marker = if message.is_whisper { "(whisper) " } else { "" };
    format!("[{time}] {marker}{sender}: {}", message.content)
}

/// One notification row.
pub fn notification(notification: &Notification) -> String {
    let prefix = match notification.level {
        NotificationLevel::Success => '+',
        NotificationLevel::Info => '*',
        NotificationLevel::Error => '!',
    };
    format!("{prefix} {}", notification.text)
}
