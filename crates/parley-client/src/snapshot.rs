//! UI projection of a session.

use chrono::{DateTime, Utc};
use parley_core::{LedgerEntry, MessageId, Scope};

use crate::session::SessionStatus;

/// One row of the message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Message text.
    pub content: String,
    /// Sender display name.
    pub sender: String,
    /// Server timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the current user sent it.
    pub is_own: bool,
    /// Whether it came from the whisper ledger.
    pub is_whisper: bool,
}

impl From<LedgerEntry<'_>> for DisplayMessage {
    fn from(entry: LedgerEntry<'_>) -> Self {
        Self {
            id: entry.message.id.clone(),
            content: entry.message.content.clone(),
            sender: entry.message.sender.clone(),
            timestamp: entry.message.timestamp,
            is_own: entry.message.is_own,
            is_whisper: entry.is_whisper(),
        }
    }
}

/// Everything the UI renders, derived fresh from controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Connection status.
    pub status: SessionStatus,
    /// Logged-in username, if any.
    pub username: Option<String>,
    /// Bound channel or ticket.
    pub scope: Option<Scope>,
    /// Last error or disconnect reason.
    pub last_error: Option<String>,
    /// Merged, time-ordered messages.
    pub messages: Vec<DisplayMessage>,
    /// Input box text.
    pub input: String,
    /// Whether the input box has focus.
    pub input_focused: bool,
    /// Whether a send is awaiting acknowledgment.
    pub sending: bool,
}

impl SessionSnapshot {
    /// Whether the chat view (rather than the login form) should show.
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Connected && self.scope.is_some()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            username: None,
            scope: None,
            last_error: None,
            messages: Vec::new(),
            input: String::new(),
            input_focused: false,
            sending: false,
        }
    }
}
