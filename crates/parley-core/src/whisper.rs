//! Whisper routing.
//!
//! Decides locally, without a network round-trip, whether composed text is a
//! private message (`/whisper <recipient> <text>`, alias `/w`) or public text.

use crate::error::ValidationError;

/// Command prefixes requesting a private send.
const WHISPER_PREFIXES: [&str; 2] = ["/whisper", "/w"];

/// Minimum recipient identifier length.
pub const RECIPIENT_MIN_LEN: usize = 4;

/// Maximum recipient identifier length.
pub const RECIPIENT_MAX_LEN: usize = 16;

/// Where composed text should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Private message to one user.
    Whisper {
        /// Recipient identifier.
        recipient: String,
        /// Message text.
        content: String,
    },
    /// Public message to the bound channel or ticket.
    Broadcast {
        /// Message text.
        content: String,
    },
}

impl Outbound {
    /// Message text regardless of route.
    pub fn content(&self) -> &str {
        match self {
            Self::Whisper { content, .. } | Self::Broadcast { content } => content,
        }
    }

    /// Whether this is a private send.
    pub fn is_whisper(&self) -> bool {
        matches!(self, Self::Whisper { .. })
    }
}

/// Parses composed text into an [`Outbound`] route.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhisperRouter;

impl WhisperRouter {
    /// Route composed text.
    ///
    /// Blank input is rejected. Text that does not fully match the whisper
    /// pattern is sent publicly as typed (trimmed).
    pub fn route(input: &str) -> Result<Outbound, ValidationError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }

        Ok(parse_whisper(text).unwrap_or_else(|| Outbound::Broadcast { content: text.to_string() }))
    }
}

fn parse_whisper(text: &str) -> Option<Outbound> {
    let (command, rest) = text.split_once(char::is_whitespace)?;
    if !WHISPER_PREFIXES.contains(&command) {
        return None;
    }

    let (recipient, content) = rest.trim_start().split_once(char::is_whitespace)?;
    if !is_recipient(recipient) {
        return None;
    }

    let content = content.trim();
    if content.is_empty() {
        return None;
    }

    Some(Outbound::Whisper { recipient: recipient.to_string(), content: content.to_string() })
}

fn is_recipient(token: &str) -> bool {
    (RECIPIENT_MIN_LEN..=RECIPIENT_MAX_LEN).contains(&token.len())
        && token.bytes().all(|b| b.is_ascii_alphanumeric())
}
