//! Chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// Opaque message identifier, unique per message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a message identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message as delivered by the transport.
///
/// Carries no ownership flag; that is derived locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Message text.
    pub content: String,
    /// Sender display name.
    pub sender: String,
    /// Server timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Ledger a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Public channel or ticket message.
    Broadcast,
    /// Private message between two users.
    Whisper,
}

/// Immutable message as held by a session ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Message text.
    pub content: String,
    /// Sender display name.
    pub sender: String,
    /// Server timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the current user sent this message.
    pub is_own: bool,
    /// Channel or ticket the message was received in.
    pub scope: Scope,
}

impl Message {
    /// Build a ledger message, deriving `is_own` from the session username.
    pub fn from_inbound(inbound: InboundMessage, username: &str, scope: Scope) -> Self {
        let is_own = inbound.sender == username;
        Self {
            id: inbound.id,
            content: inbound.content,
            sender: inbound.sender,
            timestamp: inbound.timestamp,
            is_own,
            scope,
        }
    }
}
