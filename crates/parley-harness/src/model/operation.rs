//! Operations for model-based testing.
//!
//! Operations cover every input a session sees: user intents, transport pushes
//! and completions of earlier actions. They are generated randomly by proptest
//! and applied to both the model and the real controller.

use arbitrary::Arbitrary;
use parley_core::{Scope, Target, TicketId};

/// Usernames addressed by [`Operation::Login`]. The last one is blank and
/// fails validation.
pub const USERNAMES: [&str; 3] = ["alice", "bobby", "  "];

/// Distinct channels and tickets a session can bind.
const SCOPE_SLOTS: u8 = 3;

/// Distinct incoming message ids, kept small so duplicates are common.
const MESSAGE_SLOTS: u8 = 8;

/// Operations that can be applied to a session.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// User logs in.
    Login {
        /// Index into [`USERNAMES`].
        user: u8,
        /// What to bind once connected.
        target: TargetSlot,
    },

    /// User logs out.
    Logout,

    /// User binds another channel or ticket on the live connection.
    Bind {
        /// What to bind.
        target: TargetSlot,
    },

    /// Transport reports the handshake completed.
    Connected,

    /// Transport lost the link and is retrying.
    Reconnecting,

    /// Transport reports the connection ended.
    Disconnected {
        /// Whether the server supplied a reason.
        with_reason: bool,
    },

    /// Transport reports a library-level error.
    LinkError,

    /// The connect call failed.
    ConnectFailed {
        /// Credential rejection rather than an unreachable server.
        auth: bool,
    },

    /// The outstanding channel join or ticket fetch completes.
    ScopeResult {
        /// Whether the server accepted it.
        ok: bool,
    },

    /// The outstanding history fetch completes.
    HistoryResult {
        /// Whether the fetch succeeded.
        ok: bool,
        /// Message slots in the batch, newest first.
        slots: Vec<u8>,
    },

    /// A message is pushed by the server.
    Incoming {
        /// Message slot (mapped to an id).
        slot: u8,
        /// Private message rather than broadcast.
        whisper: bool,
        /// Broadcast posted to a channel the session is not bound to.
        elsewhere: bool,
    },

    /// User edits the input box.
    Edit {
        /// New text.
        text: SmallText,
    },

    /// User presses send.
    Submit,

    /// The outstanding send completes.
    SendResult {
        /// Whether the server acknowledged it.
        ok: bool,
    },

    /// A push from a connection that was never live.
    Stale,
}

/// Channel or ticket selector.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub struct TargetSlot {
    /// Ticket rather than channel.
    pub ticket: bool,
    /// Which one (wrapped to a small range).
    pub slot: u8,
}

impl TargetSlot {
    /// Resolve to a model target.
    pub fn resolve(self) -> ModelTarget {
        let slot = self.slot % SCOPE_SLOTS;
        if self.ticket { ModelTarget::Ticket(slot) } else { ModelTarget::Channel(slot) }
    }
}

/// A channel or ticket in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTarget {
    /// Channel `room-N`.
    Channel(u8),
    /// Ticket `T-N`.
    Ticket(u8),
}

impl ModelTarget {
    /// Login/bind target for the real controller.
    pub fn to_target(self) -> Target {
        match self {
            Self::Channel(n) => Target::Channel(channel_name(n)),
            Self::Ticket(n) => Target::Ticket(ticket_id(n)),
        }
    }

    /// Bound scope as the real controller reports it.
    pub fn to_scope(self) -> Scope {
        match self {
            Self::Channel(n) => Scope::Channel(channel_name(n)),
            Self::Ticket(n) => Scope::Ticket(ticket_id(n)),
        }
    }
}

/// Channel name for slot `n`.
pub fn channel_name(n: u8) -> String {
    format!("room-{n}")
}

/// Ticket id for slot `n`.
pub fn ticket_id(n: u8) -> TicketId {
    TicketId::new(format!("T-{n}"))
}

/// Username for a login slot.
pub fn username(user: u8) -> &'static str {
    USERNAMES[usize::from(user) % USERNAMES.len()]
}

/// Id of an incoming message slot.
pub fn message_id(slot: u8) -> String {
    format!("m-{}", slot % MESSAGE_SLOTS)
}

/// Id the server assigns to an acknowledged send.
pub fn receipt_id(request: u64) -> String {
    format!("sent-{request}")
}

/// Input text with a known routing outcome.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub struct SmallText {
    /// Varies the content.
    pub seed: u8,
    /// Selects the [`TextShape`].
    pub shape: u8,
}

/// How a [`SmallText`] routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextShape {
    /// Nothing but whitespace; rejected.
    Blank,
    /// Plain broadcast.
    Broadcast,
    /// Whisper to `bobby`.
    Whisper,
    /// Looks like a whisper but the recipient is too short, so it broadcasts.
    ShortRecipient,
}

impl SmallText {
    /// Routing outcome.
    pub fn shape(self) -> TextShape {
        match self.shape % 4 {
            0 => TextShape::Blank,
            1 => TextShape::Broadcast,
            2 => TextShape::Whisper,
            _ => TextShape::ShortRecipient,
        }
    }

    /// Expand to the typed text.
    pub fn render(self) -> String {
        match self.shape() {
            TextShape::Blank => " ".repeat(usize::from(self.seed % 3)),
            TextShape::Broadcast => format!("hello {}", self.seed),
            TextShape::Whisper => format!("/w bobby psst {}", self.seed),
            TextShape::ShortRecipient => format!("/w bob hi {}", self.seed),
        }
    }

    /// Whether sending this text produces a whisper.
    pub fn is_whisper(self) -> bool {
        self.shape() == TextShape::Whisper
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Accepted (including events the session ignores).
    Ok,
    /// Refused.
    Error(OperationError),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}

/// Why an intent was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Login while a login is in flight.
    AlreadyConnecting,
    /// Login while connected or reconnecting.
    AlreadyConnected,
    /// The intent needs a connected session.
    NotConnected,
    /// Connected but nothing bound.
    NoScope,
    /// Blank input, blank username, or a send already in flight.
    Invalid,
    /// Any other refusal. The model never produces this.
    Unexpected,
}
