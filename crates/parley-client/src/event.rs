//! Events fed into the session controller and actions it produces.
//!
//! The controller never performs I/O. User intents, transport pushes and the
//! results of earlier actions all arrive as [`SessionEvent`]s through one
//! channel; the controller answers with [`SessionAction`]s for the driver to
//! execute.

use parley_core::{
    ConnectionId, Identity, InboundMessage, NewTicket, Scope, SendReceipt, Target, Ticket,
    TicketId, TransportError, TransportEvent,
};

use crate::error::ErrorCategory;

/// Identifies one outbound send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Where an outbound message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendRoute {
    /// Public message to a channel.
    Channel {
        /// Channel name.
        channel: String,
        /// Message text.
        content: String,
    },
    /// Private message to one user.
    Whisper {
        /// Recipient identifier.
        recipient: String,
        /// Message text.
        content: String,
    },
    /// Message to a support ticket.
    Ticket {
        /// Ticket identifier.
        ticket_id: TicketId,
        /// Message text.
        content: String,
    },
}

impl SendRoute {
    /// Message text.
    pub fn content(&self) -> &str {
        match self {
            Self::Channel { content, .. }
            | Self::Whisper { content, .. }
            | Self::Ticket { content, .. } => content,
        }
    }

    /// Whether this is a private send.
    pub fn is_whisper(&self) -> bool {
        matches!(self, Self::Whisper { .. })
    }
}

/// One outbound send awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Request identifier echoed in the completion.
    pub id: RequestId,
    /// Destination and text.
    pub route: SendRoute,
    /// Scope bound when the send was issued. The acknowledged message is
    /// only shown while this scope is still bound.
    pub scope: Scope,
}

/// Results of actions, posted back by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// `connect` failed.
    ConnectFailed(TransportError),
    /// `join_channel` finished.
    ChannelJoined {
        /// Channel that was joined.
        channel: String,
        /// Outcome.
        result: Result<(), TransportError>,
    },
    /// `fetch_history` finished.
    HistoryFetched {
        /// Channel the history belongs to.
        channel: String,
        /// Past messages in no guaranteed order.
        result: Result<Vec<InboundMessage>, TransportError>,
    },
    /// `get_ticket` finished.
    TicketFetched {
        /// Ticket that was requested.
        ticket_id: TicketId,
        /// Outcome.
        result: Result<Ticket, TransportError>,
    },
    /// `create_ticket` finished.
    TicketCreated(Result<TicketId, TransportError>),
    /// A send was acknowledged or failed.
    SendCompleted {
        /// Request that finished.
        request: RequestId,
        /// Outcome.
        result: Result<SendReceipt, TransportError>,
    },
}

/// Events processed by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User submitted the login form.
    Login {
        /// Who is logging in.
        identity: Identity,
        /// Channel or ticket to bind once connected.
        target: Target,
    },
    /// User logged out.
    Logout,
    /// Bind a different channel or ticket on the live connection.
    Bind {
        /// Channel or ticket to bind.
        target: Target,
    },
    /// User edited the input box.
    EditInput(String),
    /// User pressed send.
    Submit,
    /// Push from a transport client instance.
    Transport {
        /// Instance that fired the event.
        conn: ConnectionId,
        /// The push.
        event: TransportEvent,
    },
    /// Result of an earlier action.
    Completed {
        /// Instance the action ran against.
        conn: ConnectionId,
        /// The result.
        completion: Completion,
    },
}

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Something went right.
    Success,
    /// Informational.
    Info,
    /// Something failed.
    Error,
}

/// Toast/banner shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Error class for error notifications.
    pub category: Option<ErrorCategory>,
    /// Text shown to the user.
    pub text: String,
}

impl Notification {
    /// Success notification.
    pub fn success(text: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Success, category: None, text: text.into() }
    }

    /// Informational notification.
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Info, category: None, text: text.into() }
    }

    /// Error notification.
    pub fn error(category: ErrorCategory, text: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, category: Some(category), text: text.into() }
    }
}

/// Actions for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Build a transport client for `conn` and connect it.
    Connect {
        /// Tag for the new instance.
        conn: ConnectionId,
        /// Who is connecting.
        identity: Identity,
    },
    /// Tear down an instance. Bounded wait; completion is not reported.
    Disconnect {
        /// Instance to tear down.
        conn: ConnectionId,
    },
    /// Stop receiving a scope the session switched away from. Completion is
    /// not reported.
    Leave {
        /// Instance to use.
        conn: ConnectionId,
        /// Channel or ticket to leave.
        scope: Scope,
    },
    /// Join a channel.
    JoinChannel {
        /// Instance to use.
        conn: ConnectionId,
        /// Channel name.
        channel: String,
    },
    /// Fetch a channel's history.
    FetchHistory {
        /// Instance to use.
        conn: ConnectionId,
        /// Channel name.
        channel: String,
    },
    /// Fetch ticket metadata.
    FetchTicket {
        /// Instance to use.
        conn: ConnectionId,
        /// Ticket to fetch.
        ticket_id: TicketId,
    },
    /// Open a new ticket.
    CreateTicket {
        /// Instance to use.
        conn: ConnectionId,
        /// Topic and description.
        ticket: NewTicket,
    },
    /// Send a message.
    Send {
        /// Instance to use.
        conn: ConnectionId,
        /// What to send where.
        request: SendRequest,
    },
    /// Return focus to the input box.
    FocusInput,
    /// Show a notification.
    Notify(Notification),
}
