//! Transport contract.
//!
//! The chat/support client library owns the wire protocol, handshake signing
//! and wire-level reconnection. This module describes the capability set the
//! session core consumes from it:
//!
//! - [`TransportClient`]: suspending calls (connect, send, fetch, tickets)
//! - [`TransportEvent`]: pushes the library fires at arbitrary times
//! - [`EventSink`]: how a client instance reports those pushes, tagged with
//!   the [`ConnectionId`] of the instance so superseded connections can be
//!   recognised and dropped
//! - [`Connector`]: builds one client instance per login attempt

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    identity::Identity,
    message::{InboundMessage, MessageId},
    scope::{Scope, Ticket, TicketId},
};

/// Tag identifying one transport client instance.
///
/// Assigned by the session controller, strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw tag.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw tag value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The tag following this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Pushes fired by a transport client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; the client can send.
    Connected,
    /// The connection is gone, optionally with a server-supplied reason.
    Disconnected {
        /// Why the connection ended.
        reason: Option<String>,
    },
    /// The library lost the link and is re-establishing it.
    Reconnecting,
    /// Public channel or ticket message.
    MessageReceived {
        /// Channel or ticket the message was posted to.
        scope: Scope,
        /// The message.
        message: InboundMessage,
    },
    /// Private message.
    WhisperReceived(InboundMessage),
    /// The server announced a newly created ticket.
    TicketCreated(TicketId),
    /// Library-level error.
    Error(String),
}

/// Reports transport pushes for one client instance.
///
/// Every event is tagged with the instance's [`ConnectionId`].
#[derive(Clone)]
pub struct EventSink {
    conn: ConnectionId,
    forward: Arc<dyn Fn(ConnectionId, TransportEvent) -> bool + Send + Sync>,
}

impl EventSink {
    /// Create a sink that forwards tagged events to `forward`.
    ///
    /// `forward` returns `false` once the receiving side is gone.
    pub fn new(
        conn: ConnectionId,
        forward: impl Fn(ConnectionId, TransportEvent) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { conn, forward: Arc::new(forward) }
    }

    /// Connection this sink is bound to.
    pub fn conn(&self) -> ConnectionId {
        self.conn
    }

    /// Report an event. Returns `false` if nobody is listening anymore.
    pub fn emit(&self, event: TransportEvent) -> bool {
        (self.forward)(self.conn, event)
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").field("conn", &self.conn).finish_non_exhaustive()
    }
}

/// Server acknowledgment of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Identifier the server assigned to the message.
    pub message_id: MessageId,
    /// Server timestamp, when the library reports one.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Failures reported by transport calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Credentials, application id or secret were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The server could not be reached or the link dropped.
    #[error("server unavailable: {0}")]
    Unavailable(String),

    /// The server refused the request (unknown ticket, bad channel, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The call needs an established connection.
    #[error("not connected")]
    NotConnected,

    /// The call did not complete in time.
    #[error("timed out after {millis}ms")]
    Timeout {
        /// How long the caller waited.
        millis: u64,
    },
}

impl TransportError {
    /// Whether the failure is a credential problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Parameters for building a client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Server endpoint.
    pub server_url: String,
    /// Who is connecting.
    pub identity: Identity,
    /// Client platform label reported to the server.
    pub platform: String,
    /// Preferred language tag.
    pub language: String,
}

/// Capability set of a chat/support client instance.
///
/// Every method suspends until the server acknowledges or the call fails.
#[async_trait]
pub trait TransportClient: Send + Sync + 'static {
    /// Establish the connection. Success is also reported as
    /// [`TransportEvent::Connected`].
    async fn connect(&self) -> Result<(), TransportError>;

    /// Tear the connection down. Idempotent.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Subscribe to a channel's live messages.
    async fn join_channel(&self, channel: &str) -> Result<(), TransportError>;

    /// Stop receiving live messages of a channel or ticket. Idempotent.
    async fn leave(&self, scope: &Scope) -> Result<(), TransportError>;

    /// Past messages of a channel, in no guaranteed order.
    async fn fetch_history(&self, channel: &str) -> Result<Vec<InboundMessage>, TransportError>;

    /// Public message to a channel.
    async fn send_broadcast(
        &self,
        content: &str,
        channel: &str,
    ) -> Result<SendReceipt, TransportError>;

    /// Private message to one user.
    async fn send_whisper(
        &self,
        content: &str,
        recipient: &str,
    ) -> Result<SendReceipt, TransportError>;

    /// Message to a support ticket.
    async fn send_ticket_message(
        &self,
        ticket_id: &TicketId,
        content: &str,
    ) -> Result<SendReceipt, TransportError>;

    /// Open a ticket, returning its id.
    async fn create_ticket(
        &self,
        topic: &str,
        description: &str,
    ) -> Result<TicketId, TransportError>;

    /// Ticket metadata, failing for unknown ids.
    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, TransportError>;
}

/// Builds transport client instances.
pub trait Connector: Send + Sync + 'static {
    /// Client type produced.
    type Client: TransportClient;

    /// Construct a client for one login attempt. Must not perform I/O; the
    /// caller invokes [`TransportClient::connect`] separately.
    fn build(&self, params: ConnectParams, events: EventSink) -> Self::Client;
}
