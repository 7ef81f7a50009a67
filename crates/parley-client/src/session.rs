//! Session controller.
//!
//! Owns one logical session: connection status, the transport instance tag,
//! identity, bound scope, message ledger and input box. A pure state machine:
//! [`SessionController::handle`] consumes one [`SessionEvent`] and returns the
//! [`SessionAction`]s the driver must execute.
//!
//! # State Machine
//!
//! ```text
//! Disconnected|Error --login--> Connecting --Connected--> Connected
//!                                   |                      |    ^
//!                            ConnectFailed          Reconnecting|Connected
//!                                   v                      v    |
//!                                 Error               Reconnecting
//! any --logout--> Disconnected
//! any live --Disconnected(reason)--> Disconnected
//! any live --Error(reason)--> Error
//! ```
//!
//! # Invariants
//!
//! - Single connection: at most one live [`ConnectionId`]; events and
//!   completions tagged with any other id are dropped
//! - Single flight: a login while connecting or connected is refused
//! - Clean reset: leaving the live states clears identity, scope, ledger and
//!   input
//! - Scoped view: the ledger only holds messages of the bound scope (or of the
//!   pending one before anything is bound); switching away issues a
//!   [`SessionAction::Leave`] for the old scope

use parley_core::{
    ConnectionId, Environment, Identity, InboundMessage, Message, MessageKind, MessageLedger,
    Outbound, Scope, SendReceipt, Target, TransportError, TransportEvent, WhisperRouter,
};

use crate::{
    composer::Composer,
    error::{ErrorCategory, SessionError},
    event::{
        Completion, Notification, RequestId, SendRequest, SendRoute, SessionAction, SessionEvent,
    },
    snapshot::{DisplayMessage, SessionSnapshot},
};

/// Reason recorded when the transport drops without one.
const DEFAULT_DISCONNECT_REASON: &str = "Disconnected from server";

/// Connection status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// No transport instance.
    Disconnected,
    /// Login issued, handshake pending.
    Connecting,
    /// Handshake done.
    Connected,
    /// Link lost, the transport is re-establishing it.
    Reconnecting,
    /// Last attempt or connection failed. A new login is allowed.
    Error,
}

impl SessionStatus {
    /// Whether a transport instance is live.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

/// State that exists only while a transport instance is live.
#[derive(Debug, Clone)]
pub(crate) struct Live {
    /// Tag of the live instance.
    pub(crate) conn: ConnectionId,
    pub(crate) identity: Identity,
    /// Most recently requested channel or ticket.
    pub(crate) target: Target,
    /// Scope confirmed by the server.
    pub(crate) scope: Option<Scope>,
    /// Scope action in flight.
    pub(crate) pending: Option<Target>,
}

impl Live {
    /// Whether a message posted to `scope` belongs in the ledger.
    ///
    /// Until a scope is bound, messages for the pending channel or ticket are
    /// kept so pushes racing the join result are not lost.
    fn accepts(&self, scope: &Scope) -> bool {
        match &self.scope {
            Some(bound) => bound == scope,
            None => self.pending.as_ref().and_then(Target::scope).as_ref() == Some(scope),
        }
    }

    /// Scope whispers are filed under.
    fn whisper_scope(&self) -> Option<Scope> {
        self.scope.clone().or_else(|| self.pending.as_ref().and_then(Target::scope))
    }
}

/// Session state machine.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time/randomness
pub struct SessionController<E: Environment> {
    env: E,
    pub(crate) status: SessionStatus,
    pub(crate) live: Option<Live>,
    pub(crate) last_error: Option<String>,
    pub(crate) ledger: MessageLedger,
    composer: Composer,
    next_conn: ConnectionId,
    next_request: u64,
}

impl<E: Environment> SessionController<E> {
    /// Create a disconnected session.
    pub fn new(env: E) -> Self {
        Self {
            env,
            status: SessionStatus::Disconnected,
            live: None,
            last_error: None,
            ledger: MessageLedger::new(),
            composer: Composer::new(),
            next_conn: ConnectionId::new(1),
            next_request: 1,
        }
    }

    /// Connection status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Tag of the live transport instance.
    pub fn conn(&self) -> Option<ConnectionId> {
        self.live.as_ref().map(|l| l.conn)
    }

    /// Identity of the live session.
    pub fn identity(&self) -> Option<&Identity> {
        self.live.as_ref().map(|l| &l.identity)
    }

    /// Bound channel or ticket.
    pub fn scope(&self) -> Option<&Scope> {
        self.live.as_ref().and_then(|l| l.scope.as_ref())
    }

    /// Last error or disconnect reason.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Message ledger.
    pub fn ledger(&self) -> &MessageLedger {
        &self.ledger
    }

    /// Input box.
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Whether the session is connected and bound to a scope.
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Connected && self.scope().is_some()
    }

    /// Project the current state for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            username: self.identity().map(|i| i.username.clone()),
            scope: self.scope().cloned(),
            last_error: self.last_error.clone(),
            messages: self.ledger.merged_view().map(DisplayMessage::from).collect(),
            input: self.composer.text().to_string(),
            input_focused: self.composer.is_focused(),
            sending: self.composer.is_sending(),
        }
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when a user intent is refused. State is left
    /// unchanged in that case.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        match event {
            SessionEvent::Login { identity, target } => self.handle_login(identity, target),
            SessionEvent::Logout => Ok(self.handle_logout()),
            SessionEvent::Bind { target } => self.handle_bind(target),
            SessionEvent::EditInput(text) => {
                self.composer.set_text(text);
                Ok(Vec::new())
            },
            SessionEvent::Submit => self.handle_submit(),
            SessionEvent::Transport { conn, event } => {
                if !self.is_current(conn) {
                    tracing::debug!(%conn, ?event, "event from superseded connection dropped");
                    return Ok(Vec::new());
                }
                Ok(self.handle_transport(event))
            },
            SessionEvent::Completed { conn, completion } => {
                if !self.is_current(conn) {
                    tracing::debug!(%conn, ?completion, "completion from superseded connection dropped");
                    return Ok(Vec::new());
                }
                Ok(self.handle_completion(completion))
            },
        }
    }

    fn is_current(&self, conn: ConnectionId) -> bool {
        self.live.as_ref().is_some_and(|l| l.conn == conn)
    }

    fn handle_login(
        &mut self,
        identity: Identity,
        target: Target,
    ) -> Result<Vec<SessionAction>, SessionError> {
        match self.status {
            SessionStatus::Connecting => return Err(SessionError::AlreadyConnecting),
            SessionStatus::Connected | SessionStatus::Reconnecting => {
                return Err(SessionError::AlreadyConnected);
            },
            SessionStatus::Disconnected | SessionStatus::Error => {},
        }

        identity.validate()?;
        target.validate()?;

        let conn = self.next_conn;
        self.next_conn = conn.next();

        tracing::info!(%conn, username = %identity.username, ?target, "login started");

        self.ledger.clear();
        self.composer.reset();
        self.last_error = None;
        self.status = SessionStatus::Connecting;
        self.live =
            Some(Live { conn, identity: identity.clone(), target, scope: None, pending: None });

        Ok(vec![SessionAction::Connect { conn, identity }])
    }

    fn handle_logout(&mut self) -> Vec<SessionAction> {
        let actions: Vec<_> =
            self.live.as_ref().map(|l| SessionAction::Disconnect { conn: l.conn }).into_iter().collect();

        tracing::info!(status = ?self.status, "logged out");
        self.reset(SessionStatus::Disconnected, None);
        actions
    }

    fn handle_bind(&mut self, target: Target) -> Result<Vec<SessionAction>, SessionError> {
        target.validate()?;

        if self.status != SessionStatus::Connected {
            return Err(SessionError::NotConnected { status: self.status });
        }
        let Some(live) = self.live.as_mut() else {
            return Err(SessionError::NotConnected { status: self.status });
        };
        if matches!(live.pending, Some(Target::NewTicket(_))) {
            return Err(SessionError::TicketCreationPending);
        }

        live.target = target.clone();
        Ok(self.resolve_target(target))
    }

    fn handle_submit(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.status != SessionStatus::Connected {
            return Err(SessionError::NotConnected { status: self.status });
        }
        let Some(live) = self.live.as_ref() else {
            return Err(SessionError::NotConnected { status: self.status });
        };
        let Some(scope) = live.scope.as_ref() else {
            return Err(SessionError::NoScope);
        };

        let route = match (WhisperRouter::route(self.composer.text())?, scope) {
            (Outbound::Whisper { recipient, content }, _) => SendRoute::Whisper { recipient, content },
            (Outbound::Broadcast { content }, Scope::Channel(channel)) => {
                SendRoute::Channel { channel: channel.clone(), content }
            },
            (Outbound::Broadcast { content }, Scope::Ticket(ticket_id)) => {
                SendRoute::Ticket { ticket_id: ticket_id.clone(), content }
            },
        };

        let conn = live.conn;
        let request = SendRequest { id: RequestId(self.next_request), route, scope: scope.clone() };
        self.composer.begin_send(request.clone())?;
        self.next_request += 1;

        tracing::debug!(%conn, request = request.id.0, whisper = request.route.is_whisper(), "send issued");
        Ok(vec![SessionAction::Send { conn, request }])
    }

    fn handle_transport(&mut self, event: TransportEvent) -> Vec<SessionAction> {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Reconnecting => self.on_reconnecting(),
            TransportEvent::Disconnected { reason } => self.on_disconnected(reason),
            TransportEvent::MessageReceived { scope, message } => self.on_broadcast(scope, message),
            TransportEvent::WhisperReceived(inbound) => self.on_whisper(inbound),
            TransportEvent::TicketCreated(ticket_id) => self.on_ticket_pushed(ticket_id),
            TransportEvent::Error(reason) => self.on_transport_error(reason),
        }
    }

    fn handle_completion(&mut self, completion: Completion) -> Vec<SessionAction> {
        match completion {
            Completion::ConnectFailed(err) => self.on_connect_failed(err),
            Completion::ChannelJoined { channel, result } => self.on_channel_joined(channel, result),
            Completion::HistoryFetched { channel, result } => self.on_history(channel, result),
            Completion::TicketFetched { ticket_id, result } => {
                self.on_ticket_fetched(ticket_id, result)
            },
            Completion::TicketCreated(result) => self.on_ticket_created(result),
            Completion::SendCompleted { request, result } => self.on_send_completed(request, result),
        }
    }

    fn on_connected(&mut self) -> Vec<SessionAction> {
        let previous = self.status;
        if !matches!(previous, SessionStatus::Connecting | SessionStatus::Reconnecting) {
            tracing::debug!(status = ?previous, "connected event ignored");
            return Vec::new();
        }
        let Some(live) = self.live.as_mut() else {
            return Vec::new();
        };

        self.status = SessionStatus::Connected;
        let conn = live.conn;
        let mut actions = Vec::new();

        if previous == SessionStatus::Connecting {
            tracing::info!(%conn, username = %live.identity.username, "connected");
            actions.push(SessionAction::Notify(Notification::success(format!(
                "Welcome {}!",
                live.identity.username
            ))));
        } else {
            tracing::info!(%conn, "reconnected");
            actions.push(SessionAction::Notify(Notification::info("Reconnected")));
        }

        match (live.scope.clone(), live.pending.is_some()) {
            (Some(Scope::Channel(channel)), _) => {
                live.pending = Some(Target::Channel(channel.clone()));
                actions.push(SessionAction::JoinChannel { conn, channel });
            },
            (Some(Scope::Ticket(_)), _) | (None, true) => {},
            (None, false) => {
                let target = live.target.clone();
                actions.extend(self.resolve_target(target));
            },
        }

        actions
    }

    fn on_reconnecting(&mut self) -> Vec<SessionAction> {
        if self.status == SessionStatus::Connected {
            tracing::warn!(conn = ?self.conn(), "link lost, reconnecting");
            self.status = SessionStatus::Reconnecting;
        }
        Vec::new()
    }

    fn on_disconnected(&mut self, reason: Option<String>) -> Vec<SessionAction> {
        let reason = reason.unwrap_or_else(|| DEFAULT_DISCONNECT_REASON.to_string());
        let actions = self.retire();

        tracing::warn!(%reason, "disconnected");
        self.reset(SessionStatus::Disconnected, Some(reason));
        actions
    }

    fn on_transport_error(&mut self, reason: String) -> Vec<SessionAction> {
        let mut actions = self.retire();
        actions.push(SessionAction::Notify(Notification::error(
            ErrorCategory::Transport,
            format!("Connection error: {reason}"),
        )));

        tracing::error!(%reason, "transport error");
        self.reset(SessionStatus::Error, Some(reason));
        actions
    }

    fn on_connect_failed(&mut self, err: TransportError) -> Vec<SessionAction> {
        let mut actions = self.retire();
        let notification = if err.is_auth() {
            Notification::error(ErrorCategory::Auth, format!("Authentication failed: {err}"))
        } else {
            Notification::error(ErrorCategory::Transport, "Failed to connect to server")
        };
        actions.push(SessionAction::Notify(notification));

        tracing::warn!(error = %err, "connect failed");
        self.reset(SessionStatus::Error, Some(err.to_string()));
        actions
    }

    fn on_broadcast(&mut self, scope: Scope, inbound: InboundMessage) -> Vec<SessionAction> {
        let Some(live) = self.live.as_ref() else {
            return Vec::new();
        };
        if !live.accepts(&scope) {
            tracing::debug!(id = %inbound.id, %scope, "message for unbound scope dropped");
            return Vec::new();
        }

        let message = Message::from_inbound(inbound, &live.identity.username, scope);
        self.ledger.ingest(message, MessageKind::Broadcast);
        Vec::new()
    }

    fn on_whisper(&mut self, inbound: InboundMessage) -> Vec<SessionAction> {
        let Some(live) = self.live.as_ref() else {
            return Vec::new();
        };
        let Some(scope) = live.whisper_scope() else {
            tracing::debug!(id = %inbound.id, "whisper before scope bound dropped");
            return Vec::new();
        };

        let message = Message::from_inbound(inbound, &live.identity.username, scope);
        let notification = (!message.is_own).then(|| {
            Notification::info(format!("Whisper from {}: {}", message.sender, message.content))
        });

        if !self.ledger.ingest(message, MessageKind::Whisper) {
            return Vec::new();
        }
        notification.map(SessionAction::Notify).into_iter().collect()
    }

    fn on_channel_joined(
        &mut self,
        channel: String,
        result: Result<(), TransportError>,
    ) -> Vec<SessionAction> {
        let Some(live) = self.live.as_mut() else {
            return Vec::new();
        };
        if live.pending.as_ref() != Some(&Target::Channel(channel.clone())) {
            tracing::debug!(%channel, "stale join result ignored");
            return Vec::new();
        }
        let conn = live.conn;

        match result {
            Ok(()) => {
                tracing::info!(%conn, %channel, "channel joined");
                let mut actions = self.bind_scope(Scope::Channel(channel.clone()));
                actions.push(SessionAction::FetchHistory { conn, channel });
                actions
            },
            Err(err) => {
                live.pending = None;
                tracing::warn!(%conn, %channel, error = %err, "channel join failed");
                let text = format!("Failed to join channel {channel}");
                self.last_error = Some(text.clone());
                vec![SessionAction::Notify(Notification::error(ErrorCategory::Application, text))]
            },
        }
    }

    fn on_history(
        &mut self,
        channel: String,
        result: Result<Vec<InboundMessage>, TransportError>,
    ) -> Vec<SessionAction> {
        let Some(live) = self.live.as_ref() else {
            return Vec::new();
        };
        let scope = Scope::Channel(channel);
        if live.scope.as_ref() != Some(&scope) {
            tracing::debug!(%scope, "history for unbound scope ignored");
            return Vec::new();
        }

        match result {
            Ok(batch) => {
                let received = batch.len();
                let appended =
                    self.ledger.hydrate(batch, MessageKind::Broadcast, &live.identity.username, &scope);
                tracing::info!(%scope, received, appended, "history loaded");
                Vec::new()
            },
            Err(err) => {
                tracing::warn!(%scope, error = %err, "history fetch failed");
                vec![SessionAction::Notify(Notification::error(
                    ErrorCategory::Application,
                    "Failed to load channel history",
                ))]
            },
        }
    }

    fn on_send_completed(
        &mut self,
        request: RequestId,
        result: Result<SendReceipt, TransportError>,
    ) -> Vec<SessionAction> {
        let Some(finished) = self.composer.complete(request, result.is_ok()) else {
            tracing::debug!(request = request.0, "completion for unknown send ignored");
            return Vec::new();
        };

        match result {
            Ok(receipt) => {
                let Some(live) = self.live.as_ref() else {
                    return Vec::new();
                };

                if live.scope.as_ref() == Some(&finished.scope) {
                    let kind = if finished.route.is_whisper() {
                        MessageKind::Whisper
                    } else {
                        MessageKind::Broadcast
                    };
                    let message = Message {
                        id: receipt.message_id,
                        content: finished.route.content().to_string(),
                        sender: live.identity.username.clone(),
                        timestamp: receipt.timestamp.unwrap_or_else(|| self.env.now()),
                        is_own: true,
                        scope: finished.scope,
                    };
                    self.ledger.ingest(message, kind);
                } else {
                    tracing::debug!(
                        request = request.0,
                        scope = %finished.scope,
                        "acknowledged send belongs to a scope no longer bound"
                    );
                }

                tracing::debug!(request = request.0, "send acknowledged");
                vec![SessionAction::FocusInput]
            },
            Err(err) => {
                tracing::warn!(request = request.0, error = %err, "send failed");
                let category =
                    if err.is_auth() { ErrorCategory::Auth } else { ErrorCategory::Transport };
                vec![SessionAction::Notify(Notification::error(category, "Failed to send message"))]
            },
        }
    }

    /// Issue the action that binds `target` and mark it pending.
    pub(crate) fn resolve_target(&mut self, target: Target) -> Vec<SessionAction> {
        let Some(live) = self.live.as_mut() else {
            return Vec::new();
        };
        let conn = live.conn;
        live.pending = Some(target.clone());

        let action = match target {
            Target::Channel(channel) => SessionAction::JoinChannel { conn, channel },
            Target::Ticket(ticket_id) => SessionAction::FetchTicket { conn, ticket_id },
            Target::NewTicket(ticket) => SessionAction::CreateTicket { conn, ticket },
        };
        vec![action]
    }

    /// Confirm `scope`. Switching away from a different scope empties the
    /// ledger and leaves the old one.
    pub(crate) fn bind_scope(&mut self, scope: Scope) -> Vec<SessionAction> {
        let Some(live) = self.live.as_mut() else {
            return Vec::new();
        };

        let conn = live.conn;
        live.pending = None;
        self.last_error = None;
        match live.scope.replace(scope) {
            Some(previous) if live.scope.as_ref() != Some(&previous) => {
                self.ledger.clear();
                vec![SessionAction::Leave { conn, scope: previous }]
            },
            _ => Vec::new(),
        }
    }

    /// Drop the bound scope after a failed switch, leaving it on the
    /// transport.
    pub(crate) fn unbind_scope(&mut self) -> Vec<SessionAction> {
        let Some(live) = self.live.as_mut() else {
            return Vec::new();
        };

        live.pending = None;
        let Some(previous) = live.scope.take() else {
            return Vec::new();
        };
        self.ledger.clear();
        vec![SessionAction::Leave { conn: live.conn, scope: previous }]
    }

    /// Disconnect action for the live instance, if any.
    fn retire(&self) -> Vec<SessionAction> {
        self.conn().map(|conn| SessionAction::Disconnect { conn }).into_iter().collect()
    }

    fn reset(&mut self, status: SessionStatus, last_error: Option<String>) {
        self.live = None;
        self.ledger.clear();
        self.composer.reset();
        self.status = status;
        self.last_error = last_error;
    }
}
