//! Model session state machine.
//!
//! Tracks the lifecycle, the bound scope, the message ids a session has
//! accepted and the input box. No transport, no timestamps, no notifications.

use std::collections::HashSet;

use parley_client::SessionStatus;

use super::operation::{
    ModelTarget, OperationError, OperationResult, SmallText, TextShape, receipt_id,
};

/// Message in the model: identity and classification only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    /// Message id.
    pub id: String,
    /// Whether it went to the whisper sequence.
    pub whisper: bool,
}

#[derive(Debug, Clone)]
struct ModelLive {
    username: String,
    target: ModelTarget,
    scope: Option<ModelTarget>,
    pending: Option<ModelTarget>,
}

impl ModelLive {
    fn ingest_scope(&self) -> Option<ModelTarget> {
        self.scope.or(self.pending)
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    request: u64,
    whisper: bool,
    scope: ModelTarget,
}

/// Model session.
#[derive(Debug, Clone)]
pub struct ModelSession {
    status: SessionStatus,
    live: Option<ModelLive>,
    has_error: bool,
    messages: Vec<ModelMessage>,
    ids: HashSet<String>,
    draft: Option<SmallText>,
    focused: bool,
    in_flight: Option<InFlight>,
    next_request: u64,
}

impl ModelSession {
    /// A disconnected session.
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            live: None,
            has_error: false,
            messages: Vec::new(),
            ids: HashSet::new(),
            draft: None,
            focused: false,
            in_flight: None,
            next_request: 0,
        }
    }

    /// Lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Whether a connection is live.
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Logged-in username.
    pub fn username(&self) -> Option<&str> {
        self.live.as_ref().map(|l| l.username.as_str())
    }

    /// Bound scope.
    pub fn scope(&self) -> Option<ModelTarget> {
        self.live.as_ref().and_then(|l| l.scope)
    }

    /// Scope action in flight.
    pub fn pending(&self) -> Option<ModelTarget> {
        self.live.as_ref().and_then(|l| l.pending)
    }

    /// Whether an error is on display.
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Accepted messages in insertion order.
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// Input box text.
    pub fn input(&self) -> String {
        self.draft.map(SmallText::render).unwrap_or_default()
    }

    /// Whether focus was returned after a send.
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Whether a send is in flight.
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a login.
    pub fn login(&mut self, username: &str, target: ModelTarget) -> OperationResult {
        match self.status {
            SessionStatus::Connecting => {
                return OperationResult::Error(OperationError::AlreadyConnecting);
            },
            SessionStatus::Connected | SessionStatus::Reconnecting => {
                return OperationResult::Error(OperationError::AlreadyConnected);
            },
            SessionStatus::Disconnected | SessionStatus::Error => {},
        }
        if username.trim().is_empty() {
            return OperationResult::Error(OperationError::Invalid);
        }

        self.clear_session_data();
        self.has_error = false;
        self.status = SessionStatus::Connecting;
        self.live = Some(ModelLive {
            username: username.to_string(),
            target,
            scope: None,
            pending: None,
        });
        OperationResult::Ok
    }

    /// Log out from any state.
    pub fn logout(&mut self) {
        self.reset(SessionStatus::Disconnected, false);
    }

    /// Bind another target. Returns the scope action issued.
    pub fn bind(&mut self, target: ModelTarget) -> Result<ModelTarget, OperationError> {
        if self.status != SessionStatus::Connected {
            return Err(OperationError::NotConnected);
        }
        let live = self.live.as_mut().ok_or(OperationError::NotConnected)?;

        live.target = target;
        live.pending = Some(target);
        Ok(target)
    }

    /// Handshake completed. Returns the scope action issued, if any.
    pub fn connected(&mut self) -> Option<ModelTarget> {
        if !matches!(self.status, SessionStatus::Connecting | SessionStatus::Reconnecting) {
            return None;
        }
        let live = self.live.as_mut()?;
        self.status = SessionStatus::Connected;

        match (live.scope, live.pending) {
            (Some(ModelTarget::Channel(n)), _) => {
                live.pending = Some(ModelTarget::Channel(n));
                live.pending
            },
            (Some(ModelTarget::Ticket(_)), _) | (None, Some(_)) => None,
            (None, None) => {
                live.pending = Some(live.target);
                live.pending
            },
        }
    }

    /// Link lost.
    pub fn reconnecting(&mut self) {
        if self.status == SessionStatus::Connected {
            self.status = SessionStatus::Reconnecting;
        }
    }

    /// Connection ended by the server.
    pub fn disconnected(&mut self) {
        if self.is_live() {
            self.reset(SessionStatus::Disconnected, true);
        }
    }

    /// Transport error or failed connect.
    pub fn failed(&mut self) {
        if self.is_live() {
            self.reset(SessionStatus::Error, true);
        }
    }

    /// Result of the scope action for `target`. Returns the channel whose
    /// history is fetched next.
    pub fn scope_result(&mut self, target: ModelTarget, ok: bool) -> Option<u8> {
        let live = self.live.as_mut()?;
        if live.pending != Some(target) {
            return None;
        }

        if !ok {
            live.pending = None;
            self.has_error = true;
            // A failed ticket switch also drops the ticket bound before it.
            if matches!(target, ModelTarget::Ticket(_)) && live.scope.take().is_some() {
                self.messages.clear();
                self.ids.clear();
            }
            return None;
        }

        if live.scope.is_some_and(|current| current != target) {
            self.messages.clear();
            self.ids.clear();
        }
        live.pending = None;
        live.scope = Some(target);
        self.has_error = false;

        match target {
            ModelTarget::Channel(n) => Some(n),
            ModelTarget::Ticket(_) => None,
        }
    }

    /// History batch for `channel`, newest first.
    pub fn history(&mut self, channel: u8, batch: &[String]) {
        let bound = self.scope() == Some(ModelTarget::Channel(channel));
        if !bound {
            return;
        }
        for id in batch.iter().rev() {
            self.ingest(id, false);
        }
    }

    /// Message pushed by the server. Broadcasts posted `elsewhere` belong to
    /// a scope the session never bound.
    pub fn incoming(&mut self, id: &str, whisper: bool, elsewhere: bool) {
        if !whisper && elsewhere {
            return;
        }
        if self.live.as_ref().and_then(ModelLive::ingest_scope).is_some() {
            self.ingest(id, whisper);
        }
    }

    /// Replace the input text unless a send is in flight.
    pub fn edit(&mut self, text: SmallText) {
        if self.in_flight.is_none() {
            self.draft = Some(text);
        }
    }

    /// Send the input. Returns the request id.
    pub fn submit(&mut self) -> Result<u64, OperationError> {
        if self.status != SessionStatus::Connected {
            return Err(OperationError::NotConnected);
        }
        let Some(scope) = self.scope() else {
            return Err(OperationError::NoScope);
        };
        let Some(text) = self.draft.filter(|t| t.shape() != TextShape::Blank) else {
            return Err(OperationError::Invalid);
        };
        if self.in_flight.is_some() {
            return Err(OperationError::Invalid);
        }

        let request = self.next_request;
        self.next_request += 1;
        self.focused = false;
        self.in_flight = Some(InFlight { request, whisper: text.is_whisper(), scope });
        Ok(request)
    }

    /// Acknowledgment of `request`.
    pub fn send_result(&mut self, request: u64, ok: bool) {
        let Some(in_flight) = self.in_flight.filter(|f| f.request == request) else {
            return;
        };
        self.in_flight = None;
        if !ok {
            return;
        }

        self.draft = None;
        self.focused = true;
        if self.scope() == Some(in_flight.scope) {
            self.ingest(&receipt_id(request), in_flight.whisper);
        }
    }

    fn ingest(&mut self, id: &str, whisper: bool) {
        if self.ids.insert(id.to_string()) {
            self.messages.push(ModelMessage { id: id.to_string(), whisper });
        }
    }

    fn clear_session_data(&mut self) {
        self.messages.clear();
        self.ids.clear();
        self.draft = None;
        self.focused = false;
        self.in_flight = None;
    }

    fn reset(&mut self, status: SessionStatus, has_error: bool) {
        self.live = None;
        self.clear_session_data();
        self.status = status;
        self.has_error = has_error;
    }
}

impl Default for ModelSession {
    fn default() -> Self {
        Self::new()
    }
}
