//! In-process chat/support backend.
//!
//! [`MemoryBackend`] plays the server: it checks application credentials,
//! keeps channel history and tickets, and fans messages out to attached
//! clients through their [`EventSink`]s. Test code drives the "other side"
//! (other users, support agents, server restarts) through its methods and
//! injects failures with a [`FaultPlan`].
//!
//! Event order follows a typical hub server: `connect` fires
//! [`TransportEvent::Connected`] before returning, sends echo to the sender,
//! and `create_ticket` announces the new ticket before the call returns.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::{
    ConnectParams, Connector, EventSink, InboundMessage, MessageId, Scope, SendReceipt, Ticket,
    TicketId, TransportClient, TransportError, TransportEvent,
};

/// Backend operations a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    /// `connect`
    Connect,
    /// `join_channel`
    JoinChannel,
    /// `fetch_history`
    FetchHistory,
    /// Any of the three send calls.
    Send,
    /// `create_ticket`
    CreateTicket,
    /// `get_ticket`
    GetTicket,
    /// `disconnect`. A fault here makes the call hang instead of failing.
    Disconnect,
}

/// Failures the backend injects, per operation, until cleared.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    failures: HashMap<BackendOp, TransportError>,
}

impl FaultPlan {
    /// No faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail with `error`.
    pub fn fail(&mut self, op: BackendOp, error: TransportError) {
        self.failures.insert(op, error);
    }

    /// Let `op` succeed again.
    pub fn heal(&mut self, op: BackendOp) {
        self.failures.remove(&op);
    }

    /// Injected failure for `op`, if any.
    pub fn check(&self, op: BackendOp) -> Result<(), TransportError> {
        self.failures.get(&op).map_or(Ok(()), |e| Err(e.clone()))
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A client attached to the backend.
struct Attached {
    username: String,
    sink: EventSink,
    channels: HashSet<String>,
    tickets: HashSet<TicketId>,
}

struct StoredTicket {
    ticket: Ticket,
    messages: Vec<InboundMessage>,
}

struct BackendState {
    applications: HashMap<String, String>,
    channels: HashMap<String, Vec<InboundMessage>>,
    tickets: HashMap<TicketId, StoredTicket>,
    attached: HashMap<u64, Attached>,
    faults: FaultPlan,
    next_session: u64,
    next_message: u64,
    next_ticket: u64,
}

impl BackendState {
    fn next_message_id(&mut self) -> MessageId {
        self.next_message += 1;
        MessageId::new(format!("msg-{}", self.next_message))
    }

    /// Sinks of attached clients matching `filter`.
    fn sinks(&self, filter: impl Fn(&Attached) -> bool) -> Vec<EventSink> {
        self.attached.values().filter(|a| filter(a)).map(|a| a.sink.clone()).collect()
    }
}

/// In-process server shared by any number of clients.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
    clock: Clock,
}

impl MemoryBackend {
    /// Backend with no registered applications, stamping messages with the
    /// wall clock.
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Backend stamping messages with `clock`.
    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        let state = BackendState {
            applications: HashMap::new(),
            channels: HashMap::new(),
            tickets: HashMap::new(),
            attached: HashMap::new(),
            faults: FaultPlan::new(),
            next_session: 0,
            next_message: 0,
            next_ticket: 0,
        };
        Self { state: Arc::new(Mutex::new(state)), clock: Arc::new(clock) }
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept logins for `application_id` with `secret`.
    pub fn register_application(&self, application_id: &str, secret: &str) {
        self.state().applications.insert(application_id.to_string(), secret.to_string());
    }

    /// Connector building clients of this backend.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector { backend: self.clone() }
    }

    /// Inject or clear failures.
    pub fn with_faults<R>(&self, f: impl FnOnce(&mut FaultPlan) -> R) -> R {
        f(&mut self.state().faults)
    }

    /// Number of attached clients.
    pub fn attached_count(&self) -> usize {
        self.state().attached.len()
    }

    /// Replace a channel's stored history.
    pub fn seed_history(&self, channel: &str, messages: Vec<InboundMessage>) {
        self.state().channels.insert(channel.to_string(), messages);
    }

    /// Stored history of a channel, oldest first.
    pub fn history(&self, channel: &str) -> Vec<InboundMessage> {
        self.state().channels.get(channel).cloned().unwrap_or_default()
    }

    /// Metadata of a stored ticket.
    pub fn ticket(&self, ticket_id: &TicketId) -> Option<Ticket> {
        self.state().tickets.get(ticket_id).map(|t| t.ticket.clone())
    }

    /// Messages posted to a ticket, oldest first.
    pub fn ticket_messages(&self, ticket_id: &TicketId) -> Vec<InboundMessage> {
        self.state().tickets.get(ticket_id).map(|t| t.messages.clone()).unwrap_or_default()
    }

    /// Store a ticket created elsewhere.
    pub fn insert_ticket(&self, ticket: Ticket) {
        self.state()
            .tickets
            .insert(ticket.id.clone(), StoredTicket { ticket, messages: Vec::new() });
    }

    /// Another user posts to a channel.
    pub fn post_to_channel(&self, channel: &str, sender: &str, content: &str) -> InboundMessage {
        let timestamp = (self.clock)();
        let (message, sinks) = {
            let mut state = self.state();
            let message = InboundMessage {
                id: state.next_message_id(),
                content: content.to_string(),
                sender: sender.to_string(),
                timestamp,
            };
            state.channels.entry(channel.to_string()).or_default().push(message.clone());
            let sinks = state.sinks(|a| a.channels.contains(channel));
            (message, sinks)
        };

        let scope = Scope::Channel(channel.to_string());
        for sink in sinks {
            sink.emit(TransportEvent::MessageReceived {
                scope: scope.clone(),
                message: message.clone(),
            });
        }
        message
    }

    /// Another user whispers to `recipient`.
    pub fn whisper(&self, sender: &str, recipient: &str, content: &str) -> InboundMessage {
        let timestamp = (self.clock)();
        let (message, sinks) = {
            let mut state = self.state();
            let message = InboundMessage {
                id: state.next_message_id(),
                content: content.to_string(),
                sender: sender.to_string(),
                timestamp,
            };
            let sinks = state.sinks(|a| a.username == recipient);
            (message, sinks)
        };

        for sink in sinks {
            sink.emit(TransportEvent::WhisperReceived(message.clone()));
        }
        message
    }

    /// A support agent replies on a ticket.
    pub fn reply_to_ticket(
        &self,
        ticket_id: &TicketId,
        sender: &str,
        content: &str,
    ) -> Option<InboundMessage> {
        let timestamp = (self.clock)();
        let (message, sinks) = {
            let mut state = self.state();
            if !state.tickets.contains_key(ticket_id) {
                return None;
            }
            let message = InboundMessage {
                id: state.next_message_id(),
                content: content.to_string(),
                sender: sender.to_string(),
                timestamp,
            };
            if let Some(stored) = state.tickets.get_mut(ticket_id) {
                stored.messages.push(message.clone());
            }
            let sinks = state.sinks(|a| a.tickets.contains(ticket_id));
            (message, sinks)
        };

        let scope = Scope::Ticket(ticket_id.clone());
        for sink in sinks {
            sink.emit(TransportEvent::MessageReceived {
                scope: scope.clone(),
                message: message.clone(),
            });
        }
        Some(message)
    }

    /// Drop every client, as on a server restart.
    pub fn drop_all(&self, reason: Option<&str>) {
        let attached: Vec<Attached> = self.state().attached.drain().map(|(_, a)| a).collect();
        for client in attached {
            client.sink.emit(TransportEvent::Disconnected { reason: reason.map(str::to_string) });
        }
    }

    /// Interrupt every client's link; it recovers immediately.
    pub fn blip(&self) {
        let sinks = self.state().sinks(|_| true);
        for sink in sinks {
            sink.emit(TransportEvent::Reconnecting);
            sink.emit(TransportEvent::Connected);
        }
    }

    /// Fire a library-level error on every client and detach them.
    pub fn fail_all(&self, reason: &str) {
        let attached: Vec<Attached> = self.state().attached.drain().map(|(_, a)| a).collect();
        for client in attached {
            client.sink.emit(TransportEvent::Error(reason.to_string()));
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").field("attached", &self.attached_count()).finish()
    }
}

/// Builds [`MemoryClient`]s bound to one backend.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    backend: MemoryBackend,
}

impl Connector for MemoryConnector {
    type Client = MemoryClient;

    fn build(&self, params: ConnectParams, events: EventSink) -> MemoryClient {
        MemoryClient { backend: self.backend.clone(), params, events, session: Mutex::new(None) }
    }
}

/// One client instance attached to a [`MemoryBackend`].
pub struct MemoryClient {
    backend: MemoryBackend,
    params: ConnectParams,
    events: EventSink,
    session: Mutex<Option<u64>>,
}

impl MemoryClient {
    fn session(&self) -> Result<u64, TransportError> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or(TransportError::NotConnected)
    }

    /// Session key, checked against both the client and the backend side.
    fn attached(&self, state: &BackendState) -> Result<u64, TransportError> {
        let session = self.session()?;
        if !state.attached.contains_key(&session) {
            return Err(TransportError::NotConnected);
        }
        Ok(session)
    }

    fn receipt(message: &InboundMessage) -> SendReceipt {
        SendReceipt { message_id: message.id.clone(), timestamp: Some(message.timestamp) }
    }

    fn own_message(&self, state: &mut BackendState, content: &str) -> InboundMessage {
        InboundMessage {
            id: state.next_message_id(),
            content: content.to_string(),
            sender: self.params.identity.username.clone(),
            timestamp: (self.backend.clock)(),
        }
    }
}

#[async_trait]
impl TransportClient for MemoryClient {
    async fn connect(&self) -> Result<(), TransportError> {
        {
            let mut state = self.backend.state();
            state.faults.check(BackendOp::Connect)?;

            let identity = &self.params.identity;
            match state.applications.get(&identity.application_id) {
                Some(secret) if *secret == identity.application_secret => {},
                _ => {
                    return Err(TransportError::Unauthorized(
                        "invalid application credentials".to_string(),
                    ));
                },
            }

            state.next_session += 1;
            let session = state.next_session;
            state.attached.insert(session, Attached {
                username: identity.username.clone(),
                sink: self.events.clone(),
                channels: HashSet::new(),
                tickets: HashSet::new(),
            });
            *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);

            tracing::debug!(session, username = %identity.username, "memory client attached");
        }

        self.events.emit(TransportEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let hung = self.backend.state().faults.check(BackendOp::Disconnect).is_err();
        if hung {
            std::future::pending::<()>().await;
        }

        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(session) = session {
            self.backend.state().attached.remove(&session);
        }
        Ok(())
    }

    async fn join_channel(&self, channel: &str) -> Result<(), TransportError> {
        let mut state = self.backend.state();
        let session = self.attached(&state)?;
        state.faults.check(BackendOp::JoinChannel)?;

        state.channels.entry(channel.to_string()).or_default();
        if let Some(attached) = state.attached.get_mut(&session) {
            attached.channels.insert(channel.to_string());
        }
        Ok(())
    }

    async fn leave(&self, scope: &Scope) -> Result<(), TransportError> {
        let mut state = self.backend.state();
        let session = self.attached(&state)?;

        if let Some(attached) = state.attached.get_mut(&session) {
            match scope {
                Scope::Channel(channel) => {
                    attached.channels.remove(channel);
                },
                Scope::Ticket(ticket_id) => {
                    attached.tickets.remove(ticket_id);
                },
            }
        }
        Ok(())
    }

    async fn fetch_history(&self, channel: &str) -> Result<Vec<InboundMessage>, TransportError> {
        let state = self.backend.state();
        self.attached(&state)?;
        state.faults.check(BackendOp::FetchHistory)?;

        // Newest first, like the hub's history endpoint.
        let mut history = state.channels.get(channel).cloned().unwrap_or_default();
        history.reverse();
        Ok(history)
    }

    async fn send_broadcast(
        &self,
        content: &str,
        channel: &str,
    ) -> Result<SendReceipt, TransportError> {
        let (message, sinks) = {
            let mut state = self.backend.state();
            self.attached(&state)?;
            state.faults.check(BackendOp::Send)?;

            let message = self.own_message(&mut state, content);
            state.channels.entry(channel.to_string()).or_default().push(message.clone());
            (message, state.sinks(|a| a.channels.contains(channel)))
        };

        let scope = Scope::Channel(channel.to_string());
        for sink in sinks {
            sink.emit(TransportEvent::MessageReceived {
                scope: scope.clone(),
                message: message.clone(),
            });
        }
        Ok(Self::receipt(&message))
    }

    async fn send_whisper(
        &self,
        content: &str,
        recipient: &str,
    ) -> Result<SendReceipt, TransportError> {
        let (message, sinks) = {
            let mut state = self.backend.state();
            let session = self.attached(&state)?;
            state.faults.check(BackendOp::Send)?;

            let message = self.own_message(&mut state, content);
            let mut sinks = state.sinks(|a| a.username == recipient);
            if let Some(own) = state.attached.get(&session) {
                sinks.push(own.sink.clone());
            }
            (message, sinks)
        };

        for sink in sinks {
            sink.emit(TransportEvent::WhisperReceived(message.clone()));
        }
        Ok(Self::receipt(&message))
    }

    async fn send_ticket_message(
        &self,
        ticket_id: &TicketId,
        content: &str,
    ) -> Result<SendReceipt, TransportError> {
        let (message, sinks) = {
            let mut state = self.backend.state();
            self.attached(&state)?;
            state.faults.check(BackendOp::Send)?;
            if !state.tickets.contains_key(ticket_id) {
                return Err(TransportError::Rejected(format!("unknown ticket {ticket_id}")));
            }

            let message = self.own_message(&mut state, content);
            if let Some(stored) = state.tickets.get_mut(ticket_id) {
                stored.messages.push(message.clone());
            }
            (message, state.sinks(|a| a.tickets.contains(ticket_id)))
        };

        let scope = Scope::Ticket(ticket_id.clone());
        for sink in sinks {
            sink.emit(TransportEvent::MessageReceived {
                scope: scope.clone(),
                message: message.clone(),
            });
        }
        Ok(Self::receipt(&message))
    }

    async fn create_ticket(
        &self,
        topic: &str,
        description: &str,
    ) -> Result<TicketId, TransportError> {
        let ticket_id = {
            let mut state = self.backend.state();
            let session = self.attached(&state)?;
            state.faults.check(BackendOp::CreateTicket)?;

            state.next_ticket += 1;
            let ticket_id = TicketId::new(format!("T-{}", state.next_ticket));
            let ticket = Ticket {
                id: ticket_id.clone(),
                topic: topic.to_string(),
                description: description.to_string(),
                created_by: self.params.identity.username.clone(),
            };
            state.tickets.insert(ticket_id.clone(), StoredTicket { ticket, messages: Vec::new() });
            if let Some(attached) = state.attached.get_mut(&session) {
                attached.tickets.insert(ticket_id.clone());
            }
            ticket_id
        };

        self.events.emit(TransportEvent::TicketCreated(ticket_id.clone()));
        Ok(ticket_id)
    }

    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, TransportError> {
        let mut state = self.backend.state();
        let session = self.attached(&state)?;
        state.faults.check(BackendOp::GetTicket)?;

        let ticket = state
            .tickets
            .get(ticket_id)
            .map(|t| t.ticket.clone())
            .ok_or_else(|| TransportError::Rejected(format!("unknown ticket {ticket_id}")))?;
        if let Some(attached) = state.attached.get_mut(&session) {
            attached.tickets.insert(ticket_id.clone());
        }
        Ok(ticket)
    }
}
