//! Fuzz target for the session state machine
//!
//! Prevent inconsistent session state under arbitrary event interleavings
//!
//! # Strategy
//!
//! - Event sequences: user intents, transport pushes and completions in any
//!   order, including for connections that were never live
//! - Hostile input: arbitrary usernames, channels, ticket ids and message text
//! - Both session kinds: chat and ticket-bound
//!
//! # Invariants
//!
//! - A refused intent leaves the snapshot untouched
//! - Events from a connection other than the live one change nothing
//! - `Connect` is only issued from Disconnected or Error, at most once per event
//! - No live connection means no identity, no scope, no messages, no send
//! - Message ids are unique and the merged view is ordered by timestamp
//! - NEVER panic

#![no_main]

use std::{collections::HashSet, time::Duration};

use arbitrary::Arbitrary;
use chrono::TimeDelta;
use libfuzzer_sys::fuzz_target;
use parley_client::{
    Completion, RequestId, SessionAction, SessionController, SessionError, SessionEvent,
    SessionStatus, TicketSessionController,
};
use parley_core::{
    ConnectionId, DeviceId, Environment, Identity, InboundMessage, MessageId, NewTicket, Scope,
    SendReceipt, Target, Ticket, TicketId, TransportError, TransportEvent,
};
use parley_harness::SimEnv;

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    Login { username: String, target: FuzzTarget },
    Logout,
    Bind(FuzzTarget),
    Edit(String),
    Submit,
    Transport { conn: u8, event: FuzzTransport },
    Completed { conn: u8, completion: FuzzCompletion },
    Advance { secs: u16 },
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzTarget {
    Channel(String),
    Ticket(String),
    NewTicket { topic: String, description: String },
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzTransport {
    Connected,
    Disconnected(Option<String>),
    Reconnecting,
    Message { scope: FuzzScope, message: FuzzMessage },
    Whisper(FuzzMessage),
    TicketCreated(String),
    Error(String),
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzScope {
    /// Whatever the session has bound, so messages can land.
    Bound,
    Channel(String),
    Ticket(String),
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzCompletion {
    ConnectFailed { auth: bool },
    ChannelJoined { channel: String, ok: bool },
    HistoryFetched { channel: String, batch: Option<Vec<FuzzMessage>> },
    TicketFetched { ticket_id: String, ok: bool },
    TicketCreated(Option<String>),
    SendCompleted { request: u8, receipt: Option<u8> },
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzMessage {
    id: u8,
    sender: String,
    content: String,
    offset_secs: i16,
}

/// Fuzz input.
#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    /// Run a ticket session instead of a chat session.
    support: bool,
    /// Seed for the environment.
    seed: u64,
    /// Event sequence to process.
    events: Vec<FuzzEvent>,
}

enum Machine {
    Chat(SessionController<SimEnv>),
    Support(TicketSessionController<SimEnv>),
}

impl Machine {
    fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        match self {
            Self::Chat(session) => session.handle(event),
            Self::Support(session) => session.handle(event),
        }
    }

    fn session(&self) -> &SessionController<SimEnv> {
        match self {
            Self::Chat(session) => session,
            Self::Support(session) => session.session(),
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let env = SimEnv::with_seed(input.seed);
    let mut machine = if input.support {
        Machine::Support(TicketSessionController::new(env.clone()))
    } else {
        Machine::Chat(SessionController::new(env.clone()))
    };

    for event in input.events {
        let before = machine.session().snapshot();
        let previous_status = before.status;
        let live = machine.session().conn();
        let bound = machine.session().scope().cloned();
        let Some(event) = build_event(event, live, bound, &env) else {
            continue;
        };
        let foreign = match &event {
            SessionEvent::Transport { conn, .. } | SessionEvent::Completed { conn, .. } => {
                Some(*conn) != live
            },
            _ => false,
        };

        match machine.handle(event) {
            Ok(actions) => {
                let connects = actions
                    .iter()
                    .filter(|a| matches!(a, SessionAction::Connect { .. }))
                    .count();
                assert!(connects <= 1, "more than one Connect for a single event");
                if connects == 1 {
                    assert!(
                        matches!(previous_status, SessionStatus::Disconnected | SessionStatus::Error),
                        "Connect issued from {previous_status:?}"
                    );
                }

                if foreign {
                    assert!(actions.is_empty(), "foreign event produced actions: {actions:?}");
                    assert_eq!(machine.session().snapshot(), before, "foreign event changed state");
                }
            },
            Err(_) => {
                assert_eq!(machine.session().snapshot(), before, "refused intent changed state");
            },
        }

        check_invariants(machine.session());
    }
});

fn conn_for(tag: u8, live: Option<ConnectionId>) -> ConnectionId {
    match (tag % 4, live) {
        (0, Some(conn)) => conn,
        _ => ConnectionId::new(u64::from(tag)),
    }
}

fn build_event(
    event: FuzzEvent,
    live: Option<ConnectionId>,
    bound: Option<Scope>,
    env: &SimEnv,
) -> Option<SessionEvent> {
    let event = match event {
        FuzzEvent::Login { username, target } => SessionEvent::Login {
            identity: Identity {
                username,
                application_id: "Demo01".to_string(),
                application_secret: "DemoSecret".to_string(),
                device_id: DeviceId::new("fuzz-device"),
            },
            target: build_target(target),
        },
        FuzzEvent::Logout => SessionEvent::Logout,
        FuzzEvent::Bind(target) => SessionEvent::Bind { target: build_target(target) },
        FuzzEvent::Edit(text) => SessionEvent::EditInput(text),
        FuzzEvent::Submit => SessionEvent::Submit,
        FuzzEvent::Transport { conn, event } => {
            let event = match event {
                FuzzTransport::Connected => TransportEvent::Connected,
                FuzzTransport::Disconnected(reason) => TransportEvent::Disconnected { reason },
                FuzzTransport::Reconnecting => TransportEvent::Reconnecting,
                FuzzTransport::Message { scope, message } => TransportEvent::MessageReceived {
                    scope: build_scope(scope, bound),
                    message: inbound(message, env),
                },
                FuzzTransport::Whisper(m) => TransportEvent::WhisperReceived(inbound(m, env)),
                FuzzTransport::TicketCreated(id) => TransportEvent::TicketCreated(TicketId::new(id)),
                FuzzTransport::Error(reason) => TransportEvent::Error(reason),
            };
            SessionEvent::Transport { conn: conn_for(conn, live), event }
        },
        FuzzEvent::Completed { conn, completion } => {
            let rejected = || TransportError::Rejected("fuzz".to_string());
            let completion = match completion {
                FuzzCompletion::ConnectFailed { auth } => Completion::ConnectFailed(if auth {
                    TransportError::Unauthorized("fuzz".to_string())
                } else {
                    TransportError::Unavailable("fuzz".to_string())
                }),
                FuzzCompletion::ChannelJoined { channel, ok } => Completion::ChannelJoined {
                    channel,
                    result: if ok { Ok(()) } else { Err(rejected()) },
                },
                FuzzCompletion::HistoryFetched { channel, batch } => Completion::HistoryFetched {
                    channel,
                    result: batch
                        .map(|b| b.into_iter().map(|m| inbound(m, env)).collect())
                        .ok_or_else(rejected),
                },
                FuzzCompletion::TicketFetched { ticket_id, ok } => {
                    let id = TicketId::new(ticket_id);
                    let result = if ok {
                        Ok(Ticket {
                            id: id.clone(),
                            topic: "topic".to_string(),
                            description: "description".to_string(),
                            created_by: "agent".to_string(),
                        })
                    } else {
                        Err(rejected())
                    };
                    Completion::TicketFetched { ticket_id: id, result }
                },
                FuzzCompletion::TicketCreated(id) => {
                    Completion::TicketCreated(id.map(TicketId::new).ok_or_else(rejected))
                },
                FuzzCompletion::SendCompleted { request, receipt } => Completion::SendCompleted {
                    request: RequestId(u64::from(request)),
                    result: receipt
                        .map(|id| SendReceipt {
                            message_id: MessageId::new(format!("m-{id}")),
                            timestamp: None,
                        })
                        .ok_or_else(rejected),
                },
            };
            SessionEvent::Completed { conn: conn_for(conn, live), completion }
        },
        FuzzEvent::Advance { secs } => {
            env.advance(Duration::from_secs(u64::from(secs)));
            return None;
        },
    };
    Some(event)
}

fn build_target(target: FuzzTarget) -> Target {
    match target {
        FuzzTarget::Channel(name) => Target::Channel(name),
        FuzzTarget::Ticket(id) => Target::Ticket(TicketId::new(id)),
        // Unvalidated; the controller must reject blank fields itself.
        FuzzTarget::NewTicket { topic, description } => {
            Target::NewTicket(NewTicket { topic, description })
        },
    }
}

fn build_scope(scope: FuzzScope, bound: Option<Scope>) -> Scope {
    match scope {
        FuzzScope::Bound => bound.unwrap_or_else(|| Scope::Channel("Global".to_string())),
        FuzzScope::Channel(name) => Scope::Channel(name),
        FuzzScope::Ticket(id) => Scope::Ticket(TicketId::new(id)),
    }
}

fn inbound(message: FuzzMessage, env: &SimEnv) -> InboundMessage {
    InboundMessage {
        id: MessageId::new(format!("m-{}", message.id)),
        content: message.content,
        sender: message.sender,
        timestamp: env.now() + TimeDelta::seconds(i64::from(message.offset_secs)),
    }
}

fn check_invariants(session: &SessionController<SimEnv>) {
    let snapshot = session.snapshot();

    assert_eq!(
        session.conn().is_some(),
        snapshot.status.is_live(),
        "connection tag and status disagree: {:?}",
        snapshot.status
    );

    if !snapshot.status.is_live() {
        assert!(snapshot.username.is_none(), "identity kept without a connection");
        assert!(snapshot.scope.is_none(), "scope kept without a connection");
        assert!(snapshot.messages.is_empty(), "messages kept without a connection");
        assert!(!snapshot.sending, "send in flight without a connection");
    }

    let mut ids = HashSet::new();
    for message in &snapshot.messages {
        assert!(ids.insert(message.id.clone()), "duplicate message id {}", message.id);
    }
    assert_eq!(session.ledger().len(), snapshot.messages.len());

    for pair in snapshot.messages.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp, "merged view out of order");
    }
}
