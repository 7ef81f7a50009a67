//! Session controller scenarios.
//!
//! Drives the Sans-IO controllers directly: every transport push and action
//! result is fed in by hand, so each test pins the exact event order.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use chrono::{DateTime, Utc};
use parley_client::{
    Completion, ErrorCategory, NotificationLevel, SessionAction, SessionController, SessionError,
    SessionEvent, SessionStatus, TicketSessionController,
};
use parley_core::{
    ConnectionId, DeviceId, Environment, Identity, InboundMessage, MessageId, NewTicket, Scope,
    SendReceipt, Target, Ticket, TicketId, TransportError, TransportEvent,
};

struct ImmediateFuture;

impl Future for ImmediateFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        Poll::Ready(())
    }
}

#[derive(Clone)]
struct TestEnv;

impl Environment for TestEnv {
    fn now(&self) -> DateTime<Utc> {
        at(10_000)
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        ImmediateFuture
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = i as u8;
        }
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + chrono::Duration::seconds(secs)
}

fn identity(username: &str) -> Identity {
    Identity {
        username: username.to_string(),
        application_id: "Demo01".to_string(),
        application_secret: "DemoSecret".to_string(),
        device_id: DeviceId::new("device-1"),
    }
}

fn global() -> Target {
    Target::Channel("Global".to_string())
}

fn inbound(id: &str, sender: &str, secs: i64) -> InboundMessage {
    InboundMessage {
        id: MessageId::new(id),
        content: format!("content of {id}"),
        sender: sender.to_string(),
        timestamp: at(secs),
    }
}

fn posted(scope: Scope, message: InboundMessage) -> TransportEvent {
    TransportEvent::MessageReceived { scope, message }
}

fn in_global(message: InboundMessage) -> TransportEvent {
    posted(Scope::Channel("Global".to_string()), message)
}

fn push(
    session: &mut SessionController<TestEnv>,
    conn: ConnectionId,
    event: TransportEvent,
) -> Vec<SessionAction> {
    session.handle(SessionEvent::Transport { conn, event }).unwrap()
}

fn complete(
    session: &mut SessionController<TestEnv>,
    conn: ConnectionId,
    completion: Completion,
) -> Vec<SessionAction> {
    session.handle(SessionEvent::Completed { conn, completion }).unwrap()
}

fn notices(actions: &[SessionAction]) -> Vec<String> {
    actions
        .iter()
        .filter_map(|a| match a {
            SessionAction::Notify(n) => Some(n.text.clone()),
            _ => None,
        })
        .collect()
}

/// Login as alice to Global and walk through connect and join.
fn joined_global() -> (SessionController<TestEnv>, ConnectionId) {
    let mut session = SessionController::new(TestEnv);
    session.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    let conn = session.conn().unwrap();

    push(&mut session, conn, TransportEvent::Connected);
    complete(&mut session, conn, Completion::ChannelJoined {
        channel: "Global".to_string(),
        result: Ok(()),
    });
    (session, conn)
}

fn view_ids(session: &SessionController<TestEnv>) -> Vec<String> {
    session.ledger().merged_view().map(|e| e.message.id.to_string()).collect()
}

#[test]
fn connected_greets_and_joins_channel() {
    let mut session = SessionController::new(TestEnv);
    session.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    let conn = session.conn().unwrap();

    let actions = push(&mut session, conn, TransportEvent::Connected);

    assert_eq!(session.status(), SessionStatus::Connected);
    assert_eq!(notices(&actions), vec!["Welcome alice!"]);
    assert!(actions.contains(&SessionAction::JoinChannel { conn, channel: "Global".to_string() }));

    let actions = complete(&mut session, conn, Completion::ChannelJoined {
        channel: "Global".to_string(),
        result: Ok(()),
    });
    assert_eq!(actions, vec![SessionAction::FetchHistory { conn, channel: "Global".to_string() }]);
    assert_eq!(session.scope(), Some(&Scope::Channel("Global".to_string())));
    assert!(session.is_authenticated());
}

#[test]
fn history_out_of_order_is_displayed_in_time_order() {
    let (mut session, conn) = joined_global();

    complete(&mut session, conn, Completion::HistoryFetched {
        channel: "Global".to_string(),
        result: Ok(vec![inbound("t2", "bob", 2), inbound("t1", "bob", 1)]),
    });

    assert_eq!(view_ids(&session), vec!["t1", "t2"]);
}

#[test]
fn live_message_during_join_is_kept() {
    let mut session = SessionController::new(TestEnv);
    session.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    let conn = session.conn().unwrap();
    push(&mut session, conn, TransportEvent::Connected);

    push(&mut session, conn, in_global(inbound("early", "bob", 5)));
    complete(&mut session, conn, Completion::ChannelJoined {
        channel: "Global".to_string(),
        result: Ok(()),
    });
    complete(&mut session, conn, Completion::HistoryFetched {
        channel: "Global".to_string(),
        result: Ok(vec![inbound("early", "bob", 5), inbound("old", "bob", 1)]),
    });

    assert_eq!(view_ids(&session), vec!["old", "early"]);
}

#[test]
fn second_login_while_connecting_is_refused() {
    let mut session = SessionController::new(TestEnv);
    let first =
        session.handle(SessionEvent::Login { identity: identity("alice"), target: global() });
    let second =
        session.handle(SessionEvent::Login { identity: identity("alice"), target: global() });

    let connects = first
        .unwrap()
        .iter()
        .filter(|a| matches!(a, SessionAction::Connect { .. }))
        .count();
    assert_eq!(connects, 1);
    assert!(matches!(second, Err(SessionError::AlreadyConnecting)));
    assert_eq!(session.conn(), Some(ConnectionId::new(1)));
}

#[test]
fn login_while_connected_is_refused() {
    let (mut session, conn) = joined_global();

    let result =
        session.handle(SessionEvent::Login { identity: identity("alice"), target: global() });

    assert!(matches!(result, Err(SessionError::AlreadyConnected)));
    assert_eq!(session.conn(), Some(conn));
}

#[test]
fn logout_from_every_state_lands_disconnected_and_empty() {
    // Connecting
    let mut connecting = SessionController::new(TestEnv);
    connecting.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();

    // Connected with messages
    let (mut connected, conn) = joined_global();
    push(&mut connected, conn, in_global(inbound("m1", "bob", 1)));

    // Reconnecting
    let (mut reconnecting, conn) = joined_global();
    push(&mut reconnecting, conn, TransportEvent::Reconnecting);

    // Error
    let mut failed = SessionController::new(TestEnv);
    failed.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    let conn = failed.conn().unwrap();
    complete(&mut failed, conn, Completion::ConnectFailed(TransportError::Unavailable(
        "refused".to_string(),
    )));
    assert_eq!(failed.status(), SessionStatus::Error);

    for mut session in [connecting, connected, reconnecting, failed, SessionController::new(TestEnv)]
    {
        let had_conn = session.conn();
        let actions = session.handle(SessionEvent::Logout).unwrap();

        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(session.ledger().is_empty());
        assert!(session.identity().is_none());
        assert!(session.last_error().is_none());
        match had_conn {
            Some(conn) => assert_eq!(actions, vec![SessionAction::Disconnect { conn }]),
            None => assert!(actions.is_empty()),
        }
    }
}

#[test]
fn server_restart_disconnect_records_reason() {
    let (mut session, conn) = joined_global();
    push(&mut session, conn, in_global(inbound("m1", "bob", 1)));

    let actions = push(&mut session, conn, TransportEvent::Disconnected {
        reason: Some("server restart".to_string()),
    });

    assert_eq!(session.status(), SessionStatus::Disconnected);
    assert_eq!(session.last_error(), Some("server restart"));
    assert!(session.ledger().is_empty());
    assert_eq!(actions, vec![SessionAction::Disconnect { conn }]);

    session.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    assert!(session.ledger().is_empty());
    assert!(session.last_error().is_none());
}

#[test]
fn disconnect_without_reason_uses_default_text() {
    let (mut session, conn) = joined_global();

    push(&mut session, conn, TransportEvent::Disconnected { reason: None });

    assert_eq!(session.last_error(), Some("Disconnected from server"));
}

#[test]
fn events_from_superseded_connection_are_dropped() {
    let (mut session, old) = joined_global();
    session.handle(SessionEvent::Logout).unwrap();
    session.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    let new = session.conn().unwrap();
    assert_ne!(old, new);

    let actions = push(&mut session, old, TransportEvent::Connected);
    assert!(actions.is_empty());
    assert_eq!(session.status(), SessionStatus::Connecting);

    push(&mut session, old, in_global(inbound("ghost", "bob", 1)));
    push(&mut session, old, TransportEvent::Disconnected { reason: Some("late".to_string()) });
    assert_eq!(session.status(), SessionStatus::Connecting);
    assert!(session.ledger().is_empty());
}

#[test]
fn unauthorized_connect_is_auth_error() {
    let mut session = SessionController::new(TestEnv);
    session.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    let conn = session.conn().unwrap();

    let actions = complete(&mut session, conn, Completion::ConnectFailed(
        TransportError::Unauthorized("invalid application credentials".to_string()),
    ));

    assert_eq!(session.status(), SessionStatus::Error);
    let notification = actions
        .iter()
        .find_map(|a| match a {
            SessionAction::Notify(n) => Some(n.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.category, Some(ErrorCategory::Auth));

    // Retry is allowed from Error.
    assert!(session
        .handle(SessionEvent::Login { identity: identity("alice"), target: global() })
        .is_ok());
}

#[test]
fn transport_error_moves_to_error_state() {
    let (mut session, conn) = joined_global();

    let actions = push(&mut session, conn, TransportEvent::Error("socket closed".to_string()));

    assert_eq!(session.status(), SessionStatus::Error);
    assert_eq!(session.last_error(), Some("socket closed"));
    assert!(actions.contains(&SessionAction::Disconnect { conn }));
}

#[test]
fn join_failure_keeps_connection() {
    let mut session = SessionController::new(TestEnv);
    session.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    let conn = session.conn().unwrap();
    push(&mut session, conn, TransportEvent::Connected);

    let actions = complete(&mut session, conn, Completion::ChannelJoined {
        channel: "Global".to_string(),
        result: Err(TransportError::Rejected("no such channel".to_string())),
    });

    assert_eq!(session.status(), SessionStatus::Connected);
    assert!(session.scope().is_none());
    assert_eq!(notices(&actions), vec!["Failed to join channel Global"]);
}

#[test]
fn history_failure_is_reported_but_scope_stays() {
    let (mut session, conn) = joined_global();

    let actions = complete(&mut session, conn, Completion::HistoryFetched {
        channel: "Global".to_string(),
        result: Err(TransportError::Timeout { millis: 5_000 }),
    });

    assert_eq!(notices(&actions), vec!["Failed to load channel history"]);
    assert!(session.is_authenticated());
}

#[test]
fn whisper_send_and_echo_dedupe() {
    let (mut session, conn) = joined_global();
    session.handle(SessionEvent::EditInput("/whisper abcd1234 hello there".to_string())).unwrap();

    let actions = session.handle(SessionEvent::Submit).unwrap();
    let [SessionAction::Send { request, .. }] = actions.as_slice() else {
        panic!("expected one send, got {actions:?}");
    };
    assert!(request.route.is_whisper());
    assert_eq!(request.route.content(), "hello there");

    complete(&mut session, conn, Completion::SendCompleted {
        request: request.id,
        result: Ok(SendReceipt { message_id: MessageId::new("w1"), timestamp: Some(at(3)) }),
    });
    push(&mut session, conn, TransportEvent::WhisperReceived(InboundMessage {
        id: MessageId::new("w1"),
        content: "hello there".to_string(),
        sender: "alice".to_string(),
        timestamp: at(3),
    }));

    let view: Vec<_> = session.ledger().merged_view().collect();
    assert_eq!(view.len(), 1);
    assert!(view[0].is_whisper());
    assert!(view[0].message.is_own);
    assert_eq!(session.composer().text(), "");
    assert!(session.composer().is_focused());
}

#[test]
fn short_recipient_is_broadcast() {
    let (mut session, _) = joined_global();
    session.handle(SessionEvent::EditInput("/whisper ab hello".to_string())).unwrap();

    let actions = session.handle(SessionEvent::Submit).unwrap();
    let [SessionAction::Send { request, .. }] = actions.as_slice() else {
        panic!("expected one send, got {actions:?}");
    };
    assert!(!request.route.is_whisper());
    assert_eq!(request.route.content(), "/whisper ab hello");
}

#[test]
fn failed_send_keeps_input_and_ledger() {
    let (mut session, conn) = joined_global();
    session.handle(SessionEvent::EditInput("hello".to_string())).unwrap();
    let actions = session.handle(SessionEvent::Submit).unwrap();
    let [SessionAction::Send { request, .. }] = actions.as_slice() else {
        panic!("expected one send, got {actions:?}");
    };

    let actions = complete(&mut session, conn, Completion::SendCompleted {
        request: request.id,
        result: Err(TransportError::Unavailable("link down".to_string())),
    });

    assert_eq!(notices(&actions), vec!["Failed to send message"]);
    assert_eq!(session.composer().text(), "hello");
    assert!(!session.composer().is_sending());
    assert!(session.ledger().is_empty());
}

#[test]
fn empty_message_is_rejected_locally() {
    let (mut session, _) = joined_global();
    session.handle(SessionEvent::EditInput("   ".to_string())).unwrap();

    let result = session.handle(SessionEvent::Submit);

    assert!(matches!(result, Err(SessionError::Validation(_))));
    assert!(!session.composer().is_sending());
}

#[test]
fn incoming_whisper_notifies() {
    let (mut session, conn) = joined_global();

    let actions =
        push(&mut session, conn, TransportEvent::WhisperReceived(inbound("w9", "bob", 4)));

    assert_eq!(notices(&actions), vec!["Whisper from bob: content of w9"]);
}

#[test]
fn duplicate_broadcast_is_ignored() {
    let (mut session, conn) = joined_global();

    push(&mut session, conn, in_global(inbound("m1", "bob", 1)));
    push(&mut session, conn, in_global(inbound("m1", "bob", 1)));
    push(&mut session, conn, TransportEvent::WhisperReceived(inbound("m1", "bob", 1)));

    assert_eq!(session.ledger().len(), 1);
    assert_eq!(session.ledger().whispers().count(), 0);
}

#[test]
fn snapshot_marks_own_messages() {
    let (mut session, conn) = joined_global();
    push(&mut session, conn, in_global(inbound("a", "alice", 1)));
    push(&mut session, conn, in_global(inbound("b", "bob", 2)));

    let snapshot = session.snapshot();

    assert_eq!(snapshot.username.as_deref(), Some("alice"));
    assert!(snapshot.is_authenticated());
    let own: Vec<_> = snapshot.messages.iter().map(|m| m.is_own).collect();
    assert_eq!(own, vec![true, false]);
}

fn ticket_session() -> (TicketSessionController<TestEnv>, ConnectionId) {
    let mut session = TicketSessionController::new(TestEnv);
    session
        .login_create(identity("alice"), NewTicket::new("Billing", "Can't pay invoice").unwrap())
        .unwrap();
    let conn = session.session().conn().unwrap();
    (session, conn)
}

#[test]
fn create_ticket_binds_scope_with_empty_ledger() {
    let (mut session, conn) = ticket_session();

    let actions = session
        .handle(SessionEvent::Transport { conn, event: TransportEvent::Connected })
        .unwrap();
    assert!(actions.iter().any(|a| matches!(
        a,
        SessionAction::CreateTicket { ticket, .. } if ticket.topic == "Billing"
    )));

    let actions = session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketCreated(Ok(TicketId::new("T-42"))),
        })
        .unwrap();

    assert_eq!(notices(&actions), vec!["Ticket created: T-42"]);
    assert_eq!(session.ticket_id(), Some(&TicketId::new("T-42")));
    assert_eq!(session.session().status(), SessionStatus::Connected);
    assert!(session.session().ledger().is_empty());
}

#[test]
fn ticket_message_routes_to_ticket() {
    let (mut session, conn) = ticket_session();
    session.handle(SessionEvent::Transport { conn, event: TransportEvent::Connected }).unwrap();
    session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketCreated(Ok(TicketId::new("T-42"))),
        })
        .unwrap();

    session.handle(SessionEvent::EditInput("still broken".to_string())).unwrap();
    let actions = session.handle(SessionEvent::Submit).unwrap();

    let [SessionAction::Send { request, .. }] = actions.as_slice() else {
        panic!("expected one send, got {actions:?}");
    };
    assert_eq!(request.route, parley_client::SendRoute::Ticket {
        ticket_id: TicketId::new("T-42"),
        content: "still broken".to_string(),
    });
}

#[test]
fn unknown_ticket_leaves_session_connected_and_unbound() {
    let mut session = TicketSessionController::new(TestEnv);
    session.login_join(identity("alice"), TicketId::new("T-404")).unwrap();
    let conn = session.session().conn().unwrap();
    session.handle(SessionEvent::Transport { conn, event: TransportEvent::Connected }).unwrap();

    let actions = session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketFetched {
                ticket_id: TicketId::new("T-404"),
                result: Err(TransportError::Rejected("unknown ticket".to_string())),
            },
        })
        .unwrap();

    assert_eq!(notices(&actions), vec!["Failed to load ticket. Please check the ticket ID."]);
    assert_eq!(session.session().status(), SessionStatus::Connected);
    assert!(session.ticket_id().is_none());

    // Retry on the same connection.
    let actions = session.join_ticket(TicketId::new("T-1")).unwrap();
    assert_eq!(actions, vec![SessionAction::FetchTicket { conn, ticket_id: TicketId::new("T-1") }]);
    session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketFetched {
                ticket_id: TicketId::new("T-1"),
                result: Ok(Ticket {
                    id: TicketId::new("T-1"),
                    topic: "Billing".to_string(),
                    description: "Can't pay invoice".to_string(),
                    created_by: "alice".to_string(),
                }),
            },
        })
        .unwrap();
    assert_eq!(session.ticket_id(), Some(&TicketId::new("T-1")));
}

#[test]
fn create_failure_reports_and_allows_retry() {
    let (mut session, conn) = ticket_session();
    session.handle(SessionEvent::Transport { conn, event: TransportEvent::Connected }).unwrap();

    let actions = session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketCreated(Err(TransportError::Unavailable(
                "busy".to_string(),
            ))),
        })
        .unwrap();

    assert_eq!(notices(&actions), vec!["Failed to create ticket"]);
    assert_eq!(session.session().status(), SessionStatus::Connected);
    assert!(session
        .create_ticket(NewTicket::new("Billing", "Can't pay invoice").unwrap())
        .is_ok());
}

#[test]
fn switching_tickets_empties_ledger() {
    let mut session = TicketSessionController::new(TestEnv);
    session.login_join(identity("alice"), TicketId::new("T-1")).unwrap();
    let conn = session.session().conn().unwrap();
    session.handle(SessionEvent::Transport { conn, event: TransportEvent::Connected }).unwrap();
    let ticket = |id: &str| Ticket {
        id: TicketId::new(id),
        topic: "t".to_string(),
        description: "d".to_string(),
        created_by: "alice".to_string(),
    };
    session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketFetched {
                ticket_id: TicketId::new("T-1"),
                result: Ok(ticket("T-1")),
            },
        })
        .unwrap();
    session
        .handle(SessionEvent::Transport {
            conn,
            event: posted(Scope::Ticket(TicketId::new("T-1")), inbound("m1", "agent", 1)),
        })
        .unwrap();
    assert_eq!(session.session().ledger().len(), 1);

    session.join_ticket(TicketId::new("T-2")).unwrap();
    let actions = session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketFetched {
                ticket_id: TicketId::new("T-2"),
                result: Ok(ticket("T-2")),
            },
        })
        .unwrap();

    assert_eq!(session.ticket_id(), Some(&TicketId::new("T-2")));
    assert!(session.session().ledger().is_empty());
    assert!(actions
        .contains(&SessionAction::Leave { conn, scope: Scope::Ticket(TicketId::new("T-1")) }));
}

fn fetched(id: &str) -> Completion {
    Completion::TicketFetched {
        ticket_id: TicketId::new(id),
        result: Ok(Ticket {
            id: TicketId::new(id),
            topic: "Billing".to_string(),
            description: "Can't pay invoice".to_string(),
            created_by: "alice".to_string(),
        }),
    }
}

#[test]
fn reply_on_previous_ticket_stays_out_of_new_one() {
    let (mut session, conn) = ticket_session();
    session.handle(SessionEvent::Transport { conn, event: TransportEvent::Connected }).unwrap();
    session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketCreated(Ok(TicketId::new("T-1"))),
        })
        .unwrap();

    session.join_ticket(TicketId::new("T-99")).unwrap();
    let actions =
        session.handle(SessionEvent::Completed { conn, completion: fetched("T-99") }).unwrap();
    assert!(actions
        .contains(&SessionAction::Leave { conn, scope: Scope::Ticket(TicketId::new("T-1")) }));

    let stale = posted(Scope::Ticket(TicketId::new("T-1")), inbound("old", "agent", 1));
    session.handle(SessionEvent::Transport { conn, event: stale }).unwrap();
    let fresh = posted(Scope::Ticket(TicketId::new("T-99")), inbound("fresh", "agent", 2));
    session.handle(SessionEvent::Transport { conn, event: fresh }).unwrap();

    let ids: Vec<_> =
        session.session().ledger().merged_view().map(|e| e.message.id.to_string()).collect();
    assert_eq!(ids, vec!["fresh"]);
}

#[test]
fn message_for_previous_channel_is_dropped() {
    let (mut session, conn) = joined_global();
    session
        .handle(SessionEvent::Bind { target: Target::Channel("Support".to_string()) })
        .unwrap();
    let actions = complete(&mut session, conn, Completion::ChannelJoined {
        channel: "Support".to_string(),
        result: Ok(()),
    });
    assert!(actions
        .contains(&SessionAction::Leave { conn, scope: Scope::Channel("Global".to_string()) }));

    push(&mut session, conn, in_global(inbound("late", "bob", 1)));
    push(&mut session, conn, posted(Scope::Channel("Support".to_string()), inbound("s1", "bob", 2)));

    assert_eq!(view_ids(&session), vec!["s1"]);
}

#[test]
fn message_for_other_channel_while_joining_is_dropped() {
    let mut session = SessionController::new(TestEnv);
    session.handle(SessionEvent::Login { identity: identity("alice"), target: global() }).unwrap();
    let conn = session.conn().unwrap();
    push(&mut session, conn, TransportEvent::Connected);

    push(&mut session, conn, posted(Scope::Channel("Lobby".to_string()), inbound("x", "bob", 1)));

    assert!(session.ledger().is_empty());
}

#[test]
fn send_ack_after_rebind_is_not_shown() {
    let (mut session, conn) = joined_global();
    session.handle(SessionEvent::EditInput("hello".to_string())).unwrap();
    let actions = session.handle(SessionEvent::Submit).unwrap();
    let [SessionAction::Send { request, .. }] = actions.as_slice() else {
        panic!("expected one send, got {actions:?}");
    };
    assert_eq!(request.scope, Scope::Channel("Global".to_string()));
    let request_id = request.id;

    session
        .handle(SessionEvent::Bind { target: Target::Channel("Support".to_string()) })
        .unwrap();
    complete(&mut session, conn, Completion::ChannelJoined {
        channel: "Support".to_string(),
        result: Ok(()),
    });
    complete(&mut session, conn, Completion::SendCompleted {
        request: request_id,
        result: Ok(SendReceipt { message_id: MessageId::new("g1"), timestamp: Some(at(3)) }),
    });

    assert!(session.ledger().is_empty());
    assert!(!session.composer().is_sending());
    assert_eq!(session.scope(), Some(&Scope::Channel("Support".to_string())));
}

#[test]
fn failed_ticket_switch_unbinds_previous_ticket() {
    let mut session = TicketSessionController::new(TestEnv);
    session.login_join(identity("alice"), TicketId::new("T-1")).unwrap();
    let conn = session.session().conn().unwrap();
    session.handle(SessionEvent::Transport { conn, event: TransportEvent::Connected }).unwrap();
    session.handle(SessionEvent::Completed { conn, completion: fetched("T-1") }).unwrap();
    session
        .handle(SessionEvent::Transport {
            conn,
            event: posted(Scope::Ticket(TicketId::new("T-1")), inbound("m1", "agent", 1)),
        })
        .unwrap();

    session.join_ticket(TicketId::new("T-404")).unwrap();
    let actions = session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketFetched {
                ticket_id: TicketId::new("T-404"),
                result: Err(TransportError::Rejected("unknown ticket".to_string())),
            },
        })
        .unwrap();

    assert_eq!(session.ticket_id(), None);
    assert_eq!(session.session().status(), SessionStatus::Connected);
    assert!(session.session().ledger().is_empty());
    assert!(actions
        .contains(&SessionAction::Leave { conn, scope: Scope::Ticket(TicketId::new("T-1")) }));
    assert_eq!(notices(&actions), vec!["Failed to load ticket. Please check the ticket ID."]);
}

#[test]
fn bind_during_ticket_creation_is_refused() {
    let (mut session, conn) = ticket_session();
    session.handle(SessionEvent::Transport { conn, event: TransportEvent::Connected }).unwrap();

    let second = session.create_ticket(NewTicket::new("Refund", "Charged twice").unwrap());
    let join = session.join_ticket(TicketId::new("T-7"));

    assert!(matches!(second, Err(SessionError::TicketCreationPending)));
    assert!(matches!(join, Err(SessionError::TicketCreationPending)));

    session
        .handle(SessionEvent::Completed {
            conn,
            completion: Completion::TicketCreated(Ok(TicketId::new("T-1"))),
        })
        .unwrap();
    assert_eq!(session.ticket_id(), Some(&TicketId::new("T-1")));
    assert!(session.join_ticket(TicketId::new("T-7")).is_ok());
}
