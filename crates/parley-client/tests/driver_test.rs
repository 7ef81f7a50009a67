//! Driver tests against the in-process backend.
//!
//! These exercise the full loop: handle -> controller -> executor -> memory
//! transport -> events back into the controller.

use std::time::Duration;

use parley_client::{
    BackendOp, ClientConfig, MemoryBackend, Notification, SessionController, SessionDriver,
    SessionHandle, SessionSnapshot, SessionStatus, SystemEnv, TicketSessionController,
    prepare_identity,
};
use parley_core::{
    Credentials, Identity, InboundMessage, MemoryStore, MessageId, NewTicket, ProductArea, Scope,
    Target, Ticket, TicketId, TransportError,
};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.register_application("Demo01", "DemoSecret");
    backend
}

fn identity(username: &str, secret: &str) -> Identity {
    let store = MemoryStore::new();
    let creds = Credentials::new(username, "Demo01", secret);
    prepare_identity(creds, &store, ProductArea::Chat, &SystemEnv::new()).unwrap()
}

fn chat(backend: &MemoryBackend) -> (SessionHandle, mpsc::UnboundedReceiver<Notification>) {
    SessionDriver::spawn(
        SessionController::new(SystemEnv::new()),
        backend.connector(),
        SystemEnv::new(),
        ClientConfig::default(),
    )
}

async fn wait(
    handle: &SessionHandle,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(WAIT, handle.wait_for(predicate)).await.unwrap().unwrap()
}

async fn next_notification(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
    tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

async fn login_global(handle: &SessionHandle, username: &str) {
    handle
        .login(identity(username, "DemoSecret"), Target::Channel("Global".to_string()))
        .unwrap();
    wait(handle, SessionSnapshot::is_authenticated).await;
}

#[tokio::test]
async fn login_hydrates_history_in_time_order() {
    let backend = backend();
    let base = chrono::Utc::now();
    backend.seed_history("Global", vec![
        InboundMessage {
            id: MessageId::new("t2"),
            content: "second".to_string(),
            sender: "bob".to_string(),
            timestamp: base + chrono::Duration::seconds(2),
        },
        InboundMessage {
            id: MessageId::new("t1"),
            content: "first".to_string(),
            sender: "bob".to_string(),
            timestamp: base + chrono::Duration::seconds(1),
        },
    ]);
    let (handle, mut notifications) = chat(&backend);

    login_global(&handle, "alice").await;
    let snapshot = wait(&handle, |s| s.messages.len() == 2).await;

    let ids: Vec<_> = snapshot.messages.iter().map(|m| m.id.to_string()).collect();
    assert_eq!(ids, vec!["t1", "t2"]);
    assert_eq!(next_notification(&mut notifications).await.text, "Welcome alice!");
}

#[tokio::test]
async fn sent_message_appears_once_and_clears_input() {
    let backend = backend();
    let (handle, _notifications) = chat(&backend);
    login_global(&handle, "alice").await;

    handle.say("hello everyone").unwrap();
    let snapshot = wait(&handle, |s| !s.messages.is_empty() && !s.sending).await;

    assert_eq!(snapshot.messages.len(), 1);
    assert!(snapshot.messages[0].is_own);
    assert_eq!(snapshot.input, "");
    assert!(snapshot.input_focused);
    assert_eq!(backend.history("Global").len(), 1);
}

#[tokio::test]
async fn whisper_reaches_recipient_only() {
    let backend = backend();
    let (alice, _alice_notes) = chat(&backend);
    let (bobby, mut bobby_notes) = chat(&backend);
    let (carol, _carol_notes) = chat(&backend);
    login_global(&alice, "alice").await;
    login_global(&bobby, "bobby").await;
    login_global(&carol, "carol").await;
    // Drain bobby's welcome.
    next_notification(&mut bobby_notes).await;

    alice.say("/w bobby psst").unwrap();

    let snapshot = wait(&bobby, |s| s.messages.iter().any(|m| m.is_whisper)).await;
    assert_eq!(snapshot.messages[0].content, "psst");
    assert_eq!(next_notification(&mut bobby_notes).await.text, "Whisper from alice: psst");

    let alice_view = wait(&alice, |s| !s.messages.is_empty()).await;
    assert!(alice_view.messages[0].is_whisper);
    assert!(carol.snapshot().messages.is_empty());
}

#[tokio::test]
async fn bad_secret_ends_in_error() {
    let backend = backend();
    let (handle, mut notifications) = chat(&backend);

    handle.login(identity("alice", "wrong"), Target::Channel("Global".to_string())).unwrap();
    let snapshot = wait(&handle, |s| s.status == SessionStatus::Error).await;

    assert!(snapshot.last_error.is_some_and(|e| e.contains("unauthorized")));
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification.category, Some(parley_client::ErrorCategory::Auth));
    assert_eq!(backend.attached_count(), 0);
}

#[tokio::test]
async fn server_restart_disconnects_and_relogin_starts_empty() {
    let backend = backend();
    let (handle, _notifications) = chat(&backend);
    login_global(&handle, "alice").await;
    backend.post_to_channel("Global", "bobby", "hi");
    wait(&handle, |s| s.messages.len() == 1).await;

    backend.drop_all(Some("server restart"));
    let snapshot = wait(&handle, |s| s.status == SessionStatus::Disconnected).await;
    assert_eq!(snapshot.last_error.as_deref(), Some("server restart"));
    assert!(snapshot.messages.is_empty());

    backend.seed_history("Global", Vec::new());
    login_global(&handle, "alice").await;
    assert!(handle.snapshot().messages.is_empty());
}

#[tokio::test]
async fn logout_detaches_from_backend() {
    let backend = backend();
    let (handle, _notifications) = chat(&backend);
    login_global(&handle, "alice").await;
    assert_eq!(backend.attached_count(), 1);

    handle.logout().unwrap();
    wait(&handle, |s| s.status == SessionStatus::Disconnected).await;

    tokio::time::timeout(WAIT, async {
        while backend.attached_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn link_blip_rejoins_channel() {
    let backend = backend();
    let (handle, mut notifications) = chat(&backend);
    login_global(&handle, "alice").await;
    next_notification(&mut notifications).await;

    backend.blip();
    assert_eq!(next_notification(&mut notifications).await.text, "Reconnected");
    let snapshot = wait(&handle, SessionSnapshot::is_authenticated).await;
    assert_eq!(snapshot.scope, Some(Scope::Channel("Global".to_string())));

    backend.post_to_channel("Global", "bobby", "still here?");
    wait(&handle, |s| s.messages.len() == 1).await;
}

#[tokio::test]
async fn send_failure_keeps_input() {
    let backend = backend();
    let (handle, mut notifications) = chat(&backend);
    login_global(&handle, "alice").await;
    next_notification(&mut notifications).await;

    backend.with_faults(|f| f.fail(BackendOp::Send, TransportError::Unavailable("busy".into())));
    handle.say("hello").unwrap();

    assert_eq!(next_notification(&mut notifications).await.text, "Failed to send message");
    let snapshot = wait(&handle, |s| !s.sending).await;
    assert_eq!(snapshot.input, "hello");
    assert!(!snapshot.sending);
    assert!(snapshot.messages.is_empty());
}

#[tokio::test]
async fn submit_before_login_notifies_not_connected() {
    let backend = backend();
    let (handle, mut notifications) = chat(&backend);

    handle.say("hello").unwrap();

    assert_eq!(next_notification(&mut notifications).await.text, "Not connected to server");
    assert_eq!(handle.snapshot().input, "hello");
}

#[tokio::test]
async fn ticket_create_then_agent_reply() {
    let backend = backend();
    let (handle, mut notifications) = SessionDriver::spawn(
        TicketSessionController::new(SystemEnv::new()),
        backend.connector(),
        SystemEnv::new(),
        ClientConfig::default(),
    );

    handle
        .login(
            identity("alice", "DemoSecret"),
            Target::NewTicket(NewTicket::new("Billing", "Can't pay invoice").unwrap()),
        )
        .unwrap();
    let snapshot = wait(&handle, SessionSnapshot::is_authenticated).await;
    let Some(Scope::Ticket(ticket_id)) = snapshot.scope else {
        panic!("expected a ticket scope, got {:?}", snapshot.scope);
    };
    assert!(snapshot.messages.is_empty());

    assert_eq!(next_notification(&mut notifications).await.text, "Welcome alice!");
    assert_eq!(
        next_notification(&mut notifications).await.text,
        format!("Ticket created: {ticket_id}")
    );

    backend.reply_to_ticket(&ticket_id, "agent", "Looking into it");
    let snapshot = wait(&handle, |s| s.messages.len() == 1).await;
    assert_eq!(snapshot.messages[0].sender, "agent");
}

#[tokio::test]
async fn rebinding_ticket_drops_replies_on_previous_one() {
    let backend = backend();
    let (handle, _notifications) = SessionDriver::spawn(
        TicketSessionController::new(SystemEnv::new()),
        backend.connector(),
        SystemEnv::new(),
        ClientConfig::default(),
    );
    handle
        .login(
            identity("alice", "DemoSecret"),
            Target::NewTicket(NewTicket::new("Billing", "Can't pay invoice").unwrap()),
        )
        .unwrap();
    let snapshot = wait(&handle, SessionSnapshot::is_authenticated).await;
    let Some(Scope::Ticket(first)) = snapshot.scope else {
        panic!("expected a ticket scope, got {:?}", snapshot.scope);
    };

    let other = TicketId::new("T-99");
    backend.insert_ticket(Ticket {
        id: other.clone(),
        topic: "Refund".to_string(),
        description: "Charged twice".to_string(),
        created_by: "alice".to_string(),
    });
    handle.bind(Target::Ticket(other.clone())).unwrap();
    wait(&handle, |s| s.scope == Some(Scope::Ticket(other.clone()))).await;

    backend.reply_to_ticket(&first, "agent", "reply on previous ticket");
    backend.reply_to_ticket(&other, "agent", "fresh");

    let snapshot = wait(&handle, |s| !s.messages.is_empty()).await;
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].content, "fresh");
}

#[tokio::test]
async fn unknown_ticket_stays_connected() {
    let backend = backend();
    let (handle, mut notifications) = SessionDriver::spawn(
        TicketSessionController::new(SystemEnv::new()),
        backend.connector(),
        SystemEnv::new(),
        ClientConfig::default(),
    );

    handle.login(identity("alice", "DemoSecret"), Target::Ticket(TicketId::new("T-404"))).unwrap();
    next_notification(&mut notifications).await;

    assert_eq!(
        next_notification(&mut notifications).await.text,
        "Failed to load ticket. Please check the ticket ID."
    );
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Connected);
    assert!(snapshot.scope.is_none());
}

#[tokio::test]
async fn hung_disconnect_does_not_block_next_login() {
    let backend = backend();
    let config =
        ClientConfig { disconnect_timeout: Duration::from_millis(50), ..ClientConfig::default() };
    let (handle, _notifications) = SessionDriver::spawn(
        SessionController::new(SystemEnv::new()),
        backend.connector(),
        SystemEnv::new(),
        config,
    );
    login_global(&handle, "alice").await;

    backend.with_faults(|f| f.fail(BackendOp::Disconnect, TransportError::Timeout { millis: 0 }));
    handle.logout().unwrap();
    wait(&handle, |s| s.status == SessionStatus::Disconnected).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    backend.with_faults(|f| f.heal(BackendOp::Disconnect));
    login_global(&handle, "alice").await;

    // The abandoned instance never detached.
    assert_eq!(backend.attached_count(), 2);
}
