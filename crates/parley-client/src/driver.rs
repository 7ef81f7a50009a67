//! Session driver.
//!
//! Runs a session state machine on a tokio task. All inputs, whether user
//! intents from a [`SessionHandle`], transport pushes or completions of
//! earlier actions, travel through one unbounded channel and are dispatched
//! one at a time, so the state machine never sees concurrent mutation.
//!
//! ```text
//! SessionHandle ──┐
//! EventSink ──────┼──> events ──> SessionMachine::handle ──> ActionExecutor
//! action tasks ───┘                      │                         │
//!                                 snapshot (watch)        notifications (mpsc)
//! ```

use parley_core::{Connector, Environment, Identity, Target};
use tokio::sync::{mpsc, watch};

use crate::{
    config::ClientConfig,
    error::SessionError,
    event::{Notification, SessionAction, SessionEvent},
    executor::ActionExecutor,
    session::SessionController,
    snapshot::SessionSnapshot,
    ticket::TicketSessionController,
};

/// State machine a driver can run.
pub trait SessionMachine: Send + 'static {
    /// Process one event.
    fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError>;

    /// Current UI projection.
    fn snapshot(&self) -> SessionSnapshot;
}

impl<E: Environment> SessionMachine for SessionController<E> {
    fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        Self::handle(self, event)
    }

    fn snapshot(&self) -> SessionSnapshot {
        Self::snapshot(self)
    }
}

impl<E: Environment> SessionMachine for TicketSessionController<E> {
    fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        Self::handle(self, event)
    }

    fn snapshot(&self) -> SessionSnapshot {
        Self::snapshot(self)
    }
}

/// Dispatch loop owning a state machine and its executor.
pub struct SessionDriver<M: SessionMachine, C: Connector, E: Environment> {
    machine: M,
    executor: ActionExecutor<C, E>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl<M: SessionMachine, C: Connector, E: Environment> SessionDriver<M, C, E> {
    /// Start a driver on the current tokio runtime.
    ///
    /// Returns the handle for user intents and the notification stream. The
    /// driver stops once every handle is dropped, logging out first.
    pub fn spawn(
        machine: M,
        connector: C,
        env: E,
        config: ClientConfig,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<Notification>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());

        let executor = ActionExecutor::new(connector, env, config, events_tx.downgrade(), notify_tx);
        let driver = Self { machine, executor, events: events_rx, snapshot: snapshot_tx };
        tokio::spawn(driver.run());

        (SessionHandle { events: events_tx, snapshot: snapshot_rx }, notify_rx)
    }

    async fn run(mut self) {
        tracing::debug!("session driver started");

        while let Some(event) = self.events.recv().await {
            self.dispatch(event);
        }

        self.dispatch(SessionEvent::Logout);
        tracing::debug!("session driver stopped");
    }

    /// Handle one event. The snapshot is published before any resulting
    /// action runs, so a notification is never observed ahead of the state
    /// that caused it.
    fn dispatch(&mut self, event: SessionEvent) {
        let actions = match self.machine.handle(event) {
            Ok(actions) => actions,
            Err(err) => {
                tracing::warn!(error = %err, category = ?err.category(), "intent refused");
                vec![SessionAction::Notify(err.to_notification())]
            },
        };

        self.snapshot.send_replace(self.machine.snapshot());

        for action in actions {
            self.executor.execute(action);
        }
    }
}

/// Handle for submitting intents to a running driver.
///
/// Cheap to clone. Intents are queued; their outcome shows up in the snapshot
/// and the notification stream.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Queue a raw event.
    pub fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.events.send(event).map_err(|_| SessionError::DriverStopped)
    }

    /// Log in and bind `target` once connected.
    pub fn login(&self, identity: Identity, target: Target) -> Result<(), SessionError> {
        self.send(SessionEvent::Login { identity, target })
    }

    /// Log out from any state.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Logout)
    }

    /// Bind a different channel or ticket on the live connection.
    pub fn bind(&self, target: Target) -> Result<(), SessionError> {
        self.send(SessionEvent::Bind { target })
    }

    /// Replace the input box text.
    pub fn edit_input(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionEvent::EditInput(text.into()))
    }

    /// Send the input box text.
    pub fn submit(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Submit)
    }

    /// Type `text` into the input box and send it.
    pub fn say(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.edit_input(text)?;
        self.submit()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that wakes on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until a snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.snapshot.clone();
        let snapshot =
            rx.wait_for(|s| predicate(s)).await.map_err(|_| SessionError::DriverStopped)?;
        Ok(snapshot.clone())
    }
}
