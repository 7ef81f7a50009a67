//! Model world: one session plus the actions it has outstanding.
//!
//! Completion operations resolve the most recent action of their kind. An
//! action issued by a connection that has since been torn down can never
//! complete, so outstanding actions are forgotten whenever the session stops
//! being live.

use parley_client::SessionStatus;
use parley_core::Scope;

use super::{
    operation::{ModelTarget, Operation, OperationResult, message_id, username},
    session::{ModelMessage, ModelSession},
};

/// Observable state for oracle comparison.
///
/// The subset of session state that can be read from the real controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Logged-in username.
    pub username: Option<String>,
    /// Bound scope.
    pub scope: Option<Scope>,
    /// Whether an error is on display.
    pub has_error: bool,
    /// Broadcast ids in insertion order.
    pub broadcast: Vec<String>,
    /// Whisper ids in insertion order.
    pub whispers: Vec<String>,
    /// Input box text.
    pub input: String,
    /// Input focus.
    pub input_focused: bool,
    /// Send in flight.
    pub sending: bool,
}

/// Model world, the reference implementation.
#[derive(Debug, Clone, Default)]
pub struct ModelWorld {
    session: ModelSession,
    scope_request: Option<ModelTarget>,
    history_request: Option<u8>,
    send_request: Option<u64>,
}

impl ModelWorld {
    /// A world with a disconnected session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The model session.
    pub fn session(&self) -> &ModelSession {
        &self.session
    }

    /// Apply an operation and return the result.
    ///
    /// This is the main entry point for model-based testing. The result should
    /// match the real controller's.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = self.apply_inner(op);
        if !self.session.is_live() {
            self.scope_request = None;
            self.history_request = None;
            self.send_request = None;
        }
        result
    }

    fn apply_inner(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Login { user, target } => {
                self.session.login(username(*user), target.resolve())
            },
            Operation::Logout => {
                self.session.logout();
                OperationResult::Ok
            },
            Operation::Bind { target } => match self.session.bind(target.resolve()) {
                Ok(request) => {
                    self.scope_request = Some(request);
                    OperationResult::Ok
                },
                Err(e) => OperationResult::Error(e),
            },
            Operation::Connected => {
                if let Some(request) = self.session.connected() {
                    self.scope_request = Some(request);
                }
                OperationResult::Ok
            },
            Operation::Reconnecting => {
                self.session.reconnecting();
                OperationResult::Ok
            },
            Operation::Disconnected { .. } => {
                self.session.disconnected();
                OperationResult::Ok
            },
            Operation::LinkError | Operation::ConnectFailed { .. } => {
                self.session.failed();
                OperationResult::Ok
            },
            Operation::ScopeResult { ok } => {
                if let Some(target) = self.scope_request.take() {
                    if let Some(channel) = self.session.scope_result(target, *ok) {
                        self.history_request = Some(channel);
                    }
                }
                OperationResult::Ok
            },
            Operation::HistoryResult { ok, slots } => {
                if let Some(channel) = self.history_request.take() {
                    if *ok {
                        let batch: Vec<_> = slots.iter().copied().map(message_id).collect();
                        self.session.history(channel, &batch);
                    }
                }
                OperationResult::Ok
            },
            Operation::Incoming { slot, whisper, elsewhere } => {
                self.session.incoming(&message_id(*slot), *whisper, *elsewhere);
                OperationResult::Ok
            },
            Operation::Edit { text } => {
                self.session.edit(*text);
                OperationResult::Ok
            },
            Operation::Submit => match self.session.submit() {
                Ok(request) => {
                    self.send_request = Some(request);
                    OperationResult::Ok
                },
                Err(e) => OperationResult::Error(e),
            },
            Operation::SendResult { ok } => {
                if let Some(request) = self.send_request.take() {
                    self.session.send_result(request, *ok);
                }
                OperationResult::Ok
            },
            Operation::Stale => OperationResult::Ok,
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let ids = |whisper: bool| -> Vec<String> {
            self.session
                .messages()
                .iter()
                .filter(|m| m.whisper == whisper)
                .map(|m: &ModelMessage| m.id.clone())
                .collect()
        };

        ObservableState {
            status: self.session.status(),
            username: self.session.username().map(str::to_string),
            scope: self.session.scope().map(ModelTarget::to_scope),
            has_error: self.session.has_error(),
            broadcast: ids(false),
            whispers: ids(true),
            input: self.session.input(),
            input_focused: self.session.is_focused(),
            sending: self.session.is_sending(),
        }
    }
}
