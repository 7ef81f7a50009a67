//! Support ticket sessions.
//!
//! A ticket session differs from a chat session only in how its scope is
//! bound: by fetching an existing ticket or creating a new one instead of
//! joining a channel. Ticket results are handled here; the rest of the
//! lifecycle is shared with [`SessionController`].
//!
//! Ticket ids can reach the session twice, once as the `create_ticket` result
//! and once as a server push. Whichever arrives first binds the scope; the
//! other is ignored. Only one creation is in flight at a time: a bind while
//! one is pending is refused.
//!
//! A failed fetch or create leaves the session Connected with no ticket
//! bound, even when it was meant to replace a bound ticket.

use parley_core::{
    Environment, Identity, NewTicket, Scope, Target, Ticket, TicketId, TransportError,
};

use crate::{
    error::{ErrorCategory, SessionError},
    event::{Notification, SessionAction, SessionEvent},
    session::SessionController,
    snapshot::SessionSnapshot,
};

impl<E: Environment> SessionController<E> {
    pub(crate) fn on_ticket_fetched(
        &mut self,
        ticket_id: TicketId,
        result: Result<Ticket, TransportError>,
    ) -> Vec<SessionAction> {
        let Some(live) = self.live.as_ref() else {
            return Vec::new();
        };
        if live.pending.as_ref() != Some(&Target::Ticket(ticket_id.clone())) {
            tracing::debug!(%ticket_id, "stale ticket fetch ignored");
            return Vec::new();
        }

        match result {
            Ok(ticket) => {
                tracing::info!(ticket_id = %ticket.id, topic = %ticket.topic, "ticket joined");
                let mut actions = self.bind_scope(Scope::Ticket(ticket.id.clone()));
                actions.push(SessionAction::Notify(Notification::success(format!(
                    "Joined ticket {}",
                    ticket.id
                ))));
                actions
            },
            Err(err) => {
                tracing::warn!(%ticket_id, error = %err, "ticket fetch failed");
                let mut actions = self.unbind_scope();
                self.last_error = Some("Failed to load ticket".to_string());
                actions.push(SessionAction::Notify(Notification::error(
                    ErrorCategory::Application,
                    "Failed to load ticket. Please check the ticket ID.",
                )));
                actions
            },
        }
    }

    pub(crate) fn on_ticket_created(
        &mut self,
        result: Result<TicketId, TransportError>,
    ) -> Vec<SessionAction> {
        match result {
            Ok(ticket_id) => self.on_ticket_pushed(ticket_id),
            Err(err) => {
                let Some(live) = self.live.as_ref() else {
                    return Vec::new();
                };
                if !matches!(live.pending, Some(Target::NewTicket(_))) {
                    tracing::debug!(error = %err, "stale ticket creation failure ignored");
                    return Vec::new();
                }

                tracing::warn!(error = %err, "ticket creation failed");
                let mut actions = self.unbind_scope();
                self.last_error = Some("Failed to create ticket".to_string());
                actions.push(SessionAction::Notify(Notification::error(
                    ErrorCategory::Application,
                    "Failed to create ticket",
                )));
                actions
            },
        }
    }

    /// A ticket id learned from the creation result or a server push.
    pub(crate) fn on_ticket_pushed(&mut self, ticket_id: TicketId) -> Vec<SessionAction> {
        let Some(live) = self.live.as_ref() else {
            return Vec::new();
        };

        if live.scope.as_ref().and_then(Scope::ticket_id) == Some(&ticket_id) {
            tracing::debug!(%ticket_id, "ticket already bound");
            return Vec::new();
        }
        if !matches!(live.pending, Some(Target::NewTicket(_))) {
            tracing::debug!(%ticket_id, "ticket announcement without pending creation ignored");
            return Vec::new();
        }

        tracing::info!(%ticket_id, "ticket created");
        let mut actions = self.bind_scope(Scope::Ticket(ticket_id.clone()));
        actions.push(SessionAction::Notify(Notification::success(format!(
            "Ticket created: {ticket_id}"
        ))));
        actions
    }
}

/// Session controller for support tickets.
///
/// Accepts only ticket targets. Joining or creating a ticket on a live
/// connection rebinds the session without reconnecting.
pub struct TicketSessionController<E: Environment> {
    inner: SessionController<E>,
}

impl<E: Environment> TicketSessionController<E> {
    /// Create a disconnected ticket session.
    pub fn new(env: E) -> Self {
        Self { inner: SessionController::new(env) }
    }

    /// Underlying session state.
    pub fn session(&self) -> &SessionController<E> {
        &self.inner
    }

    /// Bound ticket.
    pub fn ticket_id(&self) -> Option<&TicketId> {
        self.inner.scope().and_then(Scope::ticket_id)
    }

    /// Project the current state for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot()
    }

    /// Log in and resume an existing ticket.
    pub fn login_join(
        &mut self,
        identity: Identity,
        ticket_id: TicketId,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.handle(SessionEvent::Login { identity, target: Target::Ticket(ticket_id) })
    }

    /// Log in and open a new ticket.
    pub fn login_create(
        &mut self,
        identity: Identity,
        ticket: NewTicket,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.handle(SessionEvent::Login { identity, target: Target::NewTicket(ticket) })
    }

    /// Switch the live connection to an existing ticket. On failure no ticket
    /// stays bound.
    pub fn join_ticket(&mut self, ticket_id: TicketId) -> Result<Vec<SessionAction>, SessionError> {
        self.handle(SessionEvent::Bind { target: Target::Ticket(ticket_id) })
    }

    /// Open a new ticket on the live connection. Refused with
    /// [`SessionError::TicketCreationPending`] while another creation is in
    /// flight.
    pub fn create_ticket(&mut self, ticket: NewTicket) -> Result<Vec<SessionAction>, SessionError> {
        self.handle(SessionEvent::Bind { target: Target::NewTicket(ticket) })
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Refuses channel targets with [`SessionError::UnsupportedTarget`];
    /// otherwise as [`SessionController::handle`].
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        if let SessionEvent::Login { target, .. } | SessionEvent::Bind { target } = &event {
            if !target.is_ticket() {
                return Err(SessionError::UnsupportedTarget {
                    reason: "ticket sessions cannot join channels".to_string(),
                });
            }
        }

        self.inner.handle(event)
    }
}
