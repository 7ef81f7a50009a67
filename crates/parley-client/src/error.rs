//! Session error types.

use parley_core::{StoreError, TransportError, ValidationError};
use thiserror::Error;

use crate::{event::Notification, session::SessionStatus};

/// User-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad credentials, application id or secret.
    Auth,
    /// Connect, send or disconnect failure.
    Transport,
    /// Channel join or ticket fetch/create failed after connecting.
    Application,
    /// Malformed local input, rejected before any network call.
    Validation,
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Local input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A login attempt is already in flight.
    #[error("already connecting")]
    AlreadyConnecting,

    /// The session is already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// The operation needs a connected session.
    #[error("not connected to server (session is {status:?})")]
    NotConnected {
        /// Status at the time of the call.
        status: SessionStatus,
    },

    /// Connected, but no channel or ticket is bound yet.
    #[error("no channel or ticket is bound")]
    NoScope,

    /// A ticket creation is in flight; nothing else can be bound until it
    /// finishes.
    #[error("a ticket is already being created")]
    TicketCreationPending,

    /// The controller kind does not accept this login target.
    #[error("target not supported by this session: {reason}")]
    UnsupportedTarget {
        /// Description of the mismatch.
        reason: String,
    },

    /// A transport call failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The device identity store failed.
    #[error("device identity error: {0}")]
    Store(#[from] StoreError),

    /// The driver task is gone.
    #[error("session driver stopped")]
    DriverStopped,
}

impl SessionError {
    /// Class of this error for notification purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::UnsupportedTarget { .. } => ErrorCategory::Validation,
            Self::Transport(e) if e.is_auth() => ErrorCategory::Auth,
            Self::AlreadyConnecting
            | Self::AlreadyConnected
            | Self::NotConnected { .. }
            | Self::Transport(_)
            | Self::Store(_)
            | Self::DriverStopped => ErrorCategory::Transport,
            Self::NoScope | Self::TicketCreationPending => ErrorCategory::Application,
        }
    }

    /// User-visible notification for a refused intent.
    pub fn to_notification(&self) -> Notification {
        let text = match self {
            Self::NotConnected { .. } | Self::NoScope => "Not connected to server".to_string(),
            Self::AlreadyConnecting => "Already connecting".to_string(),
            Self::AlreadyConnected => "Already connected".to_string(),
            Self::TicketCreationPending => "A ticket is already being created".to_string(),
            Self::Validation(err) => capitalize(&err.to_string()),
            Self::UnsupportedTarget { reason } => capitalize(reason),
            Self::Transport(err) => capitalize(&err.to_string()),
            Self::Store(_) => "Failed to load device identity".to_string(),
            Self::DriverStopped => "Session closed".to_string(),
        };
        Notification::error(self.category(), text)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}
