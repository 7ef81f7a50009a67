//! Input box model.
//!
//! Holds the composed text and at most one in-flight send. The text is only
//! cleared once a send is acknowledged; a failed send leaves it in place so the
//! user can retry.

use parley_core::ValidationError;

use crate::event::{RequestId, SendRequest};

/// Input box state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    text: String,
    focused: bool,
    in_flight: Option<SendRequest>,
}

impl Composer {
    /// Create an empty, unfocused input box.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether focus was returned after the last successful send.
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Whether a send is awaiting acknowledgment.
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Replace the text. Ignored while a send is in flight (the input is
    /// disabled); returns whether the edit was applied.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        if self.is_sending() {
            return false;
        }
        self.text = text.into();
        true
    }

    /// Lock the input for `request`.
    pub fn begin_send(&mut self, request: SendRequest) -> Result<(), ValidationError> {
        if self.is_sending() {
            return Err(ValidationError::SendInProgress);
        }
        self.focused = false;
        self.in_flight = Some(request);
        Ok(())
    }

    /// Release the lock for `id`.
    ///
    /// On success the text is cleared and focus returned. Returns the finished
    /// request, or `None` if `id` is not the one in flight.
    pub fn complete(&mut self, id: RequestId, ok: bool) -> Option<SendRequest> {
        if self.in_flight.as_ref().map(|r| r.id) != Some(id) {
            return None;
        }

        if ok {
            self.text.clear();
            self.focused = true;
        }
        self.in_flight.take()
    }

    /// Back to an empty input box.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
