//! Core error types.

use thiserror::Error;

/// Malformed local input, rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Message text is empty after trimming.
    #[error("message is empty")]
    EmptyMessage,

    /// A required form field is blank.
    #[error("{field} is required")]
    MissingField {
        /// Name of the blank field.
        field: &'static str,
    },

    /// A send is already in flight for the input box.
    #[error("a message is already being sent")]
    SendInProgress,
}

/// Errors from the device identity key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a valid store.
    #[error("store is corrupt: {reason}")]
    Corrupt {
        /// Description of the decoding failure.
        reason: String,
    },

    /// The in-memory store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}
