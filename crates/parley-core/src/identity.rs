//! User credentials and session identity.

use serde::{Deserialize, Serialize};

use crate::{device::DeviceId, error::ValidationError};

/// Credentials as entered on the login form.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl redacts `application_secret` so
///   credentials never reach the logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Display name the user chats under.
    pub username: String,
    /// Backend application identifier.
    pub application_id: String,
    /// Backend application secret.
    pub application_secret: String,
}

impl Credentials {
    /// Create credentials from the three form fields.
    pub fn new(
        username: impl Into<String>,
        application_id: impl Into<String>,
        application_secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            application_id: application_id.into(),
            application_secret: application_secret.into(),
        }
    }

    /// Reject blank fields before anything touches the network.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("username", &self.username)?;
        require("application id", &self.application_id)?;
        require("application secret", &self.application_secret)
    }

    /// Bind these credentials to a device, producing a session identity.
    pub fn with_device(self, device_id: DeviceId) -> Identity {
        Identity {
            username: self.username.trim().to_string(),
            application_id: self.application_id.trim().to_string(),
            application_secret: self.application_secret,
            device_id,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("application_id", &self.application_id)
            .field("application_secret", &"<redacted>")
            .finish()
    }
}

/// Identity of one logical session.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl redacts `application_secret`.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Display name; messages whose sender equals this are our own.
    pub username: String,
    /// Backend application identifier.
    pub application_id: String,
    /// Backend application secret.
    pub application_secret: String,
    /// Stable per-profile device identifier.
    pub device_id: DeviceId,
}

impl Identity {
    /// Reject an identity with blank fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("username", &self.username)?;
        require("application id", &self.application_id)?;
        require("application secret", &self.application_secret)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("application_id", &self.application_id)
            .field("application_secret", &"<redacted>")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Require a non-blank field.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}
