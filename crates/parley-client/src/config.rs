//! Client configuration.

use std::time::Duration;

/// Named server/application presets.
///
/// The login form offers these by name; the first entry is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPreset {
    /// Preset name shown to the user.
    pub name: &'static str,
    /// Server endpoint.
    pub server_url: &'static str,
    /// Backend application identifier.
    pub application_id: &'static str,
    /// Backend application secret.
    pub application_secret: &'static str,
    /// Channel joined by chat sessions.
    pub channel: &'static str,
}

impl ServerPreset {
    /// All known presets.
    pub const ALL: &'static [Self] = &[Self {
        name: "Global",
        server_url: "https://signalr.fiveminutes.cloud/signalr",
        application_id: "Demo01",
        application_secret: "DemoSecret",
        channel: "Global",
    }];

    /// Look up a preset by name (case-insensitive).
    pub fn by_name(name: &str) -> Option<&'static Self> {
        Self::ALL.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Configuration for a session driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server endpoint.
    pub server_url: String,
    /// Backend application identifier.
    pub application_id: String,
    /// Backend application secret.
    pub application_secret: String,
    /// Channel joined by chat sessions.
    pub channel: String,
    /// Client platform label reported to the server.
    pub platform: String,
    /// Preferred language tag.
    pub language: String,
    /// Upper bound on waiting for a transport to disconnect.
    pub disconnect_timeout: Duration,
}

impl ClientConfig {
    /// Configuration for a named preset, other fields at their defaults.
    pub fn from_preset(preset: &ServerPreset) -> Self {
        Self {
            server_url: preset.server_url.to_string(),
            application_id: preset.application_id.to_string(),
            application_secret: preset.application_secret.to_string(),
            channel: preset.channel.to_string(),
            platform: "Parley Terminal Client".to_string(),
            language: "en-US".to_string(),
            disconnect_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_preset(&ServerPreset::ALL[0])
    }
}
