//! Session scope: the channel or support ticket a session is bound to.

use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, identity::require};

/// Opaque support ticket identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    /// Wrap a ticket identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Support ticket metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier.
    pub id: TicketId,
    /// Short subject line.
    pub topic: String,
    /// Problem description.
    pub description: String,
    /// Username of the creator.
    pub created_by: String,
}

/// Request to open a new ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    /// Short subject line.
    pub topic: String,
    /// Problem description.
    pub description: String,
}

impl NewTicket {
    /// Build a request, rejecting blank fields.
    pub fn new(
        topic: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let topic = topic.into();
        let description = description.into();
        require("topic", &topic)?;
        require("description", &description)?;
        Ok(Self { topic, description })
    }
}

/// Where a bound session's messages live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Open chat channel by name.
    Channel(String),
    /// Support ticket.
    Ticket(TicketId),
}

impl Scope {
    /// Ticket id when this is a ticket scope.
    pub fn ticket_id(&self) -> Option<&TicketId> {
        match self {
            Self::Ticket(id) => Some(id),
            Self::Channel(_) => None,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel(name) => write!(f, "#{name}"),
            Self::Ticket(id) => write!(f, "ticket {id}"),
        }
    }
}

/// Scope requested at login, resolved once the transport connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Join a channel and hydrate its history.
    Channel(String),
    /// Resume an existing ticket.
    Ticket(TicketId),
    /// Open a new ticket.
    NewTicket(NewTicket),
}

impl Target {
    /// Reject blank channel names and ticket ids.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Channel(name) => require("channel", name),
            Self::Ticket(id) => require("ticket id", id.as_str()),
            Self::NewTicket(ticket) => {
                require("topic", &ticket.topic)?;
                require("description", &ticket.description)
            },
        }
    }

    /// Scope this target binds, known up front except for a new ticket.
    pub fn scope(&self) -> Option<Scope> {
        match self {
            Self::Channel(name) => Some(Scope::Channel(name.clone())),
            Self::Ticket(id) => Some(Scope::Ticket(id.clone())),
            Self::NewTicket(_) => None,
        }
    }

    /// Whether this target binds a support ticket.
    pub fn is_ticket(&self) -> bool {
        !matches!(self, Self::Channel(_))
    }
}
