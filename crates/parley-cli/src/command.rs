//! Input line parsing.
//!
//! Lines starting with `/` are local commands, except the whisper prefixes,
//! which go to the session like any other text.

use parley_core::{NewTicket, TicketId, ValidationError};
use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the command list.
    Help,
    /// Log out and exit.
    Quit,
    /// Log in again with the startup identity and target.
    Login,
    /// Log out, stay running.
    Logout,
    /// Bind a channel.
    Join(String),
    /// Bind an existing ticket.
    Ticket(TicketId),
    /// Open a ticket and bind it.
    NewTicket(NewTicket),
    /// Make the local backend deliver a message from someone else.
    Inject {
        /// Pretend sender.
        sender: String,
        /// Message text.
        content: String,
        /// Deliver as a whisper to us instead of to the bound scope.
        whisper: bool,
    },
    /// Send text (whispers included).
    Say(String),
}

/// Malformed command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Wrong arguments.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// Arguments failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Shown by `/help`.
pub const HELP: &str = "\
commands:
  /join <channel>                     switch channel
  /ticket <id>                        open an existing ticket
  /new-ticket <topic> | <description> create a ticket
  /w <user> <text>                    whisper
  /inject <sender> <text>             local backend: message from someone else
  /inject-whisper <sender> <text>     local backend: whisper from someone else
  /logout, /login                     end or restart the session
  /quit                               exit";

impl Command {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let Some(rest) = line.trim().strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };
        let (name, args) =
            rest.split_once(char::is_whitespace).map_or((rest, ""), |(n, a)| (n, a.trim()));

        match name {
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            "login" => Ok(Self::Login),
            "logout" => Ok(Self::Logout),
            "join" => single(args, "/join <channel>").map(|c| Self::Join(c.to_string())),
            "ticket" => single(args, "/ticket <id>").map(|id| Self::Ticket(TicketId::new(id))),
            "new-ticket" => {
                let usage = CommandError::Usage("/new-ticket <topic> | <description>");
                let (topic, description) = args.split_once('|').ok_or(usage)?;
                Ok(Self::NewTicket(NewTicket::new(topic.trim(), description.trim())?))
            },
            "inject" | "inject-whisper" => {
                let whisper = name == "inject-whisper";
                let usage = CommandError::Usage("/inject <sender> <text>");
                let (sender, content) = args.split_once(char::is_whitespace).ok_or(usage)?;
                Ok(Self::Inject {
                    sender: sender.to_string(),
                    content: content.trim().to_string(),
                    whisper,
                })
            },
            _ => Ok(Self::Say(line.to_string())),
        }
    }
}

fn single<'a>(args: &'a str, usage: &'static str) -> Result<&'a str, CommandError> {
    if args.is_empty() || args.contains(char::is_whitespace) {
        return Err(CommandError::Usage(usage));
    }
    Ok(args)
}
