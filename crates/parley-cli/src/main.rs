//! Parley terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Chat in the preset's channel
//! parley --username alice
//!
//! # Open a support ticket
//! parley --username alice --topic Billing --description "Can't pay invoice"
//!
//! # Resume a support ticket
//! parley --username alice --ticket T-1
//! ```
//!
//! Sessions run against an in-process backend, so one binary is a complete
//! local setup. `/help` lists the commands.

mod command;
mod render;

use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
};

use clap::Parser;
use command::{Command, HELP};
use parley_client::{
    ClientConfig, MemoryBackend, ServerPreset, SessionController, SessionDriver, SessionHandle,
    SessionMachine, SessionStatus, SystemEnv, TicketSessionController, prepare_identity,
};
use parley_core::{
    Credentials, FileStore, Identity, NewTicket, ProductArea, Scope, Target, TicketId,
};
use render::Renderer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat and support client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Parley chat and support client")]
#[command(version)]
struct Args {
    /// Display name
    #[arg(short, long)]
    username: String,

    /// Server preset
    #[arg(long, default_value = "Global")]
    preset: String,

    /// Channel to join instead of the preset's
    #[arg(short, long)]
    channel: Option<String>,

    /// Resume a support ticket by id
    #[arg(long, conflicts_with_all = ["topic", "description"])]
    ticket: Option<String>,

    /// Open a support ticket with this topic
    #[arg(long, requires = "description")]
    topic: Option<String>,

    /// Description of the new support ticket
    #[arg(long, requires = "topic")]
    description: Option<String>,

    /// Device id file (defaults to the platform data directory)
    #[arg(long)]
    device_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr, chat goes to stdout.
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let preset = ServerPreset::by_name(&args.preset)
        .ok_or_else(|| format!("unknown preset: {}", args.preset))?;
    let mut config = ClientConfig::from_preset(preset);
    if let Some(channel) = &args.channel {
        config.channel.clone_from(channel);
    }

    let target = login_target(&args, &config)?;
    let area = if target.is_ticket() { ProductArea::Support } else { ProductArea::Chat };

    let store = FileStore::new(device_file(args.device_file)?);
    let env = SystemEnv::new();
    let credentials =
        Credentials::new(args.username, &config.application_id, &config.application_secret);
    let identity = prepare_identity(credentials, &store, area, &env)?;
    tracing::info!(device_id = %identity.device_id, ?area, path = %store.path().display(), "identity ready");

    let backend = MemoryBackend::new();
    backend.register_application(&config.application_id, &config.application_secret);

    let session = Session { backend, identity, target };
    if session.target.is_ticket() {
        session.run(TicketSessionController::new(env.clone()), env, config).await
    } else {
        session.run(SessionController::new(env.clone()), env, config).await
    }
}

fn login_target(args: &Args, config: &ClientConfig) -> Result<Target, Box<dyn Error>> {
    if let Some(ticket) = &args.ticket {
        return Ok(Target::Ticket(TicketId::new(ticket.as_str())));
    }
    if let (Some(topic), Some(description)) = (&args.topic, &args.description) {
        return Ok(Target::NewTicket(NewTicket::new(topic.as_str(), description.as_str())?));
    }
    Ok(Target::Channel(config.channel.clone()))
}

fn device_file(explicit: Option<PathBuf>) -> Result<PathBuf, Box<dyn Error>> {
    explicit
        .or_else(|| dirs::data_dir().map(|dir| dir.join("parley").join("device.cbor")))
        .ok_or_else(|| "no platform data directory; pass --device-file".into())
}

/// One interactive session over the local backend.
struct Session {
    backend: MemoryBackend,
    identity: Identity,
    target: Target,
}

impl Session {
    async fn run<M: SessionMachine>(
        self,
        machine: M,
        env: SystemEnv,
        config: ClientConfig,
    ) -> Result<(), Box<dyn Error>> {
        let (handle, mut notifications) =
            SessionDriver::spawn(machine, self.backend.connector(), env, config);
        handle.login(self.identity.clone(), self.target.clone())?;

        let mut snapshots = handle.subscribe();
        let mut renderer = Renderer::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut out = io::stdout();

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    for line in renderer.snapshot(&snapshot) {
                        writeln!(out, "{line}")?;
                    }
                },
                Some(notification) = notifications.recv() => {
                    writeln!(out, "{}", render::notification(&notification))?;
                },
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match Command::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => self.dispatch(&handle, command, &mut out)?,
                        Err(e) => writeln!(out, "! {e}")?,
                    }
                },
            }
        }

        handle.logout()?;
        if handle.wait_for(|s| s.status == SessionStatus::Disconnected).await.is_err() {
            tracing::debug!("driver stopped before logout completed");
        }
        Ok(())
    }

    fn dispatch(
        &self,
        handle: &SessionHandle,
        command: Command,
        out: &mut impl Write,
    ) -> Result<(), Box<dyn Error>> {
        match command {
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => {},
            Command::Login => handle.login(self.identity.clone(), self.target.clone())?,
            Command::Logout => handle.logout()?,
            Command::Join(channel) => handle.bind(Target::Channel(channel))?,
            Command::Ticket(ticket_id) => handle.bind(Target::Ticket(ticket_id))?,
            Command::NewTicket(ticket) => handle.bind(Target::NewTicket(ticket))?,
            Command::Inject { sender, content, whisper: true } => {
                self.backend.whisper(&sender, &self.identity.username, &content);
            },
            Command::Inject { sender, content, whisper: false } => {
                match handle.snapshot().scope {
                    Some(Scope::Channel(channel)) => {
                        self.backend.post_to_channel(&channel, &sender, &content);
                    },
                    Some(Scope::Ticket(ticket_id)) => {
                        if self.backend.reply_to_ticket(&ticket_id, &sender, &content).is_none() {
                            writeln!(out, "! unknown ticket {ticket_id}")?;
                        }
                    },
                    None => writeln!(out, "! nothing to inject into yet")?,
                }
            },
            Command::Say(text) => handle.say(text)?,
        }
        Ok(())
    }
}
