//! Parley core
//!
//! Domain types and pure logic for the Parley chat/support client. Nothing in
//! this crate performs I/O on its own; the client crate drives it.
//!
//! # Components
//!
//! - [`env::Environment`]: wall clock, randomness and timers behind a trait
//! - [`device`]: per-product device identifiers over an injectable store
//! - [`identity`]: login credentials and session identity
//! - [`message`]: inbound and ledger messages
//! - [`ledger::MessageLedger`]: append-only broadcast/whisper sequences with a
//!   merged, time-ordered view
//! - [`whisper::WhisperRouter`]: `/whisper` command recognition
//! - [`scope`]: channels, tickets and login targets
//! - [`transport`]: the client-library contract the session consumes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod device;
pub mod env;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod message;
pub mod scope;
pub mod transport;
pub mod whisper;

pub use device::{DeviceId, FileStore, KeyValueStore, MemoryStore, ProductArea, device_id};
pub use env::Environment;
pub use error::{StoreError, ValidationError};
pub use identity::{Credentials, Identity};
pub use ledger::{LedgerEntry, MergedView, MessageLedger};
pub use message::{InboundMessage, Message, MessageId, MessageKind};
pub use scope::{NewTicket, Scope, Target, Ticket, TicketId};
pub use transport::{
    ConnectParams, ConnectionId, Connector, EventSink, SendReceipt, TransportClient,
    TransportError, TransportEvent,
};
pub use whisper::{Outbound, WhisperRouter};
