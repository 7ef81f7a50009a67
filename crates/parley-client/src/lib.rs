//! Parley client
//!
//! Session lifecycle and message reconciliation for the Parley chat/support
//! client.
//!
//! # Architecture
//!
//! ```text
//! parley-client
//!   ├─ SessionController        (Sans-IO chat session state machine)
//!   ├─ TicketSessionController  (ticket-bound variant)
//!   ├─ Composer                 (input box, single in-flight send)
//!   ├─ SessionDriver            (dispatch loop over one event channel)
//!   ├─ ActionExecutor           (transport calls as tasks)
//!   ├─ ConnectionRegistry       (live transport instances)
//!   ├─ SystemEnv                (production Environment impl)
//!   └─ MemoryBackend            (in-process server)
//! ```
//!
//! The controllers never perform I/O: they consume [`SessionEvent`]s and
//! return [`SessionAction`]s. The driver executes those actions and feeds
//! every result back in as another event.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod composer;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod executor;
pub mod login;
pub mod registry;
pub mod session;
pub mod snapshot;
mod system_env;
pub mod ticket;
pub mod transport;

pub use composer::Composer;
pub use config::{ClientConfig, ServerPreset};
pub use driver::{SessionDriver, SessionHandle, SessionMachine};
pub use error::{ErrorCategory, SessionError};
pub use event::{
    Completion, Notification, NotificationLevel, RequestId, SendRequest, SendRoute, SessionAction,
    SessionEvent,
};
pub use executor::ActionExecutor;
pub use login::prepare_identity;
pub use registry::ConnectionRegistry;
pub use session::{SessionController, SessionStatus};
pub use snapshot::{DisplayMessage, SessionSnapshot};
pub use system_env::SystemEnv;
pub use ticket::TicketSessionController;
pub use transport::{BackendOp, FaultPlan, MemoryBackend, MemoryClient, MemoryConnector};
