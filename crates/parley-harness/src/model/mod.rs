//! Reference model for model-based testing.
//!
//! The model is a simplified session that captures what a user can observe
//! (lifecycle, bound scope, accepted message ids, input box) without
//! transport, timestamps or notifications. It serves as the oracle against
//! which `SessionController` is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Observable behaviour only: no logging, no notification text
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod session;
mod world;

pub use operation::{
    ModelTarget, Operation, OperationError, OperationResult, SmallText, TargetSlot, TextShape,
};
pub use session::{ModelMessage, ModelSession};
pub use world::{ModelWorld, ObservableState};
