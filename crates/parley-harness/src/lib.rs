//! Deterministic test support for Parley sessions.
//!
//! [`SimEnv`] implements [`parley_core::Environment`] with a seeded RNG and a
//! manually advanced wall clock, so device ids and message timestamps are
//! reproducible.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the session
//! lifecycle. Operations are applied to both the model and the real
//! `SessionController`, and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;

pub use model::{
    ModelMessage, ModelSession, ModelTarget, ModelWorld, ObservableState, Operation,
    OperationError, OperationResult, SmallText, TargetSlot, TextShape,
};
pub use sim_env::SimEnv;
