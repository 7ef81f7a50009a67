//! Transport implementations.
//!
//! The production chat library plugs in through [`parley_core::Connector`].
//! This crate ships an in-process backend for tests, simulations and the
//! offline terminal client.

pub mod memory;

pub use memory::{BackendOp, FaultPlan, MemoryBackend, MemoryClient, MemoryConnector};
