//! framewire embed library entry.
//!
//! This crate wires the raw transport, channel multiplexer, RPC correlator,
//! provider state machine, popup tracker, and session orchestrator into a
//! cohesive embed stack. It is intended to be consumed by host applications
//! and by integration tests.

pub mod config;
pub mod mux;
pub mod popup;
pub mod provider;
pub mod rpc;
pub mod session;
pub mod transport;
