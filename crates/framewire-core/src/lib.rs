//! framewire core: transport-agnostic wire contracts and the error surface.
//!
//! This crate defines the envelope that carries every named-channel payload,
//! the JSON-RPC shapes exchanged on the provider channel, the typed payloads
//! of the wallet communication channels, and the shared error type. It
//! intentionally carries no runtime dependencies so it can be reused by any
//! transport binding.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `FramewireError`/`Result` so a host
//! page never crashes on malformed traffic from the wallet frame.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, FramewireError, Result};
