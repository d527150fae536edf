//! Wire-level contracts.
//!
//! Everything that crosses the raw transport is an [`envelope::Envelope`];
//! the payloads inside are either the JSON-RPC shapes of the provider
//! channel ([`rpc`]) or the typed notices of the communication channels
//! ([`channels`]).

pub mod channels;
pub mod envelope;
pub mod rpc;
