//! Named-channel envelope.
//!
//! One raw duplex stream carries many logical channels; the envelope tag is
//! the only routing information the multiplexer looks at. `data` stays a
//! `Value` so each substream consumer parses its own payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only shape ever written to the raw transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Logical channel name.
    pub name: String,
    /// Opaque channel payload.
    pub data: Value,
}

impl Envelope {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Lenient decode of an arbitrary inbound object.
    ///
    /// Anything that is not an envelope is dropped by the multiplexer, never
    /// surfaced as an error; a misbehaving frame must not kill the pipe.
    pub fn from_value(v: Value) -> Option<Self> {
        match serde_json::from_value(v) {
            Ok(env) => Some(env),
            Err(e) => {
                tracing::trace!(error = %e, "dropping non-envelope payload");
                None
            }
        }
    }
}
