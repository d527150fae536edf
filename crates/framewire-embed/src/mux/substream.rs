//! Named sub-stream endpoint.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex};

use framewire_core::protocol::envelope::Envelope;
use framewire_core::{FramewireError, Result};

/// A duplex channel restricted to one multiplexer and one name.
///
/// Clones share the same receive buffer, so requesting the same channel name
/// twice observes a single stream of payloads. Writes are fire-and-forget
/// and preserve order relative to other writes on this substream.
#[derive(Clone)]
pub struct Substream {
    name: Arc<str>,
    out_tx: mpsc::UnboundedSender<Envelope>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Value>>>,
    alive: watch::Receiver<bool>,
}

impl Substream {
    pub(crate) fn new(
        name: Arc<str>,
        out_tx: mpsc::UnboundedSender<Envelope>,
        rx: mpsc::UnboundedReceiver<Value>,
        alive: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name,
            out_tx,
            rx: Arc::new(Mutex::new(rx)),
            alive,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap the payload in an envelope tagged with this substream's name and
    /// hand it to the multiplexer, the sole writer of the raw transport.
    pub fn write<T: Serialize>(&self, payload: &T) -> Result<()> {
        let data = serde_json::to_value(payload)
            .map_err(|e| FramewireError::Internal(format!("encode payload: {e}")))?;
        self.out_tx
            .send(Envelope::new(self.name.as_ref(), data))
            .map_err(|_| FramewireError::Disconnected)
    }

    /// Next payload routed to this channel; `None` once the transport ended.
    pub async fn recv(&self) -> Option<Value> {
        self.rx.lock().await.recv().await
    }

    /// Next payload that decodes as `T`; undecodable payloads are skipped.
    pub async fn recv_parsed<T: DeserializeOwned>(&self) -> Option<T> {
        loop {
            let v = self.recv().await?;
            match serde_json::from_value(v) {
                Ok(parsed) => return Some(parsed),
                Err(e) => {
                    tracing::trace!(channel = %self.name, error = %e, "skipping undecodable payload");
                }
            }
        }
    }

    /// Whether the underlying transport is still up.
    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    /// Resolves once the underlying transport has ended or errored.
    pub async fn wait_disconnected(&self) {
        let mut alive = self.alive.clone();
        while *alive.borrow() {
            if alive.changed().await.is_err() {
                return;
            }
        }
    }
}
