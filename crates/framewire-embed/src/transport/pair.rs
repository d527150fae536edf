//! In-memory duplex transport.
//!
//! Two endpoints joined by a pair of unbounded channels. Order-preserving
//! and object-capable, which is all the multiplexer contract asks for.
//! Dropping one endpoint ends the stream for the other.

use async_trait::async_trait;
use tokio::sync::mpsc;

use framewire_core::protocol::envelope::Envelope;
use framewire_core::{FramewireError, Result};

use super::RawTransport;

/// One endpoint of an in-memory duplex pair.
pub struct PairTransport {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl PairTransport {
    /// Create a connected pair of endpoints.
    pub fn pair() -> (PairTransport, PairTransport) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            PairTransport { tx: a_tx, rx: b_rx },
            PairTransport { tx: b_tx, rx: a_rx },
        )
    }
}

#[async_trait]
impl RawTransport for PairTransport {
    async fn send(&mut self, env: Envelope) -> Result<()> {
        self.tx.send(env).map_err(|_| FramewireError::Disconnected)
    }

    async fn recv(&mut self) -> Option<Result<Envelope>> {
        self.rx.recv().await.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_in_order() {
        let (mut a, mut b) = PairTransport::pair();
        a.send(Envelope::new("c1", json!(1))).await.unwrap();
        a.send(Envelope::new("c1", json!(2))).await.unwrap();

        assert_eq!(b.recv().await.unwrap().unwrap().data, json!(1));
        assert_eq!(b.recv().await.unwrap().unwrap().data, json!(2));
    }

    #[tokio::test]
    async fn drop_ends_stream() {
        let (a, mut b) = PairTransport::pair();
        drop(a);
        assert!(b.recv().await.is_none());
    }
}
