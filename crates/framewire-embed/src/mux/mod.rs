//! Channel multiplexer.
//!
//! Turns one raw duplex object stream into many named logical substreams.
//! A single router task owns the transport: it is the only writer of
//! outbound envelopes and the only reader of inbound ones, so no locking
//! discipline beyond that exclusivity is needed.

mod substream;

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Notify};

use framewire_core::protocol::envelope::Envelope;

use crate::transport::RawTransport;

pub use substream::Substream;

/// Multiplexer handle. Cheap to clone; all clones share one router task.
#[derive(Clone)]
pub struct ChannelMux {
    channels: Arc<DashMap<String, Substream>>,
    inbound: Arc<DashMap<String, mpsc::UnboundedSender<Value>>>,
    out_tx: mpsc::UnboundedSender<Envelope>,
    alive: watch::Receiver<bool>,
    stop: Arc<Notify>,
}

impl ChannelMux {
    /// Take exclusive ownership of the transport and start routing.
    pub fn new(transport: Box<dyn RawTransport>) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (alive_tx, alive_rx) = watch::channel(true);
        let inbound: Arc<DashMap<String, mpsc::UnboundedSender<Value>>> = Arc::new(DashMap::new());
        let stop = Arc::new(Notify::new());

        tokio::spawn(route(
            transport,
            out_rx,
            Arc::clone(&inbound),
            alive_tx,
            Arc::clone(&stop),
        ));

        Self {
            channels: Arc::new(DashMap::new()),
            inbound,
            out_tx,
            alive: alive_rx,
            stop,
        }
    }

    /// Get or create the substream bound to `name`.
    ///
    /// Idempotent: a repeated name returns the same substream (shared
    /// receive buffer), so at most one substream object is bound to a name.
    pub fn get_channel(&self, name: &str) -> Substream {
        let sub = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                self.inbound.insert(name.to_string(), tx);
                Substream::new(
                    Arc::from(name),
                    self.out_tx.clone(),
                    rx,
                    self.alive.clone(),
                )
            })
            .clone();
        // A channel requested after teardown must still observe the ended
        // stream; the router cleared the registry before we inserted.
        if !*self.alive.borrow() {
            self.inbound.remove(name);
        }
        sub
    }

    /// Whether the router is still connected to the transport.
    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    /// Resolves once the transport has ended or errored.
    pub async fn wait_disconnected(&self) {
        let mut alive = self.alive.clone();
        while *alive.borrow() {
            if alive.changed().await.is_err() {
                return;
            }
        }
    }

    /// Tear down the router and end every open substream. Idempotent.
    pub fn shutdown(&self) {
        self.stop.notify_one();
    }
}

async fn route(
    mut transport: Box<dyn RawTransport>,
    mut out_rx: mpsc::UnboundedReceiver<Envelope>,
    inbound: Arc<DashMap<String, mpsc::UnboundedSender<Value>>>,
    alive_tx: watch::Sender<bool>,
    stop: Arc<Notify>,
) {
    enum Step {
        Out(Option<Envelope>),
        In(Option<framewire_core::Result<Envelope>>),
        Stop,
    }

    loop {
        // `transport.recv()` must be cancellation-safe: the future is
        // dropped whenever an outbound write wins the race.
        let step = tokio::select! {
            maybe_out = out_rx.recv() => Step::Out(maybe_out),
            incoming = transport.recv() => Step::In(incoming),
            _ = stop.notified() => Step::Stop,
        };

        match step {
            // outbound writer: substream writes funnel through here
            Step::Out(Some(env)) => {
                if let Err(e) = transport.send(env).await {
                    tracing::warn!(error = %e, "transport write failed");
                    break;
                }
            }
            Step::Out(None) => break,

            // inbound reader: route by channel name
            Step::In(Some(Ok(env))) => match inbound.get(&env.name) {
                Some(tx) => {
                    // receiver gone means the substream was torn down;
                    // nothing to do
                    let _ = tx.send(env.data);
                }
                None => {
                    tracing::trace!(channel = %env.name, "dropping envelope for unregistered channel");
                }
            },
            Step::In(Some(Err(e))) => {
                tracing::warn!(error = %e, "transport errored");
                break;
            }
            Step::In(None) => break,

            Step::Stop => break,
        }
    }

    // Ending the stream must be observed by every open substream so pending
    // reads do not hang: dropping the senders ends each receive buffer. The
    // alive flag flips first so late get_channel calls see the teardown.
    let _ = alive_tx.send(false);
    inbound.clear();
    tracing::debug!("mux router stopped");
}
