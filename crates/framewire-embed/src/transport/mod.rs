//! Raw transport seam.
//!
//! The multiplexer assumes exactly this much of the outside world: a
//! reliable, order-preserving, bidirectional stream of structured objects
//! between two endpoints. The browser binding (window post-message pair) is
//! out of scope; tests and demos use the in-memory [`pair::PairTransport`].

pub mod pair;

use async_trait::async_trait;

use framewire_core::protocol::envelope::Envelope;
use framewire_core::Result;

pub use pair::PairTransport;

/// One duplex endpoint. The multiplexer's router task takes exclusive
/// ownership, which is why both methods borrow mutably.
#[async_trait]
pub trait RawTransport: Send {
    /// Send one envelope to the peer.
    async fn send(&mut self, env: Envelope) -> Result<()>;

    /// Receive the next inbound envelope.
    ///
    /// `None` means the peer ended the stream; `Some(Err(_))` is a transport
    /// error. Both are terminal for the multiplexer.
    async fn recv(&mut self) -> Option<Result<Envelope>>;
}
