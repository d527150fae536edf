//! RPC request correlator.
//!
//! Sits on top of one substream and turns host-issued calls into correlated
//! request/response pairs. Responses may arrive out of order; correlation is
//! by id, and resolution is exactly-once even under duplicate or delayed
//! responses. Unsolicited notifications (subscription feeds, state pushes)
//! are fanned out on a separate channel instead of being dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use framewire_core::protocol::rpc::{RpcIncoming, RpcNotification, RpcRequest};
use framewire_core::{FramewireError, Result};

use crate::mux::Substream;

type PendingMap = Arc<DashMap<u64, oneshot::Sender<Result<Value>>>>;

/// Correlates JSON-RPC calls over one substream.
#[derive(Clone)]
pub struct RpcCorrelator {
    stream: Substream,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
}

impl RpcCorrelator {
    /// Start the reader task and return the correlator plus the stream of
    /// unsolicited notifications.
    pub fn new(stream: Substream) -> (Self, mpsc::UnboundedReceiver<RpcNotification>) {
        let pending: PendingMap = Arc::new(DashMap::new());
        let (notif_tx, notif_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(stream.clone(), Arc::clone(&pending), notif_tx));

        (
            Self {
                stream,
                pending,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            notif_rx,
        )
    }

    /// Issue a correlated call and await its result.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.call_with_preopen(method, params, None).await
    }

    /// Issue a correlated call tagged with a popup correlation id.
    pub async fn call_with_preopen(
        &self,
        method: &str,
        params: Option<Value>,
        preopen_instance_id: Option<String>,
    ) -> Result<Value> {
        if !self.stream.is_alive() {
            return Err(FramewireError::Disconnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut req = RpcRequest::new(id, method, params);
        req.preopen_instance_id = preopen_instance_id;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if let Err(e) = self.stream.write(&req) {
            self.pending.remove(&id);
            return Err(e);
        }
        tracing::debug!(id, method, "rpc request sent");

        match rx.await {
            Ok(outcome) => outcome,
            // reader task gone without resolving us: transport died
            Err(_) => Err(FramewireError::Disconnected),
        }
    }

    /// Fire-and-forget notification; no id, nothing tracked.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.stream.write(&req)
    }

    /// Number of requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

async fn read_loop(
    stream: Substream,
    pending: PendingMap,
    notif_tx: mpsc::UnboundedSender<RpcNotification>,
) {
    while let Some(v) = stream.recv().await {
        match RpcIncoming::from_value(v) {
            RpcIncoming::Response(resp) => {
                // remove() makes a duplicate response a no-op
                let Some((_, tx)) = pending.remove(&resp.id) else {
                    tracing::trace!(id = resp.id, "dropping response with no pending request");
                    continue;
                };
                let outcome = match resp.error {
                    Some(err) => Err(FramewireError::Rpc {
                        code: err.code,
                        message: err.message,
                        data: err.data,
                    }),
                    None => Ok(resp.result.unwrap_or(Value::Null)),
                };
                // caller may have been dropped; nothing to do then
                let _ = tx.send(outcome);
            }
            RpcIncoming::Notification(notif) => {
                let _ = notif_tx.send(notif);
            }
            RpcIncoming::Unknown(v) => {
                tracing::trace!(payload = %v, "dropping unrecognized rpc payload");
            }
        }
    }

    // Substream ended: every pending caller fails exactly once. remove()
    // guarantees no id is rejected twice even if a response raced in.
    let ids: Vec<u64> = pending.iter().map(|e| *e.key()).collect();
    for id in ids {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(FramewireError::Disconnected));
        }
    }
    tracing::debug!("rpc reader stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::mux::ChannelMux;
    use crate::transport::{PairTransport, RawTransport};
    use framewire_core::protocol::envelope::Envelope;
    use serde_json::json;

    async fn setup() -> (RpcCorrelator, PairTransport) {
        let (near, far) = PairTransport::pair();
        let mux = ChannelMux::new(Box::new(near));
        let (correlator, _notifs) = RpcCorrelator::new(mux.get_channel("provider"));
        (correlator, far)
    }

    #[tokio::test]
    async fn resolves_by_id_out_of_order() {
        let (correlator, mut far) = setup().await;

        let c1 = correlator.clone();
        let first = tokio::spawn(async move { c1.call("eth_accounts", None).await });
        let c2 = correlator.clone();
        let second = tokio::spawn(async move { c2.call("net_version", None).await });

        // read both requests, answer in reverse order
        let r1 = far.recv().await.unwrap().unwrap();
        let r2 = far.recv().await.unwrap().unwrap();
        let id1 = r1.data["id"].as_u64().unwrap();
        let id2 = r2.data["id"].as_u64().unwrap();
        assert_ne!(id1, id2);

        far.send(Envelope::new("provider", json!({"id": id2, "result": "3"})))
            .await
            .unwrap();
        far.send(Envelope::new("provider", json!({"id": id1, "result": ["0xabc"]})))
            .await
            .unwrap();

        assert_eq!(first.await.unwrap().unwrap(), json!(["0xabc"]));
        assert_eq!(second.await.unwrap().unwrap(), json!("3"));
    }

    #[tokio::test]
    async fn duplicate_response_is_ignored() {
        let (correlator, mut far) = setup().await;

        let c = correlator.clone();
        let call = tokio::spawn(async move { c.call("eth_accounts", None).await });
        let req = far.recv().await.unwrap().unwrap();
        let id = req.data["id"].as_u64().unwrap();

        far.send(Envelope::new("provider", json!({"id": id, "result": 1})))
            .await
            .unwrap();
        far.send(Envelope::new("provider", json!({"id": id, "result": 2})))
            .await
            .unwrap();

        assert_eq!(call.await.unwrap().unwrap(), json!(1));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn remote_error_passes_through() {
        let (correlator, mut far) = setup().await;

        let c = correlator.clone();
        let call = tokio::spawn(async move { c.call("eth_sign", None).await });
        let req = far.recv().await.unwrap().unwrap();
        let id = req.data["id"].as_u64().unwrap();

        far.send(Envelope::new(
            "provider",
            json!({"id": id, "error": {"code": 4001, "message": "user rejected"}}),
        ))
        .await
        .unwrap();

        match call.await.unwrap() {
            Err(FramewireError::Rpc { code, message, .. }) => {
                assert_eq!(code, 4001);
                assert_eq!(message, "user rejected");
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnect_fails_pending_once() {
        let (correlator, mut far) = setup().await;

        let c = correlator.clone();
        let call = tokio::spawn(async move { c.call("eth_accounts", None).await });
        // wait until the request is on the wire so the pending entry exists
        let _ = far.recv().await.unwrap().unwrap();

        drop(far);
        assert!(matches!(
            call.await.unwrap(),
            Err(FramewireError::Disconnected)
        ));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn notify_carries_no_id_and_tracks_nothing() {
        let (correlator, mut far) = setup().await;

        correlator.notify("wallet_ping", Some(json!({"seq": 1}))).unwrap();

        let env = far.recv().await.unwrap().unwrap();
        assert_eq!(env.name, "provider");
        assert_eq!(env.data["method"], "wallet_ping");
        assert!(env.data.get("id").is_none());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn notifications_are_routed_not_dropped() {
        let (near, mut far) = PairTransport::pair();
        let mux = ChannelMux::new(Box::new(near));
        let (_correlator, mut notifs) = RpcCorrelator::new(mux.get_channel("provider"));

        far.send(Envelope::new(
            "provider",
            json!({"method": "eth_subscription", "params": {"subscription": "0x1"}}),
        ))
        .await
        .unwrap();

        let n = notifs.recv().await.unwrap();
        assert_eq!(n.method, "eth_subscription");
    }
}
