//! Shared harness: a scripted wallet frame driving the far end of a paired
//! transport, plus flag-backed popup windows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::Notify;

use framewire_core::protocol::envelope::Envelope;
use framewire_core::Result;
use framewire_embed::config::EmbedConfig;
use framewire_embed::popup::{WindowHandle, WindowOpener};
use framewire_embed::session::EmbedSession;
use framewire_embed::transport::{PairTransport, RawTransport};

/// The wallet frame side of the wire. Tests script it step by step.
pub struct FakeFrame {
    far: PairTransport,
}

impl FakeFrame {
    /// Next envelope on the wire, asserting which channel it rides on.
    pub async fn expect(&mut self, channel: &str) -> Value {
        let env = self
            .far
            .recv()
            .await
            .expect("transport ended")
            .expect("transport error");
        assert_eq!(env.name, channel, "unexpected channel: {:?}", env.data);
        env.data
    }

    pub async fn send(&mut self, channel: &str, data: Value) {
        self.far.send(Envelope::new(channel, data)).await.unwrap();
    }

    /// Asserts nothing reaches the wire for a short window.
    pub async fn assert_quiet(&mut self) {
        let res = tokio::time::timeout(Duration::from_millis(50), self.far.recv()).await;
        assert!(res.is_err(), "expected no outbound traffic: {res:?}");
    }

    /// Play the frame's half of the init handshake.
    pub async fn complete_init(&mut self) {
        let init = self.expect("init_stream").await;
        assert_eq!(init["name"], "init_stream");
        let change = self.expect("provider_change").await;
        assert_eq!(change["name"], "show_provider_change");
        self.send(
            "init_stream",
            json!({"name": "init_complete", "data": {"success": true}}),
        )
        .await;
        self.send("provider_change", json!({"data": {"success": true}}))
            .await;
    }

    /// Serve one RPC request, asserting its method, and return the request
    /// payload as seen on the wire.
    pub async fn answer_rpc(&mut self, method: &str, result: Value) -> Value {
        let req = self.expect("provider").await;
        assert_eq!(req["method"], method);
        self.send("provider", json!({"id": req["id"], "result": result}))
            .await;
        req
    }
}

pub struct TestWindow {
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

#[derive(Clone, Default)]
pub struct TestOpener {
    pub windows: Arc<DashMap<String, (Arc<AtomicBool>, Arc<Notify>)>>,
    pub features: Arc<DashMap<String, String>>,
}

impl WindowOpener for TestOpener {
    fn open(&self, url: &str, _target: &str, features: &str) -> Result<Box<dyn WindowHandle>> {
        let closed = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        self.windows
            .insert(url.to_string(), (Arc::clone(&closed), Arc::clone(&notify)));
        self.features.insert(url.to_string(), features.to_string());
        Ok(Box::new(TestWindow { closed, notify }))
    }
}

#[async_trait]
impl WindowHandle for TestWindow {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn wait_closed(&mut self) {
        loop {
            let notified = self.notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

/// Poll until the window whose url carries `id` is closed.
pub async fn assert_window_closed(opener: &TestOpener, id: &str) {
    for _ in 0..100 {
        let mut seen = false;
        let mut all_closed = true;
        for w in opener.windows.iter() {
            if w.key().contains(id) {
                seen = true;
                all_closed &= w.value().0.load(Ordering::SeqCst);
            }
        }
        if seen && all_closed {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("window for {id} never closed");
}

pub fn session_pair() -> (Arc<EmbedSession>, FakeFrame, TestOpener) {
    session_with_config(EmbedConfig::new("https://wallet.example"))
}

pub fn session_with_config(config: EmbedConfig) -> (Arc<EmbedSession>, FakeFrame, TestOpener) {
    // RUST_LOG=framewire_embed=trace makes failing flows readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let (near, far) = PairTransport::pair();
    let opener = TestOpener::default();
    let session = EmbedSession::new(config, Box::new(near), Arc::new(opener.clone())).unwrap();
    (session, FakeFrame { far }, opener)
}

/// Init end to end against the scripted frame.
pub async fn run_init(session: &Arc<EmbedSession>, frame: &mut FakeFrame) {
    let s = Arc::clone(session);
    let task = tokio::spawn(async move { s.init(None).await });
    frame.complete_init().await;
    task.await.unwrap().unwrap();
}
