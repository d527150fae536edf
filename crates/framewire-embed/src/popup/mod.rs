//! Popup correlation manager.
//!
//! Methods that need explicit user confirmation are tagged with a
//! `preopenInstanceId` and paired with a satellite window whose lifecycle is
//! reconciled with the wallet frame over the `window` channel. One reader
//! task owns the inbound side of that channel and routes remote close
//! notices to the entry they belong to.
//!
//! The canonical flow is host-opens-and-announces: the host opens the window
//! itself and writes `opened_window`; the counter-party never opens windows
//! on the host's behalf.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::oneshot;

use framewire_core::protocol::channels::{WindowCloseNotice, WindowNotice};
use framewire_core::{FramewireError, Result};

use crate::mux::Substream;

/// Fixed feature string for confirmation popups (predictable geometry).
pub const FEATURES_CONFIRM_WINDOW: &str =
    "directories=0,titlebar=0,toolbar=0,status=0,location=0,menubar=0,height=700,width=450";

/// Centered-popup feature string for a given host viewport.
pub fn popup_features(inner_width: u32, inner_height: u32) -> String {
    let (w, h) = (1200u32, 700u32);
    let left = inner_width.saturating_sub(w) / 2;
    let top = inner_height.saturating_sub(h) / 2;
    format!("titlebar=0,toolbar=0,status=0,location=0,menubar=0,height={h},width={w},top={top},left={left}")
}

/// An open satellite window, as much of it as the core needs.
#[async_trait]
pub trait WindowHandle: Send {
    /// Close the window. Closing an already-closed window is a no-op.
    fn close(&self);
    fn is_closed(&self) -> bool;
    /// Resolves once the window has closed, locally or by the user.
    async fn wait_closed(&mut self);
}

/// Opens satellite windows. `Err` means the environment refused (popup
/// blocker), which callers must surface as [`FramewireError::PopupBlocked`],
/// distinct from a user-rejected confirmation.
pub trait WindowOpener: Send + Sync {
    fn open(&self, url: &str, target: &str, features: &str) -> Result<Box<dyn WindowHandle>>;
}

/// Overrides for one tracked window.
#[derive(Debug, Clone, Default)]
pub struct PopupOptions {
    pub url: Option<String>,
    pub target: Option<String>,
    pub features: Option<String>,
}

/// Tracks popup windows keyed by `preopenInstanceId`.
#[derive(Clone)]
pub struct PopupTracker {
    window_stream: Substream,
    opener: Arc<dyn WindowOpener>,
    wallet_url: String,
    confirm_features: String,
    entries: Arc<DashMap<String, oneshot::Sender<()>>>,
    next_id: Arc<AtomicU64>,
}

impl PopupTracker {
    pub fn new(
        window_stream: Substream,
        opener: Arc<dyn WindowOpener>,
        wallet_url: String,
        confirm_features: String,
    ) -> Self {
        let entries: Arc<DashMap<String, oneshot::Sender<()>>> = Arc::new(DashMap::new());

        tokio::spawn(close_notice_loop(
            window_stream.clone(),
            Arc::clone(&entries),
        ));

        Self {
            window_stream,
            opener,
            wallet_url,
            confirm_features,
            entries,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Fresh correlation id, unique per tracker instance.
    pub fn next_instance_id(&self) -> String {
        format!("pre-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Open a window for `preopen_instance_id`, announce it, and watch its
    /// lifecycle until either side closes it.
    pub fn track(&self, preopen_instance_id: &str, opts: PopupOptions) -> Result<()> {
        if self.entries.contains_key(preopen_instance_id) {
            return Err(FramewireError::Internal(format!(
                "preopen id already tracked: {preopen_instance_id}"
            )));
        }

        let url = opts.url.unwrap_or_else(|| {
            format!(
                "{}#/redirect?preopenInstanceId={preopen_instance_id}",
                self.wallet_url
            )
        });
        let target = opts.target.as_deref().unwrap_or("_blank");
        let features = opts.features.as_deref().unwrap_or(&self.confirm_features);

        let handle = self.opener.open(&url, target, features)?;

        // the window is already on screen; a failed announce must not leak it
        if let Err(e) = self
            .window_stream
            .write(&WindowNotice::opened(preopen_instance_id))
        {
            handle.close();
            return Err(e);
        }

        let (close_tx, close_rx) = oneshot::channel();
        self.entries
            .insert(preopen_instance_id.to_string(), close_tx);

        tokio::spawn(watch_window(
            handle,
            close_rx,
            preopen_instance_id.to_string(),
            self.window_stream.clone(),
            Arc::clone(&self.entries),
        ));

        Ok(())
    }

    /// Close and deregister a tracked window, e.g. once the correlated RPC
    /// call resolved. No-op if the window already closed.
    pub fn release(&self, preopen_instance_id: &str) {
        if let Some((_, close_tx)) = self.entries.remove(preopen_instance_id) {
            let _ = close_tx.send(());
        }
    }

    /// Number of windows currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }
}

/// Route remote-initiated `{preopenInstanceId, close: true}` notices to the
/// matching watcher. Unmatched or repeated notices are no-ops.
async fn close_notice_loop(
    window_stream: Substream,
    entries: Arc<DashMap<String, oneshot::Sender<()>>>,
) {
    while let Some(notice) = window_stream.recv_parsed::<WindowCloseNotice>().await {
        if !notice.close {
            continue;
        }
        if let Some((_, close_tx)) = entries.remove(&notice.preopen_instance_id) {
            tracing::debug!(id = %notice.preopen_instance_id, "remote close");
            let _ = close_tx.send(());
        }
    }
}

async fn watch_window(
    mut handle: Box<dyn WindowHandle>,
    mut close_rx: oneshot::Receiver<()>,
    preopen_instance_id: String,
    window_stream: Substream,
    entries: Arc<DashMap<String, oneshot::Sender<()>>>,
) {
    enum Closed {
        Local,
        Remote,
    }

    let closed = tokio::select! {
        _ = handle.wait_closed() => Closed::Local,
        _ = &mut close_rx => Closed::Remote,
    };

    match closed {
        Closed::Local => {
            // user closed the window; tell the frame and deregister
            let _ = window_stream.write(&WindowNotice::closed(&preopen_instance_id));
            entries.remove(&preopen_instance_id);
        }
        Closed::Remote => {
            // entry was already removed by whoever signalled us
            handle.close();
        }
    }
    tracing::debug!(id = %preopen_instance_id, "window watcher done");
}
