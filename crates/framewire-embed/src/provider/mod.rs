//! Provider state machine.
//!
//! Owns the session-visible state (accounts, chain, lock/connect flags),
//! validates and dispatches host-issued RPC calls, and emits change events.
//! Methods that need user confirmation are routed through the popup tracker
//! before they reach the correlator; account-request methods are routed
//! through an explicit dispatch hook instead of the generic RPC path.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use framewire_core::protocol::channels::{self, PublicConfig};
use framewire_core::protocol::rpc::{is_unsafe_method, RpcNotification, SYNC_CACHED_METHODS};
use framewire_core::{ErrorCode, FramewireError, Result};

use crate::mux::ChannelMux;
use crate::popup::{PopupOptions, PopupTracker};
use crate::rpc::RpcCorrelator;

/// Notifications forwarded upward as `Message` events.
const EMITTED_NOTIFICATIONS: &[&str] = &["eth_subscription"];

/// Arguments of a `request` call.
#[derive(Debug, Clone)]
pub struct RequestArgs {
    pub method: String,
    pub params: Option<Value>,
}

impl RequestArgs {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Events emitted upward to arbitrary subscribers.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Connect { chain_id: String },
    Disconnect { code: i64 },
    AccountsChanged(Vec<String>),
    ChainChanged(String),
    Message { kind: String, data: Value },
}

/// Session-visible provider state. Owned exclusively by the provider;
/// mutated only from transport events and explicit session transitions.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub accounts: Option<Vec<String>>,
    pub chain_id: Option<String>,
    pub network_version: Option<String>,
    pub is_connected: bool,
    pub is_unlocked: bool,
    pub initialized: bool,
    pub is_permanently_disconnected: bool,
}

/// Dispatch hook for account-request methods (`eth_requestAccounts`,
/// `sol_requestAccount`). Installed by the session orchestrator; consulted
/// before the generic RPC path.
#[async_trait]
pub trait AccountRequestHandler: Send + Sync {
    async fn handle(&self, method: &str) -> Result<Vec<String>>;
}

type HandlerSlot = Arc<Mutex<Option<Arc<dyn AccountRequestHandler>>>>;

#[derive(Clone)]
pub struct WalletProvider {
    correlator: RpcCorrelator,
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<ProviderEvent>,
    popups: Option<PopupTracker>,
    account_handler: HandlerSlot,
}

impl WalletProvider {
    /// Wire the provider onto a multiplexer: a correlator on the `provider`
    /// channel, a state feed on `publicConfig`, and a disconnect watcher.
    pub fn new(mux: &ChannelMux, popups: Option<PopupTracker>) -> Self {
        let (correlator, notif_rx) = RpcCorrelator::new(mux.get_channel(channels::PROVIDER));
        let state = Arc::new(Mutex::new(SessionState::default()));
        let (events, _) = broadcast::channel(64);

        let provider = Self {
            correlator,
            state,
            events,
            popups,
            account_handler: Arc::new(Mutex::new(None)),
        };

        tokio::spawn(public_config_loop(
            mux.get_channel(channels::PUBLIC_CONFIG),
            provider.clone(),
        ));
        tokio::spawn(notification_loop(notif_rx, provider.clone()));
        tokio::spawn(disconnect_watch(mux.clone(), provider.clone()));

        provider
    }

    /// EIP-1193 entry point.
    pub async fn request(&self, args: RequestArgs) -> Result<Value> {
        validate_args(&args)?;

        if self.snapshot().is_permanently_disconnected {
            return Err(FramewireError::PermanentlyDisconnected);
        }

        // dispatch table first, generic RPC path second
        if let Some(handler) = self.account_request_handler(&args.method) {
            let accounts = handler.handle(&args.method).await?;
            return Ok(json!(accounts));
        }

        self.raw_request(args).await
    }

    /// Generic RPC path, without the account-request dispatch hook. The
    /// session's own login flow uses this so the hook cannot recurse.
    pub(crate) async fn raw_request(&self, args: RequestArgs) -> Result<Value> {
        validate_args(&args)?;

        if self.snapshot().is_permanently_disconnected {
            return Err(FramewireError::PermanentlyDisconnected);
        }

        if is_unsafe_method(&args.method) {
            if let Some(popups) = &self.popups {
                let preopen_id = popups.next_instance_id();
                popups.track(&preopen_id, PopupOptions::default())?;
                let outcome = self
                    .correlator
                    .call_with_preopen(&args.method, args.params, Some(preopen_id.clone()))
                    .await;
                popups.release(&preopen_id);
                return outcome;
            }
        }

        self.correlator.call(&args.method, args.params).await
    }

    /// Legacy async form of `request`.
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.request(RequestArgs::new(method, params)).await
    }

    /// Legacy callback form; wraps the same asynchronous path.
    pub fn send_async<F>(&self, args: RequestArgs, callback: F)
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let provider = self.clone();
        tokio::spawn(async move {
            callback(provider.request(args).await);
        });
    }

    /// Legacy synchronous reads, served from cached state only. There is no
    /// synchronous transport path; anything uncached fails.
    pub fn send_sync(&self, method: &str) -> Result<Value> {
        if !SYNC_CACHED_METHODS.contains(&method) {
            return Err(FramewireError::UnsupportedSync(method.to_string()));
        }
        let state = self.snapshot();
        match method {
            "eth_accounts" => Ok(json!(state.accounts.unwrap_or_default())),
            "eth_coinbase" => Ok(state
                .accounts
                .and_then(|a| a.into_iter().next())
                .map_or(Value::Null, Value::String)),
            _ => Ok(state.network_version.map_or(Value::Null, Value::String)),
        }
    }

    /// Subscribe to provider events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    /// Install the account-request dispatch hook.
    pub fn set_account_request_handler(&self, handler: Arc<dyn AccountRequestHandler>) {
        if let Ok(mut slot) = self.account_handler.lock() {
            *slot = Some(handler);
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn cached_accounts(&self) -> Option<Vec<String>> {
        self.snapshot().accounts
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot().is_connected
    }

    pub(crate) fn set_initialized(&self, initialized: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.initialized = initialized;
        }
    }

    fn account_request_handler(&self, method: &str) -> Option<Arc<dyn AccountRequestHandler>> {
        if method != "eth_requestAccounts" && method != "sol_requestAccount" {
            return None;
        }
        self.account_handler.lock().ok()?.clone()
    }

    /// Apply a wallet-pushed state update, emitting change events only for
    /// values that actually changed.
    fn apply_public_config(&self, cfg: PublicConfig) {
        let mut emits: Vec<ProviderEvent> = Vec::new();
        {
            let mut s = match self.state.lock() {
                Ok(s) => s,
                Err(e) => e.into_inner(),
            };

            if let Some(addr) = cfg.selected_address {
                let accounts = if addr.is_empty() {
                    vec![]
                } else {
                    vec![addr]
                };
                if s.accounts.as_deref() != Some(accounts.as_slice()) {
                    s.accounts = Some(accounts.clone());
                    emits.push(ProviderEvent::AccountsChanged(accounts));
                }
            }

            if let Some(chain_id) = cfg.chain_id {
                if !s.is_connected {
                    s.is_connected = true;
                    emits.push(ProviderEvent::Connect {
                        chain_id: chain_id.clone(),
                    });
                }
                if s.chain_id.as_deref() != Some(chain_id.as_str()) {
                    let changed = s.chain_id.is_some();
                    s.chain_id = Some(chain_id.clone());
                    if changed {
                        emits.push(ProviderEvent::ChainChanged(chain_id));
                    }
                }
            }

            if let Some(nv) = cfg.network_version {
                s.network_version = Some(nv);
            }
            if let Some(unlocked) = cfg.is_unlocked {
                s.is_unlocked = unlocked;
            }
        }

        for ev in emits {
            let _ = self.events.send(ev);
        }
    }

    fn mark_permanently_disconnected(&self) {
        let newly = {
            let mut s = match self.state.lock() {
                Ok(s) => s,
                Err(e) => e.into_inner(),
            };
            let newly = !s.is_permanently_disconnected;
            s.is_connected = false;
            s.is_permanently_disconnected = true;
            newly
        };
        // terminal state is entered once; disconnect fires once
        if newly {
            tracing::warn!("wallet frame transport lost; provider permanently disconnected");
            let _ = self.events.send(ProviderEvent::Disconnect {
                code: ErrorCode::Disconnected.as_i64(),
            });
        }
    }
}

fn validate_args(args: &RequestArgs) -> Result<()> {
    if args.method.is_empty() {
        return Err(FramewireError::InvalidRequestArgs(
            "'args.method' must be a non-empty string".into(),
        ));
    }
    if let Some(params) = &args.params {
        if !params.is_array() && !params.is_object() {
            return Err(FramewireError::InvalidRequestArgs(
                "'args.params' must be an object or array if provided".into(),
            ));
        }
    }
    Ok(())
}

async fn public_config_loop(stream: crate::mux::Substream, provider: WalletProvider) {
    while let Some(cfg) = stream.recv_parsed::<PublicConfig>().await {
        provider.apply_public_config(cfg);
    }
}

async fn notification_loop(
    mut notif_rx: tokio::sync::mpsc::UnboundedReceiver<RpcNotification>,
    provider: WalletProvider,
) {
    while let Some(notif) = notif_rx.recv().await {
        // message always fires for passthrough notifications
        if EMITTED_NOTIFICATIONS.contains(&notif.method.as_str()) {
            let _ = provider.events.send(ProviderEvent::Message {
                kind: notif.method,
                data: notif.params.unwrap_or(Value::Null),
            });
        } else {
            tracing::debug!(method = %notif.method, "ignoring unknown notification");
        }
    }
}

async fn disconnect_watch(mux: ChannelMux, provider: WalletProvider) {
    mux.wait_disconnected().await;
    provider.mark_permanently_disconnected();
}
