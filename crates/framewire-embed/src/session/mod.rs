//! Session/login orchestrator.
//!
//! Coordinates `init`, `login`, `sol_login`, `logout`, and `clean_up`
//! against the wallet frame's communication channels. The `status` channel
//! is the single source of truth for login state; login flows that arrive
//! before the frame has reported its state park on a waiter that the next
//! status update fires exactly once.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::json;
use tokio::sync::{broadcast, oneshot};

use framewire_core::protocol::channels::{
    self, InitNotice, InitRequest, LogoutNotice, NetworkSpec, OauthRequest, OauthResult,
    ProviderChangeAck, ProviderChangeRequest, StatusUpdate,
};
use framewire_core::{FramewireError, Result};

use crate::config::{EmbedConfig, NetworkConfig};
use crate::mux::ChannelMux;
use crate::popup::{PopupOptions, PopupTracker, WindowOpener};
use crate::provider::{AccountRequestHandler, RequestArgs, WalletProvider};
use crate::transport::RawTransport;

/// Which chain's account-request flow `enable` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    Ethereum,
    Solana,
}

impl ChainKind {
    fn request_method(self) -> &'static str {
        match self {
            ChainKind::Ethereum => "eth_requestAccounts",
            ChainKind::Solana => "sol_requestAccount",
        }
    }

    fn chain_name(self) -> &'static str {
        match self {
            ChainKind::Ethereum => "",
            ChainKind::Solana => "solana",
        }
    }
}

#[derive(Default)]
struct LoginState {
    requested_verifier: Option<String>,
    current_verifier: Option<String>,
    logged_in: bool,
    initialized: bool,
    login_waiters: Vec<oneshot::Sender<()>>,
}

type EnableFlight = Shared<BoxFuture<'static, Result<Vec<String>>>>;

/// One embedded-wallet session: mux, provider, popup tracker, and login
/// state, with no process-wide singletons.
pub struct EmbedSession {
    config: EmbedConfig,
    mux: ChannelMux,
    provider: WalletProvider,
    popups: PopupTracker,
    login: Mutex<LoginState>,
    status_events: broadcast::Sender<StatusUpdate>,
    enable_flight: tokio::sync::Mutex<Option<EnableFlight>>,
}

impl EmbedSession {
    /// Wire a session onto a raw transport and window opener.
    pub fn new(
        config: EmbedConfig,
        transport: Box<dyn RawTransport>,
        opener: Arc<dyn WindowOpener>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let mux = ChannelMux::new(transport);
        let popups = PopupTracker::new(
            mux.get_channel(channels::WINDOW),
            opener,
            config.wallet_url.clone(),
            config.confirm_features.clone(),
        );
        let provider = WalletProvider::new(&mux, Some(popups.clone()));
        let (status_events, _) = broadcast::channel(16);

        let session = Arc::new(Self {
            config,
            mux: mux.clone(),
            provider,
            popups,
            login: Mutex::new(LoginState::default()),
            status_events,
            enable_flight: tokio::sync::Mutex::new(None),
        });

        session.provider.set_account_request_handler(Arc::new(EnableHook {
            session: Arc::downgrade(&session),
        }));

        tokio::spawn(status_loop(
            mux.get_channel(channels::STATUS),
            Arc::downgrade(&session),
        ));

        Ok(session)
    }

    /// The provider surface exposed to the host page.
    pub fn provider(&self) -> &WalletProvider {
        &self.provider
    }

    /// Initialize the embed: handshake on `init_stream` and switch the
    /// wallet to the requested network. Both acknowledgments must arrive
    /// before this resolves.
    pub async fn init(&self, network: Option<NetworkConfig>) -> Result<()> {
        if self.with_login(|s| s.initialized) {
            return Err(FramewireError::AlreadyInitialized);
        }

        let network = network.unwrap_or_else(|| self.config.network.clone());
        network.validate()?;

        let init_sub = self.mux.get_channel(channels::INIT_STREAM);
        let change_sub = self.mux.get_channel(channels::PROVIDER_CHANGE);

        init_sub.write(&InitRequest::new(self.config.enable_logging))?;
        change_sub.write(&ProviderChangeRequest::new(
            NetworkSpec {
                chain_id: network.chain_id.clone(),
                host: network.host.clone(),
            },
            true,
        ))?;

        // two independent waits racing the same underlying stream
        let init_wait = async {
            loop {
                match init_sub.recv_parsed::<InitNotice>().await {
                    None => return Err(FramewireError::Disconnected),
                    Some(notice) => {
                        if notice.is_complete() {
                            return Ok(());
                        }
                        if let Some(err) = notice.error {
                            return Err(FramewireError::Internal(err));
                        }
                        // some other init-channel chatter; keep waiting
                    }
                }
            }
        };
        let change_wait = async {
            match change_sub.recv_parsed::<ProviderChangeAck>().await {
                None => Err(FramewireError::Disconnected),
                Some(ack) => {
                    if let Some(err) = ack.data.err {
                        Err(FramewireError::Internal(err))
                    } else if ack.data.success {
                        Ok(())
                    } else {
                        Err(FramewireError::Internal("provider change failed".into()))
                    }
                }
            }
        };
        tokio::try_join!(init_wait, change_wait)?;

        self.with_login_mut(|s| s.initialized = true);
        self.provider.set_initialized(true);
        tracing::debug!(chain_id = %network.chain_id, "embed initialized");
        Ok(())
    }

    /// Login against the Ethereum provider, optionally pinning a verifier.
    pub async fn login(self: &Arc<Self>, verifier: Option<String>) -> Result<Vec<String>> {
        if !self.with_login(|s| s.initialized) {
            return Err(FramewireError::NotInitialized);
        }
        self.set_requested_verifier(verifier);
        self.enable(ChainKind::Ethereum).await
    }

    /// Login against the Solana provider.
    pub async fn sol_login(self: &Arc<Self>, verifier: Option<String>) -> Result<Vec<String>> {
        if !self.with_login(|s| s.initialized) {
            return Err(FramewireError::NotInitialized);
        }
        self.set_requested_verifier(verifier);
        self.enable(ChainKind::Solana).await
    }

    /// The login entry point. Idempotent while authorized; at most one login
    /// flow is in flight, with overlapping calls coalescing onto it.
    pub async fn enable(self: &Arc<Self>, chain: ChainKind) -> Result<Vec<String>> {
        let (fut, owner) = {
            let mut flight = self.enable_flight.lock().await;
            match flight.as_ref() {
                Some(f) => (f.clone(), false),
                None => {
                    let session = Arc::clone(self);
                    let fut: EnableFlight = async move { session.enable_flow(chain).await }
                        .boxed()
                        .shared();
                    *flight = Some(fut.clone());
                    (fut, true)
                }
            }
        };

        let result = fut.await;
        // only the flight's owner clears the slot; a slow coalesced waiter
        // must not wipe out a flight started after this one finished
        if owner {
            *self.enable_flight.lock().await = None;
        }
        result
    }

    async fn enable_flow(self: Arc<Self>, chain: ChainKind) -> Result<Vec<String>> {
        let res = self
            .provider
            .raw_request(RequestArgs::new(chain.request_method(), Some(json!([]))))
            .await?;
        let accounts: Vec<String> = serde_json::from_value(res).unwrap_or_default();

        if accounts.is_empty() {
            // no session in the wallet yet; run the login popup path
            return self.show_login_popup(chain, true).await;
        }

        // the wallet has a rehydrated session; wait for the status channel
        // to confirm before trusting verifier state
        if let Some(rx) = self.park_until_logged_in() {
            let _ = rx.await;
        }

        let (requested, current) = self.with_login(|s| {
            (s.requested_verifier.clone(), s.current_verifier.clone())
        });
        if let Some(requested) = requested {
            if current.as_deref() != Some(requested.as_str()) {
                // verifier mismatch: recover by forced logout + fresh login;
                // invisible to the caller unless the retry fails
                tracing::debug!(%requested, current = ?current, "verifier mismatch, re-authenticating");
                self.logout().await?;
                self.set_requested_verifier(Some(requested));
                return self.show_login_popup(chain, true).await;
            }
        }

        Ok(accounts)
    }

    async fn show_login_popup(
        &self,
        chain: ChainKind,
        called_from_embed: bool,
    ) -> Result<Vec<String>> {
        let oauth = self.mux.get_channel(channels::OAUTH);
        let requested = self.with_login(|s| s.requested_verifier.clone());

        let preopen_id = match requested {
            None => {
                oauth.write(&OauthRequest::modal(called_from_embed, chain.chain_name()))?;
                None
            }
            Some(verifier) => {
                let id = self.popups.next_instance_id();
                self.popups.track(&id, PopupOptions::default())?;
                oauth.write(&OauthRequest::popup(called_from_embed, verifier, &id))?;
                Some(id)
            }
        };

        let received: Option<OauthResult> = oauth.recv_parsed().await;
        if let Some(id) = preopen_id {
            // the frame usually closes it over the window channel; no-op then
            self.popups.release(&id);
        }
        let result = received.ok_or(FramewireError::Disconnected)?;
        if let Some(err) = result.err {
            tracing::warn!(error = %err, "login failed");
            return Err(FramewireError::UserRejected(err));
        }
        match result.selected_address {
            Some(addr) => {
                tracing::debug!(address = %addr, "login complete");
                Ok(vec![addr])
            }
            None => Err(FramewireError::Internal("login produced no address".into())),
        }
    }

    /// Log out of the wallet. Fails without touching the transport if no
    /// session is active.
    pub async fn logout(&self) -> Result<()> {
        if !self.with_login(|s| s.logged_in) {
            return Err(FramewireError::NotLoggedIn);
        }

        let mut status_rx = self.status_events.subscribe();
        self.mux
            .get_channel(channels::LOGOUT)
            .write(&LogoutNotice::new())?;

        match status_rx.recv().await {
            Ok(status) if !status.logged_in => {
                self.with_login_mut(|s| {
                    s.logged_in = false;
                    s.current_verifier = None;
                    s.requested_verifier = None;
                });
                Ok(())
            }
            Ok(_) => Err(FramewireError::Internal("logout failed".into())),
            Err(_) => Err(FramewireError::Disconnected),
        }
    }

    /// Log out if needed, then tear down the embed. Idempotent even if the
    /// session was never initialized.
    pub async fn clean_up(&self) -> Result<()> {
        if self.with_login(|s| s.logged_in) {
            self.logout().await?;
        }
        self.mux.shutdown();
        self.with_login_mut(|s| s.initialized = false);
        self.provider.set_initialized(false);
        Ok(())
    }

    /// Current login flags (for hosts that render their own UI).
    pub fn is_logged_in(&self) -> bool {
        self.with_login(|s| s.logged_in)
    }

    pub fn current_verifier(&self) -> Option<String> {
        self.with_login(|s| s.current_verifier.clone())
    }

    fn set_requested_verifier(&self, verifier: Option<String>) {
        self.with_login_mut(|s| {
            s.requested_verifier = verifier.filter(|v| !v.is_empty());
        });
    }

    /// Register a waiter fired by the next status update, unless login state
    /// is already known.
    fn park_until_logged_in(&self) -> Option<oneshot::Receiver<()>> {
        let mut state = self.lock_login();
        if state.logged_in {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        state.login_waiters.push(tx);
        Some(rx)
    }

    fn apply_status(&self, status: StatusUpdate) {
        let waiters = {
            let mut s = self.lock_login();
            if status.logged_in {
                s.logged_in = true;
                s.current_verifier = status.verifier.clone();
            } else {
                s.logged_in = false;
                s.current_verifier = None;
            }
            std::mem::take(&mut s.login_waiters)
        };

        // broadcast first: a waiter that resumes and subscribes must only
        // ever observe statuses newer than the one that woke it
        let _ = self.status_events.send(status);
        // replay each parked login exactly once, then the queue is empty
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    fn lock_login(&self) -> std::sync::MutexGuard<'_, LoginState> {
        match self.login.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }

    fn with_login<T>(&self, f: impl FnOnce(&LoginState) -> T) -> T {
        f(&self.lock_login())
    }

    fn with_login_mut<T>(&self, f: impl FnOnce(&mut LoginState) -> T) -> T {
        f(&mut self.lock_login())
    }
}

/// Routes `eth_requestAccounts` / `sol_requestAccount` issued through the
/// provider into the session's login flow.
struct EnableHook {
    session: std::sync::Weak<EmbedSession>,
}

#[async_trait]
impl AccountRequestHandler for EnableHook {
    async fn handle(&self, method: &str) -> Result<Vec<String>> {
        let Some(session) = self.session.upgrade() else {
            return Err(FramewireError::Internal("session torn down".into()));
        };
        let chain = if method == "sol_requestAccount" {
            ChainKind::Solana
        } else {
            ChainKind::Ethereum
        };
        session.enable(chain).await
    }
}

async fn status_loop(stream: crate::mux::Substream, session: std::sync::Weak<EmbedSession>) {
    while let Some(status) = stream.recv_parsed::<StatusUpdate>().await {
        let Some(session) = session.upgrade() else {
            return;
        };
        session.apply_status(status);
    }
    // transport gone: fire any parked logins so they observe the dead state
    // instead of hanging forever
    if let Some(session) = session.upgrade() {
        let waiters = session.with_login_mut(|s| std::mem::take(&mut s.login_waiters));
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
    tracing::debug!("status loop stopped");
}
