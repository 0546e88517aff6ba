//! Balance, public key and draft transactions of the active wallet.

use ae_api_types::{BackendError, BackendResponse, TransactionMeta, TxOutput, TxStatus, WalletBalance};
use ae_gateway::Gateway;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::{SessionStore, StateCell, StoreConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    #[default]
    Locked,
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub status: WalletStatus,
    pub balance: Option<WalletBalance>,
    pub master_pubkey: Option<String>,
    pub transactions: BTreeMap<String, TransactionMeta>,
    pub loaded_wallet_name: Option<String>,
    pub fetching: bool,
    pub error: Option<String>,
}

pub struct WalletStore {
    state: StateCell<WalletState>,
    gateway: Gateway,
    session: Arc<SessionStore>,
    config: StoreConfig,
    /// Bumped by every fetch; stale fetch results are discarded.
    generation: AtomicU64,
    /// Bumped only when the wallet scope changes (lock or a different load).
    /// Transaction commands compare against this, so a refresh never drops them.
    epoch: AtomicU64,
    in_flight: Mutex<Option<(u64, String)>>,
}

impl WalletStore {
    pub fn new(gateway: Gateway, session: Arc<SessionStore>, config: StoreConfig) -> Self {
        Self {
            state: StateCell::default(),
            gateway,
            session,
            config,
            generation: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WalletState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state.subscribe()
    }

    /// Load `wallet_name` unless it is already the loaded wallet.
    pub async fn fetch_wallet_data(&self, wallet_name: &str) {
        self.fetch(wallet_name, false).await;
    }

    /// Re-fetch the loaded wallet. A failure keeps the previous data.
    pub async fn refresh(&self) {
        let Some(wallet_name) = self.state.read(|s| s.loaded_wallet_name.clone()) else {
            self.set_error("No wallet loaded.".to_owned());
            return;
        };
        self.fetch(&wallet_name, true).await;
    }

    /// Transaction history. The backend has no history command yet, so this
    /// only ever records the failure.
    pub async fn fetch_history(&self) -> Option<serde_json::Value> {
        let wallet_name = self.require_loaded()?;
        match self.gateway.wallet().history(&wallet_name).await {
            BackendResponse::Success(history) => Some(history),
            BackendResponse::Failure(err) => {
                self.set_error(format!("Failed to fetch history: {err}"));
                None
            }
        }
    }

    /// Drop everything wallet-scoped. In-flight results are discarded.
    pub fn lock(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.state.set(WalletState::default());
        debug!("wallet store locked");
    }

    async fn fetch(&self, wallet_name: &str, force: bool) {
        let (status, loaded) = self.state.read(|s| (s.status, s.loaded_wallet_name.clone()));
        let same_wallet = loaded.as_deref() == Some(wallet_name);
        if !force && same_wallet && status == WalletStatus::Loaded {
            debug!(wallet = wallet_name, "wallet already loaded");
            return;
        }

        let Some(generation) = self.claim(wallet_name) else {
            debug!(wallet = wallet_name, "wallet fetch already in flight");
            return;
        };

        let refresh = same_wallet && status == WalletStatus::Loaded;
        if refresh {
            self.state.update(|s| {
                s.fetching = true;
                s.error = None;
            });
        } else {
            self.epoch.fetch_add(1, Ordering::AcqRel);
            self.state.set(WalletState {
                status: WalletStatus::Loading,
                fetching: true,
                ..WalletState::default()
            });
        }
        info!(wallet = wallet_name, refresh, "fetching wallet data");

        let wallet_api = self.gateway.wallet();
        let (balance, pubkey, unsent) = tokio::join!(
            self.poll_balance(wallet_name, refresh),
            wallet_api.master_pubkey(wallet_name),
            wallet_api.list_unsent_txs(wallet_name),
        );

        if !self.release(generation) {
            debug!(wallet = wallet_name, "discarding stale wallet fetch");
            return;
        }

        match (balance, pubkey.into_result()) {
            (Ok(balance), Ok(pubkey)) => {
                let (unsent, warning) = match unsent.into_result() {
                    Ok(unsent) => (Some(unsent), None),
                    Err(err) => {
                        warn!(wallet = wallet_name, error = %err, "failed to list pending transactions");
                        (None, Some(format!("Failed to list pending transactions: {err}")))
                    }
                };

                let name = wallet_name.to_owned();
                self.state.update(move |s| {
                    s.status = WalletStatus::Loaded;
                    s.balance = Some(balance);
                    s.master_pubkey = Some(pubkey);
                    s.loaded_wallet_name = Some(name);
                    s.fetching = false;
                    s.error = warning;
                    if let Some(unsent) = unsent {
                        if refresh {
                            for meta in unsent.into_values() {
                                merge_transaction(&mut s.transactions, meta);
                            }
                        } else {
                            s.transactions = unsent;
                        }
                    }
                });
                info!(wallet = wallet_name, "wallet data loaded");

                self.resync_session().await;
            }
            (balance, pubkey) => {
                let reasons: Vec<String> = [balance.err(), pubkey.err()]
                    .into_iter()
                    .flatten()
                    .map(|err| err.to_string())
                    .collect();
                let message = format!("Failed to load wallet data: {}", reasons.join(", "));
                warn!(wallet = wallet_name, refresh, "{message}");

                if refresh {
                    // Stale data beats a blank wallet; the error records the staleness.
                    self.state.update(|s| {
                        s.fetching = false;
                        s.error = Some(message);
                    });
                } else {
                    self.state.set(WalletState {
                        status: WalletStatus::Error,
                        error: Some(message),
                        ..WalletState::default()
                    });
                }
            }
        }
    }

    /// Ask for the balance until the backend answers or the wait budget is spent.
    /// Refreshes try exactly once.
    async fn poll_balance(&self, wallet_name: &str, refresh: bool) -> Result<WalletBalance, BackendError> {
        let started = Instant::now();
        loop {
            match self.gateway.wallet().balance(wallet_name).await {
                BackendResponse::Success(balance) => return Ok(balance),
                BackendResponse::Failure(err) => {
                    if refresh || started.elapsed() >= self.config.balance_max_wait {
                        return Err(err);
                    }
                    debug!(wallet = wallet_name, error = %err, "balance not ready, retrying");
                    sleep(self.config.balance_poll_interval).await;
                }
            }
        }
    }

    async fn resync_session(&self) {
        match self.gateway.aeroe().status().await {
            BackendResponse::Success(status) => {
                self.session.set_wallets(status.wallets);
                if let Some(active) = status.active_wallet {
                    self.session.set_active_wallet(&active);
                }
            }
            BackendResponse::Failure(err) => {
                warn!(error = %err, "session re-sync after wallet load failed");
            }
        }
    }

    pub async fn create_transaction(&self, outputs: Vec<TxOutput>, fee: u64) -> Option<TransactionMeta> {
        let wallet_name = self.require_loaded()?;
        if outputs.is_empty() {
            self.set_error("Add at least one recipient.".to_owned());
            return None;
        }
        if outputs
            .iter()
            .any(|output| output.recipient.trim().is_empty() || output.amount == 0)
        {
            self.set_error("Every recipient needs an address and a positive amount.".to_owned());
            return None;
        }
        if fee == 0 {
            self.set_error("Fee must be greater than zero.".to_owned());
            return None;
        }

        let outputs = outputs
            .into_iter()
            .map(|output| TxOutput {
                recipient: output.recipient.trim().to_owned(),
                amount: output.amount,
            })
            .collect();

        let epoch = self.begin_mutation();
        let response = self.gateway.wallet().create_tx(&wallet_name, outputs, fee).await;
        self.apply_transaction(epoch, response, "create transaction")
    }

    pub async fn sign_transaction(&self, draft_id: &str) -> Option<TransactionMeta> {
        let wallet_name = self.require_loaded()?;
        self.require_draft(draft_id, TxStatus::Draft)?;

        let epoch = self.begin_mutation();
        let response = self.gateway.wallet().sign_tx(&wallet_name, draft_id).await;
        self.apply_transaction(epoch, response, "sign transaction")
    }

    pub async fn send_transaction(&self, draft_id: &str) -> Option<TransactionMeta> {
        let wallet_name = self.require_loaded()?;
        self.require_draft(draft_id, TxStatus::Signed)?;

        let epoch = self.begin_mutation();
        let response = self.gateway.wallet().send_tx(&wallet_name, draft_id).await;
        self.apply_transaction(epoch, response, "send transaction")
    }

    fn require_loaded(&self) -> Option<String> {
        let loaded = self.state.read(|s| {
            (s.status == WalletStatus::Loaded)
                .then(|| s.loaded_wallet_name.clone())
                .flatten()
        });
        if loaded.is_none() {
            self.set_error("No wallet loaded.".to_owned());
        }
        loaded
    }

    fn require_draft(&self, draft_id: &str, expected: TxStatus) -> Option<()> {
        let status = self.state.read(|s| s.transactions.get(draft_id).map(|meta| meta.status));
        match status {
            None => {
                self.set_error(format!("Unknown draft: {draft_id}"));
                None
            }
            Some(status) if status != expected => {
                let message = match status {
                    TxStatus::Draft => format!("Draft {draft_id} must be signed before sending."),
                    TxStatus::Signed => format!("Draft {draft_id} is already signed."),
                    TxStatus::Pending => format!("Draft {draft_id} has already been sent."),
                };
                self.set_error(message);
                None
            }
            Some(_) => Some(()),
        }
    }

    fn begin_mutation(&self) -> u64 {
        self.state.update(|s| s.error = None);
        self.epoch.load(Ordering::Acquire)
    }

    fn apply_transaction(
        &self,
        epoch: u64,
        response: BackendResponse<TransactionMeta>,
        action: &str,
    ) -> Option<TransactionMeta> {
        if self.epoch.load(Ordering::Acquire) != epoch {
            debug!(action, "wallet changed while the command was in flight");
            return None;
        }

        match response {
            BackendResponse::Success(meta) => {
                let merged = meta.clone();
                let accepted = self
                    .state
                    .update_if(|s| merge_transaction(&mut s.transactions, merged));
                if accepted {
                    info!(draft_id = %meta.draft_id, status = ?meta.status, "{action} succeeded");
                } else {
                    warn!(draft_id = %meta.draft_id, "ignoring out-of-order transaction status");
                }
                Some(meta)
            }
            BackendResponse::Failure(err) => {
                let message = format!("Failed to {action}: {err}");
                warn!("{message}");
                self.set_error(message);
                None
            }
        }
    }

    fn set_error(&self, message: String) {
        self.state.update(|s| s.error = Some(message));
    }

    fn claim(&self, wallet_name: &str) -> Option<u64> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.as_ref().is_some_and(|(_, name)| name == wallet_name) {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *in_flight = Some((generation, wallet_name.to_owned()));
        Some(generation)
    }

    /// True when `generation` is still the latest fetch.
    fn release(&self, generation: u64) -> bool {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.as_ref().is_some_and(|(current, _)| *current == generation) {
            *in_flight = None;
        }
        self.generation.load(Ordering::Acquire) == generation
    }
}

/// Upsert by draft id. Returns false when the update would move the status backwards.
fn merge_transaction(transactions: &mut BTreeMap<String, TransactionMeta>, meta: TransactionMeta) -> bool {
    if let Some(existing) = transactions.get(&meta.draft_id) {
        if existing.status > meta.status {
            return false;
        }
    }
    transactions.insert(meta.draft_id.clone(), meta);
    true
}
