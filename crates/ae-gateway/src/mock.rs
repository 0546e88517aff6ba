//! In-memory backend.
//!
//! Behaves like the native backend for the commands the stores use, and lets
//! tests script failures, latency and inspect call counts.

use ae_api_types::commands::*;
use ae_api_types::{
    AeroeStatus, CreateTxArgs, DraftArgs, PasswordArgs, PeekArgs, TransactionMeta, TxStatus,
    UnsentTransactions, WalletBalance, WalletCreateArgs, WalletNameArgs,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{CommandTransport, TransportError};

pub const MOCK_COIN: &str = "Nock";
pub const SEED_PHRASE_WORDS: usize = 24;

#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub terms_accepted: bool,
    pub privacy_accepted: bool,
    /// `Some` once a vault exists.
    pub vault_password: Option<String>,
    pub vault_loaded: bool,
    pub wallets: Vec<String>,
    pub active_wallet: Option<String>,
    pub balances: HashMap<String, u64>,
    pub drafts: HashMap<String, BTreeMap<String, TransactionMeta>>,
    pub master_node_running: bool,
    pub block_height: u64,
}

impl MockState {
    /// Terms accepted, vault unlocked with `password`, and `wallets` registered.
    pub fn ready(password: &str, wallets: &[&str]) -> Self {
        Self {
            terms_accepted: true,
            privacy_accepted: true,
            vault_password: Some(password.to_owned()),
            wallets: wallets.iter().map(|name| (*name).to_owned()).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Next(u32),
    Always,
}

#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    faults: Mutex<HashMap<String, Fault>>,
    calls: Mutex<HashMap<String, usize>>,
    latency: Mutex<Option<Duration>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MockState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    pub async fn state(&self) -> MockState {
        self.state.lock().await.clone()
    }

    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut MockState),
    {
        let mut guard = self.state.lock().await;
        f(&mut guard);
    }

    /// Reject the next `times` invocations of `command`.
    pub async fn fail_next(&self, command: &str, times: u32) {
        if times == 0 {
            return;
        }
        self.faults.lock().await.insert(command.to_owned(), Fault::Next(times));
    }

    pub async fn fail_always(&self, command: &str) {
        self.faults.lock().await.insert(command.to_owned(), Fault::Always);
    }

    pub async fn clear_faults(&self, command: &str) {
        self.faults.lock().await.remove(command);
    }

    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    pub async fn calls(&self, command: &str) -> usize {
        self.calls.lock().await.get(command).copied().unwrap_or(0)
    }

    async fn take_fault(&self, command: &str) -> bool {
        let mut faults = self.faults.lock().await;
        match faults.get(command).copied() {
            Some(Fault::Always) => true,
            Some(Fault::Next(remaining)) => {
                if remaining <= 1 {
                    faults.remove(command);
                } else {
                    faults.insert(command.to_owned(), Fault::Next(remaining - 1));
                }
                true
            }
            None => false,
        }
    }

    async fn dispatch(&self, command: &str, args: Option<Value>) -> Result<Value, String> {
        let mut state = self.state.lock().await;
        match command {
            TERMS_OF_USE_IS_ACCEPTED => to_json(state.terms_accepted),
            PRIVACY_POLICY_IS_ACCEPTED => to_json(state.privacy_accepted),
            ACCEPT_TERMS_OF_USE => {
                state.terms_accepted = true;
                Ok(Value::Null)
            }
            ACCEPT_PRIVACY_POLICY => {
                state.privacy_accepted = true;
                Ok(Value::Null)
            }
            AEROE_STATUS => to_json(AeroeStatus {
                is_first_run: state.vault_password.is_none(),
                vault_exists: state.vault_password.is_some(),
                vault_loaded: state.vault_loaded,
                wallets: state.wallets.clone(),
                active_wallet: state.active_wallet.clone(),
                block_height: state.master_node_running.then_some(state.block_height),
                master_node_running: state.master_node_running,
                num_miners: 0,
            }),
            VAULT_CREATE => {
                let args: PasswordArgs = parse(args)?;
                if state.vault_password.is_some() {
                    return Err("vault already exists".to_owned());
                }
                state.vault_password = Some(args.password);
                state.vault_loaded = true;
                Ok(Value::Null)
            }
            VAULT_LOAD => {
                let args: PasswordArgs = parse(args)?;
                match state.vault_password.as_deref() {
                    None => Err("vault does not exist".to_owned()),
                    Some(expected) if expected != args.password => Err("invalid password".to_owned()),
                    Some(_) => {
                        state.vault_loaded = true;
                        Ok(Value::Null)
                    }
                }
            }
            KEYGEN => to_json(
                (1..=SEED_PHRASE_WORDS)
                    .map(|index| format!("word{index}"))
                    .collect::<Vec<_>>(),
            ),
            WALLET_CREATE => {
                let args: WalletCreateArgs = parse(args)?;
                if args.seedphrase.len() != SEED_PHRASE_WORDS {
                    return Err("seedphrase must contain 24 words".to_owned());
                }
                if state.wallets.contains(&args.wallet_name) {
                    return Err("wallet already exists".to_owned());
                }
                state.balances.entry(args.wallet_name.clone()).or_insert(0);
                state.wallets.push(args.wallet_name);
                Ok(Value::Null)
            }
            WALLET_LOAD => {
                let args: WalletNameArgs = parse(args)?;
                require_wallet(&state, &args.wallet_name)?;
                state.active_wallet = Some(args.wallet_name);
                Ok(Value::Null)
            }
            MASTER_PUBKEY => {
                let args: WalletNameArgs = parse(args)?;
                require_wallet(&state, &args.wallet_name)?;
                to_json(format!("mock-pubkey-for-{}", args.wallet_name))
            }
            BALANCE => {
                let args: WalletNameArgs = parse(args)?;
                require_wallet(&state, &args.wallet_name)?;
                to_json(WalletBalance {
                    coin: MOCK_COIN.to_owned(),
                    amount: state.balances.get(&args.wallet_name).copied().unwrap_or(0),
                })
            }
            CREATE_TX => {
                let args: CreateTxArgs = parse(args)?;
                require_wallet(&state, &args.wallet_name)?;
                if args.transactions.is_empty() {
                    return Err("no transactions".to_owned());
                }
                if args.fee == 0 {
                    return Err("fee is 0".to_owned());
                }
                let meta = TransactionMeta {
                    draft_id: Uuid::new_v4().to_string(),
                    transactions: args.transactions,
                    fee: args.fee,
                    created_at: epoch_ms_string(),
                    signed_at: None,
                    broadcasted_at: None,
                    status: TxStatus::Draft,
                };
                state
                    .drafts
                    .entry(args.wallet_name)
                    .or_default()
                    .insert(meta.draft_id.clone(), meta.clone());
                to_json(meta)
            }
            SIGN_TX => {
                let args: DraftArgs = parse(args)?;
                let meta = find_draft(&mut state, &args)?;
                if meta.status != TxStatus::Draft {
                    return Err("draft already signed".to_owned());
                }
                meta.status = TxStatus::Signed;
                meta.signed_at = Some(epoch_ms_string());
                to_json(meta.clone())
            }
            SEND_TX => {
                let args: DraftArgs = parse(args)?;
                let meta = find_draft(&mut state, &args)?;
                if meta.status != TxStatus::Signed {
                    return Err("draft is not signed".to_owned());
                }
                meta.status = TxStatus::Pending;
                meta.broadcasted_at = Some(epoch_ms_string());
                to_json(meta.clone())
            }
            LIST_UNSENT_TXS => {
                let args: WalletNameArgs = parse(args)?;
                require_wallet(&state, &args.wallet_name)?;
                let unsent: UnsentTransactions = state
                    .drafts
                    .get(&args.wallet_name)
                    .map(|drafts| {
                        drafts
                            .iter()
                            .filter(|(_, meta)| meta.status != TxStatus::Pending)
                            .map(|(id, meta)| (id.clone(), meta.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                to_json(unsent)
            }
            NODE_START_MASTER => {
                state.master_node_running = true;
                Ok(Value::Null)
            }
            NODE_STOP_MASTER => {
                state.master_node_running = false;
                Ok(Value::Null)
            }
            NODE_PEEK => {
                let args: PeekArgs = parse(args)?;
                match args.command.as_str() {
                    "height" if state.master_node_running => Ok(json!(state.block_height)),
                    "height" => Err("node is not running".to_owned()),
                    other => Err(format!("unsupported peek: {other}")),
                }
            }
            other => Err(format!("unknown command: {other}")),
        }
    }
}

#[async_trait]
impl CommandTransport for MockBackend {
    async fn invoke(&self, command: &str, args: Option<Value>) -> Result<Value, TransportError> {
        *self.calls.lock().await.entry(command.to_owned()).or_insert(0) += 1;

        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.take_fault(command).await {
            return Err(TransportError::Rejected(Value::String(format!(
                "mocked backend error: {command}"
            ))));
        }

        self.dispatch(command, args)
            .await
            .map_err(|message| TransportError::Rejected(Value::String(message)))
    }
}

fn parse<T: DeserializeOwned>(args: Option<Value>) -> Result<T, String> {
    serde_json::from_value(args.unwrap_or(Value::Null)).map_err(|err| format!("invalid arguments: {err}"))
}

fn to_json<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|err| err.to_string())
}

fn require_wallet(state: &MockState, wallet_name: &str) -> Result<(), String> {
    if state.wallets.iter().any(|name| name == wallet_name) {
        Ok(())
    } else {
        Err(format!("wallet not found: {wallet_name}"))
    }
}

fn find_draft<'a>(state: &'a mut MockState, args: &DraftArgs) -> Result<&'a mut TransactionMeta, String> {
    state
        .drafts
        .get_mut(&args.wallet_name)
        .and_then(|drafts| drafts.get_mut(&args.draft_id))
        .ok_or_else(|| "draft not found".to_owned())
}

fn epoch_ms_string() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
        .to_string()
}
