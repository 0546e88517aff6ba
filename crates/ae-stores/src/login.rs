use ae_gateway::Gateway;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::{MainStore, SessionStore, StateCell};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginStatus {
    #[default]
    Idle,
    Pending,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoginState {
    pub state: LoginStatus,
    pub error: Option<String>,
}

/// Unlocks the vault and picks the wallet to open.
pub struct LoginStore {
    state: StateCell<LoginState>,
    gateway: Gateway,
    session: Arc<SessionStore>,
    main: Arc<MainStore>,
}

impl LoginStore {
    pub fn new(gateway: Gateway, session: Arc<SessionStore>, main: Arc<MainStore>) -> Self {
        Self {
            state: StateCell::default(),
            gateway,
            session,
            main,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    pub async fn login(&self, password: &str) -> bool {
        let password = Zeroizing::new(password.trim().to_owned());
        if password.is_empty() {
            self.fail("Please enter your password.".to_owned());
            return false;
        }
        if !self.begin() {
            return false;
        }

        if let Err(err) = self.gateway.vault().load(&password).await.into_result() {
            self.fail(format!("Failed to unlock vault: {err}"));
            return false;
        }

        let status = match self.gateway.aeroe().status().await.into_result() {
            Ok(status) => status,
            Err(err) => {
                self.fail(format!("Vault unlocked, but failed to get status: {err}"));
                return false;
            }
        };
        self.session.set_wallets(status.wallets.clone());

        let target = status
            .active_wallet
            .filter(|active| status.wallets.contains(active))
            .or_else(|| match status.wallets.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            });

        match target {
            Some(wallet_name) => self.open_wallet(&wallet_name).await,
            None if status.wallets.is_empty() => {
                self.fail("Vault unlocked, but no wallets were found.".to_owned());
                false
            }
            None => {
                info!(wallets = status.wallets.len(), "vault unlocked; choosing a wallet");
                self.state.set(LoginState::default());
                self.main.navigate_to_wallet_selection();
                true
            }
        }
    }

    /// Open a wallet picked on the selection page.
    pub async fn select_wallet(&self, wallet_name: &str) -> bool {
        if !self.session.contains(wallet_name) {
            self.fail(format!("Unknown wallet: {wallet_name}"));
            return false;
        }
        if !self.begin() {
            return false;
        }
        self.open_wallet(wallet_name).await
    }

    async fn open_wallet(&self, wallet_name: &str) -> bool {
        if let Err(err) = self.gateway.wallet().load(wallet_name).await.into_result() {
            self.fail(format!("Failed to load wallet {wallet_name}: {err}"));
            return false;
        }
        if !self.main.authenticate(wallet_name) {
            self.fail("Wallet loaded, but the application is not ready.".to_owned());
            return false;
        }
        info!(wallet = wallet_name, "logged in");
        self.state.set(LoginState::default());
        true
    }

    fn begin(&self) -> bool {
        self.state.update_if(|s| {
            if s.state == LoginStatus::Pending {
                return false;
            }
            *s = LoginState {
                state: LoginStatus::Pending,
                error: None,
            };
            true
        })
    }

    fn fail(&self, message: String) {
        warn!("{message}");
        self.state.set(LoginState {
            state: LoginStatus::Error,
            error: Some(message),
        });
    }
}
