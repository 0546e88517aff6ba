//! First-run wizard: vault password, then a new or imported wallet.
//!
//! Each step calls the backend and only advances when that call succeeds.
//! The password and seed phrase live in zeroizing buffers and are dropped
//! when the wizard finishes.

use ae_gateway::Gateway;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::{MainStore, SessionStore, StateCell, StoreConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    #[default]
    CreatePassword,
    ChooseAction,
    CreateWallet,
    ImportWallet,
    Finished,
}

#[derive(Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeState {
    pub step: WizardStep,
    #[serde(skip)]
    pub password: Option<Zeroizing<String>>,
    /// Shown once so the user can write it down.
    #[serde(serialize_with = "serialize_phrase")]
    pub seed_phrase: Option<Zeroizing<Vec<String>>>,
    /// Set once the backend has the wallet, even if loading it failed.
    pub created_wallet: Option<String>,
    pub error: Option<String>,
}

impl fmt::Debug for WelcomeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WelcomeState")
            .field("step", &self.step)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "seed_phrase",
                &self.seed_phrase.as_ref().map(|words| format!("<{} words>", words.len())),
            )
            .field("created_wallet", &self.created_wallet)
            .field("error", &self.error)
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Origin {
    Created,
    Imported,
}

impl Origin {
    fn verb(self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::Imported => "import",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Imported => "imported",
        }
    }
}

fn serialize_phrase<S: Serializer>(
    phrase: &Option<Zeroizing<Vec<String>>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match phrase {
        Some(words) => serializer.collect_seq(words.iter()),
        None => serializer.serialize_none(),
    }
}

pub struct WelcomeStore {
    state: StateCell<WelcomeState>,
    gateway: Gateway,
    session: Arc<SessionStore>,
    main: Arc<MainStore>,
    config: StoreConfig,
}

impl WelcomeStore {
    pub fn new(gateway: Gateway, session: Arc<SessionStore>, main: Arc<MainStore>, config: StoreConfig) -> Self {
        Self {
            state: StateCell::default(),
            gateway,
            session,
            main,
            config,
        }
    }

    pub fn state(&self) -> WelcomeState {
        self.state.get()
    }

    pub fn step(&self) -> WizardStep {
        self.state.read(|s| s.step)
    }

    pub fn subscribe(&self) -> watch::Receiver<WelcomeState> {
        self.state.subscribe()
    }

    pub async fn submit_password(&self, password: &str) -> bool {
        if !self.expect_step(&[WizardStep::CreatePassword]) {
            return false;
        }
        if password.trim().is_empty() {
            self.fail("Please choose a password.".to_owned());
            return false;
        }
        let password = Zeroizing::new(password.to_owned());

        if let Err(err) = self.gateway.vault().create(&password).await.into_result() {
            self.fail(format!("Failed to create vault: {err}"));
            return false;
        }

        info!("vault created");
        self.state.set(WelcomeState {
            step: WizardStep::ChooseAction,
            password: Some(password),
            ..WelcomeState::default()
        });
        true
    }

    pub async fn choose_create(&self) -> bool {
        self.generate_seed_phrase().await
    }

    pub fn choose_import(&self) -> bool {
        if !self.expect_step(&[WizardStep::ChooseAction]) {
            return false;
        }
        self.state.update(|s| {
            s.step = WizardStep::ImportWallet;
            s.error = None;
        });
        true
    }

    /// Ask the backend for a fresh phrase. Calling it again on the
    /// create-wallet step replaces the phrase.
    pub async fn generate_seed_phrase(&self) -> bool {
        if !self.expect_step(&[WizardStep::ChooseAction, WizardStep::CreateWallet]) {
            return false;
        }
        self.state.update(|s| s.error = None);

        let words = match self.gateway.wallet().keygen().await.into_result() {
            Ok(words) => Zeroizing::new(words),
            Err(err) => {
                self.fail(format!("Failed to generate seed phrase: {err}"));
                return false;
            }
        };
        if words.len() != self.config.seed_phrase_words {
            self.fail(format!(
                "Failed to generate seed phrase: expected {} words, got {}",
                self.config.seed_phrase_words,
                words.len()
            ));
            return false;
        }

        self.state.update(|s| {
            s.seed_phrase = Some(words);
            s.step = WizardStep::CreateWallet;
        });
        true
    }

    pub async fn create_wallet(&self, wallet_name: &str) -> bool {
        if !self.expect_step(&[WizardStep::CreateWallet]) {
            return false;
        }
        let Some(wallet_name) = self.wallet_name(wallet_name) else {
            return false;
        };
        self.state.update(|s| s.error = None);
        let Some(phrase) = self.state.read(|s| s.seed_phrase.clone()) else {
            self.fail("Seed phrase not found.".to_owned());
            return false;
        };

        self.register(&wallet_name, &phrase, Origin::Created).await
    }

    pub async fn import_wallet(&self, wallet_name: &str, seed_phrase: &[String]) -> bool {
        if !self.expect_step(&[WizardStep::ImportWallet]) {
            return false;
        }
        let Some(wallet_name) = self.wallet_name(wallet_name) else {
            return false;
        };
        if seed_phrase.len() != self.config.seed_phrase_words
            || seed_phrase.iter().any(|word| word.trim().is_empty())
        {
            self.fail(format!("Please enter all {} words.", self.config.seed_phrase_words));
            return false;
        }
        self.state.update(|s| s.error = None);

        let words: Zeroizing<Vec<String>> =
            Zeroizing::new(seed_phrase.iter().map(|word| word.trim().to_owned()).collect());

        self.register(&wallet_name, &words, Origin::Imported).await
    }

    /// Create the wallet once, then load and authenticate it. A retry after a
    /// failed load or authentication skips the create the backend already did.
    async fn register(&self, wallet_name: &str, phrase: &[String], origin: Origin) -> bool {
        let exists = self.state.read(|s| s.created_wallet.as_deref() == Some(wallet_name));
        if !exists {
            if let Err(err) = self.gateway.wallet().create(wallet_name, phrase).await.into_result() {
                self.fail(format!("Failed to {} wallet: {err}", origin.verb()));
                return false;
            }
            self.state.update(|s| s.created_wallet = Some(wallet_name.to_owned()));
        }

        if let Err(err) = self.gateway.wallet().load(wallet_name).await.into_result() {
            self.fail(format!("Wallet {}, but failed to load: {err}", origin.past()));
            return false;
        }
        info!(wallet = wallet_name, "wallet {}", origin.past());

        self.session.add_wallet(wallet_name);
        if !self.main.authenticate(wallet_name) {
            self.fail(format!("Wallet {}, but the application is not ready.", origin.past()));
            return false;
        }
        self.state.set(WelcomeState {
            step: WizardStep::Finished,
            ..WelcomeState::default()
        });
        true
    }

    fn wallet_name(&self, wallet_name: &str) -> Option<String> {
        let trimmed = wallet_name.trim();
        if trimmed.is_empty() {
            self.fail("Please enter a wallet name.".to_owned());
            return None;
        }
        Some(trimmed.to_owned())
    }

    fn expect_step(&self, allowed: &[WizardStep]) -> bool {
        let step = self.step();
        if allowed.contains(&step) {
            return true;
        }
        warn!(?step, ?allowed, "wizard action out of order");
        self.state.update(|s| s.error = Some("This step is not available right now.".to_owned()));
        false
    }

    fn fail(&self, message: String) {
        warn!("{message}");
        self.state.update(|s| s.error = Some(message));
    }
}
