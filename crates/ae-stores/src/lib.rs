//! Observable application stores.
//!
//! Each store owns one slice of UI state behind a [`StateCell`] and talks to
//! the backend only through the [`Gateway`]. Stores that drive other stores
//! hold them as `Arc`s handed in at construction; [`AppStores`] wires the
//! whole graph.

mod cell;
mod config;
mod login;
mod main_store;
mod navigation;
mod node;
mod onboarding;
mod poller;
mod session;
mod wallet;
mod welcome;

#[cfg(test)]
mod testing;

pub use cell::StateCell;
pub use config::StoreConfig;
pub use login::{LoginState, LoginStatus, LoginStore};
pub use main_store::{MainStateName, MainStore, MainStoreState};
pub use navigation::{Navigator, Route, RouteNavigator};
pub use node::{NodeMode, NodeState, NodeStore};
pub use onboarding::{OnboardingState, OnboardingStore};
pub use poller::PollHandle;
pub use session::{SessionState, SessionStore};
pub use wallet::{WalletState, WalletStatus, WalletStore};
pub use welcome::{WelcomeState, WelcomeStore, WizardStep};

use ae_gateway::Gateway;
use std::sync::Arc;
use tracing::info;

/// Every store, constructed once and shared by the UI bridge.
#[derive(Clone)]
pub struct AppStores {
    pub session: Arc<SessionStore>,
    pub wallet: Arc<WalletStore>,
    pub main: Arc<MainStore>,
    pub onboarding: Arc<OnboardingStore>,
    pub login: Arc<LoginStore>,
    pub welcome: Arc<WelcomeStore>,
    pub node: Arc<NodeStore>,
}

impl AppStores {
    pub fn new(gateway: Gateway, navigator: Arc<dyn Navigator>, config: StoreConfig) -> Self {
        let session = Arc::new(SessionStore::new());
        let wallet = Arc::new(WalletStore::new(gateway.clone(), session.clone(), config.clone()));
        let main = Arc::new(MainStore::new(
            gateway.clone(),
            session.clone(),
            wallet.clone(),
            navigator,
        ));
        let onboarding = Arc::new(OnboardingStore::new(gateway.clone(), main.clone()));
        let login = Arc::new(LoginStore::new(gateway.clone(), session.clone(), main.clone()));
        let welcome = Arc::new(WelcomeStore::new(
            gateway.clone(),
            session.clone(),
            main.clone(),
            config.clone(),
        ));
        let node = Arc::new(NodeStore::new(gateway, config));

        Self {
            session,
            wallet,
            main,
            onboarding,
            login,
            welcome,
            node,
        }
    }

    /// Stop background work. Call once before exit.
    pub fn shutdown(&self) {
        self.node.cleanup();
        info!("stores shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use ae_gateway::mock::MockState;

    #[tokio::test]
    async fn full_first_run_reaches_wallet() {
        let harness = Harness::new(MockState::default());
        let stores = &harness.stores;

        stores.main.boot().await;
        assert_eq!(harness.navigator.routes(), vec![Route::Landing]);

        stores.onboarding.toggle_terms();
        stores.onboarding.toggle_privacy();
        assert!(stores.onboarding.submit().await);

        assert!(stores.welcome.submit_password("pw").await);
        assert!(stores.welcome.choose_create().await);
        assert!(stores.welcome.create_wallet("alice").await);

        stores.wallet.fetch_wallet_data("alice").await;
        assert_eq!(stores.wallet.state().status, WalletStatus::Loaded);
        assert_eq!(stores.main.state().name, MainStateName::Authenticated);
        assert_eq!(
            harness.navigator.routes(),
            vec![Route::Landing, Route::Welcome, Route::Wallet]
        );

        stores.shutdown();
    }
}
