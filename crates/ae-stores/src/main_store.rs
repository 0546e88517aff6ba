//! Top-level application state machine.
//!
//! `booting` resolves to `onboarding`, `unauthenticated` or `error`. The
//! remaining transitions are explicit calls from the other stores.

use ae_gateway::Gateway;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{Navigator, Route, SessionStore, StateCell, WalletStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MainStateName {
    #[default]
    Booting,
    Onboarding,
    Unauthenticated,
    Authenticated,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MainStoreState {
    pub name: MainStateName,
    pub error: Option<String>,
}

pub struct MainStore {
    state: StateCell<MainStoreState>,
    gateway: Gateway,
    session: Arc<SessionStore>,
    wallet: Arc<WalletStore>,
    navigator: Arc<dyn Navigator>,
    boot_claimed: AtomicBool,
}

/// Held for the duration of one boot; released on every exit path.
struct BootClaim<'a>(&'a AtomicBool);

impl<'a> BootClaim<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BootClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MainStore {
    pub fn new(
        gateway: Gateway,
        session: Arc<SessionStore>,
        wallet: Arc<WalletStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            state: StateCell::default(),
            gateway,
            session,
            wallet,
            navigator,
            boot_claimed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> MainStoreState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<MainStoreState> {
        self.state.subscribe()
    }

    pub async fn boot(&self) {
        let Some(_claim) = BootClaim::acquire(&self.boot_claimed) else {
            debug!("boot skipped: another boot is running");
            return;
        };
        // Checked under the claim so a boot that finished meanwhile is seen.
        if self.state.read(|s| s.name) != MainStateName::Booting {
            debug!("boot skipped: already booted");
            return;
        }
        info!("booting");

        let terms = self.gateway.terms();
        let (terms_accepted, privacy_accepted) =
            tokio::join!(terms.is_terms_accepted(), terms.is_privacy_accepted());
        let accepted = match (terms_accepted.into_result(), privacy_accepted.into_result()) {
            (Ok(terms), Ok(privacy)) => terms && privacy,
            (Err(err), _) | (_, Err(err)) => {
                self.fail(format!("Failed to check terms acceptance: {err}"));
                return;
            }
        };
        if !accepted {
            self.transition(MainStateName::Onboarding, Route::Landing);
            return;
        }

        let status = match self.gateway.aeroe().status().await.into_result() {
            Ok(status) => status,
            Err(err) => {
                self.fail(format!("Failed to get application status: {err}"));
                return;
            }
        };
        self.session.set_wallets(status.wallets);

        if status.vault_exists {
            self.transition(MainStateName::Unauthenticated, Route::Login);
        } else {
            self.transition(MainStateName::Onboarding, Route::Welcome);
        }
    }

    /// Leave `error` and run the boot sequence again.
    pub async fn retry_boot(&self) {
        let reset = self.state.update_if(|s| {
            if s.name != MainStateName::Error {
                return false;
            }
            *s = MainStoreState::default();
            true
        });
        if reset {
            info!("retrying boot");
            self.boot().await;
        }
    }

    /// Make `wallet_name` the active wallet and enter the wallet view.
    pub fn authenticate(&self, wallet_name: &str) -> bool {
        let current = self.state.read(|s| s.name);
        if matches!(current, MainStateName::Booting | MainStateName::Error) {
            warn!(state = ?current, wallet = wallet_name, "authenticate ignored");
            return false;
        }

        let switching = self
            .wallet
            .state()
            .loaded_wallet_name
            .is_some_and(|loaded| loaded != wallet_name);
        if switching {
            self.wallet.lock();
        }

        self.session.set_active_wallet(wallet_name);
        info!(wallet = wallet_name, "authenticated");
        self.transition(MainStateName::Authenticated, Route::Wallet);
        true
    }

    pub fn logout(&self) {
        let was_authenticated = self.state.read(|s| s.name == MainStateName::Authenticated);
        if !was_authenticated {
            debug!("logout ignored: not authenticated");
            return;
        }
        self.session.clear();
        self.wallet.lock();
        info!("logged out");
        self.transition(MainStateName::Unauthenticated, Route::Login);
    }

    /// Terms accepted; continue with vault setup.
    pub fn complete_onboarding(&self) {
        if self.state.read(|s| s.name) != MainStateName::Onboarding {
            debug!("complete_onboarding ignored: not onboarding");
            return;
        }
        self.transition(MainStateName::Unauthenticated, Route::Welcome);
    }

    pub fn navigate_to_wallet_selection(&self) {
        let current = self.state.read(|s| s.name);
        if matches!(current, MainStateName::Booting | MainStateName::Error) {
            warn!(state = ?current, "wallet selection ignored");
            return;
        }
        self.transition(MainStateName::Unauthenticated, Route::SelectWallet);
    }

    fn transition(&self, name: MainStateName, route: Route) {
        debug!(state = ?name, route = route.path(), "main state transition");
        self.state.set(MainStoreState { name, error: None });
        self.navigator.navigate(route);
    }

    fn fail(&self, message: String) {
        error!("{message}");
        self.state.set(MainStoreState {
            name: MainStateName::Error,
            error: Some(message),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use ae_api_types::commands::{AEROE_STATUS, TERMS_OF_USE_IS_ACCEPTED};
    use ae_gateway::mock::MockState;
    use std::time::Duration;

    #[tokio::test]
    async fn fresh_install_lands_in_onboarding() {
        let harness = Harness::new(MockState {
            terms_accepted: true,
            privacy_accepted: true,
            ..MockState::default()
        });

        harness.stores.main.boot().await;

        assert_eq!(harness.stores.main.state().name, MainStateName::Onboarding);
        assert_eq!(harness.navigator.routes(), vec![Route::Welcome]);
    }

    #[tokio::test]
    async fn unaccepted_terms_show_landing() {
        let harness = Harness::new(MockState {
            terms_accepted: true,
            ..MockState::default()
        });

        harness.stores.main.boot().await;

        assert_eq!(harness.stores.main.state().name, MainStateName::Onboarding);
        assert_eq!(harness.navigator.routes(), vec![Route::Landing]);
        assert_eq!(harness.backend.calls(AEROE_STATUS).await, 0);
    }

    #[tokio::test]
    async fn existing_vault_goes_to_login() {
        let harness = Harness::new(MockState::ready("pw", &["alice", "bob"]));

        harness.stores.main.boot().await;

        assert_eq!(harness.stores.main.state().name, MainStateName::Unauthenticated);
        assert_eq!(harness.navigator.routes(), vec![Route::Login]);
        assert_eq!(harness.stores.session.state().wallets.len(), 2);
    }

    #[tokio::test]
    async fn boot_failure_is_surfaced_then_retried() {
        let harness = Harness::new(MockState::ready("pw", &[]));
        harness.backend.fail_next(TERMS_OF_USE_IS_ACCEPTED, 1).await;

        harness.stores.main.boot().await;
        let state = harness.stores.main.state();
        assert_eq!(state.name, MainStateName::Error);
        assert!(state.error.unwrap_or_default().starts_with("Failed to check terms acceptance"));
        assert!(harness.navigator.routes().is_empty());

        // Boot does not leave `error` on its own.
        harness.stores.main.boot().await;
        assert_eq!(harness.stores.main.state().name, MainStateName::Error);

        harness.stores.main.retry_boot().await;
        assert_eq!(harness.stores.main.state().name, MainStateName::Unauthenticated);
        assert_eq!(harness.navigator.routes(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn status_failure_is_an_error() {
        let harness = Harness::new(MockState::ready("pw", &[]));
        harness.backend.fail_next(AEROE_STATUS, 1).await;

        harness.stores.main.boot().await;

        let state = harness.stores.main.state();
        assert_eq!(state.name, MainStateName::Error);
        assert!(state.error.unwrap_or_default().starts_with("Failed to get application status"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_boot_navigates_once() {
        let harness = Harness::new(MockState::ready("pw", &["alice"]));
        harness.backend.set_latency(Some(Duration::from_millis(50))).await;

        let main = &harness.stores.main;
        tokio::join!(main.boot(), main.boot());
        main.boot().await;

        assert_eq!(harness.navigator.routes(), vec![Route::Login]);
        assert_eq!(harness.backend.calls(AEROE_STATUS).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_boots_on_worker_threads_navigate_once() -> anyhow::Result<()> {
        for _ in 0..20 {
            let harness = Harness::new(MockState::ready("pw", &["alice"]));
            let tasks: Vec<_> = (0..8)
                .map(|_| {
                    let main = harness.stores.main.clone();
                    tokio::spawn(async move { main.boot().await })
                })
                .collect();
            for task in tasks {
                task.await?;
            }

            assert_eq!(harness.navigator.routes(), vec![Route::Login]);
            assert_eq!(harness.backend.calls(AEROE_STATUS).await, 1);
        }
        Ok(())
    }

    #[test]
    fn boot_claim_is_exclusive_until_dropped() {
        let flag = AtomicBool::new(false);
        let claim = BootClaim::acquire(&flag);
        assert!(claim.is_some());
        assert!(BootClaim::acquire(&flag).is_none());
        drop(claim);
        assert!(BootClaim::acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn authenticate_is_ignored_while_booting() {
        let harness = Harness::new(MockState::ready("pw", &["alice"]));
        assert!(!harness.stores.main.authenticate("alice"));
        assert_eq!(harness.stores.main.state().name, MainStateName::Booting);
        assert!(harness.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn switching_wallet_locks_previous_one() {
        let harness = Harness::new(MockState::ready("pw", &["alice", "bob"]));
        harness.stores.main.boot().await;
        harness.stores.wallet.fetch_wallet_data("alice").await;
        assert!(harness.stores.main.authenticate("alice"));
        assert_eq!(
            harness.stores.wallet.state().loaded_wallet_name.as_deref(),
            Some("alice")
        );

        assert!(harness.stores.main.authenticate("bob"));

        assert_eq!(harness.stores.wallet.state(), crate::WalletState::default());
        assert_eq!(
            harness.stores.session.state().active_wallet_name.as_deref(),
            Some("bob")
        );
    }

    #[tokio::test]
    async fn logout_clears_session_and_wallet() {
        let harness = Harness::new(MockState::ready("pw", &["alice"]));
        harness.stores.main.boot().await;
        harness.stores.wallet.fetch_wallet_data("alice").await;
        harness.stores.main.authenticate("alice");

        harness.stores.main.logout();

        assert_eq!(harness.stores.main.state().name, MainStateName::Unauthenticated);
        assert_eq!(harness.stores.session.state(), crate::SessionState::default());
        assert_eq!(harness.stores.wallet.state(), crate::WalletState::default());
        assert_eq!(
            harness.navigator.routes(),
            vec![Route::Login, Route::Wallet, Route::Login]
        );
    }

    #[tokio::test]
    async fn complete_onboarding_moves_to_welcome() {
        let harness = Harness::new(MockState::default());
        harness.stores.main.boot().await;

        harness.stores.main.complete_onboarding();

        assert_eq!(harness.stores.main.state().name, MainStateName::Unauthenticated);
        assert_eq!(harness.navigator.routes(), vec![Route::Landing, Route::Welcome]);
    }
}
