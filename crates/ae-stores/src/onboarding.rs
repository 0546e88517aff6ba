use ae_gateway::Gateway;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{MainStore, StateCell};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingState {
    pub terms_accepted: bool,
    pub privacy_accepted: bool,
    pub error: Option<String>,
}

/// Terms of use and privacy policy acceptance.
pub struct OnboardingStore {
    state: StateCell<OnboardingState>,
    gateway: Gateway,
    main: Arc<MainStore>,
}

impl OnboardingStore {
    pub fn new(gateway: Gateway, main: Arc<MainStore>) -> Self {
        Self {
            state: StateCell::default(),
            gateway,
            main,
        }
    }

    pub fn state(&self) -> OnboardingState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<OnboardingState> {
        self.state.subscribe()
    }

    pub fn toggle_terms(&self) {
        self.state.update(|s| {
            s.terms_accepted = !s.terms_accepted;
            s.error = None;
        });
    }

    pub fn toggle_privacy(&self) {
        self.state.update(|s| {
            s.privacy_accepted = !s.privacy_accepted;
            s.error = None;
        });
    }

    /// Record both acceptances, in order, then hand over to vault setup.
    pub async fn submit(&self) -> bool {
        let ready = self.state.read(|s| s.terms_accepted && s.privacy_accepted);
        if !ready {
            self.fail("Please accept the terms of use and the privacy policy.".to_owned());
            return false;
        }

        let terms = self.gateway.terms();
        if let Err(err) = terms.accept_terms().await.into_result() {
            self.fail(format!("Failed to accept terms of use: {err}"));
            return false;
        }
        if let Err(err) = terms.accept_privacy().await.into_result() {
            self.fail(format!("Failed to accept privacy policy: {err}"));
            return false;
        }

        self.state.update(|s| s.error = None);
        info!("terms of use and privacy policy accepted");
        self.main.complete_onboarding();
        true
    }

    fn fail(&self, message: String) {
        warn!("{message}");
        self.state.update(|s| s.error = Some(message));
    }
}
