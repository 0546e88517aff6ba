//! Known wallets and the active one, as last reported by the backend.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::StateCell;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub wallets: Vec<String>,
    pub active_wallet_name: Option<String>,
}

#[derive(Default)]
pub struct SessionStore {
    state: StateCell<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn contains(&self, wallet_name: &str) -> bool {
        self.state.read(|s| s.wallets.iter().any(|name| name == wallet_name))
    }

    /// Replace membership with the backend's list, keeping its order.
    pub fn set_wallets(&self, wallets: Vec<String>) {
        let mut unique: Vec<String> = Vec::with_capacity(wallets.len());
        for name in wallets {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        self.state.update(|s| {
            if let Some(active) = &s.active_wallet_name {
                if !unique.contains(active) {
                    debug!(wallet = %active, "active wallet no longer reported; clearing");
                    s.active_wallet_name = None;
                }
            }
            s.wallets = unique;
        });
    }

    /// Optimistically record a wallet the backend just created.
    pub fn add_wallet(&self, wallet_name: &str) -> bool {
        self.state.update_if(|s| {
            if s.wallets.iter().any(|name| name == wallet_name) {
                return false;
            }
            s.wallets.push(wallet_name.to_owned());
            true
        })
    }

    pub fn set_active_wallet(&self, wallet_name: &str) {
        self.state.update(|s| {
            if !s.wallets.iter().any(|name| name == wallet_name) {
                s.wallets.push(wallet_name.to_owned());
            }
            s.active_wallet_name = Some(wallet_name.to_owned());
        });
    }

    pub fn clear(&self) {
        self.state.set(SessionState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn set_wallets_dedupes_in_backend_order() {
        let session = SessionStore::new();
        session.set_wallets(names(&["bob", "alice", "bob"]));
        assert_eq!(session.state().wallets, names(&["bob", "alice"]));
    }

    #[test]
    fn set_wallets_drops_vanished_active_wallet() {
        let session = SessionStore::new();
        session.set_active_wallet("alice");
        session.set_wallets(names(&["bob"]));
        assert_eq!(session.state().active_wallet_name, None);

        session.set_active_wallet("bob");
        session.set_wallets(names(&["alice", "bob"]));
        assert_eq!(session.state().active_wallet_name.as_deref(), Some("bob"));
    }

    #[test]
    fn add_wallet_is_idempotent() {
        let session = SessionStore::new();
        assert!(session.add_wallet("alice"));
        assert!(!session.add_wallet("alice"));
        assert_eq!(session.state().wallets, names(&["alice"]));
    }

    #[test]
    fn clear_resets_everything() {
        let session = SessionStore::new();
        session.set_wallets(names(&["alice"]));
        session.set_active_wallet("alice");
        session.clear();
        assert_eq!(session.state(), SessionState::default());
    }
}
