use serde::Serialize;

use crate::StateCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Landing,
    Welcome,
    Login,
    SelectWallet,
    Wallet,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Welcome => "/welcome",
            Self::Login => "/login",
            Self::SelectWallet => "/select-wallet",
            Self::Wallet => "/wallet",
        }
    }
}

/// Receives the page changes decided by the main store.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Publishes the latest route for the web-view to follow.
#[derive(Default)]
pub struct RouteNavigator {
    current: StateCell<Option<Route>>,
}

impl RouteNavigator {
    pub fn current(&self) -> Option<Route> {
        self.current.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Option<Route>> {
        self.current.subscribe()
    }
}

impl Navigator for RouteNavigator {
    fn navigate(&self, route: Route) {
        self.current.set(Some(route));
    }
}
