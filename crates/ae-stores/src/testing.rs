use ae_gateway::Gateway;
use ae_gateway::mock::{MockBackend, MockState};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::{AppStores, Navigator, Route, StoreConfig};

/// Short timings so paused-clock tests stay readable.
pub fn fast_config() -> StoreConfig {
    StoreConfig {
        balance_poll_interval: Duration::from_millis(100),
        balance_max_wait: Duration::from_secs(5),
        height_poll_interval: Duration::from_secs(10),
        seed_phrase_words: 24,
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner).push(route);
    }
}

pub struct Harness {
    pub backend: Arc<MockBackend>,
    pub navigator: Arc<RecordingNavigator>,
    pub stores: AppStores,
}

impl Harness {
    pub fn new(state: MockState) -> Self {
        let backend = Arc::new(MockBackend::with_state(state));
        let navigator = Arc::new(RecordingNavigator::default());
        let stores = AppStores::new(Gateway::new(backend.clone()), navigator.clone(), fast_config());
        Self {
            backend,
            navigator,
            stores,
        }
    }
}
