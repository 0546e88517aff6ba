//! Node connection lifecycle and block-height polling.

use ae_api_types::BackendResponse;
use ae_gateway::Gateway;
use serde::Serialize;
use serde_json::Value;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{PollHandle, StateCell, StoreConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    Local,
    External,
    #[default]
    Disconnected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub connected: bool,
    pub mode: NodeMode,
    pub block_height: Option<u64>,
    pub connecting: bool,
    pub error: Option<String>,
    pub height_polling: bool,
}

pub struct NodeStore {
    state: StateCell<NodeState>,
    gateway: Gateway,
    config: StoreConfig,
    poller: Mutex<Option<PollHandle>>,
}

/// Clears `connecting` when a connect or disconnect attempt ends, however it ends.
struct ConnectingGuard<'a>(&'a StateCell<NodeState>);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.update_if(|s| std::mem::replace(&mut s.connecting, false));
    }
}

/// Clears `height_polling` when a poll finishes or its task is aborted.
struct PollingGuard<'a>(&'a StateCell<NodeState>);

impl Drop for PollingGuard<'_> {
    fn drop(&mut self) {
        self.0.update_if(|s| std::mem::replace(&mut s.height_polling, false));
    }
}

impl NodeStore {
    pub fn new(gateway: Gateway, config: StoreConfig) -> Self {
        Self {
            state: StateCell::default(),
            gateway,
            config,
            poller: Mutex::new(None),
        }
    }

    pub fn state(&self) -> NodeState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<NodeState> {
        self.state.subscribe()
    }

    pub async fn start_local(self: &Arc<Self>) -> bool {
        let Some(_connecting) = self.begin_connecting() else {
            return false;
        };
        info!("starting local master node");

        match self.gateway.node().start_master().await {
            BackendResponse::Success(()) => {
                self.refresh_status().await;
                true
            }
            BackendResponse::Failure(err) => {
                self.set_error(format!("Failed to start local node: {err}"));
                false
            }
        }
    }

    pub async fn connect_external(self: &Arc<Self>, socket_path: &str) -> bool {
        let socket_path = socket_path.trim();
        if socket_path.is_empty() {
            self.set_error("Socket path is required.".to_owned());
            return false;
        }
        let Some(_connecting) = self.begin_connecting() else {
            return false;
        };
        info!(socket_path, "connecting to external node");

        match self.gateway.node().connect_external(socket_path).await {
            BackendResponse::Success(()) => {
                self.state.update(|s| s.mode = NodeMode::External);
                self.refresh_status().await;
                true
            }
            BackendResponse::Failure(err) => {
                self.set_error(format!("Failed to connect to external node: {err}"));
                false
            }
        }
    }

    pub async fn disconnect(self: &Arc<Self>) -> bool {
        let Some(_connecting) = self.begin_connecting() else {
            return false;
        };
        let mode = self.state.read(|s| s.mode);
        info!(?mode, "disconnecting node");

        let response = match mode {
            NodeMode::Local => self.gateway.node().stop_master().await,
            NodeMode::External => self.gateway.node().disconnect_external().await,
            NodeMode::Disconnected => BackendResponse::Success(()),
        };
        if let BackendResponse::Failure(err) = response {
            self.set_error(format!("Failed to disconnect: {err}"));
            return false;
        }

        // An external session has nothing left to report once it is closed.
        if mode == NodeMode::External {
            self.state.update(|s| s.mode = NodeMode::Disconnected);
        }
        self.refresh_status().await;
        true
    }

    /// Derive the connection from the backend's status check.
    pub async fn refresh_status(self: &Arc<Self>) {
        let status = match self.gateway.aeroe().status().await {
            BackendResponse::Success(status) => status,
            BackendResponse::Failure(err) => {
                self.set_error(format!("Failed to get node status: {err}"));
                return;
            }
        };

        let connected = self.state.read(|s| s.mode == NodeMode::External) || status.master_node_running;
        self.state.update(|s| {
            s.connected = connected;
            s.mode = match (connected, s.mode) {
                (false, _) => NodeMode::Disconnected,
                (true, NodeMode::External) => NodeMode::External,
                (true, _) => NodeMode::Local,
            };
            if connected {
                if let Some(height) = status.block_height {
                    s.block_height = Some(height);
                }
            } else {
                s.block_height = None;
            }
            s.error = None;
        });
        debug!(connected, "node status refreshed");

        if connected {
            self.start_height_polling();
        } else {
            self.stop_height_polling();
        }
    }

    /// One height poll. Skipped while disconnected or while a previous poll is in flight.
    pub async fn poll_block_height(&self) {
        let claimed = self.state.update_if(|s| {
            if !s.connected || s.height_polling {
                return false;
            }
            s.height_polling = true;
            true
        });
        if !claimed {
            debug!("height poll skipped");
            return;
        }
        let _polling = PollingGuard(&self.state);

        let response = self.gateway.node().peek("height").await;
        self.state.update(|s| {
            if !s.connected {
                return;
            }
            match response.into_result() {
                Ok(payload) => match parse_height(&payload) {
                    Some(height) => {
                        s.block_height = Some(height);
                        s.error = None;
                    }
                    None => s.error = Some(format!("Unexpected block height payload: {payload}")),
                },
                Err(err) => s.error = Some(format!("Failed to fetch block height: {err}")),
            }
        });
    }

    /// Restarts polling if it is not running. The first poll is immediate.
    pub fn start_height_polling(self: &Arc<Self>) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let store = Arc::downgrade(self);
        *poller = Some(PollHandle::spawn(self.config.height_poll_interval, move || {
            let store = store.clone();
            async move {
                let Some(store) = store.upgrade() else {
                    return ControlFlow::Break(());
                };
                store.poll_block_height().await;
                ControlFlow::Continue(())
            }
        }));
        debug!(interval = ?self.config.height_poll_interval, "height polling started");
    }

    pub fn stop_height_polling(&self) {
        let handle = self.poller.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.stop();
            debug!("height polling stopped");
        }
    }

    pub fn is_height_polling_active(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn set_error(&self, message: String) {
        warn!("{message}");
        self.state.update(|s| s.error = Some(message));
    }

    pub fn clear_error(&self) {
        self.state.update_if(|s| s.error.take().is_some());
    }

    pub fn cleanup(&self) {
        self.stop_height_polling();
    }

    fn begin_connecting(&self) -> Option<ConnectingGuard<'_>> {
        let claimed = self.state.update_if(|s| {
            if s.connecting {
                return false;
            }
            s.connecting = true;
            s.error = None;
            true
        });
        if !claimed {
            debug!("node connection change already in progress");
            return None;
        }
        Some(ConnectingGuard(&self.state))
    }
}

fn parse_height(payload: &Value) -> Option<u64> {
    match payload {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        Value::Object(fields) => fields.get("height").and_then(parse_height),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, fast_config};
    use ae_api_types::commands::{NODE_PEEK, NODE_START_MASTER};
    use ae_gateway::mock::MockState;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    fn with_height(height: u64) -> Harness {
        Harness::new(MockState {
            block_height: height,
            ..MockState::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn start_local_connects_and_polls() {
        let harness = with_height(42);
        let node = &harness.stores.node;

        assert!(node.start_local().await);
        sleep(Duration::from_millis(1)).await;

        let state = node.state();
        assert!(state.connected);
        assert_eq!(state.mode, NodeMode::Local);
        assert_eq!(state.block_height, Some(42));
        assert!(!state.connecting);
        assert!(node.is_height_polling_active());

        harness.backend.update(|s| s.block_height = 43).await;
        sleep(fast_config().height_poll_interval).await;
        assert_eq!(node.state().block_height, Some(43));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_polling_and_clears_height() {
        let harness = with_height(7);
        let node = &harness.stores.node;
        node.start_local().await;
        sleep(Duration::from_millis(1)).await;

        assert!(node.disconnect().await);

        let state = node.state();
        assert!(!state.connected);
        assert_eq!(state.mode, NodeMode::Disconnected);
        assert_eq!(state.block_height, None);
        assert!(!node.is_height_polling_active());

        let peeks = harness.backend.calls(NODE_PEEK).await;
        sleep(fast_config().height_poll_interval * 3).await;
        assert_eq!(harness.backend.calls(NODE_PEEK).await, peeks);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_connects_are_rejected() {
        let harness = with_height(1);
        harness.backend.set_latency(Some(Duration::from_millis(100))).await;
        let node = &harness.stores.node;

        let (first, second) = tokio::join!(node.start_local(), node.start_local());

        assert!(first ^ second);
        assert_eq!(harness.backend.calls(NODE_START_MASTER).await, 1);
        node.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_height_polls_are_skipped() {
        let harness = with_height(5);
        let node = &harness.stores.node;
        node.start_local().await;
        sleep(Duration::from_millis(1)).await;
        node.stop_height_polling();
        harness.backend.set_latency(Some(Duration::from_millis(100))).await;
        let before = harness.backend.calls(NODE_PEEK).await;

        tokio::join!(node.poll_block_height(), node.poll_block_height());

        assert_eq!(harness.backend.calls(NODE_PEEK).await, before + 1);
        assert!(!node.state().height_polling);
    }

    #[tokio::test]
    async fn poll_failure_records_error() {
        let harness = with_height(5);
        let node = &harness.stores.node;
        node.start_local().await;
        node.stop_height_polling();
        harness.backend.fail_always(NODE_PEEK).await;

        node.poll_block_height().await;

        let state = node.state();
        assert!(state.error.unwrap_or_default().starts_with("Failed to fetch block height"));
        assert!(state.connected);
        assert!(!state.height_polling);
    }

    #[tokio::test]
    async fn refresh_follows_backend_status() {
        let harness = with_height(9);
        harness.backend.update(|s| s.master_node_running = true).await;
        let node = &harness.stores.node;

        node.refresh_status().await;
        assert!(node.state().connected);
        assert_eq!(node.state().block_height, Some(9));

        harness.backend.update(|s| s.master_node_running = false).await;
        node.refresh_status().await;
        let state = node.state();
        assert_eq!(state.mode, NodeMode::Disconnected);
        assert_eq!(state.block_height, None);
        assert!(!node.is_height_polling_active());
    }

    #[tokio::test]
    async fn external_connection_is_not_wired_yet() {
        let harness = with_height(0);
        let node = &harness.stores.node;

        assert!(!node.connect_external("   ").await);
        assert_eq!(node.state().error.as_deref(), Some("Socket path is required."));

        assert!(!node.connect_external("/tmp/nockchain.sock").await);
        let state = node.state();
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to connect to external node: Not implemented")
        );
        assert!(!state.connecting);
        assert!(!state.connected);

        node.clear_error();
        assert!(node.state().error.is_none());
    }

    #[test]
    fn height_payload_shapes() {
        assert_eq!(parse_height(&json!(12)), Some(12));
        assert_eq!(parse_height(&json!("13")), Some(13));
        assert_eq!(parse_height(&json!({ "height": 14 })), Some(14));
        assert_eq!(parse_height(&json!([15])), None);
    }
}
