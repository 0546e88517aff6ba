mod bridge;
mod config;

use ae_gateway::mock::MockBackend;
use ae_gateway::{CommandTransport, Gateway};
use ae_stores::{AppStores, RouteNavigator};
use ae_transport_http::HttpTransport;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bridge::{AppState, router};
use crate::config::ShellConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ShellConfig::from_env()?;

    let transport: Arc<dyn CommandTransport> = if config.mock_backend {
        warn!("AEROE_MOCK_BACKEND is set; using the in-memory backend");
        Arc::new(MockBackend::new())
    } else {
        let transport = HttpTransport::new(Some(config.backend_url.clone()));
        info!("forwarding backend commands to {}", transport.endpoint());
        Arc::new(transport)
    };

    let navigator = Arc::new(RouteNavigator::default());
    let stores = AppStores::new(Gateway::new(transport), navigator.clone(), config.stores.clone());

    let mut routes = navigator.subscribe();
    tokio::spawn(async move {
        while routes.changed().await.is_ok() {
            if let Some(route) = *routes.borrow_and_update() {
                info!("navigate to {}", route.path());
            }
        }
    });

    let main_store = stores.main.clone();
    tokio::spawn(async move { main_store.boot().await });

    let app = router(AppState {
        stores: stores.clone(),
        navigator,
    });

    info!("aeroe-shell listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    stores.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
