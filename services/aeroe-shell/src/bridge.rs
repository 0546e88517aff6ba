//! Local JSON bridge between the web-view and the stores.
//!
//! Reads return snapshots; every action returns the snapshot of the store it
//! touched, so the view can re-render from the response alone.

use ae_api_types::{TransactionMeta, TxOutput};
use ae_stores::{
    AppStores, LoginState, MainStoreState, NodeState, OnboardingState, Route, RouteNavigator,
    SessionState, WalletState, WelcomeState,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) stores: AppStores,
    pub(crate) navigator: Arc<RouteNavigator>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateSnapshot {
    route: Option<Route>,
    path: Option<&'static str>,
    main: MainStoreState,
    session: SessionState,
    onboarding: OnboardingState,
    login: LoginState,
    welcome: WelcomeState,
    wallet: WalletState,
    node: NodeState,
}

#[derive(Debug, Deserialize)]
struct PasswordRequest {
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletNameRequest {
    wallet_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRequest {
    wallet_name: String,
    seed_phrase: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreateTxRequest {
    transactions: Vec<TxOutput>,
    fee: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftRequest {
    draft_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    socket_path: String,
}

#[derive(Debug, Serialize)]
struct TxResponse {
    transaction: Option<TransactionMeta>,
    wallet: WalletState,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

pub(crate) fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/state", get(snapshot))
        .route("/boot", post(boot))
        .route("/boot/retry", post(retry_boot))
        .route("/logout", post(logout))
        .route("/onboarding/toggle-terms", post(toggle_terms))
        .route("/onboarding/toggle-privacy", post(toggle_privacy))
        .route("/onboarding/submit", post(submit_onboarding))
        .route("/login", post(login))
        .route("/login/select", post(select_wallet))
        .route("/welcome/password", post(welcome_password))
        .route("/welcome/create", post(welcome_create))
        .route("/welcome/choose-import", post(welcome_choose_import))
        .route("/welcome/import", post(welcome_import))
        .route("/welcome/wallet", post(welcome_wallet))
        .route("/wallet/fetch", post(wallet_fetch))
        .route("/wallet/refresh", post(wallet_refresh))
        .route("/wallet/lock", post(wallet_lock))
        .route("/wallet/history", post(wallet_history))
        .route("/wallet/tx", post(wallet_create_tx))
        .route("/wallet/tx/sign", post(wallet_sign_tx))
        .route("/wallet/tx/send", post(wallet_send_tx))
        .route("/node/start", post(node_start))
        .route("/node/connect", post(node_connect))
        .route("/node/disconnect", post(node_disconnect))
        .route("/node/status", post(node_status))
        .route("/node/poll", post(node_poll))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "aeroe-shell",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "aeroe-shell",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn snapshot(State(state): State<AppState>) -> Json<StateSnapshot> {
    let stores = &state.stores;
    let route = state.navigator.current();
    Json(StateSnapshot {
        route,
        path: route.map(Route::path),
        main: stores.main.state(),
        session: stores.session.state(),
        onboarding: stores.onboarding.state(),
        login: stores.login.state(),
        welcome: stores.welcome.state(),
        wallet: stores.wallet.state(),
        node: stores.node.state(),
    })
}

async fn boot(State(state): State<AppState>) -> Json<MainStoreState> {
    state.stores.main.boot().await;
    Json(state.stores.main.state())
}

async fn retry_boot(State(state): State<AppState>) -> Json<MainStoreState> {
    state.stores.main.retry_boot().await;
    Json(state.stores.main.state())
}

async fn logout(State(state): State<AppState>) -> Json<MainStoreState> {
    state.stores.main.logout();
    Json(state.stores.main.state())
}

async fn toggle_terms(State(state): State<AppState>) -> Json<OnboardingState> {
    state.stores.onboarding.toggle_terms();
    Json(state.stores.onboarding.state())
}

async fn toggle_privacy(State(state): State<AppState>) -> Json<OnboardingState> {
    state.stores.onboarding.toggle_privacy();
    Json(state.stores.onboarding.state())
}

async fn submit_onboarding(State(state): State<AppState>) -> Json<OnboardingState> {
    state.stores.onboarding.submit().await;
    Json(state.stores.onboarding.state())
}

async fn login(State(state): State<AppState>, Json(request): Json<PasswordRequest>) -> Json<LoginState> {
    state.stores.login.login(&request.password).await;
    Json(state.stores.login.state())
}

async fn select_wallet(
    State(state): State<AppState>,
    Json(request): Json<WalletNameRequest>,
) -> ApiResult<LoginState> {
    let wallet_name = required(&request.wallet_name, "walletName is required")?;
    state.stores.login.select_wallet(wallet_name).await;
    Ok(Json(state.stores.login.state()))
}

async fn welcome_password(
    State(state): State<AppState>,
    Json(request): Json<PasswordRequest>,
) -> Json<WelcomeState> {
    state.stores.welcome.submit_password(&request.password).await;
    Json(state.stores.welcome.state())
}

async fn welcome_create(State(state): State<AppState>) -> Json<WelcomeState> {
    state.stores.welcome.choose_create().await;
    Json(state.stores.welcome.state())
}

async fn welcome_choose_import(State(state): State<AppState>) -> Json<WelcomeState> {
    state.stores.welcome.choose_import();
    Json(state.stores.welcome.state())
}

async fn welcome_import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Json<WelcomeState> {
    state
        .stores
        .welcome
        .import_wallet(&request.wallet_name, &request.seed_phrase)
        .await;
    Json(state.stores.welcome.state())
}

async fn welcome_wallet(
    State(state): State<AppState>,
    Json(request): Json<WalletNameRequest>,
) -> Json<WelcomeState> {
    state.stores.welcome.create_wallet(&request.wallet_name).await;
    Json(state.stores.welcome.state())
}

async fn wallet_fetch(
    State(state): State<AppState>,
    Json(request): Json<WalletNameRequest>,
) -> ApiResult<WalletState> {
    let wallet_name = required(&request.wallet_name, "walletName is required")?;
    state.stores.wallet.fetch_wallet_data(wallet_name).await;
    Ok(Json(state.stores.wallet.state()))
}

async fn wallet_refresh(State(state): State<AppState>) -> Json<WalletState> {
    state.stores.wallet.refresh().await;
    Json(state.stores.wallet.state())
}

async fn wallet_lock(State(state): State<AppState>) -> Json<WalletState> {
    state.stores.wallet.lock();
    Json(state.stores.wallet.state())
}

async fn wallet_history(State(state): State<AppState>) -> Json<WalletState> {
    state.stores.wallet.fetch_history().await;
    Json(state.stores.wallet.state())
}

async fn wallet_create_tx(
    State(state): State<AppState>,
    Json(request): Json<CreateTxRequest>,
) -> Json<TxResponse> {
    let transaction = state
        .stores
        .wallet
        .create_transaction(request.transactions, request.fee)
        .await;
    Json(TxResponse {
        transaction,
        wallet: state.stores.wallet.state(),
    })
}

async fn wallet_sign_tx(
    State(state): State<AppState>,
    Json(request): Json<DraftRequest>,
) -> ApiResult<TxResponse> {
    let draft_id = required(&request.draft_id, "draftId is required")?;
    let transaction = state.stores.wallet.sign_transaction(draft_id).await;
    Ok(Json(TxResponse {
        transaction,
        wallet: state.stores.wallet.state(),
    }))
}

async fn wallet_send_tx(
    State(state): State<AppState>,
    Json(request): Json<DraftRequest>,
) -> ApiResult<TxResponse> {
    let draft_id = required(&request.draft_id, "draftId is required")?;
    let transaction = state.stores.wallet.send_transaction(draft_id).await;
    Ok(Json(TxResponse {
        transaction,
        wallet: state.stores.wallet.state(),
    }))
}

async fn node_start(State(state): State<AppState>) -> Json<NodeState> {
    state.stores.node.start_local().await;
    Json(state.stores.node.state())
}

async fn node_connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> Json<NodeState> {
    state.stores.node.connect_external(&request.socket_path).await;
    Json(state.stores.node.state())
}

async fn node_disconnect(State(state): State<AppState>) -> Json<NodeState> {
    state.stores.node.disconnect().await;
    Json(state.stores.node.state())
}

async fn node_status(State(state): State<AppState>) -> Json<NodeState> {
    state.stores.node.refresh_status().await;
    Json(state.stores.node.state())
}

async fn node_poll(State(state): State<AppState>) -> Json<NodeState> {
    state.stores.node.poll_block_height().await;
    Json(state.stores.node.state())
}

fn required<'a>(value: &'a str, message: &str) -> Result<&'a str, (StatusCode, Json<ErrorResponse>)> {
    let value = value.trim();
    if value.is_empty() {
        return Err(bad_request(message));
    }
    Ok(value)
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}
