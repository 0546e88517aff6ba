use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Command names understood by the native backend.
pub mod commands {
    pub const TERMS_OF_USE_IS_ACCEPTED: &str = "terms_of_use_is_accepted";
    pub const PRIVACY_POLICY_IS_ACCEPTED: &str = "privacy_policy_is_accepted";
    pub const ACCEPT_TERMS_OF_USE: &str = "accept_terms_of_use";
    pub const ACCEPT_PRIVACY_POLICY: &str = "accept_privacy_policy";
    pub const AEROE_STATUS: &str = "aeroe_status";
    pub const VAULT_CREATE: &str = "vault_create";
    pub const VAULT_LOAD: &str = "vault_load";
    pub const KEYGEN: &str = "keygen";
    pub const WALLET_CREATE: &str = "wallet_create";
    pub const WALLET_LOAD: &str = "wallet_load";
    pub const MASTER_PUBKEY: &str = "master_pubkey";
    pub const BALANCE: &str = "balance";
    pub const CREATE_TX: &str = "create_tx";
    pub const SIGN_TX: &str = "sign_tx";
    pub const SEND_TX: &str = "send_tx";
    pub const LIST_UNSENT_TXS: &str = "list_unsent_txs";
    pub const NODE_START_MASTER: &str = "node_start_master";
    pub const NODE_STOP_MASTER: &str = "node_stop_master";
    pub const NODE_PEEK: &str = "node_peek";
}

pub const NOT_IMPLEMENTED: &str = "Not implemented";

/// Opaque error payload reported by the backend or the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendError(pub Value);

impl BackendError {
    pub fn message(message: impl Into<String>) -> Self {
        Self(Value::String(message.into()))
    }

    pub fn not_implemented() -> Self {
        Self::message(NOT_IMPLEMENTED)
    }

    pub fn is_not_implemented(&self) -> bool {
        self.0.as_str() == Some(NOT_IMPLEMENTED)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(text) => f.write_str(text),
            Value::Null => f.write_str("unknown error"),
            other => write!(f, "{other}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Result of one remote call.
///
/// On the wire this is `{"success": true, "data": ...}` or
/// `{"success": false, "error": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendResponse<T> {
    Success(T),
    Failure(BackendError),
}

impl<T> BackendResponse<T> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure(BackendError::message(error))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&BackendError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<T, BackendError> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BackendResponse<U> {
        match self {
            Self::Success(data) => BackendResponse::Success(f(data)),
            Self::Failure(err) => BackendResponse::Failure(err),
        }
    }
}

#[derive(Serialize)]
struct WireResponseRef<'a, T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a Value>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl<T: Serialize> Serialize for BackendResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Success(data) => WireResponseRef {
                success: true,
                data: Some(data),
                error: None,
            },
            Self::Failure(err) => WireResponseRef {
                success: false,
                data: None,
                error: Some(&err.0),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for BackendResponse<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireResponse::deserialize(deserializer)?;
        if !wire.success {
            return Ok(Self::Failure(BackendError(wire.error.unwrap_or(Value::Null))));
        }
        let data = serde_json::from_value(wire.data.unwrap_or(Value::Null)).map_err(D::Error::custom)?;
        Ok(Self::Success(data))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub coin: String,
    pub amount: u64,
}

/// Aggregate status check reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AeroeStatus {
    #[serde(default, rename = "is_first_run")]
    pub is_first_run: bool,
    #[serde(default)]
    pub vault_exists: bool,
    #[serde(default)]
    pub vault_loaded: bool,
    #[serde(default)]
    pub wallets: Vec<String>,
    #[serde(default)]
    pub active_wallet: Option<String>,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub master_node_running: bool,
    #[serde(default)]
    pub num_miners: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub recipient: String,
    pub amount: u64,
}

/// Draft lifecycle. Ordering follows the only legal progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Draft,
    Signed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub draft_id: String,
    pub transactions: Vec<TxOutput>,
    pub fee: u64,
    pub created_at: String,
    #[serde(default)]
    pub signed_at: Option<String>,
    #[serde(default)]
    pub broadcasted_at: Option<String>,
    pub status: TxStatus,
}

pub type UnsentTransactions = BTreeMap<String, TransactionMeta>;

// ── Command arguments ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordArgs {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletNameArgs {
    pub wallet_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCreateArgs {
    pub wallet_name: String,
    pub seedphrase: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTxArgs {
    pub wallet_name: String,
    pub transactions: Vec<TxOutput>,
    pub fee: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftArgs {
    pub wallet_name: String,
    pub draft_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeekArgs {
    pub command: String,
}
