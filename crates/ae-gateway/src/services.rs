use ae_api_types::commands::*;
use ae_api_types::{
    AeroeStatus, BackendResponse, CreateTxArgs, DraftArgs, PasswordArgs, PeekArgs, TransactionMeta,
    TxOutput, UnsentTransactions, WalletBalance, WalletCreateArgs, WalletNameArgs,
};
use serde_json::Value;

use crate::Gateway;

pub struct TermsApi<'a> {
    gateway: &'a Gateway,
}

impl<'a> TermsApi<'a> {
    pub(crate) fn new(gateway: &'a Gateway) -> Self {
        Self { gateway }
    }

    pub async fn is_terms_accepted(&self) -> BackendResponse<bool> {
        self.gateway.invoke(TERMS_OF_USE_IS_ACCEPTED, None).await
    }

    pub async fn is_privacy_accepted(&self) -> BackendResponse<bool> {
        self.gateway.invoke(PRIVACY_POLICY_IS_ACCEPTED, None).await
    }

    pub async fn accept_terms(&self) -> BackendResponse<()> {
        self.gateway.invoke(ACCEPT_TERMS_OF_USE, None).await
    }

    pub async fn accept_privacy(&self) -> BackendResponse<()> {
        self.gateway.invoke(ACCEPT_PRIVACY_POLICY, None).await
    }
}

pub struct AeroeApi<'a> {
    gateway: &'a Gateway,
}

impl<'a> AeroeApi<'a> {
    pub(crate) fn new(gateway: &'a Gateway) -> Self {
        Self { gateway }
    }

    pub async fn status(&self) -> BackendResponse<AeroeStatus> {
        self.gateway.invoke(AEROE_STATUS, None).await
    }
}

pub struct VaultApi<'a> {
    gateway: &'a Gateway,
}

impl<'a> VaultApi<'a> {
    pub(crate) fn new(gateway: &'a Gateway) -> Self {
        Self { gateway }
    }

    pub async fn create(&self, password: &str) -> BackendResponse<()> {
        let args = PasswordArgs {
            password: password.to_owned(),
        };
        self.gateway.invoke_with(VAULT_CREATE, &args).await
    }

    pub async fn load(&self, password: &str) -> BackendResponse<()> {
        let args = PasswordArgs {
            password: password.to_owned(),
        };
        self.gateway.invoke_with(VAULT_LOAD, &args).await
    }
}

pub struct WalletApi<'a> {
    gateway: &'a Gateway,
}

impl<'a> WalletApi<'a> {
    pub(crate) fn new(gateway: &'a Gateway) -> Self {
        Self { gateway }
    }

    pub async fn keygen(&self) -> BackendResponse<Vec<String>> {
        self.gateway.invoke(KEYGEN, None).await
    }

    pub async fn create(&self, wallet_name: &str, seedphrase: &[String]) -> BackendResponse<()> {
        let args = WalletCreateArgs {
            wallet_name: wallet_name.to_owned(),
            seedphrase: seedphrase.to_vec(),
        };
        self.gateway.invoke_with(WALLET_CREATE, &args).await
    }

    pub async fn load(&self, wallet_name: &str) -> BackendResponse<()> {
        self.gateway.invoke_with(WALLET_LOAD, &named(wallet_name)).await
    }

    pub async fn master_pubkey(&self, wallet_name: &str) -> BackendResponse<String> {
        self.gateway.invoke_with(MASTER_PUBKEY, &named(wallet_name)).await
    }

    pub async fn balance(&self, wallet_name: &str) -> BackendResponse<WalletBalance> {
        self.gateway.invoke_with(BALANCE, &named(wallet_name)).await
    }

    pub async fn create_tx(
        &self,
        wallet_name: &str,
        transactions: Vec<TxOutput>,
        fee: u64,
    ) -> BackendResponse<TransactionMeta> {
        let args = CreateTxArgs {
            wallet_name: wallet_name.to_owned(),
            transactions,
            fee,
        };
        self.gateway.invoke_with(CREATE_TX, &args).await
    }

    pub async fn sign_tx(&self, wallet_name: &str, draft_id: &str) -> BackendResponse<TransactionMeta> {
        self.gateway.invoke_with(SIGN_TX, &draft(wallet_name, draft_id)).await
    }

    pub async fn send_tx(&self, wallet_name: &str, draft_id: &str) -> BackendResponse<TransactionMeta> {
        self.gateway.invoke_with(SEND_TX, &draft(wallet_name, draft_id)).await
    }

    pub async fn list_unsent_txs(&self, wallet_name: &str) -> BackendResponse<UnsentTransactions> {
        self.gateway.invoke_with(LIST_UNSENT_TXS, &named(wallet_name)).await
    }

    // No history command on the backend yet.
    pub async fn history(&self, _wallet_name: &str) -> BackendResponse<Value> {
        Gateway::not_implemented()
    }
}

pub struct NodeApi<'a> {
    gateway: &'a Gateway,
}

impl<'a> NodeApi<'a> {
    pub(crate) fn new(gateway: &'a Gateway) -> Self {
        Self { gateway }
    }

    pub async fn start_master(&self) -> BackendResponse<()> {
        self.gateway.invoke(NODE_START_MASTER, None).await
    }

    pub async fn stop_master(&self) -> BackendResponse<()> {
        self.gateway.invoke(NODE_STOP_MASTER, None).await
    }

    pub async fn peek(&self, command: &str) -> BackendResponse<Value> {
        let args = PeekArgs {
            command: command.to_owned(),
        };
        self.gateway.invoke_with(NODE_PEEK, &args).await
    }

    pub async fn connect_external(&self, _socket_path: &str) -> BackendResponse<()> {
        Gateway::not_implemented()
    }

    pub async fn disconnect_external(&self) -> BackendResponse<()> {
        Gateway::not_implemented()
    }
}

fn named(wallet_name: &str) -> WalletNameArgs {
    WalletNameArgs {
        wallet_name: wallet_name.to_owned(),
    }
}

fn draft(wallet_name: &str, draft_id: &str) -> DraftArgs {
    DraftArgs {
        wallet_name: wallet_name.to_owned(),
        draft_id: draft_id.to_owned(),
    }
}
