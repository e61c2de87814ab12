//! Wallet signing capabilities and the adapter that picks among them.
//!
//! Wallet providers differ in what they offer. Some sign and broadcast in a
//! single step, some only sign, and some are reachable only through a generic
//! JSON-RPC style bridge. [`WalletSignerAdapter::probe`] selects exactly one
//! path per session, preferring the most capable, and refuses to build an
//! adapter when no path exists.

use crate::chain::rpc::ChainRpc;
use crate::domain::keys::{Pubkey, Signature};
use crate::error::{NetworkError, PactError, Result, SignerError};
use async_trait::async_trait;
use serde_json::{Value, json};
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use tracing::{debug, info};

pub const BRIDGE_SIGN_AND_SEND: &str = "solana_signAndSendTransaction";

/// EIP-1193 style code for a request the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;
const METHOD_NOT_FOUND_CODE: i64 = -32601;

#[async_trait]
pub trait SignAndSend: Send + Sync {
    async fn sign_and_send_transaction(
        &self,
        tx: &Transaction,
    ) -> std::result::Result<Signature, SignerError>;
}

#[async_trait]
pub trait SignOnly: Send + Sync {
    async fn sign_transaction(
        &self,
        tx: Transaction,
    ) -> std::result::Result<Transaction, SignerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeError {
    pub code: i64,
    pub message: String,
}

#[async_trait]
pub trait RpcBridge: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, BridgeError>;
}

/// The capabilities a connected wallet exposes. Any subset may be present.
#[derive(Clone, Default)]
pub struct WalletProvider {
    pub sign_and_send: Option<Arc<dyn SignAndSend>>,
    pub sign_only: Option<Arc<dyn SignOnly>>,
    pub bridge: Option<Arc<dyn RpcBridge>>,
}

impl WalletProvider {
    pub fn with_sign_and_send(mut self, signer: Arc<dyn SignAndSend>) -> Self {
        self.sign_and_send = Some(signer);
        self
    }

    pub fn with_sign_only(mut self, signer: Arc<dyn SignOnly>) -> Self {
        self.sign_only = Some(signer);
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn RpcBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningPath {
    SignAndSend,
    SignOnly,
    Bridge,
}

enum Path {
    SignAndSend(Arc<dyn SignAndSend>),
    SignOnly(Arc<dyn SignOnly>),
    Bridge(Arc<dyn RpcBridge>),
}

/// Uniform `submit` over whichever signing path the wallet supports.
pub struct WalletSignerAdapter {
    path: Path,
    rpc: Arc<dyn ChainRpc>,
}

impl WalletSignerAdapter {
    /// Selects sign-and-send, then sign-only, then the bridge.
    pub fn probe(
        provider: WalletProvider,
        rpc: Arc<dyn ChainRpc>,
    ) -> std::result::Result<Self, SignerError> {
        let path = if let Some(signer) = provider.sign_and_send {
            Path::SignAndSend(signer)
        } else if let Some(signer) = provider.sign_only {
            Path::SignOnly(signer)
        } else if let Some(bridge) = provider.bridge {
            Path::Bridge(bridge)
        } else {
            return Err(SignerError::ProviderUnavailable(
                "wallet exposes no signing capability".to_string(),
            ));
        };
        let adapter = Self { path, rpc };
        debug!(path = ?adapter.path(), "Wallet signer selected");
        Ok(adapter)
    }

    pub fn path(&self) -> SigningPath {
        match self.path {
            Path::SignAndSend(_) => SigningPath::SignAndSend,
            Path::SignOnly(_) => SigningPath::SignOnly,
            Path::Bridge(_) => SigningPath::Bridge,
        }
    }

    /// Has the wallet sign `tx` and gets it broadcast, returning its signature.
    ///
    /// An error here means the transaction was not accepted for broadcast;
    /// callers must not record anything.
    pub async fn submit(&self, tx: Transaction) -> Result<Signature> {
        let signature = match &self.path {
            Path::SignAndSend(signer) => signer.sign_and_send_transaction(&tx).await?,
            Path::SignOnly(signer) => {
                let signed = signer.sign_transaction(tx).await?;
                if !signed.is_signed() {
                    return Err(SignerError::SubmissionFailed(
                        "wallet returned a transaction with missing signatures".to_string(),
                    )
                    .into());
                }
                self.rpc
                    .send_transaction(&signed)
                    .await
                    .map_err(broadcast_error)?
            }
            Path::Bridge(bridge) => {
                let wire = bincode::serialize(&tx).map_err(|e| {
                    SignerError::SubmissionFailed(format!("failed to serialize transaction: {e}"))
                })?;
                let message = bs58::encode(wire).into_string();
                let response = bridge
                    .request(BRIDGE_SIGN_AND_SEND, json!({ "message": message }))
                    .await
                    .map_err(bridge_error)?;
                bridge_signature(&response)?
            }
        };
        info!(signature = %signature, path = ?self.path(), "Transaction submitted");
        Ok(signature)
    }
}

// unreachable endpoints stay retriable; anything else is a rejected broadcast
fn broadcast_error(error: PactError) -> PactError {
    match error {
        PactError::Network(NetworkError::Unreachable(_)) => error,
        PactError::Network(NetworkError::Rpc { code, message }) => {
            SignerError::SubmissionFailed(format!("RPC error {code}: {message}")).into()
        }
        other => SignerError::SubmissionFailed(other.to_string()).into(),
    }
}

fn bridge_error(error: BridgeError) -> SignerError {
    let lowered = error.message.to_ascii_lowercase();
    if error.code == USER_REJECTED_CODE
        || lowered.contains("user rejected")
        || lowered.contains("user denied")
    {
        SignerError::UserRejected(error.message)
    } else if error.code == METHOD_NOT_FOUND_CODE {
        SignerError::ProviderUnavailable(error.message)
    } else {
        SignerError::SubmissionFailed(format!("bridge error {}: {}", error.code, error.message))
    }
}

/// Bridges answer with a bare signature string or `{ "signature": ... }`.
fn bridge_signature(response: &Value) -> std::result::Result<Signature, SignerError> {
    let text = match response {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("signature").and_then(Value::as_str),
        _ => None,
    }
    .ok_or_else(|| {
        SignerError::SubmissionFailed(format!("unexpected bridge response: {response}"))
    })?;
    text.parse()
        .map_err(|_| SignerError::SubmissionFailed(format!("bridge returned invalid signature '{text}'")))
}

/// A connected wallet: the account that pays and the means to sign for it.
pub struct WalletSession {
    owner: Pubkey,
    signer: WalletSignerAdapter,
}

impl WalletSession {
    pub fn new(owner: Pubkey, signer: WalletSignerAdapter) -> Self {
        Self { owner, signer }
    }

    pub fn owner(&self) -> Pubkey {
        self.owner
    }

    pub fn signer(&self) -> &WalletSignerAdapter {
        &self.signer
    }
}
