//! JSON-RPC access to the network.
//!
//! [`ChainRpc`] is the seam the application layer depends on. [`HttpRpcClient`]
//! holds one `RpcClient` per endpoint and fails over along the ordered list.

use crate::domain::keys::{Hash, Pubkey, Signature};
use crate::error::{NetworkError, PactError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_rpc_client_api::client_error::{ClientError, ErrorKind};
use solana_rpc_client_api::config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_rpc_client_api::request::{RpcError, RpcRequest};
use solana_rpc_client_api::response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::transaction::Transaction;
use solana_transaction_status_client_types::option_serializer::OptionSerializer;
use solana_transaction_status_client_types::{
    EncodedConfirmedTransactionWithStatusMeta, TransactionConfirmationStatus, TransactionStatus,
    UiTransactionEncoding, UiTransactionTokenBalance,
};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEVNET_ENDPOINTS: [&str; 2] = [
    "https://rpc.ankr.com/solana_devnet",
    "https://api.devnet.solana.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        })
    }
}

impl FromStr for Commitment {
    type Err = PactError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(PactError::ValidationError(format!(
                "Unknown commitment level '{other}'"
            ))),
        }
    }
}

impl From<Commitment> for CommitmentLevel {
    fn from(commitment: Commitment) -> Self {
        match commitment {
            Commitment::Processed => CommitmentLevel::Processed,
            Commitment::Confirmed => CommitmentLevel::Confirmed,
            Commitment::Finalized => CommitmentLevel::Finalized,
        }
    }
}

impl From<Commitment> for CommitmentConfig {
    fn from(commitment: Commitment) -> Self {
        CommitmentConfig {
            commitment: commitment.into(),
        }
    }
}

impl From<TransactionConfirmationStatus> for Commitment {
    fn from(status: TransactionConfirmationStatus) -> Self {
        match status {
            TransactionConfirmationStatus::Processed => Commitment::Processed,
            TransactionConfirmationStatus::Confirmed => Commitment::Confirmed,
            TransactionConfirmationStatus::Finalized => Commitment::Finalized,
        }
    }
}

/// The blockhash a transaction was built against and the last block height
/// at which the network will still accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockhashWindow {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
    pub ui_amount_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    pub err: Option<String>,
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Whether the status has reached at least `commitment`.
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        match self.confirmation_status {
            Some(status) => status >= commitment,
            // nodes omit confirmations once a slot is rooted
            None => self.confirmations.is_none(),
        }
    }
}

impl From<TransactionStatus> for SignatureStatus {
    fn from(status: TransactionStatus) -> Self {
        Self {
            slot: status.slot,
            confirmations: status.confirmations.map(|c| c as u64),
            err: status.err.map(|e| e.to_string()),
            confirmation_status: status.confirmation_status.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureInfo {
    pub signature: Signature,
    pub slot: u64,
    pub err: Option<String>,
    pub confirmation_status: Option<Commitment>,
}

impl TryFrom<RpcConfirmedTransactionStatusWithSignature> for SignatureInfo {
    type Error = PactError;

    fn try_from(info: RpcConfirmedTransactionStatusWithSignature) -> Result<Self> {
        Ok(Self {
            signature: info.signature.parse().map_err(|e| malformed("signature", e))?,
            slot: info.slot,
            err: info.err.map(|e| e.to_string()),
            confirmation_status: info.confirmation_status.map(Into::into),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: Pubkey,
    pub owner: Option<Pubkey>,
    pub amount: u64,
}

impl TryFrom<UiTransactionTokenBalance> for TokenBalance {
    type Error = PactError;

    fn try_from(balance: UiTransactionTokenBalance) -> Result<Self> {
        let owner = match balance.owner {
            OptionSerializer::Some(owner) => Some(owner.parse().map_err(|e| malformed("owner", e))?),
            _ => None,
        };
        Ok(Self {
            account_index: usize::from(balance.account_index),
            mint: balance.mint.parse().map_err(|e| malformed("mint", e))?,
            owner,
            amount: balance
                .ui_token_amount
                .amount
                .parse()
                .map_err(|e| malformed("token amount", e))?,
        })
    }
}

/// The parts of a landed transaction needed to validate a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub slot: u64,
    pub account_keys: Vec<Pubkey>,
    pub err: Option<String>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

impl TryFrom<EncodedConfirmedTransactionWithStatusMeta> for TransactionRecord {
    type Error = PactError;

    fn try_from(encoded: EncodedConfirmedTransactionWithStatusMeta) -> Result<Self> {
        let tx = encoded
            .transaction
            .transaction
            .decode()
            .ok_or_else(|| malformed("transaction", "undecodable payload"))?;
        let mut account_keys = tx.message.static_account_keys().to_vec();
        let mut record = Self {
            slot: encoded.slot,
            account_keys: Vec::new(),
            err: None,
            pre_balances: Vec::new(),
            post_balances: Vec::new(),
            pre_token_balances: Vec::new(),
            post_token_balances: Vec::new(),
        };
        if let Some(meta) = encoded.transaction.meta {
            if let OptionSerializer::Some(loaded) = meta.loaded_addresses {
                for key in loaded.writable.iter().chain(&loaded.readonly) {
                    account_keys.push(key.parse().map_err(|e| malformed("loaded address", e))?);
                }
            }
            record.err = meta.err.map(|e| e.to_string());
            record.pre_balances = meta.pre_balances;
            record.post_balances = meta.post_balances;
            record.pre_token_balances = token_balances(meta.pre_token_balances)?;
            record.post_token_balances = token_balances(meta.post_token_balances)?;
        }
        record.account_keys = account_keys;
        Ok(record)
    }
}

fn token_balances(balances: OptionSerializer<Vec<UiTransactionTokenBalance>>) -> Result<Vec<TokenBalance>> {
    match balances {
        OptionSerializer::Some(balances) => balances.into_iter().map(TryInto::try_into).collect(),
        _ => Ok(Vec::new()),
    }
}

fn malformed(what: &str, error: impl fmt::Display) -> PactError {
    NetworkError::Rpc {
        code: 0,
        message: format!("malformed {what} in RPC response: {error}"),
    }
    .into()
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Commitment level every query is made at.
    fn commitment(&self) -> Commitment;
    async fn latest_blockhash(&self) -> Result<BlockhashWindow>;
    async fn balance(&self, account: &Pubkey) -> Result<u64>;
    async fn token_account_balance(&self, account: &Pubkey) -> Result<TokenAmount>;
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature>;
    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>>;
    async fn block_height(&self) -> Result<u64>;
    async fn signatures_for_address(&self, address: &Pubkey, limit: usize) -> Result<Vec<SignatureInfo>>;
    async fn transaction(&self, signature: &Signature) -> Result<Option<TransactionRecord>>;
}

struct Endpoint {
    url: String,
    client: RpcClient,
}

/// RPC client over an ordered list of interchangeable endpoints.
///
/// Each call starts at the last endpoint that answered and moves down the
/// list on transport or HTTP failures. A JSON-RPC error object is an answer,
/// not a failure, and is returned without trying other endpoints.
pub struct HttpRpcClient {
    endpoints: Vec<Endpoint>,
    preferred: AtomicUsize,
    commitment: Commitment,
}

impl HttpRpcClient {
    pub fn new(endpoints: Vec<String>, commitment: Commitment, timeout: Duration) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(PactError::ValidationError(
                "At least one RPC endpoint is required".to_string(),
            ));
        }
        let endpoints = endpoints
            .into_iter()
            .map(|url| Endpoint {
                client: RpcClient::new_with_timeout_and_commitment(url.clone(), timeout, commitment.into()),
                url,
            })
            .collect();
        Ok(Self {
            endpoints,
            preferred: AtomicUsize::new(0),
            commitment,
        })
    }

    /// Builds a client and checks the endpoints in order with
    /// `getLatestBlockhash`, preferring the first that answers. When none
    /// answers the last endpoint is kept so later calls still fail over.
    pub async fn connect(
        endpoints: Vec<String>,
        commitment: Commitment,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Self::new(endpoints, commitment, timeout)?;
        let mut healthy = None;
        for (index, endpoint) in client.endpoints.iter().enumerate() {
            match endpoint
                .client
                .get_latest_blockhash_with_commitment(commitment.into())
                .await
            {
                Ok(_) => {
                    debug!(endpoint = %endpoint.url, "RPC endpoint healthy");
                    healthy = Some(index);
                    break;
                }
                Err(e) => warn!(endpoint = %endpoint.url, error = %e, "RPC endpoint health check failed"),
            }
        }
        let preferred = healthy.unwrap_or(client.endpoints.len() - 1);
        client.preferred.store(preferred, Ordering::Relaxed);
        Ok(client)
    }

    /// Endpoint the next call will try first.
    pub fn preferred_endpoint(&self) -> &str {
        &self.endpoints[self.preferred.load(Ordering::Relaxed) % self.endpoints.len()].url
    }

    fn query_commitment(&self) -> CommitmentConfig {
        self.commitment.into()
    }

    /// History queries reject `processed`.
    fn history_commitment(&self) -> CommitmentConfig {
        self.commitment.max(Commitment::Confirmed).into()
    }

    async fn call<'a, T, F, Fut>(&'a self, method: &str, request: F) -> Result<T>
    where
        F: Fn(&'a RpcClient) -> Fut,
        Fut: Future<Output = std::result::Result<T, ClientError>>,
    {
        let start = self.preferred.load(Ordering::Relaxed);
        let mut last_error = None;
        for offset in 0..self.endpoints.len() {
            let index = (start + offset) % self.endpoints.len();
            let endpoint = &self.endpoints[index];
            debug!(endpoint = %endpoint.url, method, "RPC call");
            match request(&endpoint.client).await {
                Ok(value) => {
                    self.preferred.store(index, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e) => match classify(&endpoint.url, &e) {
                    NetworkError::Unreachable(reason) => {
                        warn!(endpoint = %endpoint.url, method, %reason, "RPC endpoint failed, trying next");
                        last_error = Some(reason);
                    }
                    other => return Err(other.into()),
                },
            }
        }
        Err(NetworkError::Unreachable(
            last_error.unwrap_or_else(|| "no endpoints configured".to_string()),
        )
        .into())
    }
}

/// Transport and HTTP failures mean the endpoint is unusable; anything the
/// node actually answered is reported as an RPC error.
fn classify(endpoint: &str, error: &ClientError) -> NetworkError {
    match error.kind() {
        ErrorKind::Io(e) => NetworkError::Unreachable(format!("{endpoint}: {e}")),
        ErrorKind::Reqwest(e) => NetworkError::Unreachable(format!("{endpoint}: {e}")),
        ErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => NetworkError::Rpc {
            code: *code,
            message: message.clone(),
        },
        other => NetworkError::Rpc {
            code: 0,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl ChainRpc for HttpRpcClient {
    fn commitment(&self) -> Commitment {
        self.commitment
    }

    async fn latest_blockhash(&self) -> Result<BlockhashWindow> {
        let commitment = self.query_commitment();
        let (blockhash, last_valid_block_height) = self
            .call("getLatestBlockhash", |rpc| {
                rpc.get_latest_blockhash_with_commitment(commitment)
            })
            .await?;
        Ok(BlockhashWindow {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn balance(&self, account: &Pubkey) -> Result<u64> {
        let commitment = self.query_commitment();
        let response = self
            .call("getBalance", |rpc| rpc.get_balance_with_commitment(account, commitment))
            .await?;
        Ok(response.value)
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<TokenAmount> {
        let commitment = self.query_commitment();
        let response = self
            .call("getTokenAccountBalance", |rpc| {
                rpc.get_token_account_balance_with_commitment(account, commitment)
            })
            .await?;
        let value = response.value;
        Ok(TokenAmount {
            amount: value.amount.parse().map_err(|e| malformed("token amount", e))?,
            decimals: value.decimals,
            ui_amount_string: Some(value.ui_amount_string),
        })
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature> {
        let preflight = CommitmentLevel::from(self.commitment);
        self.call("sendTransaction", |rpc| {
            rpc.send_transaction_with_config(
                tx,
                RpcSendTransactionConfig {
                    encoding: Some(UiTransactionEncoding::Base64),
                    preflight_commitment: Some(preflight),
                    ..RpcSendTransactionConfig::default()
                },
            )
        })
        .await
    }

    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>> {
        let signatures = [*signature];
        let response = self
            .call("getSignatureStatuses", |rpc| {
                rpc.get_signature_statuses_with_history(&signatures)
            })
            .await?;
        Ok(response.value.into_iter().next().flatten().map(Into::into))
    }

    async fn block_height(&self) -> Result<u64> {
        let commitment = self.query_commitment();
        self.call("getBlockHeight", |rpc| rpc.get_block_height_with_commitment(commitment))
            .await
    }

    async fn signatures_for_address(&self, address: &Pubkey, limit: usize) -> Result<Vec<SignatureInfo>> {
        let commitment = self.history_commitment();
        let infos = self
            .call("getSignaturesForAddress", |rpc| {
                rpc.get_signatures_for_address_with_config(
                    address,
                    GetConfirmedSignaturesForAddress2Config {
                        limit: Some(limit),
                        commitment: Some(commitment),
                        ..GetConfirmedSignaturesForAddress2Config::default()
                    },
                )
            })
            .await?;
        infos.into_iter().map(TryInto::try_into).collect()
    }

    async fn transaction(&self, signature: &Signature) -> Result<Option<TransactionRecord>> {
        let params = json!([
            signature.to_string(),
            RpcTransactionConfig {
                encoding: Some(UiTransactionEncoding::Base64),
                commitment: Some(self.history_commitment()),
                max_supported_transaction_version: Some(0),
            }
        ]);
        let encoded = self
            .call("getTransaction", |rpc| {
                rpc.send::<Option<EncodedConfirmedTransactionWithStatusMeta>>(
                    RpcRequest::GetTransaction,
                    params.clone(),
                )
            })
            .await?;
        encoded.map(TryInto::try_into).transpose()
    }
}
