#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use pactpay::application::registry::PactRegistry;
use pactpay::application::signer::{BridgeError, RpcBridge, SignAndSend};
use pactpay::chain::rpc::{
    BlockhashWindow, ChainRpc, Commitment, SignatureInfo, SignatureStatus, TokenAmount,
    TransactionRecord,
};
use pactpay::domain::amount::Amount;
use pactpay::domain::keys::{Hash, Pubkey, Signature};
use pactpay::domain::pact::{PactDraft, ParticipantDraft};
use pactpay::error::{NetworkError, Result, SignerError};
use pactpay::infrastructure::in_memory::{InMemoryPactStore, StaticDirectory};
use pactpay::infrastructure::notify::LogNotifier;
use rust_decimal::Decimal;
use serde_json::Value;
use solana_sdk::transaction::Transaction;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const RECEIVER: Pubkey = Pubkey::new_from_array([42u8; 32]);

pub fn registry() -> PactRegistry {
    PactRegistry::new(
        Box::new(InMemoryPactStore::new()),
        Box::new(StaticDirectory::new()),
        Box::new(LogNotifier),
    )
}

pub fn draft(amount: Decimal, participants: Vec<ParticipantDraft>) -> PactDraft {
    PactDraft {
        name: "Team Dinner".to_string(),
        amount_per_person: Amount::new(amount).unwrap(),
        receiver_wallet: RECEIVER,
        due_date: Utc::now(),
        created_by: "organizer".to_string(),
        token: None,
        participants,
    }
}

pub fn confirmed(slot: u64) -> SignatureStatus {
    SignatureStatus {
        slot,
        confirmations: Some(1),
        err: None,
        confirmation_status: Some(Commitment::Confirmed),
    }
}

pub fn processed(slot: u64) -> SignatureStatus {
    SignatureStatus {
        slot,
        confirmations: Some(0),
        err: None,
        confirmation_status: Some(Commitment::Processed),
    }
}

/// A `ChainRpc` whose answers are scripted by the test.
///
/// Status and block-height answers are consumed in order; once a script runs
/// out its last answer repeats.
pub struct ScriptedRpc {
    pub window: BlockhashWindow,
    statuses: Mutex<VecDeque<Option<SignatureStatus>>>,
    heights: Mutex<VecDeque<u64>>,
    send_error: Mutex<Option<NetworkError>>,
    pub sent: Mutex<Vec<Transaction>>,
    pub history: Mutex<HashMap<Pubkey, Vec<SignatureInfo>>>,
    pub records: Mutex<HashMap<Signature, TransactionRecord>>,
    pub balances: Mutex<HashMap<Pubkey, u64>>,
    pub blockhash_calls: AtomicUsize,
    status_failures: AtomicUsize,
    height_failures: AtomicUsize,
}

impl ScriptedRpc {
    pub fn new(last_valid_block_height: u64) -> Self {
        Self {
            window: BlockhashWindow {
                blockhash: Hash::new_from_array([11u8; 32]),
                last_valid_block_height,
            },
            statuses: Mutex::new(VecDeque::new()),
            heights: Mutex::new(VecDeque::from([0])),
            send_error: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            history: Mutex::new(HashMap::new()),
            records: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            blockhash_calls: AtomicUsize::new(0),
            status_failures: AtomicUsize::new(0),
            height_failures: AtomicUsize::new(0),
        }
    }

    pub fn with_statuses(self, statuses: Vec<Option<SignatureStatus>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_heights(self, heights: Vec<u64>) -> Self {
        *self.heights.lock().unwrap() = heights.into();
        self
    }

    pub fn failing_send(self, error: NetworkError) -> Self {
        *self.send_error.lock().unwrap() = Some(error);
        self
    }

    /// The next `count` status polls fail as if the endpoint were down.
    pub fn failing_status_polls(self, count: usize) -> Self {
        self.status_failures.store(count, Ordering::SeqCst);
        self
    }

    /// The next `count` block-height polls fail as if the endpoint were down.
    pub fn failing_height_polls(self, count: usize) -> Self {
        self.height_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn unreachable(budget: &AtomicUsize) -> Result<()> {
        match budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1)) {
            Ok(_) => Err(NetworkError::Unreachable("connection reset".into()).into()),
            Err(_) => Ok(()),
        }
    }

    fn next<T: Clone>(script: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut script = script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait]
impl ChainRpc for ScriptedRpc {
    fn commitment(&self) -> Commitment {
        Commitment::Confirmed
    }

    async fn latest_blockhash(&self) -> Result<BlockhashWindow> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.window)
    }

    async fn balance(&self, account: &Pubkey) -> Result<u64> {
        Ok(self.balances.lock().unwrap().get(account).copied().unwrap_or(0))
    }

    async fn token_account_balance(&self, _account: &Pubkey) -> Result<TokenAmount> {
        Ok(TokenAmount {
            amount: 0,
            decimals: 6,
            ui_amount_string: Some("0".into()),
        })
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature> {
        if let Some(error) = self.send_error.lock().unwrap().clone() {
            return Err(error.into());
        }
        self.sent.lock().unwrap().push(tx.clone());
        Ok(tx.signatures.first().copied().unwrap_or_default())
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<Option<SignatureStatus>> {
        Self::unreachable(&self.status_failures)?;
        Ok(Self::next(&self.statuses).flatten())
    }

    async fn block_height(&self) -> Result<u64> {
        Self::unreachable(&self.height_failures)?;
        Ok(Self::next(&self.heights).unwrap_or(0))
    }

    async fn signatures_for_address(&self, address: &Pubkey, _limit: usize) -> Result<Vec<SignatureInfo>> {
        Ok(self.history.lock().unwrap().get(address).cloned().unwrap_or_default())
    }

    async fn transaction(&self, signature: &Signature) -> Result<Option<TransactionRecord>> {
        Ok(self.records.lock().unwrap().get(signature).cloned())
    }
}

/// A sign-and-send wallet returning a fixed answer.
pub struct MockSignAndSend {
    pub result: std::result::Result<Signature, SignerError>,
    pub calls: AtomicUsize,
}

impl MockSignAndSend {
    pub fn returning(result: std::result::Result<Signature, SignerError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SignAndSend for MockSignAndSend {
    async fn sign_and_send_transaction(
        &self,
        _tx: &Transaction,
    ) -> std::result::Result<Signature, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// A bridge-only wallet returning a fixed answer and recording requests.
pub struct MockBridge {
    pub response: std::result::Result<Value, BridgeError>,
    pub requests: Mutex<Vec<(String, Value)>>,
}

impl MockBridge {
    pub fn returning(response: std::result::Result<Value, BridgeError>) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RpcBridge for MockBridge {
    async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, BridgeError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        self.response.clone()
    }
}
