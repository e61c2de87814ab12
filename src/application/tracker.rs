use super::registry::PactRegistry;
use crate::chain::rpc::{BlockhashWindow, ChainRpc, SignatureStatus, TokenBalance, TransactionRecord};
use crate::domain::keys::{Pubkey, Signature};
use crate::domain::pact::{PaidTransition, Pact, PactId, PaymentProof};
use crate::error::{NetworkError, PactError, Result};
use spl_associated_token_account::get_associated_token_address;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Comfortably longer than a blockhash stays valid.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// How many recent signatures touching a reference are inspected.
const RECONCILE_SIGNATURE_LIMIT: usize = 100;

/// Watches submitted transactions until they confirm, fail, or expire, and
/// records confirmed payments through the registry.
pub struct PaymentConfirmationTracker {
    rpc: Arc<dyn ChainRpc>,
    registry: Arc<PactRegistry>,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl PaymentConfirmationTracker {
    pub fn new(rpc: Arc<dyn ChainRpc>, registry: Arc<PactRegistry>) -> Self {
        Self {
            rpc,
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Upper bound on waiting while the RPC gives no usable answer.
    pub fn with_confirmation_timeout(mut self, confirmation_timeout: Duration) -> Self {
        self.confirmation_timeout = confirmation_timeout;
        self
    }

    /// Polls until `signature` reaches the configured commitment.
    ///
    /// Fails with [`PactError::TransactionFailed`] when the transaction landed
    /// with an error and with [`NetworkError::BlockhashExpired`] once the block
    /// height passes the window without confirmation. An unreachable RPC does
    /// not end the wait: the broadcast transaction may still land. If no
    /// verdict arrives within the confirmation timeout the result is
    /// [`NetworkError::ConfirmationUnknown`].
    pub async fn await_confirmation(
        &self,
        signature: &Signature,
        window: &BlockhashWindow,
    ) -> Result<SignatureStatus> {
        let commitment = self.rpc.commitment();
        let started = Instant::now();
        let mut expired_at = None;
        loop {
            match self.check_status(signature).await {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if let Some(height) = expired_at {
                        warn!(
                            signature = %signature,
                            block_height = height,
                            last_valid_block_height = window.last_valid_block_height,
                            "Blockhash expired before confirmation"
                        );
                        return Err(NetworkError::BlockhashExpired {
                            last_valid_block_height: window.last_valid_block_height,
                            current_block_height: height,
                        }
                        .into());
                    }
                }
                Err(PactError::Network(NetworkError::Unreachable(reason))) => {
                    warn!(signature = %signature, %reason, "Status poll failed; transaction still pending");
                }
                Err(other) => return Err(other),
            }

            if expired_at.is_none() {
                match self.rpc.block_height().await {
                    Ok(height) if height > window.last_valid_block_height => {
                        // the transaction may have landed between the two queries
                        expired_at = Some(height);
                        continue;
                    }
                    Ok(height) => {
                        debug!(signature = %signature, %commitment, block_height = height, "Awaiting confirmation");
                    }
                    Err(PactError::Network(NetworkError::Unreachable(reason))) => {
                        warn!(signature = %signature, %reason, "Block height poll failed; transaction still pending");
                    }
                    Err(other) => return Err(other),
                }
            }

            if started.elapsed() >= self.confirmation_timeout {
                warn!(signature = %signature, "Gave up waiting for an RPC verdict");
                return Err(NetworkError::ConfirmationUnknown {
                    signature: signature.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                }
                .into());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// `Some` once the status meets the commitment, `None` while still pending.
    async fn check_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>> {
        let Some(status) = self.rpc.signature_status(signature).await? else {
            return Ok(None);
        };
        if let Some(err) = &status.err {
            return Err(PactError::TransactionFailed {
                signature: signature.to_string(),
                reason: err.clone(),
            });
        }
        Ok(status
            .satisfies(self.rpc.commitment())
            .then_some(status))
    }

    /// Waits for confirmation, then records the payment. Nothing is written
    /// unless confirmation succeeds.
    pub async fn confirm_and_record(
        &self,
        pact_id: PactId,
        index: usize,
        signature: Signature,
        window: &BlockhashWindow,
    ) -> Result<PaidTransition> {
        let status = self.await_confirmation(&signature, window).await?;
        info!(signature = %signature, slot = status.slot, "Payment confirmed");
        self.registry
            .mark_paid(pact_id, index, PaymentProof::now(signature))
            .await
    }

    /// Looks for an already confirmed transfer carrying the participant's
    /// reference and records it.
    ///
    /// Returns `None` when no qualifying transfer exists yet. A transaction
    /// only qualifies if it succeeded and moved at least the owed amount to
    /// the receiver.
    pub async fn reconcile(
        &self,
        pact_id: PactId,
        index: usize,
    ) -> Result<Option<(Signature, PaidTransition)>> {
        let pact = self.registry.require(pact_id).await?;
        let participant = pact.participant(index)?;
        if let Some(signature) = participant.paid_tx_signature.filter(|_| participant.paid) {
            return Ok(Some((signature, PaidTransition::AlreadyPaid)));
        }
        let reference = participant.reference.pubkey();

        let mut candidates = self
            .rpc
            .signatures_for_address(&reference, RECONCILE_SIGNATURE_LIMIT)
            .await?;
        // oldest first so the earliest settling transfer is the one recorded
        candidates.reverse();

        for info in candidates.into_iter().filter(|info| info.err.is_none()) {
            let Some(record) = self.rpc.transaction(&info.signature).await? else {
                continue;
            };
            if !transfer_satisfies(&record, &pact, &reference)? {
                debug!(signature = %info.signature, "Reference transaction does not settle obligation");
                continue;
            }
            let transition = self
                .registry
                .mark_paid(pact_id, index, PaymentProof::now(info.signature))
                .await?;
            info!(pact_id = %pact_id, index, signature = %info.signature, "Reconciled payment");
            return Ok(Some((info.signature, transition)));
        }
        Ok(None)
    }

    /// Reconciles every unpaid participant of a pact.
    pub async fn reconcile_pact(
        &self,
        pact_id: PactId,
    ) -> Result<Vec<(usize, Signature, PaidTransition)>> {
        let pact = self.registry.require(pact_id).await?;
        let mut recorded = Vec::new();
        for (index, participant) in pact.participants.iter().enumerate() {
            if participant.paid {
                continue;
            }
            if let Some((signature, transition)) = self.reconcile(pact_id, index).await? {
                recorded.push((index, signature, transition));
            }
        }
        Ok(recorded)
    }
}

/// Whether `record` is a successful transfer of the owed amount to the
/// pact's receiver that carries `reference`.
pub fn transfer_satisfies(record: &TransactionRecord, pact: &Pact, reference: &Pubkey) -> Result<bool> {
    if record.err.is_some() || !record.account_keys.contains(reference) {
        return Ok(false);
    }
    let owed = pact.amount_per_person.to_base_units(pact.decimals())?;

    let received = match &pact.token {
        None => record
            .account_keys
            .iter()
            .position(|k| *k == pact.receiver_wallet)
            .and_then(|i| {
                let pre = record.pre_balances.get(i)?;
                let post = record.post_balances.get(i)?;
                Some(post.saturating_sub(*pre))
            })
            .unwrap_or(0),
        Some(token) => {
            let destination = get_associated_token_address(&pact.receiver_wallet, &token.mint);
            let held = |balances: &[TokenBalance]| -> u64 {
                balances
                    .iter()
                    .filter(|b| b.mint == token.mint)
                    .filter(|b| {
                        b.owner == Some(pact.receiver_wallet)
                            || record.account_keys.get(b.account_index) == Some(&destination)
                    })
                    .map(|b| b.amount)
                    .sum()
            };
            held(&record.post_token_balances).saturating_sub(held(&record.pre_token_balances))
        }
    };
    Ok(received >= owed)
}
