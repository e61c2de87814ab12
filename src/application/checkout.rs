use super::builder::{TransactionBuilder, TransferOrder};
use super::registry::PactRegistry;
use super::signer::WalletSession;
use super::tracker::PaymentConfirmationTracker;
use crate::chain::rpc::ChainRpc;
use crate::domain::keys::Signature;
use crate::domain::pact::{PaidTransition, PactId};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// A transaction was submitted and confirmed.
    Submitted {
        signature: Signature,
        transition: PaidTransition,
    },
    /// The participant was already settled; nothing was submitted.
    AlreadyPaid,
}

/// Drives one participant's payment from build to recorded confirmation.
///
/// Steps run strictly in order. Dropping the returned future before the
/// wallet accepts the transaction abandons it with no side effects.
pub struct CheckoutService {
    registry: Arc<PactRegistry>,
    builder: TransactionBuilder,
    tracker: PaymentConfirmationTracker,
}

impl CheckoutService {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        registry: Arc<PactRegistry>,
        tracker: PaymentConfirmationTracker,
    ) -> Self {
        Self {
            registry,
            builder: TransactionBuilder::new(rpc),
            tracker,
        }
    }

    pub async fn pay(
        &self,
        session: &WalletSession,
        pact_id: PactId,
        index: usize,
    ) -> Result<CheckoutOutcome> {
        let pact = self.registry.require(pact_id).await?;
        if pact.participant(index)?.paid {
            info!(pact_id = %pact_id, index, "Participant already paid; skipping checkout");
            return Ok(CheckoutOutcome::AlreadyPaid);
        }

        let order = TransferOrder::for_participant(&pact, index, session.owner())?;
        let built = self.builder.build(&order).await?;
        let signature = session.signer().submit(built.transaction).await?;
        let transition = self
            .tracker
            .confirm_and_record(pact_id, index, signature, &built.window)
            .await?;

        Ok(CheckoutOutcome::Submitted {
            signature,
            transition,
        })
    }
}
