use crate::chain::rpc::{BlockhashWindow, ChainRpc};
use crate::domain::amount::{Amount, NATIVE_DECIMALS, TokenMint};
use crate::domain::keys::Pubkey;
use crate::domain::pact::Pact;
use crate::domain::reference::ReferenceKey;
use crate::error::{PactError, Result};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use std::sync::Arc;
use tracing::debug;

/// A single transfer to be built: who pays whom, how much, in which asset,
/// tagged with which reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOrder {
    pub payer: Pubkey,
    pub recipient: Pubkey,
    pub amount: Amount,
    pub reference: ReferenceKey,
    pub token: Option<TokenMint>,
}

impl TransferOrder {
    /// The transfer that settles participant `index` of `pact`, paid by `payer`.
    pub fn for_participant(pact: &Pact, index: usize, payer: Pubkey) -> Result<Self> {
        let participant = pact.participant(index)?;
        Ok(Self {
            payer,
            recipient: pact.receiver_wallet,
            amount: pact.amount_per_person,
            reference: participant.reference,
            token: pact.token,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub transaction: Transaction,
    /// Confirmation must happen before this window closes.
    pub window: BlockhashWindow,
}

/// Turns transfer orders into unsigned transactions.
pub struct TransactionBuilder {
    rpc: Arc<dyn ChainRpc>,
}

impl TransactionBuilder {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    /// The transfer instruction with the reference appended as a readonly,
    /// non-signer account. The reference never appears anywhere else.
    pub fn transfer_instruction(order: &TransferOrder) -> Result<Instruction> {
        let mut instruction = match &order.token {
            None => system_instruction::transfer(
                &order.payer,
                &order.recipient,
                order.amount.to_base_units(NATIVE_DECIMALS)?,
            ),
            Some(token) => {
                let units = order.amount.to_base_units(token.decimals)?;
                let source = get_associated_token_address(&order.payer, &token.mint);
                let destination = get_associated_token_address(&order.recipient, &token.mint);
                spl_token::instruction::transfer_checked(
                    &spl_token::id(),
                    &source,
                    &token.mint,
                    &destination,
                    &order.payer,
                    &[],
                    units,
                    token.decimals,
                )
                .map_err(|e| PactError::ValidationError(format!("Invalid token transfer: {e}")))?
            }
        };
        instruction
            .accounts
            .push(AccountMeta::new_readonly(order.reference.pubkey(), false));
        Ok(instruction)
    }

    /// Compiles `order` against an already fetched blockhash window.
    pub fn compile(order: &TransferOrder, window: BlockhashWindow) -> Result<Transaction> {
        let instruction = Self::transfer_instruction(order)?;
        let message = Message::new_with_blockhash(&[instruction], Some(&order.payer), &window.blockhash);
        Ok(Transaction::new_unsigned(message))
    }

    /// Fetches a fresh blockhash and builds the unsigned transaction.
    ///
    /// The order is validated before any network call is made.
    pub async fn build(&self, order: &TransferOrder) -> Result<BuiltTransaction> {
        Self::transfer_instruction(order)?;
        let window = self.rpc.latest_blockhash().await?;
        let transaction = Self::compile(order, window)?;
        debug!(
            payer = %order.payer,
            recipient = %order.recipient,
            reference = %order.reference,
            last_valid_block_height = window.last_valid_block_height,
            "Built transfer transaction"
        );
        Ok(BuiltTransaction {
            transaction,
            window,
        })
    }
}
