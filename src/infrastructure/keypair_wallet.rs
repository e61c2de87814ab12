use crate::application::signer::SignOnly;
use crate::domain::keys::Pubkey;
use crate::error::{PactError, Result, SignerError};
use async_trait::async_trait;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::signer::keypair::keypair_from_seed;
use solana_sdk::transaction::Transaction;
use std::path::Path;

/// A local wallet backed by a Solana CLI keypair file: a JSON array of 64
/// bytes, secret key followed by public key.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let bytes: Vec<u8> = serde_json::from_str(json)?;
        if bytes.len() != 64 {
            return Err(PactError::ValidationError(format!(
                "Keypair must be 64 bytes, got {}",
                bytes.len()
            )));
        }
        let (secret, public) = bytes.split_at(32);
        let keypair = keypair_from_seed(secret)
            .map_err(|e| PactError::ValidationError(format!("Invalid keypair secret: {e}")))?;
        if keypair.pubkey().to_bytes().as_slice() != public {
            return Err(PactError::ValidationError(
                "Keypair public half does not match secret".to_string(),
            ));
        }
        Ok(Self { keypair })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl SignOnly for KeypairWallet {
    async fn sign_transaction(
        &self,
        mut tx: Transaction,
    ) -> std::result::Result<Transaction, SignerError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| SignerError::SubmissionFailed(e.to_string()))?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::builder::{TransactionBuilder, TransferOrder};
    use crate::chain::rpc::BlockhashWindow;
    use crate::domain::amount::Amount;
    use crate::domain::keys::Hash;
    use crate::domain::reference::ReferenceKey;
    use rust_decimal_macros::dec;

    fn keypair() -> Keypair {
        keypair_from_seed(&[7u8; 32]).unwrap()
    }

    fn keypair_json(keypair: &Keypair) -> String {
        serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap()
    }

    fn transfer_from(payer: Pubkey) -> Transaction {
        let order = TransferOrder {
            payer,
            recipient: Pubkey::new_from_array([2u8; 32]),
            amount: Amount::new(dec!(0.1)).unwrap(),
            reference: ReferenceKey::generate(),
            token: None,
        };
        let window = BlockhashWindow {
            blockhash: Hash::new_from_array([5u8; 32]),
            last_valid_block_height: 10,
        };
        TransactionBuilder::compile(&order, window).unwrap()
    }

    #[test]
    fn test_load_solana_cli_keypair() {
        let key = keypair();
        let wallet = KeypairWallet::from_json(&keypair_json(&key)).unwrap();
        assert_eq!(wallet.pubkey(), key.pubkey());

        assert!(KeypairWallet::from_json("[1,2,3]").is_err());
        let mut mismatched = key.to_bytes();
        mismatched[40] ^= 1;
        assert!(matches!(
            KeypairWallet::from_json(&serde_json::to_string(&mismatched.to_vec()).unwrap()),
            Err(PactError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_signs_fee_payer_slot() {
        let wallet = KeypairWallet::from_keypair(keypair());
        let signed = wallet
            .sign_transaction(transfer_from(wallet.pubkey()))
            .await
            .unwrap();
        assert!(signed.is_signed());
        assert!(signed.verify().is_ok());
    }

    #[tokio::test]
    async fn test_refuses_foreign_transactions() {
        let wallet = KeypairWallet::from_keypair(keypair());
        let tx = transfer_from(Pubkey::new_from_array([9u8; 32]));
        assert!(matches!(
            wallet.sign_transaction(tx).await,
            Err(SignerError::SubmissionFailed(_))
        ));
    }
}
