use super::amount::{Amount, TokenMint, asset_decimals};
use super::keys::{Pubkey, Signature, base58};
use super::reference::ReferenceKey;
use crate::error::PactError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PactId(Uuid);

impl PactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for PactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PactId {
    type Err = PactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| PactError::ValidationError(format!("Invalid pact id '{s}': {e}")))
    }
}

/// A participant as supplied by the organizer, before resolution and keying.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParticipantDraft {
    pub email: Option<String>,
    #[serde(with = "base58::option", default)]
    pub wallet: Option<Pubkey>,
}

impl ParticipantDraft {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            wallet: None,
        }
    }

    pub fn wallet(wallet: Pubkey) -> Self {
        Self {
            email: None,
            wallet: Some(wallet),
        }
    }

    /// Interprets a free-form identity: anything containing `@` is an email,
    /// anything else must be a base58 wallet address.
    pub fn parse_identity(identity: &str) -> Result<Self, PactError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(PactError::ValidationError(
                "Participant identity is empty".to_string(),
            ));
        }
        if identity.contains('@') {
            Ok(Self::email(identity))
        } else {
            Ok(Self::wallet(super::keys::parse_pubkey(identity)?))
        }
    }
}

/// Everything an organizer specifies to open a pact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PactDraft {
    pub name: String,
    pub amount_per_person: Amount,
    #[serde(with = "base58")]
    pub receiver_wallet: Pubkey,
    pub due_date: DateTime<Utc>,
    pub created_by: String,
    pub token: Option<TokenMint>,
    pub participants: Vec<ParticipantDraft>,
}

impl PactDraft {
    /// Rejects drafts that could never produce valid payment requests.
    pub fn validate(&self) -> Result<(), PactError> {
        if self.name.trim().is_empty() {
            return Err(PactError::ValidationError(
                "Pact name is required".to_string(),
            ));
        }
        if self.participants.is_empty() {
            return Err(PactError::ValidationError(
                "A pact needs at least one participant".to_string(),
            ));
        }
        for (i, p) in self.participants.iter().enumerate() {
            let has_email = p.email.as_deref().is_some_and(|e| !e.trim().is_empty());
            if !has_email && p.wallet.is_none() {
                return Err(PactError::ValidationError(format!(
                    "Participant {} has neither email nor wallet",
                    i + 1
                )));
            }
        }
        // amount must be expressible in the asset's base units
        self.amount_per_person
            .to_base_units(asset_decimals(self.token.as_ref()))?;
        Ok(())
    }
}

/// Evidence that an obligation was settled on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentProof {
    pub signature: Signature,
    pub paid_at: DateTime<Utc>,
}

impl PaymentProof {
    pub fn now(signature: Signature) -> Self {
        Self {
            signature,
            paid_at: Utc::now(),
        }
    }
}

/// Outcome of the conditional unpaid -> paid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidTransition {
    /// This call flipped the flag and recorded its proof.
    Marked,
    /// Someone else already settled the participant; nothing was written.
    AlreadyPaid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub email: Option<String>,
    #[serde(with = "base58::option", default)]
    pub wallet_address: Option<Pubkey>,
    pub reference: ReferenceKey,
    pub paid: bool,
    #[serde(with = "base58::option", default)]
    pub paid_tx_signature: Option<Signature>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(email: Option<String>, wallet_address: Option<Pubkey>, reference: ReferenceKey) -> Self {
        Self {
            email,
            wallet_address,
            reference,
            paid: false,
            paid_tx_signature: None,
            paid_at: None,
        }
    }

    /// Email if known, otherwise the wallet address.
    pub fn identity(&self) -> Option<String> {
        self.email
            .clone()
            .or_else(|| self.wallet_address.map(|w| w.to_string()))
    }

    /// Human-facing label for the participant at position `index`.
    pub fn label(&self, index: usize) -> String {
        self.identity()
            .unwrap_or_else(|| format!("Participant {}", index + 1))
    }

    /// Flips unpaid -> paid. A second call is a no-op and keeps the first proof.
    pub fn mark_paid(&mut self, proof: PaymentProof) -> PaidTransition {
        if self.paid {
            return PaidTransition::AlreadyPaid;
        }
        self.paid = true;
        self.paid_tx_signature = Some(proof.signature);
        self.paid_at = Some(proof.paid_at);
        PaidTransition::Marked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pact {
    pub id: PactId,
    pub name: String,
    pub amount_per_person: Amount,
    #[serde(with = "base58")]
    pub receiver_wallet: Pubkey,
    pub due_date: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub token: Option<TokenMint>,
    pub participants: Vec<Participant>,
}

impl Pact {
    pub fn decimals(&self) -> u8 {
        asset_decimals(self.token.as_ref())
    }

    pub fn participant(&self, index: usize) -> Result<&Participant, PactError> {
        self.participants.get(index).ok_or_else(|| {
            PactError::NotFound(format!("Participant {} in pact {}", index, self.id))
        })
    }

    pub fn participant_mut(&mut self, index: usize) -> Result<&mut Participant, PactError> {
        let id = self.id;
        self.participants
            .get_mut(index)
            .ok_or_else(|| PactError::NotFound(format!("Participant {index} in pact {id}")))
    }

    /// Wallets of resolved participants, used for participant-side listings.
    pub fn participant_wallets(&self) -> Vec<Pubkey> {
        self.participants
            .iter()
            .filter_map(|p| p.wallet_address)
            .collect()
    }
}

/// Secondary index record: which obligation a reference key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub pact_id: PactId,
    pub index: usize,
}
