//! Reference keys: opaque correlation tags embedded in payment transactions.
//!
//! A reference key is the public half of a freshly generated Ed25519 keypair
//! whose private half is dropped immediately. It never signs anything; its only
//! job is to appear in a transaction's account list so that an observer can
//! tell which obligation the transaction settles.
//!
//! # Uniqueness
//!
//! Keys come from `Keypair::new`, which seeds from the operating system
//! CSPRNG. Distinct seeds map to distinct public keys except with
//! negligible probability, so for `n` keys the chance of any collision is
//! bounded by roughly `n^2 / 2^253`. This crate relies on that bound and does
//! not keep a global registry of issued keys. Stores reject a duplicate
//! reference on insert, which turns an astronomically unlikely collision into
//! a hard failure rather than a mis-attributed payment.

use super::keys::{Pubkey, base58};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceKey(Pubkey);

impl ReferenceKey {
    /// Issues a new reference key. The signing half never leaves this function.
    pub fn generate() -> Self {
        Self(Keypair::new().pubkey())
    }

    pub fn pubkey(&self) -> Pubkey {
        self.0
    }
}

impl From<Pubkey> for ReferenceKey {
    fn from(key: Pubkey) -> Self {
        Self(key)
    }
}

impl FromStr for ReferenceKey {
    type Err = crate::error::PactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::keys::parse_pubkey(s).map(Self)
    }
}

impl Serialize for ReferenceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        base58::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for ReferenceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        base58::deserialize(deserializer).map(Self)
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceKey({})", self.0)
    }
}
