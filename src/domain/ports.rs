use super::keys::Pubkey;
use super::pact::{PaidTransition, Pact, PactId, PaymentProof, ReferenceEntry};
use super::reference::ReferenceKey;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PactStore: Send + Sync {
    /// Persists the pact and one reference entry per participant as a single
    /// unit. Either everything becomes visible or nothing does.
    async fn insert(&self, pact: Pact) -> Result<()>;
    async fn get(&self, id: PactId) -> Result<Option<Pact>>;
    async fn get_all(&self) -> Result<Vec<Pact>>;
    async fn lookup_reference(&self, reference: &ReferenceKey) -> Result<Option<ReferenceEntry>>;
    /// Conditional unpaid -> paid update. Must never overwrite an existing proof.
    async fn mark_paid(
        &self,
        id: PactId,
        index: usize,
        proof: PaymentProof,
    ) -> Result<PaidTransition>;
}

/// Maps participant emails to wallet addresses. Lookups are best-effort.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_email(&self, email: &str) -> Result<Option<Pubkey>>;
}

/// Delivers invitations once a pact exists.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn pact_created(&self, pact: &Pact) -> Result<()>;
}

pub type PactStoreBox = Box<dyn PactStore>;
pub type IdentityResolverBox = Box<dyn IdentityResolver>;
pub type NotifierBox = Box<dyn Notifier>;
