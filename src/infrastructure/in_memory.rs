use crate::domain::keys::Pubkey;
use crate::domain::pact::{PaidTransition, Pact, PactId, PaymentProof, ReferenceEntry};
use crate::domain::ports::{IdentityResolver, PactStore};
use crate::domain::reference::ReferenceKey;
use crate::error::{PactError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    pacts: HashMap<PactId, Pact>,
    references: HashMap<ReferenceKey, ReferenceEntry>,
}

/// A thread-safe in-memory pact store.
///
/// Pacts and the reference index live behind one lock, so an insert is
/// visible all at once and the paid transition is a compare-and-set.
#[derive(Default, Clone)]
pub struct InMemoryPactStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryPactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PactStore for InMemoryPactStore {
    async fn insert(&self, pact: Pact) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.pacts.contains_key(&pact.id) {
            return Err(PactError::StorageError(format!("Pact {} already exists", pact.id)));
        }
        for participant in &pact.participants {
            if tables.references.contains_key(&participant.reference) {
                return Err(PactError::DuplicateReference(participant.reference.to_string()));
            }
        }
        for (index, participant) in pact.participants.iter().enumerate() {
            tables.references.insert(
                participant.reference,
                ReferenceEntry {
                    pact_id: pact.id,
                    index,
                },
            );
        }
        tables.pacts.insert(pact.id, pact);
        Ok(())
    }

    async fn get(&self, id: PactId) -> Result<Option<Pact>> {
        let tables = self.tables.read().await;
        Ok(tables.pacts.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Pact>> {
        let tables = self.tables.read().await;
        Ok(tables.pacts.values().cloned().collect())
    }

    async fn lookup_reference(&self, reference: &ReferenceKey) -> Result<Option<ReferenceEntry>> {
        let tables = self.tables.read().await;
        Ok(tables.references.get(reference).copied())
    }

    async fn mark_paid(
        &self,
        id: PactId,
        index: usize,
        proof: PaymentProof,
    ) -> Result<PaidTransition> {
        let mut tables = self.tables.write().await;
        let pact = tables
            .pacts
            .get_mut(&id)
            .ok_or_else(|| PactError::NotFound(format!("Pact {id}")))?;
        Ok(pact.participant_mut(index)?.mark_paid(proof))
    }
}

/// Email-to-wallet directory held in memory, typically loaded from CSV.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    entries: HashMap<String, Pubkey>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, email: &str, wallet: Pubkey) -> Self {
        self.insert(email, wallet);
        self
    }

    pub fn insert(&mut self, email: &str, wallet: Pubkey) {
        self.entries.insert(normalize_email(email), wallet);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityResolver for StaticDirectory {
    async fn resolve_email(&self, email: &str) -> Result<Option<Pubkey>> {
        Ok(self.entries.get(&normalize_email(email)).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::Amount;
    use crate::domain::keys::Signature;
    use crate::domain::pact::Participant;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn pact(references: Vec<ReferenceKey>) -> Pact {
        Pact {
            id: PactId::new(),
            name: "Dinner".into(),
            amount_per_person: Amount::new(dec!(1)).unwrap(),
            receiver_wallet: Pubkey::new_from_array([1u8; 32]),
            due_date: Utc::now(),
            created_by: "organizer".into(),
            created_at: Utc::now(),
            token: None,
            participants: references
                .into_iter()
                .map(|r| Participant::new(None, None, r))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_insert_indexes_references() {
        let store = InMemoryPactStore::new();
        let (a, b) = (ReferenceKey::generate(), ReferenceKey::generate());
        let pact = pact(vec![a, b]);
        store.insert(pact.clone()).await.unwrap();

        assert_eq!(store.get(pact.id).await.unwrap(), Some(pact.clone()));
        assert_eq!(
            store.lookup_reference(&b).await.unwrap(),
            Some(ReferenceEntry {
                pact_id: pact.id,
                index: 1
            })
        );
        assert!(store.lookup_reference(&ReferenceKey::generate()).await.unwrap().is_none());
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_reference_leaves_no_trace() {
        let store = InMemoryPactStore::new();
        let shared = ReferenceKey::generate();
        store.insert(pact(vec![shared])).await.unwrap();

        let fresh = ReferenceKey::generate();
        let clash = pact(vec![fresh, shared]);
        let result = store.insert(clash.clone()).await;
        assert!(matches!(result, Err(PactError::DuplicateReference(_))));
        assert!(store.get(clash.id).await.unwrap().is_none());
        assert!(store.lookup_reference(&fresh).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_paid_is_compare_and_set() {
        let store = InMemoryPactStore::new();
        let pact = pact(vec![ReferenceKey::generate()]);
        store.insert(pact.clone()).await.unwrap();

        let first = PaymentProof::now(Signature::from([1u8; 64]));
        assert_eq!(
            store.mark_paid(pact.id, 0, first).await.unwrap(),
            PaidTransition::Marked
        );
        assert_eq!(
            store
                .mark_paid(pact.id, 0, PaymentProof::now(Signature::from([2u8; 64])))
                .await
                .unwrap(),
            PaidTransition::AlreadyPaid
        );
        let stored = store.get(pact.id).await.unwrap().unwrap();
        assert_eq!(stored.participants[0].paid_tx_signature, Some(first.signature));

        assert!(matches!(
            store.mark_paid(PactId::new(), 0, first).await,
            Err(PactError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_is_case_insensitive() {
        let wallet = Pubkey::new_from_array([8u8; 32]);
        let directory = StaticDirectory::new().with_entry("Alice@Example.com", wallet);
        assert_eq!(directory.resolve_email(" alice@example.com").await.unwrap(), Some(wallet));
        assert_eq!(directory.resolve_email("bob@example.com").await.unwrap(), None);
        assert_eq!(directory.len(), 1);
    }
}
