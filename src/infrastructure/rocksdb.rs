use crate::domain::pact::{PaidTransition, Pact, PactId, PaymentProof, ReferenceEntry};
use crate::domain::ports::PactStore;
use crate::domain::reference::ReferenceKey;
use crate::error::{PactError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family holding pacts keyed by their UUID bytes.
pub const CF_PACTS: &str = "pacts";
/// Column Family mapping reference key bytes to `(pact_id, index)`.
pub const CF_REFERENCES: &str = "references";

/// A persistent pact store on RocksDB.
///
/// Every write goes through `write_lock` so that reference uniqueness checks
/// and the paid compare-and-set observe a stable view. Inserts are a single
/// `WriteBatch` across both column families.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a database at `path` with both column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_pacts = ColumnFamilyDescriptor::new(CF_PACTS, Options::default());
        let cf_references = ColumnFamilyDescriptor::new(CF_REFERENCES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_pacts, cf_references])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PactError::StorageError(format!("Column family '{name}' not found")))
    }

    fn read_pact(&self, id: PactId) -> Result<Option<Pact>> {
        let cf = self.cf(CF_PACTS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_pact(&self, pact: &Pact) -> Result<()> {
        let cf = self.cf(CF_PACTS)?;
        self.db.put_cf(cf, pact.id.as_bytes(), serde_json::to_vec(pact)?)?;
        Ok(())
    }
}

#[async_trait]
impl PactStore for RocksDBStore {
    async fn insert(&self, pact: Pact) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf_pacts = self.cf(CF_PACTS)?;
        let cf_references = self.cf(CF_REFERENCES)?;

        if self.db.get_pinned_cf(cf_pacts, pact.id.as_bytes())?.is_some() {
            return Err(PactError::StorageError(format!("Pact {} already exists", pact.id)));
        }

        let mut batch = WriteBatch::default();
        for (index, participant) in pact.participants.iter().enumerate() {
            let key = participant.reference.pubkey().to_bytes();
            if self.db.get_pinned_cf(cf_references, key)?.is_some() {
                return Err(PactError::DuplicateReference(participant.reference.to_string()));
            }
            let entry = ReferenceEntry {
                pact_id: pact.id,
                index,
            };
            batch.put_cf(cf_references, key, serde_json::to_vec(&entry)?);
        }
        batch.put_cf(cf_pacts, pact.id.as_bytes(), serde_json::to_vec(&pact)?);

        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, id: PactId) -> Result<Option<Pact>> {
        self.read_pact(id)
    }

    async fn get_all(&self) -> Result<Vec<Pact>> {
        let cf = self.cf(CF_PACTS)?;
        let mut pacts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            pacts.push(serde_json::from_slice(&value)?);
        }
        Ok(pacts)
    }

    async fn lookup_reference(&self, reference: &ReferenceKey) -> Result<Option<ReferenceEntry>> {
        let cf = self.cf(CF_REFERENCES)?;
        match self.db.get_cf(cf, reference.pubkey().to_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn mark_paid(
        &self,
        id: PactId,
        index: usize,
        proof: PaymentProof,
    ) -> Result<PaidTransition> {
        let _guard = self.write_lock.lock().await;
        let mut pact = self
            .read_pact(id)?
            .ok_or_else(|| PactError::NotFound(format!("Pact {id}")))?;
        let transition = pact.participant_mut(index)?.mark_paid(proof);
        if transition == PaidTransition::Marked {
            self.write_pact(&pact)?;
        }
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::Amount;
    use crate::domain::keys::{Pubkey, Signature};
    use crate::domain::pact::Participant;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn pact(references: Vec<ReferenceKey>) -> Pact {
        Pact {
            id: PactId::new(),
            name: "Rent".into(),
            amount_per_person: Amount::new(dec!(2.25)).unwrap(),
            receiver_wallet: Pubkey::new_from_array([1u8; 32]),
            due_date: Utc::now(),
            created_by: "organizer".into(),
            created_at: Utc::now(),
            token: None,
            participants: references
                .into_iter()
                .map(|r| Participant::new(Some("a@example.com".into()), None, r))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_PACTS).is_some());
        assert!(store.db.cf_handle(CF_REFERENCES).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_pact_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let reference = ReferenceKey::generate();
        let pact = pact(vec![reference]);

        store.insert(pact.clone()).await.unwrap();
        assert_eq!(store.get(pact.id).await.unwrap(), Some(pact.clone()));
        assert_eq!(store.get_all().await.unwrap(), vec![pact.clone()]);
        assert_eq!(
            store.lookup_reference(&reference).await.unwrap(),
            Some(ReferenceEntry {
                pact_id: pact.id,
                index: 0
            })
        );
        assert!(store.get(PactId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_rejects_duplicate_reference() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let shared = ReferenceKey::generate();
        store.insert(pact(vec![shared])).await.unwrap();

        let clash = pact(vec![shared]);
        assert!(matches!(
            store.insert(clash.clone()).await,
            Err(PactError::DuplicateReference(_))
        ));
        assert!(store.get(clash.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_mark_paid_once() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let pact = pact(vec![ReferenceKey::generate()]);
        store.insert(pact.clone()).await.unwrap();

        let proof = PaymentProof::now(Signature::from([3u8; 64]));
        assert_eq!(store.mark_paid(pact.id, 0, proof).await.unwrap(), PaidTransition::Marked);
        assert_eq!(
            store
                .mark_paid(pact.id, 0, PaymentProof::now(Signature::from([4u8; 64])))
                .await
                .unwrap(),
            PaidTransition::AlreadyPaid
        );
        let stored = store.get(pact.id).await.unwrap().unwrap();
        assert_eq!(stored.participants[0].paid_tx_signature, Some(proof.signature));
    }
}
