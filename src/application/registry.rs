use crate::domain::keys::Pubkey;
use crate::domain::pact::{
    PaidTransition, Pact, PactDraft, PactId, Participant, PaymentProof, ReferenceEntry,
};
use crate::domain::ports::{IdentityResolverBox, NotifierBox, PactStoreBox};
use crate::domain::reference::ReferenceKey;
use crate::error::{PactError, Result};
use crate::payment::request::PaymentRequest;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// State changes observable through [`PactRegistry::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PactEvent {
    Created {
        pact_id: PactId,
    },
    ParticipantPaid {
        pact_id: PactId,
        index: usize,
        signature: crate::domain::keys::Signature,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLink {
    pub label: String,
    pub url: String,
}

/// Creates pacts and answers every query about them.
///
/// The registry owns the store and is the only component that writes to it,
/// so every paid transition goes through [`PactRegistry::mark_paid`] and is
/// announced to subscribers exactly once.
pub struct PactRegistry {
    store: PactStoreBox,
    resolver: IdentityResolverBox,
    notifier: NotifierBox,
    events: broadcast::Sender<PactEvent>,
}

impl PactRegistry {
    pub fn new(store: PactStoreBox, resolver: IdentityResolverBox, notifier: NotifierBox) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            resolver,
            notifier,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PactEvent> {
        self.events.subscribe()
    }

    /// Validates, resolves, keys and persists a new pact.
    ///
    /// The pact is assembled completely in memory and written with a single
    /// store call, so a failure at any point leaves nothing behind.
    pub async fn create(&self, draft: PactDraft) -> Result<PactId> {
        draft.validate()?;

        let mut participants = Vec::with_capacity(draft.participants.len());
        for p in &draft.participants {
            let email = p
                .email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string);
            let wallet = match (p.wallet, email.as_deref()) {
                (Some(wallet), _) => Some(wallet),
                (None, Some(email)) => self.resolve(email).await,
                (None, None) => None,
            };
            participants.push(Participant::new(email, wallet, ReferenceKey::generate()));
        }

        let pact = Pact {
            id: PactId::new(),
            name: draft.name.trim().to_string(),
            amount_per_person: draft.amount_per_person,
            receiver_wallet: draft.receiver_wallet,
            due_date: draft.due_date,
            created_by: draft.created_by.trim().to_string(),
            created_at: Utc::now(),
            token: draft.token,
            participants,
        };
        let pact_id = pact.id;

        self.store.insert(pact.clone()).await?;
        info!(
            pact_id = %pact_id,
            participants = pact.participants.len(),
            resolved = pact.participant_wallets().len(),
            "Pact created"
        );

        if let Err(e) = self.notifier.pact_created(&pact).await {
            warn!(pact_id = %pact_id, error = %e, "Failed to send pact invitations");
        }
        let _ = self.events.send(PactEvent::Created { pact_id });

        Ok(pact_id)
    }

    async fn resolve(&self, email: &str) -> Option<Pubkey> {
        match self.resolver.resolve_email(email).await {
            Ok(Some(wallet)) => Some(wallet),
            Ok(None) => {
                debug!(email, "No wallet mapped for participant");
                None
            }
            Err(e) => {
                warn!(email, error = %e, "Identity resolution failed; participant left unresolved");
                None
            }
        }
    }

    pub async fn get(&self, id: PactId) -> Result<Option<Pact>> {
        self.store.get(id).await
    }

    /// Like [`get`](Self::get) but a missing pact is an error.
    pub async fn require(&self, id: PactId) -> Result<Pact> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PactError::NotFound(format!("Pact {id}")))
    }

    /// Pacts organized by `wallet`, newest first.
    pub async fn list_by_creator(&self, wallet: &str) -> Result<Vec<Pact>> {
        let wallet = wallet.trim();
        self.list_where(|pact| pact.created_by == wallet).await
    }

    /// Pacts in which `wallet` owes a share, newest first.
    pub async fn list_by_participant(&self, wallet: &Pubkey) -> Result<Vec<Pact>> {
        self.list_where(|pact| Self::participant_index_by_wallet(pact, wallet).is_some())
            .await
    }

    async fn list_where(&self, keep: impl Fn(&Pact) -> bool) -> Result<Vec<Pact>> {
        let mut pacts: Vec<Pact> = self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(|pact| keep(pact))
            .collect();
        pacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pacts)
    }

    pub async fn find_by_reference(&self, reference: &ReferenceKey) -> Result<Option<ReferenceEntry>> {
        self.store.lookup_reference(reference).await
    }

    /// Conditionally marks a participant paid. Returns
    /// [`PaidTransition::AlreadyPaid`] rather than an error when another
    /// confirmation won the race.
    pub async fn mark_paid(
        &self,
        pact_id: PactId,
        index: usize,
        proof: PaymentProof,
    ) -> Result<PaidTransition> {
        let transition = self.store.mark_paid(pact_id, index, proof).await?;
        match transition {
            PaidTransition::Marked => {
                info!(pact_id = %pact_id, index, signature = %proof.signature, "Participant paid");
                let _ = self.events.send(PactEvent::ParticipantPaid {
                    pact_id,
                    index,
                    signature: proof.signature,
                });
            }
            PaidTransition::AlreadyPaid => {
                debug!(pact_id = %pact_id, index, "Participant already paid; transition skipped");
            }
        }
        Ok(transition)
    }

    /// One payment link per participant, in participant order.
    pub fn payment_links(pact: &Pact) -> Result<Vec<PaymentLink>> {
        pact.participants
            .iter()
            .enumerate()
            .map(|(index, participant)| {
                Ok(PaymentLink {
                    label: participant.label(index),
                    url: PaymentRequest::for_participant(pact, index)?.encode()?,
                })
            })
            .collect()
    }

    pub fn participant_index_by_wallet(pact: &Pact, wallet: &Pubkey) -> Option<usize> {
        pact.participants
            .iter()
            .position(|p| p.wallet_address.as_ref() == Some(wallet))
    }

    /// Deep link to a single participant's payment page.
    pub fn participant_page_path(pact_id: PactId, index: usize) -> String {
        format!("/pay/{pact_id}/{index}")
    }
}
