use crate::domain::amount::Amount;
use crate::domain::keys::{Pubkey, base58};
use crate::domain::pact::{Pact, PactId};
use crate::domain::ports::Notifier;
use crate::error::{PactError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Path of the invitation endpoint on the notification service.
pub const SEND_PACT_EMAILS_PATH: &str = "/send-pact-emails";

/// Records invitations in the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn pact_created(&self, pact: &Pact) -> Result<()> {
        for (index, participant) in pact.participants.iter().enumerate() {
            info!(
                pact_id = %pact.id,
                participant = %participant.label(index),
                reference = %participant.reference,
                "Invitation pending"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvitationParticipant {
    email: Option<String>,
    #[serde(with = "base58::option")]
    wallet: Option<Pubkey>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvitationRequest<'a> {
    name: &'a str,
    amount_per_person: Amount,
    #[serde(with = "base58")]
    receiver_wallet: Pubkey,
    due_date: DateTime<Utc>,
    created_by: &'a str,
    participants: Vec<InvitationParticipant>,
    pact_id: PactId,
}

impl<'a> From<&'a Pact> for InvitationRequest<'a> {
    fn from(pact: &'a Pact) -> Self {
        Self {
            name: &pact.name,
            amount_per_person: pact.amount_per_person,
            receiver_wallet: pact.receiver_wallet,
            due_date: pact.due_date,
            created_by: &pact.created_by,
            participants: pact
                .participants
                .iter()
                .map(|p| InvitationParticipant {
                    email: p.email.clone(),
                    wallet: p.wallet_address,
                })
                .collect(),
            pact_id: pact.id,
        }
    }
}

/// Posts invitations to an external email service.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    /// `base_url` is the service root; the invitation path is appended.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PactError::NotificationError(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}{SEND_PACT_EMAILS_PATH}", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn pact_created(&self, pact: &Pact) -> Result<()> {
        if pact.participants.iter().all(|p| p.email.is_none()) {
            return Ok(());
        }
        let response = self
            .client
            .post(&self.endpoint)
            .json(&InvitationRequest::from(pact))
            .send()
            .await
            .map_err(|e| PactError::NotificationError(format!("{}: {e}", self.endpoint)))?;

        if !response.status().is_success() {
            return Err(PactError::NotificationError(format!(
                "{} answered HTTP {}",
                self.endpoint,
                response.status()
            )));
        }
        info!(pact_id = %pact.id, "Invitations sent");
        Ok(())
    }
}
