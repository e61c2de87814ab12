use crate::domain::pact::ParticipantDraft;
use crate::error::Result;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct ParticipantRow {
    identity: String,
}

/// Reads participants from a CSV source with an `identity` column holding
/// either an email or a wallet address per row.
pub struct ParticipantReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ParticipantReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily parses each row; blank identities are skipped.
    pub fn participants(self) -> impl Iterator<Item = Result<ParticipantDraft>> {
        self.reader
            .into_deserialize::<ParticipantRow>()
            .filter(|row| !matches!(row, Ok(row) if row.identity.is_empty()))
            .map(|row| ParticipantDraft::parse_identity(&row?.identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::Pubkey;

    #[test]
    fn test_reader_mixed_identities() {
        let wallet = Pubkey::new_from_array([3u8; 32]);
        let data = format!("identity, note\n alice@example.com , first\n{wallet},\n,\n");
        let results: Vec<Result<ParticipantDraft>> =
            ParticipantReader::new(data.as_bytes()).participants().collect();

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].as_ref().unwrap().email.as_deref(),
            Some("alice@example.com")
        );
        assert_eq!(results[1].as_ref().unwrap().wallet, Some(wallet));
    }

    #[test]
    fn test_reader_rejects_bad_wallet() {
        let data = "identity\nnot-a-wallet";
        let results: Vec<Result<ParticipantDraft>> =
            ParticipantReader::new(data.as_bytes()).participants().collect();
        assert!(results[0].is_err());
    }
}
