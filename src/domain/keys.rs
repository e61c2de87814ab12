//! Account addresses, transaction signatures and blockhashes.
//!
//! The types are the network's own. Records persist them as base58 text
//! through the [`base58`] serde adapters so stored pacts stay readable.

use crate::error::{PactError, Result};
use std::str::FromStr;

pub use solana_sdk::hash::Hash;
pub use solana_sdk::pubkey::Pubkey;
pub use solana_sdk::signature::Signature;

pub fn parse_pubkey(text: &str) -> Result<Pubkey> {
    let text = text.trim();
    Pubkey::from_str(text)
        .map_err(|e| PactError::ValidationError(format!("Invalid address '{text}': {e}")))
}

/// Serde adapter writing a key through its base58 text form.
pub mod base58 {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.trim().parse().map_err(de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer, de};
        use std::fmt::Display;
        use std::str::FromStr;

        pub fn serialize<T: Display, S: Serializer>(
            value: &Option<T>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.collect_str(value),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
        where
            T: FromStr,
            T::Err: Display,
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|text| text.trim().parse().map_err(de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        #[serde(with = "base58")]
        owner: Pubkey,
        #[serde(with = "base58::option", default)]
        signature: Option<Signature>,
    }

    #[test]
    fn test_parse_pubkey() {
        let key = Pubkey::new_from_array([7u8; 32]);
        assert_eq!(parse_pubkey(&format!(" {key} ")).unwrap(), key);
        assert_eq!(
            parse_pubkey("11111111111111111111111111111111").unwrap(),
            Pubkey::default()
        );
        let short = bs58::encode([1u8; 31]).into_string();
        assert!(matches!(parse_pubkey(&short), Err(PactError::ValidationError(_))));
        assert!(parse_pubkey("not-base58-0OIl").is_err());
    }

    #[test]
    fn test_records_store_base58_text() {
        let record = Record {
            owner: Pubkey::new_from_array([9u8; 32]),
            signature: Some(Signature::from([3u8; 64])),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["owner"], record.owner.to_string());
        assert_eq!(json["signature"], Signature::from([3u8; 64]).to_string());
        assert_eq!(serde_json::from_value::<Record>(json).unwrap(), record);

        let unsigned: Record =
            serde_json::from_str(&format!(r#"{{"owner":"{}","signature":null}}"#, record.owner)).unwrap();
        assert!(unsigned.signature.is_none());
    }
}
