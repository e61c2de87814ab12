//! Canonical payment-request URIs.
//!
//! ```text
//! solana:<recipient>?amount=<decimal>&reference=<base58>[&spl-token=<base58>]&label=<pct>&message=<pct>
//! ```
//!
//! Wallets parse this string directly, so the output must be byte-for-byte
//! stable: the amount always carries exactly the asset's decimal places and
//! never uses exponential notation; label and message are percent-encoded.

use crate::domain::amount::{Amount, MAX_DECIMALS, NATIVE_DECIMALS};
use crate::domain::keys::{Pubkey, parse_pubkey};
use crate::domain::pact::Pact;
use crate::domain::reference::ReferenceKey;
use crate::error::{PactError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

pub const SCHEME: &str = "solana";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub recipient: Pubkey,
    pub amount: Amount,
    pub reference: ReferenceKey,
    pub spl_token: Option<Pubkey>,
    /// Fractional digits the amount is rendered with.
    pub decimals: u8,
    pub label: Option<String>,
    pub message: Option<String>,
}

impl PaymentRequest {
    pub fn native(recipient: Pubkey, amount: Amount, reference: ReferenceKey) -> Self {
        Self {
            recipient,
            amount,
            reference,
            spl_token: None,
            decimals: NATIVE_DECIMALS,
            label: None,
            message: None,
        }
    }

    pub fn with_token(mut self, mint: Pubkey, decimals: u8) -> Self {
        self.spl_token = Some(mint);
        self.decimals = decimals;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The request owed by participant `index` of `pact`.
    pub fn for_participant(pact: &Pact, index: usize) -> Result<Self> {
        let participant = pact.participant(index)?;
        let who = participant
            .identity()
            .unwrap_or_else(|| format!("P{}", index + 1));
        let mut request = Self::native(
            pact.receiver_wallet,
            pact.amount_per_person,
            participant.reference,
        )
        .with_label(pact.name.clone())
        .with_message(format!("Pact payment for {who}"));
        if let Some(token) = pact.token {
            request = request.with_token(token.mint, token.decimals);
        }
        Ok(request)
    }

    pub fn encode(&self) -> Result<String> {
        let mut uri = format!(
            "{SCHEME}:{}?amount={}&reference={}",
            self.recipient,
            self.amount.format_fixed(self.decimals)?,
            self.reference
        );
        if let Some(mint) = &self.spl_token {
            uri.push_str("&spl-token=");
            uri.push_str(&mint.to_string());
        }
        if let Some(label) = &self.label {
            uri.push_str("&label=");
            uri.push_str(&urlencoding::encode(label));
        }
        if let Some(message) = &self.message {
            uri.push_str("&message=");
            uri.push_str(&urlencoding::encode(message));
        }
        Ok(uri)
    }

    pub fn decode(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let (scheme, rest) = uri
            .split_once(':')
            .ok_or_else(|| invalid("missing scheme"))?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(invalid(&format!("unsupported scheme '{scheme}'")));
        }
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        if path.is_empty() {
            return Err(invalid("missing recipient"));
        }
        let recipient = parse_pubkey(path)?;

        let mut amount_text = None;
        let mut reference = None;
        let mut spl_token = None;
        let mut label = None;
        let mut message = None;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(raw)?;
            match key {
                "amount" => set_once(&mut amount_text, value, "amount")?,
                // later references are additional tags; the first one identifies the obligation
                "reference" => {
                    if reference.is_none() {
                        reference = Some(value.parse::<ReferenceKey>()?);
                    }
                }
                "spl-token" => set_once(&mut spl_token, parse_pubkey(&value)?, "spl-token")?,
                "label" => set_once(&mut label, value, "label")?,
                "message" => set_once(&mut message, value, "message")?,
                _ => {}
            }
        }

        let amount_text = amount_text.ok_or_else(|| invalid("missing amount"))?;
        let (amount, fraction_digits) = parse_amount(&amount_text)?;
        let decimals = match spl_token {
            Some(_) => fraction_digits,
            None if fraction_digits > NATIVE_DECIMALS => {
                return Err(invalid(&format!(
                    "amount {amount_text} exceeds {NATIVE_DECIMALS} decimal places"
                )));
            }
            None => NATIVE_DECIMALS,
        };

        Ok(Self {
            recipient,
            amount,
            reference: reference.ok_or_else(|| invalid("missing reference"))?,
            spl_token,
            decimals,
            label,
            message,
        })
    }
}

fn invalid(reason: &str) -> PactError {
    PactError::ValidationError(format!("Invalid payment request: {reason}"))
}

fn set_once<T>(slot: &mut Option<T>, value: T, name: &str) -> Result<()> {
    if slot.is_some() {
        return Err(invalid(&format!("duplicate {name}")));
    }
    *slot = Some(value);
    Ok(())
}

fn decode_component(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| invalid(&format!("bad percent-encoding: {e}")))
}

/// Accepts plain decimals only: digits, optionally one `.` followed by digits.
fn parse_amount(text: &str) -> Result<(Amount, u8)> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty()
        || !digits_only(whole)
        || !digits_only(fraction)
        || (text.contains('.') && fraction.is_empty())
    {
        return Err(invalid(&format!("malformed amount '{text}'")));
    }
    let fraction_digits = u8::try_from(fraction.len())
        .ok()
        .filter(|d| *d <= MAX_DECIMALS)
        .ok_or_else(|| invalid(&format!("too many decimal places in '{text}'")))?;
    let value =
        Decimal::from_str(text).map_err(|e| invalid(&format!("malformed amount '{text}': {e}")))?;
    Ok((Amount::new(value)?, fraction_digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> PaymentRequest {
        PaymentRequest::native(
            Pubkey::new_from_array([1u8; 32]),
            Amount::new(dec!(0.0001)).unwrap(),
            ReferenceKey::from(Pubkey::new_from_array([2u8; 32])),
        )
    }

    #[test]
    fn test_encode_exact_grammar() {
        let req = request()
            .with_label("Team Dinner")
            .with_message("Pact payment for a@b.co");
        let uri = req.encode().unwrap();
        let expected = format!(
            "solana:{}?amount=0.000100000&reference={}&label=Team%20Dinner&message=Pact%20payment%20for%20a%40b.co",
            Pubkey::new_from_array([1u8; 32]),
            Pubkey::new_from_array([2u8; 32]),
        );
        assert_eq!(uri, expected);
    }

    #[test]
    fn test_encode_token_request_places_spl_token_before_label() {
        let mint = Pubkey::new_from_array([3u8; 32]);
        let req = PaymentRequest::native(
            Pubkey::new_from_array([1u8; 32]),
            Amount::new(dec!(0.5)).unwrap(),
            ReferenceKey::from(Pubkey::new_from_array([2u8; 32])),
        )
        .with_token(mint, 6)
        .with_label("x");
        let uri = req.encode().unwrap();
        assert!(uri.contains(&format!("amount=0.500000&reference={}&spl-token={mint}&label=x", Pubkey::new_from_array([2u8; 32]))));
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            request(),
            request().with_label("Rent & Utilities / März").with_message("100% due"),
            request().with_token(Pubkey::new_from_array([3u8; 32]), 6),
        ];
        for original in cases {
            let decoded = PaymentRequest::decode(&original.encode().unwrap()).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_amounts() {
        let base = format!("solana:{}?reference={}", Pubkey::new_from_array([1u8; 32]), Pubkey::new_from_array([2u8; 32]));
        for amount in ["1e-4", "1.", ".5", "-1", "0", "1.2.3", "abc", "0.0000000001"] {
            let uri = format!("{base}&amount={amount}");
            assert!(
                matches!(PaymentRequest::decode(&uri), Err(PactError::ValidationError(_))),
                "accepted amount {amount}"
            );
        }
    }

    #[test]
    fn test_decode_requires_reference_and_scheme() {
        let recipient = Pubkey::new_from_array([1u8; 32]);
        assert!(PaymentRequest::decode(&format!("solana:{recipient}?amount=1")).is_err());
        assert!(
            PaymentRequest::decode(&format!(
                "bitcoin:{recipient}?amount=1&reference={recipient}"
            ))
            .is_err()
        );
        assert!(PaymentRequest::decode("solana:?amount=1").is_err());
    }

    #[test]
    fn test_decode_keeps_first_reference() {
        let first = Pubkey::new_from_array([2u8; 32]);
        let extra = Pubkey::new_from_array([4u8; 32]);
        let uri = format!(
            "solana:{}?amount=1&reference={first}&reference={extra}",
            Pubkey::new_from_array([1u8; 32])
        );
        let decoded = PaymentRequest::decode(&uri).unwrap();
        assert_eq!(decoded.reference, ReferenceKey::from(first));
        assert_eq!(decoded.encode().unwrap().matches("reference=").count(), 1);

        let bad_extra = format!("{uri}&reference=not-a-key");
        assert!(PaymentRequest::decode(&bad_extra).is_ok());
    }

    #[test]
    fn test_decode_accepts_form_encoded_spaces() {
        let uri = format!(
            "solana:{}?amount=1&reference={}&label=Team+Dinner",
            Pubkey::new_from_array([1u8; 32]),
            Pubkey::new_from_array([2u8; 32])
        );
        let decoded = PaymentRequest::decode(&uri).unwrap();
        assert_eq!(decoded.label.as_deref(), Some("Team Dinner"));
        assert_eq!(decoded.amount.value(), dec!(1));
        assert_eq!(decoded.decimals, NATIVE_DECIMALS);
    }

    #[test]
    fn test_encode_rejects_excess_precision() {
        let req = PaymentRequest::native(
            Pubkey::new_from_array([1u8; 32]),
            Amount::new(dec!(0.1234567)).unwrap(),
            ReferenceKey::from(Pubkey::new_from_array([2u8; 32])),
        )
        .with_token(Pubkey::new_from_array([3u8; 32]), 6);
        assert!(matches!(req.encode(), Err(PactError::ValidationError(_))));
    }
}
