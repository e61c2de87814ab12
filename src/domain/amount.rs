use super::keys::{Pubkey, base58};
use crate::error::PactError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places of the native asset (1 SOL = 10^9 lamports).
pub const NATIVE_DECIMALS: u8 = 9;

/// Largest decimal count whose base-unit multiplier still fits a `u64`.
pub const MAX_DECIMALS: u8 = 19;

/// A strictly positive amount in display units (e.g. `1.5` SOL, `50` USDC).
///
/// Base-unit conversion and fixed-point rendering both reject amounts that
/// carry more fractional digits than the asset supports, instead of rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PactError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PactError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    fn check_precision(&self, decimals: u8) -> Result<(), PactError> {
        if decimals > MAX_DECIMALS {
            return Err(PactError::ValidationError(format!(
                "Unsupported decimals {decimals} (max {MAX_DECIMALS})"
            )));
        }
        if self.0.normalize().scale() > u32::from(decimals) {
            return Err(PactError::ValidationError(format!(
                "Amount {} has more than {} decimal places",
                self.0.normalize(),
                decimals
            )));
        }
        Ok(())
    }

    /// Converts to indivisible base units (lamports, token atoms).
    pub fn to_base_units(&self, decimals: u8) -> Result<u64, PactError> {
        self.check_precision(decimals)?;
        let multiplier = Decimal::from(10u64.pow(u32::from(decimals)));
        self.0
            .checked_mul(multiplier)
            .and_then(|units| units.to_u64())
            .ok_or_else(|| {
                PactError::ValidationError(format!(
                    "Amount {} overflows base units at {} decimals",
                    self.0, decimals
                ))
            })
    }

    /// Renders with exactly `decimals` fractional digits and never in
    /// exponential notation, e.g. `0.0001` at 9 decimals is `0.000100000`.
    pub fn format_fixed(&self, decimals: u8) -> Result<String, PactError> {
        self.check_precision(decimals)?;
        let mut fixed = self.0;
        fixed.rescale(u32::from(decimals));
        Ok(fixed.to_string())
    }

    pub fn from_base_units(units: u64, decimals: u8) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(units), u32::from(decimals))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PactError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// An SPL token mint together with its declared decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMint {
    #[serde(with = "base58")]
    pub mint: Pubkey,
    pub decimals: u8,
}

impl TokenMint {
    pub fn new(mint: Pubkey, decimals: u8) -> Result<Self, PactError> {
        if decimals > MAX_DECIMALS {
            return Err(PactError::ValidationError(format!(
                "Unsupported token decimals {decimals}"
            )));
        }
        Ok(Self { mint, decimals })
    }
}

/// Decimals of the asset a pact is denominated in.
pub fn asset_decimals(token: Option<&TokenMint>) -> u8 {
    token.map_or(NATIVE_DECIMALS, |t| t.decimals)
}
