// src/fees/mod.rs
//! Taker fees: per denomination pair protocol fees charged on every hop,
//! plus exact decimal-fee arithmetic shared with the pool spread factors.

use crate::error::RouterError;
use dashmap::DashMap;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unordered denomination pair stored with `denom0 < denom1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DenomPair {
    pub denom0: String,
    pub denom1: String,
}

impl DenomPair {
    pub fn new(a: &str, b: &str) -> Self {
        if b < a {
            Self {
                denom0: b.to_string(),
                denom1: a.to_string(),
            }
        } else {
            Self {
                denom0: a.to_string(),
                denom1: b.to_string(),
            }
        }
    }
}

/// One taker-fee file entry; the pair may be written in any order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakerFeeEntry {
    pub denom0: String,
    pub denom1: String,
    pub taker_fee: Decimal,
}

pub trait TakerFeeProvider: Send + Sync {
    /// Fee for swapping between `a` and `b`. Missing pairs cost nothing.
    fn get_fee(&self, a: &str, b: &str) -> Decimal;
    fn set_fee(&self, a: &str, b: &str, fee: Decimal);
    fn set_fees(&self, fees: Vec<TakerFeeEntry>) {
        for entry in fees {
            self.set_fee(&entry.denom0, &entry.denom1, entry.taker_fee);
        }
    }
    fn all_fees(&self) -> Vec<(DenomPair, Decimal)>;
}

#[derive(Debug, Default)]
pub struct InMemoryTakerFees {
    fees: DashMap<DenomPair, Decimal>,
}

impl InMemoryTakerFees {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<TakerFeeEntry>) -> Self {
        let provider = Self::new();
        provider.set_fees(entries);
        provider
    }
}

impl TakerFeeProvider for InMemoryTakerFees {
    fn get_fee(&self, a: &str, b: &str) -> Decimal {
        self.fees
            .get(&DenomPair::new(a, b))
            .map(|fee| *fee)
            .unwrap_or(Decimal::ZERO)
    }

    fn set_fee(&self, a: &str, b: &str, fee: Decimal) {
        self.fees.insert(DenomPair::new(a, b), fee);
    }

    fn all_fees(&self) -> Vec<(DenomPair, Decimal)> {
        let mut all: Vec<(DenomPair, Decimal)> = self
            .fees
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

pub fn load_taker_fees_file<P: AsRef<Path>>(path: P) -> Result<Vec<TakerFeeEntry>, RouterError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let entries: Vec<TakerFeeEntry> = serde_json::from_str(&raw)?;
    for entry in &entries {
        validate_fee_fraction(entry.taker_fee)?;
    }
    log::info!("Loaded {} taker fee entries from {}", entries.len(), path.as_ref().display());
    Ok(entries)
}

/// Fee fractions live in `[0, 1)`.
pub fn validate_fee_fraction(fee: Decimal) -> Result<(), RouterError> {
    if fee.is_sign_negative() || fee >= Decimal::ONE {
        return Err(RouterError::InvalidInput(format!("fee fraction {} outside [0, 1)", fee)));
    }
    Ok(())
}

/// Returns `amount * (1 - fee)` rounded down, computed exactly.
pub fn deduct_fee(amount: u128, fee: Decimal) -> Result<u128, RouterError> {
    validate_fee_fraction(fee)?;
    if fee.is_zero() || amount == 0 {
        return Ok(amount);
    }
    let scale = BigUint::from(10u32).pow(fee.scale());
    let mantissa = BigUint::from(fee.mantissa().unsigned_abs());
    let kept = (BigUint::from(amount) * (&scale - &mantissa)) / &scale;
    kept.to_u128()
        .ok_or_else(|| RouterError::InvalidAmount("fee deduction overflow".to_string()))
}
