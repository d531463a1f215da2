// src/pools/mod.rs
//! Pool abstraction: decoded pool records and the quoting capability shared
//! by every pool type the router can traverse.

pub mod constant_product;
pub mod provider;
pub mod stableswap;
pub mod transmuter;
pub mod weighted;

use crate::error::RouterError;
use crate::fees::{deduct_fee, validate_fee_fraction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub use constant_product::ConstantProductPool;
pub use stableswap::StableSwapPool;
pub use transmuter::TransmuterPool;
pub use weighted::WeightedPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolType {
    ConstantProduct,
    StableSwap,
    Transmuter,
    CustomInvariant,
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolType::ConstantProduct => "constant_product",
            PoolType::StableSwap => "stable_swap",
            PoolType::Transmuter => "transmuter",
            PoolType::CustomInvariant => "custom_invariant",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBalance {
    pub denom: String,
    pub amount: u128,
}

/// Type-specific parameters carried next to the reserves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolParams {
    #[default]
    None,
    StableSwap {
        amplification: u64,
        #[serde(default)]
        scaling_factors: Vec<u64>,
    },
    Weighted {
        weights: Vec<u64>,
    },
}

/// Pool as decoded from the data provider, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    pub id: u64,
    pub pool_type: PoolType,
    pub balances: Vec<PoolBalance>,
    #[serde(default)]
    pub spread_factor: Decimal,
    #[serde(default)]
    pub liquidity_cap: u128,
    #[serde(default)]
    pub params: PoolParams,
}

/// Validated reserves and fee data common to every pool variant.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolState {
    pub id: u64,
    pub balances: Vec<PoolBalance>,
    pub spread_factor: Decimal,
    pub liquidity_cap: u128,
}

impl PoolState {
    fn from_record(record: &PoolRecord) -> Result<Self, RouterError> {
        if record.balances.len() < 2 {
            return Err(RouterError::InvalidPoolState(format!(
                "pool {} holds {} denominations, need at least 2",
                record.id,
                record.balances.len()
            )));
        }
        let mut seen = HashSet::new();
        for balance in &record.balances {
            if balance.denom.is_empty() || !seen.insert(balance.denom.as_str()) {
                return Err(RouterError::InvalidPoolState(format!(
                    "pool {} has an empty or duplicated denomination '{}'",
                    record.id, balance.denom
                )));
            }
        }
        validate_fee_fraction(record.spread_factor).map_err(|_| {
            RouterError::InvalidPoolState(format!(
                "pool {} spread factor {} outside [0, 1)",
                record.id, record.spread_factor
            ))
        })?;

        Ok(Self {
            id: record.id,
            balances: record.balances.clone(),
            spread_factor: record.spread_factor,
            liquidity_cap: record.liquidity_cap,
        })
    }

    pub fn index_of(&self, denom: &str) -> Result<usize, RouterError> {
        self.balances
            .iter()
            .position(|b| b.denom == denom)
            .ok_or_else(|| RouterError::DenomNotInPool {
                pool_id: self.id,
                denom: denom.to_string(),
            })
    }

    /// Positions of the in and out denominations, rejecting self-swaps.
    pub fn swap_indices(&self, denom_in: &str, denom_out: &str) -> Result<(usize, usize), RouterError> {
        let i = self.index_of(denom_in)?;
        let j = self.index_of(denom_out)?;
        if i == j {
            return Err(RouterError::InvalidInput(format!(
                "pool {} cannot swap {} into itself",
                self.id, denom_in
            )));
        }
        Ok((i, j))
    }

    pub fn require_reserves(&self, i: usize, j: usize) -> Result<(u128, u128), RouterError> {
        let reserve_in = self.balances[i].amount;
        let reserve_out = self.balances[j].amount;
        if reserve_in == 0 || reserve_out == 0 {
            return Err(RouterError::InsufficientLiquidity {
                pool_id: self.id,
                reason: format!(
                    "empty reserve ({} {}, {} {})",
                    reserve_in, self.balances[i].denom, reserve_out, self.balances[j].denom
                ),
            });
        }
        Ok((reserve_in, reserve_out))
    }

    /// Input left after the pool's spread factor is taken.
    pub fn amount_after_spread(&self, amount_in: u128) -> Result<u128, RouterError> {
        deduct_fee(amount_in, self.spread_factor)
    }
}

/// Quoting capability of a pool. All quoting is pure over the snapshot the
/// pool was built from.
pub trait RoutablePool: Send + Sync + fmt::Debug {
    fn state(&self) -> &PoolState;

    fn pool_type(&self) -> PoolType;

    fn calculate_token_out(&self, denom_in: &str, denom_out: &str, amount_in: u128) -> Result<u128, RouterError>;

    /// Units of `denom_out` per unit of `denom_in` for an infinitesimal trade, fees excluded.
    fn spot_price(&self, denom_in: &str, denom_out: &str) -> Result<f64, RouterError>;

    fn id(&self) -> u64 {
        self.state().id
    }

    fn denoms(&self) -> Vec<String> {
        self.state().balances.iter().map(|b| b.denom.clone()).collect()
    }

    fn balance(&self, denom: &str) -> Option<u128> {
        self.state()
            .balances
            .iter()
            .find(|b| b.denom == denom)
            .map(|b| b.amount)
    }

    fn holds(&self, denom: &str) -> bool {
        self.balance(denom).is_some()
    }

    fn liquidity_cap(&self) -> u128 {
        self.state().liquidity_cap
    }

    fn spread_factor(&self) -> Decimal {
        self.state().spread_factor
    }
}

/// Builds the quoting implementation matching the record's type tag.
pub fn new_routable_pool(record: &PoolRecord) -> Result<Arc<dyn RoutablePool>, RouterError> {
    let state = PoolState::from_record(record)?;
    let pool: Arc<dyn RoutablePool> = match (record.pool_type, &record.params) {
        (PoolType::ConstantProduct, PoolParams::None) => Arc::new(ConstantProductPool::new(state)),
        (PoolType::StableSwap, PoolParams::StableSwap { amplification, scaling_factors }) => {
            Arc::new(StableSwapPool::new(state, *amplification, scaling_factors.clone())?)
        }
        (PoolType::Transmuter, PoolParams::None) => Arc::new(TransmuterPool::new(state)),
        (PoolType::CustomInvariant, PoolParams::Weighted { weights }) => {
            Arc::new(WeightedPool::new(state, weights.clone())?)
        }
        (pool_type, params) => {
            return Err(RouterError::InvalidPoolState(format!(
                "pool {} of type {} cannot use parameters {:?}",
                record.id, pool_type, params
            )))
        }
    };
    Ok(pool)
}

/// Builds every valid record, logging and skipping the rest.
pub fn build_pools(records: &[PoolRecord]) -> Vec<Arc<dyn RoutablePool>> {
    records
        .iter()
        .filter_map(|record| match new_routable_pool(record) {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("Skipping pool {}: {}", record.id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn balances(pairs: &[(&str, u128)]) -> Vec<PoolBalance> {
        pairs
            .iter()
            .map(|(denom, amount)| PoolBalance {
                denom: denom.to_string(),
                amount: *amount,
            })
            .collect()
    }

    pub fn cp_record(id: u64, pairs: &[(&str, u128)], liquidity_cap: u128) -> PoolRecord {
        PoolRecord {
            id,
            pool_type: PoolType::ConstantProduct,
            balances: balances(pairs),
            spread_factor: Decimal::ZERO,
            liquidity_cap,
            params: PoolParams::None,
        }
    }
}
