// src/pools/constant_product.rs
//! Constant-product pools (equal weights, pairwise `x * y = k`).
//!
//! Every pair of assets in a multi-asset pool is treated as its own
//! `x * y = k` curve; the spread factor is taken from the input before the
//! curve is applied. All arithmetic is exact.

use super::{PoolState, PoolType, RoutablePool};
use crate::error::RouterError;
use num_bigint::BigUint;
use num_traits::ToPrimitive;

#[derive(Debug, Clone)]
pub struct ConstantProductPool {
    state: PoolState,
}

impl ConstantProductPool {
    pub fn new(state: PoolState) -> Self {
        Self { state }
    }
}

/// `reserve_out * amount_in / (reserve_in + amount_in)`, rounded down.
pub fn constant_product_out(amount_in: u128, reserve_in: u128, reserve_out: u128) -> Option<u128> {
    if amount_in == 0 {
        return Some(0);
    }
    // Use BigUint to prevent overflow in intermediate calculations
    let amount_in_big = BigUint::from(amount_in);
    let numerator = BigUint::from(reserve_out) * &amount_in_big;
    let denominator = BigUint::from(reserve_in) + &amount_in_big;
    (numerator / denominator).to_u128()
}

impl RoutablePool for ConstantProductPool {
    fn state(&self) -> &PoolState {
        &self.state
    }

    fn pool_type(&self) -> PoolType {
        PoolType::ConstantProduct
    }

    fn calculate_token_out(&self, denom_in: &str, denom_out: &str, amount_in: u128) -> Result<u128, RouterError> {
        let (i, j) = self.state.swap_indices(denom_in, denom_out)?;
        let (reserve_in, reserve_out) = self.state.require_reserves(i, j)?;
        let after_spread = self.state.amount_after_spread(amount_in)?;

        constant_product_out(after_spread, reserve_in, reserve_out).ok_or_else(|| {
            RouterError::InvalidPoolState(format!("pool {} output calculation overflow", self.state.id))
        })
    }

    fn spot_price(&self, denom_in: &str, denom_out: &str) -> Result<f64, RouterError> {
        let (i, j) = self.state.swap_indices(denom_in, denom_out)?;
        let (reserve_in, reserve_out) = self.state.require_reserves(i, j)?;
        Ok(reserve_out as f64 / reserve_in as f64)
    }
}
