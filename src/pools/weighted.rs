// src/pools/weighted.rs
//! Custom-invariant pools using the weighted product `Π x_i^w_i = k`.

use super::{PoolState, PoolType, RoutablePool};
use crate::error::RouterError;

#[derive(Debug, Clone)]
pub struct WeightedPool {
    state: PoolState,
    weights: Vec<u64>,
}

impl WeightedPool {
    pub fn new(state: PoolState, weights: Vec<u64>) -> Result<Self, RouterError> {
        if weights.len() != state.balances.len() || weights.contains(&0) {
            return Err(RouterError::InvalidPoolState(format!(
                "weighted pool {} needs one non-zero weight per asset",
                state.id
            )));
        }
        Ok(Self { state, weights })
    }
}

impl RoutablePool for WeightedPool {
    fn state(&self) -> &PoolState {
        &self.state
    }

    fn pool_type(&self) -> PoolType {
        PoolType::CustomInvariant
    }

    fn calculate_token_out(&self, denom_in: &str, denom_out: &str, amount_in: u128) -> Result<u128, RouterError> {
        let (i, j) = self.state.swap_indices(denom_in, denom_out)?;
        let (reserve_in, reserve_out) = self.state.require_reserves(i, j)?;
        let after_spread = self.state.amount_after_spread(amount_in)?;
        if after_spread == 0 {
            return Ok(0);
        }

        // out = Ro * (1 - (Ri / (Ri + a)) ^ (wi / wo))
        let exponent = self.weights[i] as f64 / self.weights[j] as f64;
        let base = reserve_in as f64 / (reserve_in as f64 + after_spread as f64);
        let out = (reserve_out as f64 * (1.0 - base.powf(exponent))).floor();
        if !out.is_finite() || out < 0.0 || out >= reserve_out as f64 {
            return Err(RouterError::InsufficientLiquidity {
                pool_id: self.state.id,
                reason: format!("swap of {} {} drains {}", amount_in, denom_in, denom_out),
            });
        }
        Ok(out as u128)
    }

    fn spot_price(&self, denom_in: &str, denom_out: &str) -> Result<f64, RouterError> {
        let (i, j) = self.state.swap_indices(denom_in, denom_out)?;
        let (reserve_in, reserve_out) = self.state.require_reserves(i, j)?;
        let in_per_weight = reserve_in as f64 / self.weights[i] as f64;
        let out_per_weight = reserve_out as f64 / self.weights[j] as f64;
        Ok(out_per_weight / in_per_weight)
    }
}
