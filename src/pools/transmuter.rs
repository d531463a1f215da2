// src/pools/transmuter.rs
//! Transmuter pools: 1:1 conversion between equivalent assets, bounded by
//! what the pool holds of the output asset.

use super::{PoolState, PoolType, RoutablePool};
use crate::error::RouterError;

#[derive(Debug, Clone)]
pub struct TransmuterPool {
    state: PoolState,
}

impl TransmuterPool {
    pub fn new(state: PoolState) -> Self {
        Self { state }
    }
}

impl RoutablePool for TransmuterPool {
    fn state(&self) -> &PoolState {
        &self.state
    }

    fn pool_type(&self) -> PoolType {
        PoolType::Transmuter
    }

    fn calculate_token_out(&self, denom_in: &str, denom_out: &str, amount_in: u128) -> Result<u128, RouterError> {
        let (_, j) = self.state.swap_indices(denom_in, denom_out)?;
        let out = self.state.amount_after_spread(amount_in)?;
        let reserve_out = self.state.balances[j].amount;
        if out > reserve_out {
            return Err(RouterError::InsufficientLiquidity {
                pool_id: self.state.id,
                reason: format!("requested {} {} but only {} held", out, denom_out, reserve_out),
            });
        }
        Ok(out)
    }

    fn spot_price(&self, denom_in: &str, denom_out: &str) -> Result<f64, RouterError> {
        self.state.swap_indices(denom_in, denom_out)?;
        Ok(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{new_routable_pool, PoolParams, PoolRecord};
    use super::*;
    use rust_decimal::Decimal;

    fn transmuter(id: u64, pairs: &[(&str, u128)]) -> PoolRecord {
        PoolRecord {
            id,
            pool_type: PoolType::Transmuter,
            balances: balances(pairs),
            spread_factor: Decimal::ZERO,
            liquidity_cap: 0,
            params: PoolParams::None,
        }
    }

    #[test]
    fn test_one_to_one_within_reserve() {
        let pool = new_routable_pool(&transmuter(1, &[("uusdc", 500), ("uusdc.axl", 1_000)])).unwrap();
        assert_eq!(pool.calculate_token_out("uusdc", "uusdc.axl", 1_000).unwrap(), 1_000);
        assert_eq!(pool.spot_price("uusdc.axl", "uusdc").unwrap(), 1.0);
    }

    #[test]
    fn test_output_bounded_by_reserve() {
        let pool = new_routable_pool(&transmuter(2, &[("uusdc", 500), ("uusdc.axl", 1_000)])).unwrap();
        assert!(matches!(
            pool.calculate_token_out("uusdc.axl", "uusdc", 501),
            Err(RouterError::InsufficientLiquidity { pool_id: 2, .. })
        ));
    }
}
