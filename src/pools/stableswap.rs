// src/pools/stableswap.rs
//! StableSwap (Curve) pools.
//!
//! Balances are normalized by per-asset scaling factors, then the invariant
//! `A·n^n·Σx + D = A·D·n^n + D^(n+1) / (n^n·Πx)` is solved by Newton
//! iteration, first for `D` and then for the new output balance `y`.

use super::{PoolState, PoolType, RoutablePool};
use crate::error::RouterError;

const MAX_NEWTON_ITERATIONS: usize = 255;
const CONVERGENCE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct StableSwapPool {
    state: PoolState,
    amplification: u64,
    scaling_factors: Vec<u64>,
}

impl StableSwapPool {
    /// Empty `scaling_factors` means every asset has factor 1.
    pub fn new(state: PoolState, amplification: u64, scaling_factors: Vec<u64>) -> Result<Self, RouterError> {
        if amplification == 0 {
            return Err(RouterError::InvalidPoolState(format!(
                "stableswap pool {} has zero amplification",
                state.id
            )));
        }
        let scaling_factors = if scaling_factors.is_empty() {
            vec![1; state.balances.len()]
        } else {
            scaling_factors
        };
        if scaling_factors.len() != state.balances.len() || scaling_factors.contains(&0) {
            return Err(RouterError::InvalidPoolState(format!(
                "stableswap pool {} needs one non-zero scaling factor per asset",
                state.id
            )));
        }
        Ok(Self {
            state,
            amplification,
            scaling_factors,
        })
    }

    fn normalized_balances(&self) -> Result<Vec<f64>, RouterError> {
        let xp: Vec<f64> = self
            .state
            .balances
            .iter()
            .zip(&self.scaling_factors)
            .map(|(b, factor)| b.amount as f64 * *factor as f64)
            .collect();
        if xp.iter().any(|x| *x <= 0.0) {
            return Err(RouterError::InvalidPoolState(format!(
                "stableswap pool {} has an empty reserve",
                self.state.id
            )));
        }
        Ok(xp)
    }

    fn ann(&self) -> f64 {
        let n = self.state.balances.len() as f64;
        self.amplification as f64 * n.powi(self.state.balances.len() as i32)
    }

    fn compute_d(&self, xp: &[f64]) -> Result<f64, RouterError> {
        let n = xp.len() as f64;
        let sum: f64 = xp.iter().sum();
        let ann = self.ann();
        let mut d = sum;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let mut d_p = d;
            for x in xp {
                d_p = d_p * d / (x * n);
            }
            let d_prev = d;
            d = (ann * sum + d_p * n) * d / ((ann - 1.0) * d + (n + 1.0) * d_p);
            if (d - d_prev).abs() <= CONVERGENCE_EPSILON * d {
                return Ok(d);
            }
        }
        Err(RouterError::InvalidPoolState(format!(
            "stableswap pool {} invariant did not converge",
            self.state.id
        )))
    }

    /// New normalized balance of asset `j` once asset `i` holds `x_new`.
    fn compute_y(&self, xp: &[f64], i: usize, j: usize, x_new: f64, d: f64) -> Result<f64, RouterError> {
        let n = xp.len() as f64;
        let ann = self.ann();
        let mut c = d;
        let mut s = 0.0;
        for (k, x) in xp.iter().enumerate() {
            if k == j {
                continue;
            }
            let x_k = if k == i { x_new } else { *x };
            s += x_k;
            c = c * d / (x_k * n);
        }
        c = c * d / (ann * n);
        let b = s + d / ann;
        let mut y = d;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let y_prev = y;
            y = (y * y + c) / (2.0 * y + b - d);
            if (y - y_prev).abs() <= CONVERGENCE_EPSILON * y.max(1.0) {
                return Ok(y);
            }
        }
        Err(RouterError::InvalidPoolState(format!(
            "stableswap pool {} did not converge on output balance",
            self.state.id
        )))
    }

    /// Normalized output for a normalized input, no fees.
    fn swap_normalized(&self, xp: &[f64], i: usize, j: usize, dx: f64) -> Result<f64, RouterError> {
        let d = self.compute_d(xp)?;
        let y = self.compute_y(xp, i, j, xp[i] + dx, d)?;
        Ok((xp[j] - y).max(0.0))
    }
}

impl RoutablePool for StableSwapPool {
    fn state(&self) -> &PoolState {
        &self.state
    }

    fn pool_type(&self) -> PoolType {
        PoolType::StableSwap
    }

    fn calculate_token_out(&self, denom_in: &str, denom_out: &str, amount_in: u128) -> Result<u128, RouterError> {
        let (i, j) = self.state.swap_indices(denom_in, denom_out)?;
        let (_, reserve_out) = self.state.require_reserves(i, j)?;
        let after_spread = self.state.amount_after_spread(amount_in)?;
        if after_spread == 0 {
            return Ok(0);
        }
        let xp = self.normalized_balances()?;
        let dy = self.swap_normalized(&xp, i, j, after_spread as f64 * self.scaling_factors[i] as f64)?;
        let out = (dy / self.scaling_factors[j] as f64).floor();
        if !out.is_finite() || out >= reserve_out as f64 {
            return Err(RouterError::InsufficientLiquidity {
                pool_id: self.state.id,
                reason: format!("swap of {} {} drains {}", amount_in, denom_in, denom_out),
            });
        }
        Ok(out as u128)
    }

    fn spot_price(&self, denom_in: &str, denom_out: &str) -> Result<f64, RouterError> {
        let (i, j) = self.state.swap_indices(denom_in, denom_out)?;
        self.state.require_reserves(i, j)?;
        let xp = self.normalized_balances()?;
        // marginal rate from a trade of one millionth of the input reserve
        let dx = xp[i] * 1e-6;
        let dy = self.swap_normalized(&xp, i, j, dx)?;
        Ok((dy / dx) * self.scaling_factors[i] as f64 / self.scaling_factors[j] as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{new_routable_pool, PoolParams, PoolRecord};
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rust_decimal::Decimal;

    fn stable_record(id: u64, pairs: &[(&str, u128)], amplification: u64, scaling_factors: Vec<u64>) -> PoolRecord {
        PoolRecord {
            id,
            pool_type: PoolType::StableSwap,
            balances: balances(pairs),
            spread_factor: Decimal::ZERO,
            liquidity_cap: 0,
            params: PoolParams::StableSwap {
                amplification,
                scaling_factors,
            },
        }
    }

    #[test]
    fn test_balanced_pool_trades_near_parity() {
        let pool = new_routable_pool(&stable_record(
            1,
            &[("uusdc", 1_000_000_000), ("uusdt", 1_000_000_000)],
            100,
            vec![],
        ))
        .unwrap();
        let out = pool.calculate_token_out("uusdc", "uusdt", 1_000_000).unwrap();
        assert!(out <= 1_000_000);
        assert!(out > 999_000, "stable output too low: {}", out);
        assert_approx_eq!(pool.spot_price("uusdc", "uusdt").unwrap(), 1.0, 1e-4);
    }

    #[test]
    fn test_stable_curve_beats_constant_product_for_large_trades() {
        let stable = new_routable_pool(&stable_record(
            2,
            &[("uusdc", 1_000_000), ("uusdt", 1_000_000)],
            200,
            vec![],
        ))
        .unwrap();
        let cp = new_routable_pool(&cp_record(3, &[("uusdc", 1_000_000), ("uusdt", 1_000_000)], 0)).unwrap();
        let stable_out = stable.calculate_token_out("uusdc", "uusdt", 200_000).unwrap();
        let cp_out = cp.calculate_token_out("uusdc", "uusdt", 200_000).unwrap();
        assert!(stable_out > cp_out);
    }

    #[test]
    fn test_scaling_factors_normalize_precisions() {
        // 6-decimal asset against an 18-decimal asset, same value per whole unit
        let pool = new_routable_pool(&stable_record(
            4,
            &[("uusdc", 1_000_000_000_000), ("adai", 1_000_000_000_000_000_000_000_000)],
            100,
            vec![1_000_000_000_000, 1],
        ))
        .unwrap();
        let spot = pool.spot_price("uusdc", "adai").unwrap();
        assert_approx_eq!(spot / 1e12, 1.0, 1e-4);
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert!(new_routable_pool(&stable_record(5, &[("a", 1), ("b", 1)], 0, vec![])).is_err());
        assert!(new_routable_pool(&stable_record(6, &[("a", 1), ("b", 1)], 10, vec![1])).is_err());
        assert!(new_routable_pool(&stable_record(7, &[("a", 1), ("b", 1)], 10, vec![1, 0])).is_err());
    }

    #[test]
    fn test_drained_output_reserve_errors() {
        let pool = new_routable_pool(&stable_record(8, &[("a", 0), ("b", 1_000)], 10, vec![])).unwrap();
        assert!(matches!(
            pool.calculate_token_out("a", "b", 10),
            Err(RouterError::InsufficientLiquidity { pool_id: 8, .. })
        ));
    }
}
