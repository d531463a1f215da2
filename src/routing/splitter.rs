// src/routing/splitter.rs
//! Split quote optimization.
//!
//! Starts with the whole input on the best route and greedily moves one
//! increment at a time from the route that loses the least to the route that
//! gains the most. The increment halves when no move helps, down to a single
//! unit. Moves only transfer input between routes, so the allocations always
//! sum to the requested total.

use super::graph::PoolGraph;
use super::ranker::{RankedRoute, RouteQuoter};
use crate::error::RouterError;
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRoute {
    pub allocation: u128,
    /// The route quoted for exactly `allocation`
    pub quote: RankedRoute,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitQuote {
    pub amount_in: u128,
    pub amount_out: u128,
    pub effective_price: f64,
    /// Spot price of the best route
    pub spot_price: f64,
    pub price_impact: f64,
    pub routes: Vec<SplitRoute>,
}

impl SplitQuote {
    pub fn allocated(&self) -> u128 {
        self.routes.iter().map(|r| r.allocation).sum()
    }
}

/// Split optimization configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitQuoteOptimizer {
    /// Initial increment is `total / increments`
    pub increments: u32,
    pub max_iterations: u32,
    /// Minimum aggregate output gain, in output units, for a move to be taken
    pub min_gain: u128,
}

impl Default for SplitQuoteOptimizer {
    fn default() -> Self {
        Self {
            increments: 10,
            max_iterations: 256,
            min_gain: 0,
        }
    }
}

struct Allocation<'a> {
    graph: &'a PoolGraph,
    quoter: &'a RouteQuoter,
    routes: &'a [RankedRoute],
    amounts: Vec<u128>,
    outputs: Vec<u128>,
}

impl<'a> Allocation<'a> {
    /// Output of route `i` for `amount`; `None` when the route cannot take it.
    fn output_at(&self, i: usize, amount: u128) -> Option<u128> {
        if amount == 0 {
            return Some(0);
        }
        self.quoter
            .quote_route(self.graph, &self.routes[i].route, amount)
            .ok()
            .map(|r| r.amount_out)
    }

    /// Best (donor, receiver, new donor output, new receiver output) move for `step`.
    fn best_move(&self, step: u128) -> Option<(usize, usize, u128, u128, u128)> {
        let n = self.routes.len();
        let gains: Vec<Option<(u128, u128)>> = (0..n)
            .map(|r| {
                let after = self.output_at(r, self.amounts[r].checked_add(step)?)?;
                Some((after.saturating_sub(self.outputs[r]), after))
            })
            .collect();
        let losses: Vec<Option<(u128, u128)>> = (0..n)
            .map(|d| {
                if self.amounts[d] < step {
                    return None;
                }
                let after = self.output_at(d, self.amounts[d] - step)?;
                Some((self.outputs[d].saturating_sub(after), after))
            })
            .collect();

        let mut best: Option<(usize, usize, u128, u128, u128)> = None;
        for (r, gain) in gains.iter().enumerate() {
            let Some((gain, receiver_out)) = gain else { continue };
            for (d, loss) in losses.iter().enumerate() {
                if d == r {
                    continue;
                }
                let Some((loss, donor_out)) = loss else { continue };
                if gain <= loss {
                    continue;
                }
                let net = gain - loss;
                if best.map_or(true, |(_, _, _, _, best_net)| net > best_net) {
                    best = Some((d, r, *donor_out, *receiver_out, net));
                }
            }
        }
        best
    }
}

impl SplitQuoteOptimizer {
    pub fn new(increments: u32, max_iterations: u32) -> Self {
        Self {
            increments: increments.max(1),
            max_iterations,
            ..Self::default()
        }
    }

    /// Distributes `total_in` across at most `max_split_routes` of `ranked`
    /// (already in rank order).
    pub fn optimize(
        &self,
        graph: &PoolGraph,
        quoter: &RouteQuoter,
        ranked: &[RankedRoute],
        total_in: u128,
        max_split_routes: usize,
    ) -> Result<SplitQuote, RouterError> {
        if total_in == 0 {
            return Err(RouterError::InvalidAmount("split input must be positive".to_string()));
        }
        if ranked.is_empty() || max_split_routes == 0 {
            return Err(RouterError::NoRoute("no ranked routes to split across".to_string()));
        }

        let top = &ranked[..ranked.len().min(max_split_routes)];
        let best = quoter.quote_route(graph, &top[0].route, total_in)?;
        let spot_price = best.spot_price;
        if top.len() == 1 {
            return Ok(Self::assemble(total_in, spot_price, vec![SplitRoute {
                allocation: total_in,
                quote: best,
            }]));
        }

        let mut state = Allocation {
            graph,
            quoter,
            routes: top,
            amounts: vec![0; top.len()],
            outputs: vec![0; top.len()],
        };
        state.amounts[0] = total_in;
        state.outputs[0] = best.amount_out;

        let mut step = (total_in / self.increments.max(1) as u128).max(1);
        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            match state.best_move(step) {
                Some((donor, receiver, donor_out, receiver_out, net)) if net > self.min_gain => {
                    state.amounts[donor] -= step;
                    state.amounts[receiver] += step;
                    state.outputs[donor] = donor_out;
                    state.outputs[receiver] = receiver_out;
                }
                _ if step > 1 => step = (step / 2).max(1),
                _ => break,
            }
        }
        debug!(
            "Split of {} across {} routes settled after {} iterations: {:?}",
            total_in,
            top.len(),
            iterations,
            state.amounts
        );

        let mut routes = Vec::with_capacity(top.len());
        for (i, amount) in state.amounts.iter().enumerate() {
            if *amount == 0 {
                continue;
            }
            let quote = quoter.quote_route(graph, &top[i].route, *amount)?;
            routes.push(SplitRoute {
                allocation: *amount,
                quote,
            });
        }
        Ok(Self::assemble(total_in, spot_price, routes))
    }

    fn assemble(total_in: u128, spot_price: f64, routes: Vec<SplitRoute>) -> SplitQuote {
        let amount_out: u128 = routes.iter().map(|r| r.quote.amount_out).sum();
        let effective_price = amount_out as f64 / total_in as f64;
        let price_impact = if spot_price > 0.0 {
            1.0 - effective_price / spot_price
        } else {
            0.0
        };
        SplitQuote {
            amount_in: total_in,
            amount_out,
            effective_price,
            spot_price,
            price_impact,
            routes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::InMemoryTakerFees;
    use crate::metrics::RouterMetrics;
    use crate::pools::{build_pools, PoolBalance, PoolParams, PoolRecord, PoolType};
    use crate::routing::pathfinder::CandidateRouteFinder;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn record(id: u64, pairs: &[(&str, u128)], cap: u128) -> PoolRecord {
        PoolRecord {
            id,
            pool_type: PoolType::ConstantProduct,
            balances: pairs
                .iter()
                .map(|(denom, amount)| PoolBalance {
                    denom: denom.to_string(),
                    amount: *amount,
                })
                .collect(),
            spread_factor: Decimal::ZERO,
            liquidity_cap: cap,
            params: PoolParams::None,
        }
    }

    fn setup(records: &[PoolRecord]) -> (PoolGraph, RouteQuoter) {
        let graph = PoolGraph::build(build_pools(records), 0, &[]).unwrap();
        let quoter = RouteQuoter::new(Arc::new(InMemoryTakerFees::new()), Arc::new(RouterMetrics::new()), 4);
        (graph, quoter)
    }

    fn ranked(graph: &PoolGraph, quoter: &RouteQuoter, amount: u128) -> Vec<RankedRoute> {
        let mut ranked: Vec<RankedRoute> = CandidateRouteFinder::find_routes(graph, "a", "b", 3, 10)
            .iter()
            .enumerate()
            .filter_map(|(i, route)| {
                let mut r = quoter.quote_route(graph, route, amount).ok()?;
                r.candidate_index = i;
                Some(r)
            })
            .collect();
        ranked.sort_by(crate::routing::ranker::compare_ranked);
        ranked
    }

    #[test]
    fn test_single_route_takes_everything() {
        let (graph, quoter) = setup(&[record(1, &[("a", 1_000_000), ("b", 1_000_000)], 10)]);
        let routes = ranked(&graph, &quoter, 50_000);
        let split = SplitQuoteOptimizer::default()
            .optimize(&graph, &quoter, &routes, 50_000, 3)
            .unwrap();
        assert_eq!(split.routes.len(), 1);
        assert_eq!(split.routes[0].allocation, 50_000);
        assert_eq!(split.amount_out, routes[0].amount_out);
    }

    #[test]
    fn test_identical_pools_split_evenly() {
        let (graph, quoter) = setup(&[
            record(1, &[("a", 1_000_000), ("b", 1_000_000)], 10),
            record(2, &[("a", 1_000_000), ("b", 1_000_000)], 10),
        ]);
        let total = 400_000;
        let routes = ranked(&graph, &quoter, total);
        let split = SplitQuoteOptimizer::default()
            .optimize(&graph, &quoter, &routes, total, 2)
            .unwrap();

        assert_eq!(split.allocated(), total);
        assert_eq!(split.routes.len(), 2);
        // integer rounding may leave the optimum a few units off centre
        for route in &split.routes {
            assert!(route.allocation.abs_diff(200_000) <= 10, "allocation {}", route.allocation);
        }
        // the split beats the single best route
        assert!(split.amount_out > routes[0].amount_out);
        assert!(split.routes.iter().all(|r| r.allocation > 0));
    }

    #[test]
    fn test_allocation_sum_is_exact_for_odd_totals() {
        let (graph, quoter) = setup(&[
            record(1, &[("a", 3_000_000), ("b", 2_000_000)], 10),
            record(2, &[("a", 1_000_000), ("b", 900_000)], 10),
            record(3, &[("a", 500_000), ("b", 450_000)], 10),
        ]);
        for total in [1u128, 7, 999_999, 1_234_567] {
            let routes = ranked(&graph, &quoter, total);
            let split = SplitQuoteOptimizer::new(7, 512)
                .optimize(&graph, &quoter, &routes, total, 3)
                .unwrap();
            assert_eq!(split.allocated(), total, "total {}", total);
            assert!(split.routes.iter().all(|r| r.allocation > 0));
            assert!(split.amount_out >= routes[0].amount_out);
        }
    }

    #[test]
    fn test_small_trade_stays_on_best_route() {
        let (graph, quoter) = setup(&[
            record(1, &[("a", 1_000_000_000), ("b", 1_000_000_000)], 10),
            record(2, &[("a", 1_000_000), ("b", 500_000)], 10),
        ]);
        let routes = ranked(&graph, &quoter, 1_000);
        let split = SplitQuoteOptimizer::default()
            .optimize(&graph, &quoter, &routes, 1_000, 2)
            .unwrap();
        assert_eq!(split.routes.len(), 1);
        assert_eq!(split.routes[0].quote.route.hops[0].pool_id, 1);
    }

    #[test]
    fn test_empty_ranking_is_no_route() {
        let (graph, quoter) = setup(&[record(1, &[("a", 1_000), ("b", 1_000)], 10)]);
        assert!(matches!(
            SplitQuoteOptimizer::default().optimize(&graph, &quoter, &[], 10, 3),
            Err(RouterError::NoRoute(_))
        ));
    }
}
