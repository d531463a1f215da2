// src/routing/ranker.rs
//! Route quoting and concurrent ranking.
//!
//! Each hop pays the taker fee of its denomination pair before the pool is
//! quoted; the output of one hop is the input of the next. Ranking fans out
//! one task per candidate, bounded by the worker semaphore, and collects the
//! results over a channel while racing the request context.

use super::context::RequestContext;
use super::graph::PoolGraph;
use super::pathfinder::CandidateRoute;
use crate::error::RouterError;
use crate::fees::{deduct_fee, TakerFeeProvider};
use crate::metrics::RouterMetrics;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HopQuote {
    pub pool_id: u64,
    pub denom_in: String,
    pub denom_out: String,
    pub amount_in: u128,
    pub taker_fee: Decimal,
    pub amount_out: u128,
    pub spot_price: f64,
}

/// A candidate route quoted for one input amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRoute {
    pub route: CandidateRoute,
    pub amount_in: u128,
    pub amount_out: u128,
    /// Output units per input unit actually realized
    pub effective_price: f64,
    /// Product of the hop spot prices, fees excluded
    pub spot_price: f64,
    /// `1 - effective / spot`, fees and slippage together
    pub price_impact: f64,
    /// Compounded taker fee across hops: `1 - Π(1 - fee)`
    pub aggregate_taker_fee: Decimal,
    pub hops: Vec<HopQuote>,
    /// Position of the route in the candidate list it was ranked from
    #[serde(skip)]
    pub candidate_index: usize,
}

/// Deterministic ranking: output desc, hops asc, fee asc, candidate index asc.
pub fn compare_ranked(a: &RankedRoute, b: &RankedRoute) -> Ordering {
    b.amount_out
        .cmp(&a.amount_out)
        .then_with(|| a.route.len().cmp(&b.route.len()))
        .then_with(|| a.aggregate_taker_fee.cmp(&b.aggregate_taker_fee))
        .then_with(|| a.candidate_index.cmp(&b.candidate_index))
}

#[derive(Clone)]
pub struct RouteQuoter {
    taker_fees: Arc<dyn TakerFeeProvider>,
    metrics: Arc<RouterMetrics>,
    workers: Arc<Semaphore>,
}

impl RouteQuoter {
    pub fn new(taker_fees: Arc<dyn TakerFeeProvider>, metrics: Arc<RouterMetrics>, max_workers: usize) -> Self {
        Self {
            taker_fees,
            metrics,
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    pub fn taker_fees(&self) -> &Arc<dyn TakerFeeProvider> {
        &self.taker_fees
    }

    /// Quotes every hop in order. The first failing hop fails the whole route.
    pub fn quote_route(
        &self,
        graph: &PoolGraph,
        route: &CandidateRoute,
        amount_in: u128,
    ) -> Result<RankedRoute, RouterError> {
        if amount_in == 0 {
            return Err(RouterError::InvalidAmount("route input must be positive".to_string()));
        }
        if route.is_empty() {
            return Err(RouterError::InvalidInput("route has no hops".to_string()));
        }

        let label = route.to_string();
        let mut current = amount_in;
        let mut spot_price = 1.0_f64;
        let mut fee_kept = Decimal::ONE;
        let mut hops = Vec::with_capacity(route.len());

        for (idx, hop) in route.hops.iter().enumerate() {
            let fail = |e: RouterError| RouterError::route_failure(label.clone(), idx, e);

            let pool = graph.pool(hop.pool_id).map_err(fail)?;
            let taker_fee = self.taker_fees.get_fee(&hop.denom_in, &hop.denom_out);
            let after_fee = deduct_fee(current, taker_fee).map_err(fail)?;
            let amount_out = pool
                .calculate_token_out(&hop.denom_in, &hop.denom_out, after_fee)
                .map_err(fail)?;
            let hop_spot = pool.spot_price(&hop.denom_in, &hop.denom_out).map_err(fail)?;

            spot_price *= hop_spot;
            fee_kept *= Decimal::ONE - taker_fee;
            hops.push(HopQuote {
                pool_id: hop.pool_id,
                denom_in: hop.denom_in.clone(),
                denom_out: hop.denom_out.clone(),
                amount_in: current,
                taker_fee,
                amount_out,
                spot_price: hop_spot,
            });
            current = amount_out;
        }

        let effective_price = current as f64 / amount_in as f64;
        let price_impact = if spot_price > 0.0 {
            1.0 - effective_price / spot_price
        } else {
            0.0
        };

        Ok(RankedRoute {
            route: route.clone(),
            amount_in,
            amount_out: current,
            effective_price,
            spot_price,
            price_impact,
            aggregate_taker_fee: Decimal::ONE - fee_kept,
            hops,
            candidate_index: 0,
        })
    }

    /// Quotes all routes concurrently and returns the successful ones in rank
    /// order. Failed routes are logged, counted and dropped.
    pub async fn rank_routes(
        &self,
        ctx: &RequestContext,
        graph: Arc<PoolGraph>,
        routes: &[CandidateRoute],
        amount_in: u128,
    ) -> Result<Vec<RankedRoute>, RouterError> {
        ctx.check()?;
        if routes.is_empty() {
            return Ok(Vec::new());
        }

        let total = routes.len();
        let (tx, mut rx) = mpsc::channel::<(usize, Result<RankedRoute, RouterError>)>(total);

        for (idx, route) in routes.iter().enumerate() {
            let tx = tx.clone();
            let quoter = self.clone();
            let graph = graph.clone();
            let route = route.clone();
            tokio::spawn(async move {
                let result = match quoter.workers.clone().acquire_owned().await {
                    Ok(_permit) => quoter.quote_route(&graph, &route, amount_in),
                    Err(e) => Err(RouterError::Unknown(format!("ranking worker pool closed: {}", e))),
                };
                // receiver is gone when the request was cancelled
                let _ = tx.send((idx, result)).await;
            });
        }
        drop(tx);

        let metrics = self.metrics.clone();
        let collect = async move {
            let mut ranked = Vec::with_capacity(total);
            let mut received = 0;
            while received < total {
                let Some((idx, result)) = rx.recv().await else {
                    break;
                };
                received += 1;
                match result {
                    Ok(mut route) => {
                        route.candidate_index = idx;
                        ranked.push(route);
                    }
                    Err(e) => {
                        warn!("Discarding candidate route {}: {}", idx, e);
                        metrics.increment_route_ranking_errors();
                    }
                }
            }
            ranked
        };

        let mut ranked = tokio::select! {
            ranked = collect => ranked,
            reason = ctx.done() => {
                debug!("Ranking of {} routes abandoned: {}", total, reason);
                return Err(reason);
            }
        };

        ranked.sort_by(compare_ranked);
        debug!("Ranked {}/{} candidate routes for input {}", ranked.len(), total, amount_in);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::InMemoryTakerFees;
    use crate::pools::{build_pools, PoolBalance, PoolParams, PoolRecord, PoolType};
    use crate::routing::pathfinder::{CandidateRouteFinder, RouteHop};
    use assert_approx_eq::assert_approx_eq;
    use rust_decimal_macros::dec;
    use std::time::Duration;

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

    fn quoter(fees: InMemoryTakerFees) -> RouteQuoter {
        RouteQuoter::new(Arc::new(fees), Arc::new(RouterMetrics::new()), 4)
    }

    fn hop(pool_id: u64, denom_in: &str, denom_out: &str) -> RouteHop {
        RouteHop {
            pool_id,
            denom_in: denom_in.to_string(),
            denom_out: denom_out.to_string(),
        }
    }

    #[test]
    fn test_quote_route_applies_taker_fee_per_hop() {
        let graph = PoolGraph::build(
            build_pools(&[
                record(1, &[("a", 1_000_000), ("b", 1_000_000)], 10),
                record(2, &[("b", 1_000_000), ("c", 1_000_000)], 10),
            ]),
            0,
            &[],
        )
        .unwrap();
        let fees = InMemoryTakerFees::new();
        fees.set_fee("b", "a", dec!(0.01));
        let q = quoter(fees);

        let route = CandidateRoute::new(vec![hop(1, "a", "b"), hop(2, "b", "c")]);
        let ranked = q.quote_route(&graph, &route, 10_000).unwrap();
        // hop 1: 9_900 after fee -> 1_000_000 * 9_900 / 1_009_900 = 9_802
        assert_eq!(ranked.hops[0].amount_out, 9_802);
        assert_eq!(ranked.hops[0].taker_fee, dec!(0.01));
        // hop 2: no fee -> 1_000_000 * 9_802 / 1_009_802 = 9_706
        assert_eq!(ranked.amount_out, 9_706);
        assert_eq!(ranked.aggregate_taker_fee, dec!(0.01));
        assert_approx_eq!(ranked.spot_price, 1.0, 1e-12);
        assert!(ranked.price_impact > 0.0);
        assert_approx_eq!(ranked.effective_price, 0.9706, 1e-12);
    }

    #[test]
    fn test_failing_hop_fails_route() {
        let graph = PoolGraph::build(build_pools(&[record(1, &[("a", 1_000), ("b", 1_000)], 10)]), 0, &[]).unwrap();
        let q = quoter(InMemoryTakerFees::new());
        let route = CandidateRoute::new(vec![hop(1, "a", "b"), hop(7, "b", "c")]);
        match q.quote_route(&graph, &route, 100) {
            Err(RouterError::RouteQuote { hop, source, .. }) => {
                assert_eq!(hop, 1);
                assert_eq!(*source, RouterError::PoolNotFound(7));
            }
            other => panic!("expected route failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rank_routes_orders_and_discards_failures() {
        let graph = Arc::new(
            PoolGraph::build(
                build_pools(&[
                    record(1, &[("a", 1_000_000), ("b", 1_000_000)], 30),
                    record(2, &[("a", 1_000_000), ("b", 3_000_000)], 20),
                    record(3, &[("a", 10), ("b", 10)], 10),
                ]),
                0,
                &[],
            )
            .unwrap(),
        );
        let metrics = Arc::new(RouterMetrics::new());
        let q = RouteQuoter::new(Arc::new(InMemoryTakerFees::new()), metrics.clone(), 2);
        let mut routes = CandidateRouteFinder::find_routes(&graph, "a", "b", 1, 10);
        assert_eq!(routes.len(), 3);
        routes.push(CandidateRoute::new(vec![hop(99, "a", "b")]));

        let ranked = q
            .rank_routes(&RequestContext::background(), graph.clone(), &routes, 1_000)
            .await
            .unwrap();
        let order: Vec<u64> = ranked.iter().map(|r| r.route.hops[0].pool_id).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(ranked[0].candidate_index, 1);
        assert_eq!(metrics.snapshot().route_ranking_errors, 1);
    }

    #[tokio::test]
    async fn test_ties_break_on_hops_then_index() {
        let graph = Arc::new(
            PoolGraph::build(
                build_pools(&[
                    record(1, &[("a", 1_000), ("b", 1_000)], 10),
                    record(2, &[("a", 1_000), ("b", 1_000)], 10),
                ]),
                0,
                &[],
            )
            .unwrap(),
        );
        let q = quoter(InMemoryTakerFees::new());
        let routes = vec![
            CandidateRoute::new(vec![hop(2, "a", "b")]),
            CandidateRoute::new(vec![hop(1, "a", "b")]),
        ];
        let ranked = q
            .rank_routes(&RequestContext::background(), graph, &routes, 10)
            .await
            .unwrap();
        assert_eq!(ranked[0].route.hops[0].pool_id, 2);
        assert_eq!(ranked[1].route.hops[0].pool_id, 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_aborts_ranking() {
        let graph = Arc::new(PoolGraph::build(build_pools(&[record(1, &[("a", 1_000), ("b", 1_000)], 10)]), 0, &[]).unwrap());
        let q = quoter(InMemoryTakerFees::new());
        let routes = CandidateRouteFinder::find_routes(&graph, "a", "b", 1, 10);

        let ctx = RequestContext::background();
        ctx.cancel();
        let result = q.rank_routes(&ctx, graph.clone(), &routes, 10).await;
        assert_eq!(result, Err(RouterError::Cancelled));

        let expired = RequestContext::with_timeout(Duration::from_millis(0));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(
            q.rank_routes(&expired, graph, &routes, 10).await,
            Err(RouterError::DeadlineExceeded(_))
        ));
    }
}
