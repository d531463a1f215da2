// src/routing/pathfinder.rs
//! Candidate route search over the pool graph.
//!
//! Direct pools come first, then a depth-first walk in graph order. A path
//! never reuses a pool or revisits a denomination, and the walk is bounded by
//! the hop limit and the number of routes wanted.

use super::graph::PoolGraph;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A single step in a route
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteHop {
    pub pool_id: u64,
    pub denom_in: String,
    pub denom_out: String,
}

/// Ordered hops from base to quote. Never empty, never repeats a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateRoute {
    pub hops: Vec<RouteHop>,
}

impl CandidateRoute {
    pub fn new(hops: Vec<RouteHop>) -> Self {
        Self { hops }
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn pool_ids(&self) -> Vec<u64> {
        self.hops.iter().map(|h| h.pool_id).collect()
    }

    pub fn denom_in(&self) -> Option<&str> {
        self.hops.first().map(|h| h.denom_in.as_str())
    }

    pub fn denom_out(&self) -> Option<&str> {
        self.hops.last().map(|h| h.denom_out.as_str())
    }
}

impl fmt::Display for CandidateRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .hops
            .iter()
            .map(|h| format!("{}:{}->{}", h.pool_id, h.denom_in, h.denom_out))
            .join(" | ");
        write!(f, "{}", rendered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRouteFinder {
    pub max_hops: usize,
    pub max_routes: usize,
}

struct SearchState<'a> {
    graph: &'a PoolGraph,
    quote: &'a str,
    max_hops: usize,
    max_routes: usize,
    used_pools: HashSet<u64>,
    visited_denoms: HashSet<String>,
    path: Vec<RouteHop>,
    routes: Vec<CandidateRoute>,
    explored: usize,
}

impl CandidateRouteFinder {
    pub fn new(max_hops: usize, max_routes: usize) -> Self {
        Self { max_hops, max_routes }
    }

    pub fn find(&self, graph: &PoolGraph, base: &str, quote: &str) -> Vec<CandidateRoute> {
        Self::find_routes(graph, base, quote, self.max_hops, self.max_routes)
    }

    /// An empty result means no route exists within the limits.
    pub fn find_routes(
        graph: &PoolGraph,
        base: &str,
        quote: &str,
        max_hops: usize,
        max_routes: usize,
    ) -> Vec<CandidateRoute> {
        if base == quote || max_hops == 0 || max_routes == 0 {
            return Vec::new();
        }

        let mut routes = Vec::new();
        for &pool_id in graph.pools_for(base) {
            if routes.len() >= max_routes {
                return routes;
            }
            let holds_quote = graph
                .pool(pool_id)
                .map(|pool| pool.balance(quote).unwrap_or(0) > 0)
                .unwrap_or(false);
            if holds_quote {
                routes.push(CandidateRoute::new(vec![RouteHop {
                    pool_id,
                    denom_in: base.to_string(),
                    denom_out: quote.to_string(),
                }]));
            }
        }

        let mut state = SearchState {
            graph,
            quote,
            max_hops,
            max_routes,
            used_pools: HashSet::new(),
            visited_denoms: HashSet::from([base.to_string()]),
            path: Vec::with_capacity(max_hops),
            routes,
            explored: 0,
        };
        Self::dfs(&mut state, base);

        debug!(
            "Route search {} -> {}: {} routes, {} hops explored (max_hops={}, max_routes={})",
            base,
            quote,
            state.routes.len(),
            state.explored,
            max_hops,
            max_routes
        );
        state.routes
    }

    fn dfs(state: &mut SearchState<'_>, current: &str) {
        let graph = state.graph;
        for &pool_id in graph.pools_for(current) {
            if state.routes.len() >= state.max_routes {
                return;
            }
            if state.used_pools.contains(&pool_id) {
                continue;
            }
            let pool = match graph.pool(pool_id) {
                Ok(pool) => pool,
                Err(_) => continue,
            };

            for balance in &pool.state().balances {
                if state.routes.len() >= state.max_routes {
                    return;
                }
                let next = balance.denom.as_str();
                if balance.amount == 0 || next == current || state.visited_denoms.contains(next) {
                    continue;
                }
                state.explored += 1;
                state.path.push(RouteHop {
                    pool_id,
                    denom_in: current.to_string(),
                    denom_out: next.to_string(),
                });

                if next == state.quote {
                    // single hops were already emitted as direct routes
                    if state.path.len() > 1 {
                        state.routes.push(CandidateRoute::new(state.path.clone()));
                    }
                } else if state.path.len() < state.max_hops {
                    state.used_pools.insert(pool_id);
                    state.visited_denoms.insert(next.to_string());
                    Self::dfs(state, next);
                    state.visited_denoms.remove(next);
                    state.used_pools.remove(&pool_id);
                }

                state.path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::{build_pools, PoolBalance, PoolParams, PoolRecord, PoolType};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

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

    fn graph(records: &[PoolRecord]) -> PoolGraph {
        PoolGraph::build(build_pools(records), 0, &[]).unwrap()
    }

    fn assert_well_formed(routes: &[CandidateRoute], base: &str, quote: &str, max_hops: usize) {
        for route in routes {
            assert!(!route.is_empty());
            assert!(route.len() <= max_hops);
            assert_eq!(route.denom_in(), Some(base));
            assert_eq!(route.denom_out(), Some(quote));
            let unique: HashSet<u64> = route.pool_ids().into_iter().collect();
            assert_eq!(unique.len(), route.len(), "pool repeated in {}", route);
            for pair in route.hops.windows(2) {
                assert_eq!(pair[0].denom_out, pair[1].denom_in);
            }
        }
    }

    #[test]
    fn test_direct_routes_come_first() {
        let g = graph(&[
            record(1, &[("uusdc", 1_000), ("uatom", 1_000)], 10),
            record(2, &[("uatom", 1_000), ("uosmo", 1_000)], 10),
            record(3, &[("uusdc", 1_000), ("uosmo", 1_000)], 5),
        ]);
        let routes = CandidateRouteFinder::find_routes(&g, "uusdc", "uosmo", 3, 10);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].pool_ids(), vec![3]);
        assert_eq!(routes[1].pool_ids(), vec![1, 2]);
        assert_well_formed(&routes, "uusdc", "uosmo", 3);
    }

    #[test]
    fn test_hop_limit_is_respected() {
        let g = graph(&[
            record(1, &[("a", 1_000), ("b", 1_000)], 10),
            record(2, &[("b", 1_000), ("c", 1_000)], 10),
            record(3, &[("c", 1_000), ("d", 1_000)], 10),
        ]);
        assert!(CandidateRouteFinder::find_routes(&g, "a", "d", 2, 10).is_empty());
        let routes = CandidateRouteFinder::find_routes(&g, "a", "d", 3, 10);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].pool_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_max_routes_stops_search() {
        let g = graph(&[
            record(1, &[("a", 1_000), ("b", 1_000)], 40),
            record(2, &[("a", 1_000), ("b", 1_000)], 30),
            record(3, &[("a", 1_000), ("c", 1_000)], 20),
            record(4, &[("c", 1_000), ("b", 1_000)], 10),
        ]);
        let routes = CandidateRouteFinder::find_routes(&g, "a", "b", 3, 2);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].pool_ids(), vec![1]);
        assert_eq!(routes[1].pool_ids(), vec![2]);
    }

    #[test]
    fn test_denominations_are_not_revisited() {
        // a -> b -> a -> ... would otherwise be explored through the parallel pools
        let g = graph(&[
            record(1, &[("a", 1_000), ("b", 1_000)], 10),
            record(2, &[("b", 1_000), ("a", 1_000)], 10),
            record(3, &[("b", 1_000), ("c", 1_000)], 10),
        ]);
        let routes = CandidateRouteFinder::find_routes(&g, "a", "c", 4, 10);
        assert_eq!(routes.len(), 2);
        assert_well_formed(&routes, "a", "c", 4);
        assert!(routes.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_multi_asset_pools_expand_every_denom() {
        let g = graph(&[
            record(1, &[("a", 1_000), ("x", 1_000), ("y", 1_000)], 10),
            record(2, &[("y", 1_000), ("b", 1_000)], 10),
            record(3, &[("x", 1_000), ("b", 1_000)], 10),
        ]);
        let routes = CandidateRouteFinder::find_routes(&g, "a", "b", 2, 10);
        let pools: Vec<Vec<u64>> = routes.iter().map(|r| r.pool_ids()).collect();
        assert_eq!(pools, vec![vec![1, 3], vec![1, 2]]);
    }

    #[test]
    fn test_no_route_is_empty_not_error() {
        let g = graph(&[
            record(1, &[("a", 1_000), ("b", 1_000)], 10),
            record(2, &[("c", 1_000), ("d", 1_000)], 10),
        ]);
        assert!(CandidateRouteFinder::find_routes(&g, "a", "d", 4, 10).is_empty());
        assert!(CandidateRouteFinder::find_routes(&g, "a", "a", 4, 10).is_empty());
    }
}
