// src/routing/graph.rs
//! Pool graph: denomination -> ordered pool ids, built once per pool snapshot
//! and read-only while routes are searched.

use crate::error::RouterError;
use crate::pools::RoutablePool;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Graph statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub pool_count: usize,
    pub denom_count: usize,
    pub filtered_pool_count: usize,
    pub preferred_pool_count: usize,
}

#[derive(Debug, Clone)]
pub struct PoolGraph {
    pools: HashMap<u64, Arc<dyn RoutablePool>>,
    /// Per denomination: preferred first, then liquidity cap desc, then pool id asc
    adjacency: HashMap<String, Vec<u64>>,
    /// Every denomination seen in the snapshot, including filtered pools
    known_denoms: HashSet<String>,
    preferred: HashSet<u64>,
    stats: GraphStats,
}

impl PoolGraph {
    pub fn build(
        pools: Vec<Arc<dyn RoutablePool>>,
        min_liquidity_cap: u128,
        preferred_pool_ids: &[u64],
    ) -> Result<Self, RouterError> {
        if pools.is_empty() {
            return Err(RouterError::GraphConstruction("pool set is empty".to_string()));
        }

        let preferred: HashSet<u64> = preferred_pool_ids.iter().copied().collect();
        let mut kept: HashMap<u64, Arc<dyn RoutablePool>> = HashMap::with_capacity(pools.len());
        let mut known_denoms = HashSet::new();
        let mut filtered_pool_count = 0;

        for pool in pools {
            for denom in pool.denoms() {
                known_denoms.insert(denom);
            }
            let id = pool.id();
            if kept.contains_key(&id) {
                warn!("Duplicate pool id {} in snapshot, keeping the first record", id);
                continue;
            }
            if pool.liquidity_cap() < min_liquidity_cap && !preferred.contains(&id) {
                debug!(
                    "Filtering pool {}: liquidity cap {} below minimum {}",
                    id,
                    pool.liquidity_cap(),
                    min_liquidity_cap
                );
                filtered_pool_count += 1;
                continue;
            }
            kept.insert(id, pool);
        }

        let mut adjacency: HashMap<String, Vec<u64>> = HashMap::new();
        for (id, pool) in &kept {
            for balance in &pool.state().balances {
                if balance.amount == 0 {
                    continue;
                }
                adjacency.entry(balance.denom.clone()).or_default().push(*id);
            }
        }
        for ids in adjacency.values_mut() {
            ids.sort_by(|a, b| {
                let pa = preferred.contains(a);
                let pb = preferred.contains(b);
                pb.cmp(&pa)
                    .then_with(|| kept[b].liquidity_cap().cmp(&kept[a].liquidity_cap()))
                    .then_with(|| a.cmp(b))
            });
        }

        let stats = GraphStats {
            pool_count: kept.len(),
            denom_count: adjacency.len(),
            filtered_pool_count,
            preferred_pool_count: kept.keys().filter(|id| preferred.contains(id)).count(),
        };
        info!(
            "Pool graph built: {} pools across {} denominations ({} filtered below liquidity cap {})",
            stats.pool_count, stats.denom_count, stats.filtered_pool_count, min_liquidity_cap
        );

        Ok(Self {
            pools: kept,
            adjacency,
            known_denoms,
            preferred,
            stats,
        })
    }

    pub fn pool(&self, id: u64) -> Result<&Arc<dyn RoutablePool>, RouterError> {
        self.pools.get(&id).ok_or(RouterError::PoolNotFound(id))
    }

    /// Pools holding a non-zero balance of `denom`, in routing order.
    pub fn pools_for(&self, denom: &str) -> &[u64] {
        self.adjacency.get(denom).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when any pool in the snapshot holds `denom`, filtered or not.
    pub fn contains_denom(&self, denom: &str) -> bool {
        self.known_denoms.contains(denom)
    }

    /// Fails when `denom` is unknown, or known but not held by any kept pool.
    pub fn ensure_routable(&self, denom: &str) -> Result<(), RouterError> {
        if !self.contains_denom(denom) {
            return Err(RouterError::UnknownDenom(denom.to_string()));
        }
        if self.pools_for(denom).is_empty() {
            return Err(RouterError::GraphConstruction(format!(
                "no pool above the liquidity threshold holds {}",
                denom
            )));
        }
        Ok(())
    }

    pub fn is_preferred(&self, pool_id: u64) -> bool {
        self.preferred.contains(&pool_id)
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    pub fn pool_ids(&self) -> impl Iterator<Item = &u64> {
        self.pools.keys()
    }
}
