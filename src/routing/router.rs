// src/routing/router.rs
//! Quote and price orchestration over the current pool graph snapshot.
//!
//! A quote request is validated against the snapshot, then resolved through
//! two caches: the ranked cache holds the order in which candidate routes
//! should be tried, the candidate cache holds the routes found by the graph
//! search. The ordered routes are re-quoted for the requested amount and the
//! best of them handed to the split optimizer.

use super::cache::{CacheOutcome, RouteCache, RouteCacheKey};
use super::context::RequestContext;
use super::graph::{GraphStats, PoolGraph};
use super::pathfinder::{CandidateRoute, CandidateRouteFinder};
use super::ranker::{RankedRoute, RouteQuoter};
use super::splitter::{SplitQuote, SplitQuoteOptimizer};
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::fees::TakerFeeProvider;
use crate::metrics::RouterMetrics;
use crate::pools::{build_pools, PoolRecord};
use crate::tokens::TokenRegistry;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

type RouteList = Arc<Vec<CandidateRoute>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuoteResult {
    Found(SplitQuote),
    /// Both denominations are routable but no candidate route could be quoted
    NoQuoteAvailable,
}

impl QuoteResult {
    pub fn split(&self) -> Option<&SplitQuote> {
        match self {
            QuoteResult::Found(split) => Some(split),
            QuoteResult::NoQuoteAvailable => None,
        }
    }
}

pub struct Router {
    config: RouterConfig,
    fingerprint: u64,
    graph: RwLock<Arc<PoolGraph>>,
    finder: CandidateRouteFinder,
    quoter: RouteQuoter,
    optimizer: SplitQuoteOptimizer,
    tokens: Arc<TokenRegistry>,
    candidate_cache: Arc<RouteCache<RouteList>>,
    ranked_cache: Arc<RouteCache<RouteList>>,
    metrics: Arc<RouterMetrics>,
}

impl Router {
    pub fn new(
        config: RouterConfig,
        records: &[PoolRecord],
        taker_fees: Arc<dyn TakerFeeProvider>,
        tokens: Arc<TokenRegistry>,
        metrics: Arc<RouterMetrics>,
    ) -> Result<Self, RouterError> {
        config.validate()?;
        let graph = PoolGraph::build(
            build_pools(records),
            config.min_pool_liquidity_cap,
            &config.preferred_pool_ids,
        )?;

        let candidate_cache = Arc::new(RouteCache::new(
            "candidate",
            config.candidate_ttl(),
            config.route_cache_enabled,
        ));
        let ranked_cache = Arc::new(RouteCache::new(
            "ranked",
            config.ranked_ttl(),
            config.route_cache_enabled,
        ));

        info!(
            "Router ready: max {} pools/route, {} routes, {} split routes, cache {}",
            config.max_pools_per_route,
            config.max_routes,
            config.max_split_routes,
            if config.route_cache_enabled { "on" } else { "off" }
        );

        Ok(Self {
            fingerprint: config.fingerprint(),
            graph: RwLock::new(Arc::new(graph)),
            finder: CandidateRouteFinder::new(config.max_pools_per_route, config.max_routes),
            quoter: RouteQuoter::new(taker_fees, metrics.clone(), config.max_ranking_workers),
            optimizer: SplitQuoteOptimizer::new(config.split_increments, config.split_max_iterations),
            tokens,
            candidate_cache,
            ranked_cache,
            metrics,
            config,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<RouterMetrics> {
        &self.metrics
    }

    pub fn tokens(&self) -> &Arc<TokenRegistry> {
        &self.tokens
    }

    /// The graph snapshot new requests will route over.
    pub async fn snapshot(&self) -> Arc<PoolGraph> {
        self.graph.read().await.clone()
    }

    pub fn candidate_cache_len(&self) -> usize {
        self.candidate_cache.len()
    }

    pub fn ranked_cache_len(&self) -> usize {
        self.ranked_cache.len()
    }

    /// Replaces the pool snapshot. Requests already in flight finish on the
    /// snapshot they started with; cached routes referring to pools that are
    /// gone fail to quote and are skipped.
    pub async fn update_pools(&self, records: &[PoolRecord]) -> Result<GraphStats, RouterError> {
        let graph = PoolGraph::build(
            build_pools(records),
            self.config.min_pool_liquidity_cap,
            &self.config.preferred_pool_ids,
        )?;
        let stats = graph.stats().clone();
        *self.graph.write().await = Arc::new(graph);
        info!("Pool snapshot replaced: {} pools", stats.pool_count);
        Ok(stats)
    }

    /// Purges expired entries from both caches every `interval`.
    pub fn spawn_cache_cleanup(&self, interval: Duration) -> Vec<JoinHandle<()>> {
        vec![
            self.candidate_cache.spawn_cleanup_task(interval),
            self.ranked_cache.spawn_cleanup_task(interval),
        ]
    }

    fn validate_request(graph: &PoolGraph, base: &str, quote: &str, amount_in: u128) -> Result<(), RouterError> {
        if amount_in == 0 {
            return Err(RouterError::InvalidAmount("amount in must be positive".to_string()));
        }
        if base.is_empty() || quote.is_empty() {
            return Err(RouterError::InvalidInput("denominations must not be empty".to_string()));
        }
        if base == quote {
            return Err(RouterError::InvalidInput(format!("base and quote are both {}", base)));
        }
        graph.ensure_routable(base)?;
        graph.ensure_routable(quote)?;
        Ok(())
    }

    /// Best split quote for swapping `amount_in` of `base` into `quote`.
    pub async fn quote(
        &self,
        ctx: &RequestContext,
        base: &str,
        quote: &str,
        amount_in: u128,
    ) -> Result<QuoteResult, RouterError> {
        let ctx = ctx.child_with_timeout(self.config.quote_timeout());
        let graph = self.snapshot().await;
        Self::validate_request(&graph, base, quote, amount_in)?;

        let ranked = self
            .rank_for_amount(&ctx, &graph, base, quote, amount_in, self.config.max_split_routes)
            .await?;
        if ranked.is_empty() {
            debug!("No quote available for {} {} -> {}", amount_in, base, quote);
            self.metrics.increment_no_quote_available();
            return Ok(QuoteResult::NoQuoteAvailable);
        }

        ctx.check()?;
        let split = self
            .optimizer
            .optimize(&graph, &self.quoter, &ranked, amount_in, self.config.max_split_routes)?;
        self.metrics.increment_quotes_served();
        Ok(QuoteResult::Found(split))
    }

    /// Every candidate route quoted for `amount_in`, best first. Routes that
    /// fail at this amount are left out.
    pub async fn ranked_routes(
        &self,
        ctx: &RequestContext,
        base: &str,
        quote: &str,
        amount_in: u128,
    ) -> Result<Vec<RankedRoute>, RouterError> {
        let ctx = ctx.child_with_timeout(self.config.quote_timeout());
        let graph = self.snapshot().await;
        Self::validate_request(&graph, base, quote, amount_in)?;
        self.rank_for_amount(&ctx, &graph, base, quote, amount_in, usize::MAX)
            .await
    }

    /// Price of one whole `base` unit in whole `quote` units, derived from a
    /// real quote and the token precisions.
    pub async fn price(&self, ctx: &RequestContext, base: &str, quote: &str) -> Result<f64, RouterError> {
        if base == quote {
            return Ok(1.0);
        }
        let base_factor = self.tokens.chain_scaling_factor(base)?;
        let quote_factor = self.tokens.chain_scaling_factor(quote)?;

        match self.quote(ctx, base, quote, base_factor).await? {
            QuoteResult::Found(split) => Ok(split.amount_out as f64 / quote_factor as f64),
            QuoteResult::NoQuoteAvailable => Err(RouterError::NoRoute(format!("{} -> {}", base, quote))),
        }
    }

    async fn rank_for_amount(
        &self,
        ctx: &RequestContext,
        graph: &Arc<PoolGraph>,
        base: &str,
        quote: &str,
        amount_in: u128,
        limit: usize,
    ) -> Result<Vec<RankedRoute>, RouterError> {
        let key = RouteCacheKey::new(base, quote, self.fingerprint);
        let ordered = self.ordered_routes(ctx, graph, &key, amount_in).await?;

        // the cached order was ranked at some other amount, so every route is
        // quoted again before the best ones are picked
        let mut ranked = self
            .quoter
            .rank_routes(ctx, graph.clone(), &ordered, amount_in)
            .await?;
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Candidate routes in the order they should be tried. Routes that failed
    /// to quote when the order was computed come last, in search order.
    async fn ordered_routes(
        &self,
        ctx: &RequestContext,
        graph: &Arc<PoolGraph>,
        key: &RouteCacheKey,
        amount_in: u128,
    ) -> Result<RouteList, RouterError> {
        let router = self;
        let (ordered, outcome) = self
            .ranked_cache
            .get_or_compute(ctx, key, move || async move {
                router.metrics.increment_ranked_route_computations();
                let candidates = router.candidate_routes(ctx, graph, key).await?;
                let ranked = router
                    .quoter
                    .rank_routes(ctx, graph.clone(), &candidates, amount_in)
                    .await?;

                let succeeded: HashSet<usize> = ranked.iter().map(|r| r.candidate_index).collect();
                let mut order: Vec<CandidateRoute> = ranked.into_iter().map(|r| r.route).collect();
                order.extend(
                    candidates
                        .iter()
                        .enumerate()
                        .filter(|(idx, _)| !succeeded.contains(idx))
                        .map(|(_, route)| route.clone()),
                );
                Ok::<_, RouterError>(Arc::new(order))
            })
            .await?;
        self.metrics.record_ranked_cache(outcome == CacheOutcome::Hit);
        Ok(ordered)
    }

    async fn candidate_routes(
        &self,
        ctx: &RequestContext,
        graph: &PoolGraph,
        key: &RouteCacheKey,
    ) -> Result<RouteList, RouterError> {
        let metrics = &self.metrics;
        let finder = self.finder;
        let (routes, outcome) = self
            .candidate_cache
            .get_or_compute(ctx, key, move || async move {
                metrics.increment_candidate_route_computations();
                let routes = finder.find(graph, &key.base, &key.quote);
                if routes.is_empty() {
                    warn!("No candidate routes between {} and {}", key.base, key.quote);
                }
                Ok::<_, RouterError>(Arc::new(routes))
            })
            .await?;
        self.metrics.record_candidate_cache(outcome == CacheOutcome::Hit);
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::InMemoryTakerFees;
    use crate::pools::test_support::cp_record;
    use pretty_assertions::assert_eq;

    fn router_with(config: RouterConfig, records: &[PoolRecord]) -> Router {
        Router::new(
            config,
            records,
            Arc::new(InMemoryTakerFees::new()),
            Arc::new(crate::tokens::test_support::registry()),
            Arc::new(RouterMetrics::new()),
        )
        .unwrap()
    }

    fn records() -> Vec<PoolRecord> {
        vec![
            cp_record(1, &[("uusdc", 1_000_000_000), ("uosmo", 2_000_000_000)], 500),
            cp_record(2, &[("uusdc", 1_000_000_000), ("uatom", 100_000_000)], 400),
            cp_record(3, &[("uatom", 100_000_000), ("uosmo", 2_000_000_000)], 300),
        ]
    }

    #[tokio::test]
    async fn test_invalid_requests_touch_no_cache() {
        let router = router_with(RouterConfig::default(), &records());
        let ctx = RequestContext::background();

        assert!(matches!(
            router.quote(&ctx, "uusdc", "uosmo", 0).await,
            Err(RouterError::InvalidAmount(_))
        ));
        assert!(matches!(
            router.quote(&ctx, "uusdc", "uusdc", 10).await,
            Err(RouterError::InvalidInput(_))
        ));
        let unknown = router.quote(&ctx, "udoge", "uosmo", 10).await.unwrap_err();
        assert!(unknown.is_input_error());

        assert_eq!(router.candidate_cache_len(), 0);
        assert_eq!(router.ranked_cache_len(), 0);
        assert_eq!(router.metrics().snapshot().candidate_route_computations, 0);
    }

    #[tokio::test]
    async fn test_repeat_quote_uses_caches() {
        let router = router_with(RouterConfig::default(), &records());
        let ctx = RequestContext::background();

        let first = router.quote(&ctx, "uusdc", "uosmo", 1_000_000).await.unwrap();
        let second = router.quote(&ctx, "uusdc", "uosmo", 1_000_000).await.unwrap();
        assert_eq!(first, second);

        let snapshot = router.metrics().snapshot();
        assert_eq!(snapshot.candidate_route_computations, 1);
        assert_eq!(snapshot.ranked_route_computations, 1);
        assert_eq!(snapshot.ranked_cache_hits, 1);
        assert_eq!(snapshot.quotes_served, 2);
        assert_eq!(router.candidate_cache_len(), 1);
        assert_eq!(router.ranked_cache_len(), 1);
    }

    #[tokio::test]
    async fn test_order_cached_at_small_amount_does_not_limit_large_quote() {
        let pools = [
            cp_record(1, &[("uusdc", 1_000_000_000_000), ("uosmo", 1_000_000_000_000)], 10),
            cp_record(2, &[("uusdc", 1_000), ("uosmo", 2_000)], 20),
        ];
        let single = RouterConfig {
            max_split_routes: 1,
            ..RouterConfig::default()
        };
        let cached = router_with(single.clone(), &pools);
        let uncached = router_with(
            RouterConfig {
                route_cache_enabled: false,
                ..single
            },
            &pools,
        );
        let ctx = RequestContext::background();

        // at 10 units the shallow pool pays more and leads the cached order
        let small = cached.quote(&ctx, "uusdc", "uosmo", 10).await.unwrap();
        assert_eq!(small.split().unwrap().routes[0].quote.route.pool_ids(), vec![2]);

        let warm = cached.quote(&ctx, "uusdc", "uosmo", 1_000_000).await.unwrap();
        let cold = uncached.quote(&ctx, "uusdc", "uosmo", 1_000_000).await.unwrap();
        assert_eq!(cached.metrics().snapshot().ranked_cache_hits, 1);
        assert_eq!(warm, cold);

        let split = warm.split().unwrap();
        assert_eq!(split.amount_out, 999_999);
        assert_eq!(split.routes[0].quote.route.pool_ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_disconnected_pair_has_no_quote() {
        let router = router_with(
            RouterConfig::default(),
            &[
                cp_record(1, &[("uusdc", 1_000), ("uosmo", 1_000)], 10),
                cp_record(2, &[("uatom", 1_000), ("aevmos", 1_000)], 10),
            ],
        );
        let result = router
            .quote(&RequestContext::background(), "uusdc", "uatom", 100)
            .await
            .unwrap();
        assert_eq!(result, QuoteResult::NoQuoteAvailable);
        assert_eq!(router.metrics().snapshot().no_quote_available, 1);
    }

    #[tokio::test]
    async fn test_update_pools_swaps_snapshot() {
        let router = router_with(RouterConfig::default(), &records());
        let ctx = RequestContext::background();
        router.quote(&ctx, "uusdc", "uosmo", 1_000).await.unwrap();

        // pool 1 disappears, cached routes through it are skipped
        let stats = router.update_pools(&records()[1..]).await.unwrap();
        assert_eq!(stats.pool_count, 2);
        let split = router
            .quote(&ctx, "uusdc", "uosmo", 1_000)
            .await
            .unwrap()
            .split()
            .cloned()
            .unwrap();
        assert!(split.routes.iter().all(|r| r.quote.route.pool_ids() == vec![2, 3]));
        assert!(router.metrics().snapshot().route_ranking_errors >= 1);
    }

    #[tokio::test]
    async fn test_price_uses_token_precision() {
        let router = router_with(
            RouterConfig::default(),
            &[cp_record(1, &[("uusdc", 1_000_000_000_000), ("uosmo", 2_000_000_000_000)], 10)],
        );
        let price = router
            .price(&RequestContext::background(), "uusdc", "uosmo")
            .await
            .unwrap();
        // one USDC buys slightly under two OSMO on a deep pool
        assert!(price < 2.0 && price > 1.99, "price {}", price);
        assert_eq!(router.price(&RequestContext::background(), "uosmo", "uosmo").await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_not_cached() {
        let router = router_with(RouterConfig::default(), &records());
        let ctx = RequestContext::background();
        ctx.cancel();
        assert_eq!(
            router.quote(&ctx, "uusdc", "uosmo", 1_000).await,
            Err(RouterError::Cancelled)
        );
        assert_eq!(router.ranked_cache_len(), 0);
    }

    #[test]
    fn test_quote_result_serializes_with_status() {
        let json = serde_json::to_value(QuoteResult::NoQuoteAvailable).unwrap();
        assert_eq!(json, serde_json::json!({"status": "no_quote_available"}));
    }
}
