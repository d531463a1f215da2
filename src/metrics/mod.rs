// src/metrics/mod.rs
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the router counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub candidate_route_computations: u64,
    pub ranked_route_computations: u64,
    pub candidate_cache_hits: u64,
    pub candidate_cache_misses: u64,
    pub ranked_cache_hits: u64,
    pub ranked_cache_misses: u64,
    pub route_ranking_errors: u64,
    pub quotes_served: u64,
    pub no_quote_available: u64,
    pub pricing_errors: u64,
    pub pricing_fallbacks: u64,
}

/// Side-effect-only counters. Nothing in the router reads them back to make
/// a decision.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    // Atomic counters for thread-safe incrementing
    candidate_route_computations: AtomicU64,
    ranked_route_computations: AtomicU64,
    candidate_cache_hits: AtomicU64,
    candidate_cache_misses: AtomicU64,
    ranked_cache_hits: AtomicU64,
    ranked_cache_misses: AtomicU64,
    route_ranking_errors: AtomicU64,
    quotes_served: AtomicU64,
    no_quote_available: AtomicU64,
    pricing_errors: AtomicU64,
    pricing_fallbacks: AtomicU64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter of candidate route searches over the pool graph.
    pub fn increment_candidate_route_computations(&self) {
        self.candidate_route_computations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_ranked_route_computations(&self) {
        self.ranked_route_computations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_candidate_cache(&self, hit: bool) {
        if hit {
            self.candidate_cache_hits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.candidate_cache_misses.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_ranked_cache(&self, hit: bool) {
        if hit {
            self.ranked_cache_hits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.ranked_cache_misses.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Counts a single candidate route that failed to quote and was discarded.
    pub fn increment_route_ranking_errors(&self) {
        self.route_ranking_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_quotes_served(&self) {
        self.quotes_served.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_no_quote_available(&self) {
        self.no_quote_available.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_pricing_errors(&self) {
        self.pricing_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_pricing_fallbacks(&self) {
        self.pricing_fallbacks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            candidate_route_computations: self.candidate_route_computations.load(Ordering::SeqCst),
            ranked_route_computations: self.ranked_route_computations.load(Ordering::SeqCst),
            candidate_cache_hits: self.candidate_cache_hits.load(Ordering::SeqCst),
            candidate_cache_misses: self.candidate_cache_misses.load(Ordering::SeqCst),
            ranked_cache_hits: self.ranked_cache_hits.load(Ordering::SeqCst),
            ranked_cache_misses: self.ranked_cache_misses.load(Ordering::SeqCst),
            route_ranking_errors: self.route_ranking_errors.load(Ordering::SeqCst),
            quotes_served: self.quotes_served.load(Ordering::SeqCst),
            no_quote_available: self.no_quote_available.load(Ordering::SeqCst),
            pricing_errors: self.pricing_errors.load(Ordering::SeqCst),
            pricing_fallbacks: self.pricing_fallbacks.load(Ordering::SeqCst),
        }
    }

    /// Logs a summary of the counters at info level.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!("--- Router Metrics ---");
        info!(
            "Route searches: {} | Rankings: {}",
            s.candidate_route_computations, s.ranked_route_computations
        );
        info!(
            "Candidate cache hits/misses: {}/{} | Ranked cache hits/misses: {}/{}",
            s.candidate_cache_hits, s.candidate_cache_misses, s.ranked_cache_hits, s.ranked_cache_misses
        );
        info!(
            "Quotes served: {} | No quote: {} | Route errors: {}",
            s.quotes_served, s.no_quote_available, s.route_ranking_errors
        );
        info!("Pricing errors: {} | Pricing fallbacks: {}", s.pricing_errors, s.pricing_fallbacks);
    }
}
