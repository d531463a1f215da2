// src/routing/mod.rs
//! Route discovery, ranking, split optimization and caching.
//!
//! - `graph`: denomination -> pool adjacency built once per pool snapshot
//! - `pathfinder`: bounded candidate route search
//! - `ranker`: per-route quoting with taker fees, concurrent ranking
//! - `splitter`: distributes an input across the top routes
//! - `cache`: per-key single-flight TTL cache
//! - `router`: request orchestration for quotes and prices

pub mod cache;
pub mod context;
pub mod graph;
pub mod pathfinder;
pub mod ranker;
pub mod router;
pub mod splitter;

pub use cache::{RouteCache, RouteCacheKey};
pub use context::RequestContext;
pub use graph::PoolGraph;
pub use pathfinder::{CandidateRoute, CandidateRouteFinder, RouteHop};
pub use ranker::{RankedRoute, RouteQuoter};
pub use router::{QuoteResult, Router};
pub use splitter::{SplitQuote, SplitQuoteOptimizer, SplitRoute};
