// src/pricing/chain.rs
//! Prices computed by quoting through the router.

use super::{PricingOptions, PricingSource, PricingSourceType};
use crate::error::RouterError;
use crate::routing::context::RequestContext;
use crate::routing::router::Router;
use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct ChainPricingSource {
    router: Arc<Router>,
    cache: DashMap<(String, String), (f64, Instant)>,
    ttl: Duration,
    coingecko_fallback_quotes: HashSet<String>,
}

impl ChainPricingSource {
    pub fn new(router: Arc<Router>, ttl: Duration, coingecko_fallback_quotes: &[String]) -> Self {
        Self {
            router,
            cache: DashMap::new(),
            ttl,
            coingecko_fallback_quotes: coingecko_fallback_quotes.iter().cloned().collect(),
        }
    }

    fn cached(&self, base: &str, quote: &str) -> Option<f64> {
        let entry = self.cache.get(&(base.to_string(), quote.to_string()))?;
        let (price, stored_at) = *entry;
        if stored_at.elapsed() < self.ttl {
            Some(price)
        } else {
            None
        }
    }
}

#[async_trait]
impl PricingSource for ChainPricingSource {
    fn source_type(&self) -> PricingSourceType {
        PricingSourceType::Chain
    }

    async fn get_price(
        &self,
        ctx: &RequestContext,
        base: &str,
        quote: &str,
        opts: &PricingOptions,
    ) -> Result<f64, RouterError> {
        if !opts.recompute_prices {
            if let Some(price) = self.cached(base, quote) {
                debug!("Chain price cache hit for {}/{}", base, quote);
                return Ok(price);
            }
        }

        let price = self.router.price(ctx, base, quote).await?;
        self.cache
            .insert((base.to_string(), quote.to_string()), (price, Instant::now()));
        Ok(price)
    }

    fn fallback_source(&self, quote: &str) -> PricingSourceType {
        if self.coingecko_fallback_quotes.contains(quote) {
            PricingSourceType::CoinGecko
        } else {
            PricingSourceType::None
        }
    }
}
