// src/tokens/usecase.rs
//! Token lookups plus fan-out pricing across the registered sources.

use super::TokenRegistry;
use crate::error::RouterError;
use crate::metrics::RouterMetrics;
use crate::pricing::{PricingOptions, PricingSource, PricingSourceType};
use crate::routing::context::RequestContext;
use dashmap::DashMap;
use futures::future::join_all;
use log::{error, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// base denom -> quote denom -> price
pub type PricesResult = HashMap<String, HashMap<String, f64>>;

type SourceMap = HashMap<PricingSourceType, Arc<dyn PricingSource>>;

pub struct TokensUsecase {
    registry: Arc<TokenRegistry>,
    sources: DashMap<PricingSourceType, Arc<dyn PricingSource>>,
    metrics: Arc<RouterMetrics>,
}

impl TokensUsecase {
    pub fn new(registry: Arc<TokenRegistry>, metrics: Arc<RouterMetrics>) -> Self {
        Self {
            registry,
            sources: DashMap::new(),
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    /// Registers `source` under its own type, replacing any previous one.
    pub fn register_pricing_source(&self, source: Arc<dyn PricingSource>) {
        self.sources.insert(source.source_type(), source);
    }

    pub fn is_valid_pricing_source(source: i32) -> bool {
        matches!(
            PricingSourceType::try_from(source),
            Ok(PricingSourceType::Chain) | Ok(PricingSourceType::CoinGecko)
        )
    }

    fn sources_snapshot(&self) -> SourceMap {
        self.sources
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Prices every base against every quote. A quote that cannot be priced,
    /// even through its fallback source, is reported as zero.
    pub async fn get_prices(
        &self,
        ctx: &RequestContext,
        base_denoms: &[String],
        quote_denoms: &[String],
        source: PricingSourceType,
        opts: PricingOptions,
    ) -> Result<PricesResult, RouterError> {
        let sources = Arc::new(self.sources_snapshot());
        let quotes = Arc::new(quote_denoms.to_vec());

        let handles: Vec<_> = base_denoms
            .iter()
            .map(|base| {
                tokio::spawn(prices_for_base(
                    ctx.clone(),
                    self.registry.clone(),
                    sources.clone(),
                    self.metrics.clone(),
                    base.clone(),
                    quotes.clone(),
                    source,
                    opts,
                ))
            })
            .collect();

        let mut prices = HashMap::with_capacity(base_denoms.len());
        for joined in join_all(handles).await {
            let (base, by_quote) =
                joined.map_err(|e| RouterError::Unknown(format!("pricing task failed: {}", e)))??;
            prices.insert(base, by_quote);
        }
        Ok(prices)
    }
}

#[allow(clippy::too_many_arguments)]
async fn prices_for_base(
    ctx: RequestContext,
    registry: Arc<TokenRegistry>,
    sources: Arc<SourceMap>,
    metrics: Arc<RouterMetrics>,
    base: String,
    quotes: Arc<Vec<String>>,
    source_type: PricingSourceType,
    opts: PricingOptions,
) -> Result<(String, HashMap<String, f64>), RouterError> {
    if registry.metadata(&base).is_err() {
        warn!("Pricing requested for unknown denom {}, returning zeros", base);
        let zeros = quotes.iter().map(|quote| (quote.clone(), 0.0)).collect();
        return Ok((base, zeros));
    }

    let source = sources
        .get(&source_type)
        .cloned()
        .ok_or_else(|| RouterError::PricingSourceNotFound(source_type.to_string()))?;

    let handles: Vec<_> = quotes
        .iter()
        .map(|quote| {
            let ctx = ctx.clone();
            let sources = sources.clone();
            let metrics = metrics.clone();
            let source = source.clone();
            let base = base.clone();
            let quote = quote.clone();
            tokio::spawn(async move {
                let mut result = source.get_price(&ctx, &base, &quote, &opts).await;
                if result.is_err() {
                    let fallback = source.fallback_source(&quote);
                    if fallback != PricingSourceType::None {
                        metrics.increment_pricing_fallbacks();
                        if let Some(fallback_source) = sources.get(&fallback) {
                            result = fallback_source.get_price(&ctx, &base, &quote, &opts).await;
                        }
                    }
                }
                result
            })
        })
        .collect();

    let mut by_quote = HashMap::with_capacity(quotes.len());
    for (quote, joined) in quotes.iter().zip(join_all(handles).await) {
        let price = match joined {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => {
                error!("Failed to price {} in {}: {}", base, quote, e);
                metrics.increment_pricing_errors();
                0.0
            }
            Err(e) => {
                error!("Pricing task for {} in {} failed: {}", base, quote, e);
                metrics.increment_pricing_errors();
                0.0
            }
        };
        by_quote.insert(quote.clone(), price);
    }
    Ok((base, by_quote))
}
