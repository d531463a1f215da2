// src/pricing/coingecko.rs
//! CoinGecko simple-price source.

use super::{PricingOptions, PricingSource, PricingSourceType};
use crate::error::RouterError;
use crate::routing::context::RequestContext;
use crate::tokens::TokenRegistry;
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub struct CoingeckoPricingSource {
    client: reqwest::Client,
    endpoint: url::Url,
    vs_currency: String,
    registry: Arc<TokenRegistry>,
}

impl CoingeckoPricingSource {
    pub fn new(endpoint: &str, vs_currency: &str, registry: Arc<TokenRegistry>) -> Result<Self, RouterError> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| RouterError::Config(format!("invalid coingecko url {}: {}", endpoint, e)))?;
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint,
            vs_currency: vs_currency.to_lowercase(),
            registry,
        })
    }

    fn coingecko_id(&self, denom: &str) -> Result<String, RouterError> {
        let id = self.registry.coingecko_id(denom)?;
        if id.is_empty() {
            return Err(RouterError::Pricing(format!("no coingecko id for {}", denom)));
        }
        Ok(id)
    }

    async fn fetch(&self, ids: &[&str]) -> Result<Value, RouterError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("ids", &ids.join(","))
            .append_pair("vs_currencies", &self.vs_currency);
        debug!("Fetching coingecko prices: {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

/// Extracts `body[id][vs_currency]` for both ids and returns base over quote.
pub fn ratio_from_simple_price(body: &Value, base_id: &str, quote_id: &str, vs_currency: &str) -> Result<f64, RouterError> {
    let lookup = |id: &str| {
        body.get(id)
            .and_then(|entry| entry.get(vs_currency))
            .and_then(Value::as_f64)
            .ok_or_else(|| RouterError::Pricing(format!("coingecko response has no {} price for {}", vs_currency, id)))
    };
    let base = lookup(base_id)?;
    let quote = lookup(quote_id)?;
    if quote == 0.0 {
        return Err(RouterError::Pricing(format!("coingecko price of {} is zero", quote_id)));
    }
    Ok(base / quote)
}

#[async_trait]
impl PricingSource for CoingeckoPricingSource {
    fn source_type(&self) -> PricingSourceType {
        PricingSourceType::CoinGecko
    }

    async fn get_price(
        &self,
        ctx: &RequestContext,
        base: &str,
        quote: &str,
        _opts: &PricingOptions,
    ) -> Result<f64, RouterError> {
        ctx.check()?;
        if base == quote {
            return Ok(1.0);
        }
        let base_id = self.coingecko_id(base)?;
        let quote_id = self.coingecko_id(quote)?;

        let ids = [base_id.as_str(), quote_id.as_str()];
        let body = tokio::select! {
            body = self.fetch(&ids) => body?,
            reason = ctx.done() => return Err(reason),
        };
        ratio_from_simple_price(&body, &base_id, &quote_id, &self.vs_currency)
    }

    fn fallback_source(&self, _quote: &str) -> PricingSourceType {
        PricingSourceType::None
    }
}
