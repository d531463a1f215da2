// src/pricing/mod.rs
//! Pricing sources consulted by the tokens usecase.

pub mod chain;
pub mod coingecko;

pub use chain::ChainPricingSource;
pub use coingecko::CoingeckoPricingSource;

use crate::error::RouterError;
use crate::routing::context::RequestContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a pricing source. The numeric values are the ones accepted on
/// the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingSourceType {
    Chain,
    CoinGecko,
    None,
}

impl PricingSourceType {
    pub fn as_i32(self) -> i32 {
        match self {
            PricingSourceType::Chain => 0,
            PricingSourceType::CoinGecko => 1,
            PricingSourceType::None => -1,
        }
    }
}

impl TryFrom<i32> for PricingSourceType {
    type Error = RouterError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PricingSourceType::Chain),
            1 => Ok(PricingSourceType::CoinGecko),
            -1 => Ok(PricingSourceType::None),
            other => Err(RouterError::InvalidInput(format!("unknown pricing source type {}", other))),
        }
    }
}

impl fmt::Display for PricingSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingSourceType::Chain => write!(f, "chain"),
            PricingSourceType::CoinGecko => write!(f, "coingecko"),
            PricingSourceType::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PricingOptions {
    /// Bypass any cached price and recompute
    pub recompute_prices: bool,
}

#[async_trait]
pub trait PricingSource: Send + Sync {
    fn source_type(&self) -> PricingSourceType;

    /// Price of one whole `base` unit denominated in whole `quote` units.
    async fn get_price(
        &self,
        ctx: &RequestContext,
        base: &str,
        quote: &str,
        opts: &PricingOptions,
    ) -> Result<f64, RouterError>;

    /// Source to retry with when pricing against `quote` fails here.
    /// `PricingSourceType::None` disables the fallback.
    fn fallback_source(&self, quote: &str) -> PricingSourceType;
}
