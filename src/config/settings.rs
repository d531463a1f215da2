// src/config/settings.rs
use crate::error::RouterError;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::env;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::Duration;

/// Router tuning knobs. Every field that changes which routes are produced
/// participates in [`RouterConfig::fingerprint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    pub preferred_pool_ids: Vec<u64>,
    pub max_pools_per_route: usize,
    pub max_routes: usize,
    pub max_split_routes: usize,
    pub min_pool_liquidity_cap: u128,
    pub route_cache_enabled: bool,
    pub candidate_route_cache_expiry_seconds: u64,
    pub ranked_route_cache_expiry_seconds: u64,
    pub max_ranking_workers: usize,
    pub split_increments: u32,
    pub split_max_iterations: u32,
    pub quote_timeout_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            preferred_pool_ids: Vec::new(),
            max_pools_per_route: 4,
            max_routes: 20,
            max_split_routes: 3,
            min_pool_liquidity_cap: 0,
            route_cache_enabled: true,
            candidate_route_cache_expiry_seconds: 600,
            ranked_route_cache_expiry_seconds: 45,
            max_ranking_workers: 16,
            split_increments: 10,
            split_max_iterations: 256,
            quote_timeout_ms: 5_000,
        }
    }
}

impl RouterConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, RouterError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: RouterConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RouterError> {
        if self.max_pools_per_route == 0 {
            return Err(RouterError::Config("max_pools_per_route must be at least 1".to_string()));
        }
        if self.max_routes == 0 {
            return Err(RouterError::Config("max_routes must be at least 1".to_string()));
        }
        if self.max_split_routes == 0 {
            return Err(RouterError::Config("max_split_routes must be at least 1".to_string()));
        }
        if self.max_ranking_workers == 0 {
            return Err(RouterError::Config("max_ranking_workers must be at least 1".to_string()));
        }
        if self.split_increments == 0 {
            return Err(RouterError::Config("split_increments must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn candidate_ttl(&self) -> Duration {
        Duration::from_secs(self.candidate_route_cache_expiry_seconds)
    }

    pub fn ranked_ttl(&self) -> Duration {
        Duration::from_secs(self.ranked_route_cache_expiry_seconds)
    }

    pub fn quote_timeout(&self) -> Option<Duration> {
        if self.quote_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.quote_timeout_ms))
        }
    }

    /// Stable hash of the settings that shape route discovery and ranking.
    /// Cache TTLs and worker counts are not part of it.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.preferred_pool_ids.hash(&mut hasher);
        self.max_pools_per_route.hash(&mut hasher);
        self.max_routes.hash(&mut hasher);
        self.max_split_routes.hash(&mut hasher);
        self.min_pool_liquidity_cap.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PricingConfig {
    pub coingecko_url: String,
    pub coingecko_vs_currency: String,
    pub chain_price_cache_expiry_seconds: u64,
    /// Quote denominations the chain source hands over to CoinGecko on failure
    pub coingecko_fallback_quotes: Vec<String>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            coingecko_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            coingecko_vs_currency: "usd".to_string(),
            chain_price_cache_expiry_seconds: 2,
            coingecko_fallback_quotes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub router: RouterConfig,
    pub pricing: PricingConfig,
    pub pools_file: String,
    pub tokens_file: Option<String>,
    pub taker_fees_file: Option<String>,
    pub chain_registry_url: Option<String>,
    pub router_config_file: Option<String>,
    pub log_level: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|s| {
        s.split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = RouterConfig::default();
        let pricing_defaults = PricingConfig::default();

        let router = RouterConfig {
            preferred_pool_ids: env_list("PREFERRED_POOL_IDS")
                .map(|ids| ids.iter().filter_map(|id| id.parse::<u64>().ok()).collect())
                .unwrap_or(defaults.preferred_pool_ids),
            max_pools_per_route: env_or("MAX_POOLS_PER_ROUTE", defaults.max_pools_per_route),
            max_routes: env_or("MAX_ROUTES", defaults.max_routes),
            max_split_routes: env_or("MAX_SPLIT_ROUTES", defaults.max_split_routes),
            min_pool_liquidity_cap: env_or("MIN_POOL_LIQUIDITY_CAP", defaults.min_pool_liquidity_cap),
            route_cache_enabled: env_or("ROUTE_CACHE_ENABLED", defaults.route_cache_enabled),
            candidate_route_cache_expiry_seconds: env_or(
                "CANDIDATE_ROUTE_CACHE_EXPIRY_SECONDS",
                defaults.candidate_route_cache_expiry_seconds,
            ),
            ranked_route_cache_expiry_seconds: env_or(
                "RANKED_ROUTE_CACHE_EXPIRY_SECONDS",
                defaults.ranked_route_cache_expiry_seconds,
            ),
            max_ranking_workers: env_or("MAX_RANKING_WORKERS", defaults.max_ranking_workers),
            split_increments: env_or("SPLIT_INCREMENTS", defaults.split_increments),
            split_max_iterations: env_or("SPLIT_MAX_ITERATIONS", defaults.split_max_iterations),
            quote_timeout_ms: env_or("QUOTE_TIMEOUT_MS", defaults.quote_timeout_ms),
        };

        let pricing = PricingConfig {
            coingecko_url: env::var("COINGECKO_URL").unwrap_or(pricing_defaults.coingecko_url),
            coingecko_vs_currency: env::var("COINGECKO_VS_CURRENCY")
                .unwrap_or(pricing_defaults.coingecko_vs_currency),
            chain_price_cache_expiry_seconds: env_or(
                "CHAIN_PRICE_CACHE_EXPIRY_SECONDS",
                pricing_defaults.chain_price_cache_expiry_seconds,
            ),
            coingecko_fallback_quotes: env_list("COINGECKO_FALLBACK_QUOTES")
                .unwrap_or(pricing_defaults.coingecko_fallback_quotes),
        };

        Config {
            router,
            pricing,
            pools_file: env::var("POOLS_FILE").unwrap_or_else(|_| "data/pools.json".to_string()),
            tokens_file: env::var("TOKENS_FILE").ok(),
            taker_fees_file: env::var("TAKER_FEES_FILE").ok(),
            chain_registry_url: env::var("CHAIN_REGISTRY_URL").ok(),
            router_config_file: env::var("ROUTER_CONFIG_FILE").ok(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), RouterError> {
        self.router.validate()?;
        if self.pools_file.is_empty() {
            return Err(RouterError::Config("POOLS_FILE cannot be empty".to_string()));
        }
        if let Some(registry) = &self.chain_registry_url {
            url::Url::parse(registry)
                .map_err(|e| RouterError::Config(format!("CHAIN_REGISTRY_URL is invalid: {}", e)))?;
        }
        url::Url::parse(&self.pricing.coingecko_url)
            .map_err(|e| RouterError::Config(format!("COINGECKO_URL is invalid: {}", e)))?;
        Ok(())
    }

    pub fn log_settings(&self) {
        log::info!("Router configuration loaded: {:?}", self.router);
        log::info!("Pricing configuration loaded: {:?}", self.pricing);
        log::info!(
            "Data sources: pools={} tokens={:?} taker_fees={:?} chain_registry={:?}",
            self.pools_file,
            self.tokens_file,
            self.taker_fees_file,
            self.chain_registry_url
        );
    }
}
