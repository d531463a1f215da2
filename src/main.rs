// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use sidecar_router::{
    config::{load_config, Config, RouterConfig},
    fees::{load_taker_fees_file, InMemoryTakerFees, TakerFeeProvider},
    metrics::RouterMetrics,
    pools::provider::{JsonFilePoolProvider, PoolDataProvider},
    pricing::{ChainPricingSource, CoingeckoPricingSource, PricingOptions, PricingSourceType},
    tokens::{fetch_tokens_from_chain_registry, load_tokens_file, TokenRegistry, TokensUsecase},
    utils::{parse_amount, setup_logging},
    QuoteResult, RequestContext, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "sidecar-router")]
#[command(about = "Best route and price queries over AMM pool snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Quote a swap of an exact input amount
    Quote {
        /// Input denomination (chain or human denom)
        #[arg(long)]
        base: String,

        /// Output denomination (chain or human denom)
        #[arg(long)]
        quote: String,

        /// Input amount in base chain units
        #[arg(long)]
        amount: String,

        /// Print every ranked route instead of the split quote
        #[arg(long)]
        ranked: bool,
    },

    /// Price bases against quotes
    Price {
        /// Comma-separated base denominations
        #[arg(long, value_delimiter = ',')]
        base: Vec<String>,

        /// Comma-separated quote denominations
        #[arg(long, value_delimiter = ',')]
        quote: Vec<String>,

        /// Pricing source: 0 = chain, 1 = coingecko
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        source: i32,

        /// Ignore cached prices
        #[arg(long)]
        recompute: bool,
    },
}

async fn load_tokens(config: &Config) -> Result<TokenRegistry> {
    let tokens = match (&config.tokens_file, &config.chain_registry_url) {
        (Some(path), _) => load_tokens_file(path).with_context(|| format!("loading tokens from {}", path))?,
        (None, Some(url)) => fetch_tokens_from_chain_registry(url)
            .await
            .with_context(|| format!("fetching chain registry {}", url))?,
        (None, None) => {
            warn!("No TOKENS_FILE or CHAIN_REGISTRY_URL set, token metadata is empty");
            HashMap::new()
        }
    };
    Ok(TokenRegistry::new(tokens))
}

fn load_taker_fees(config: &Config) -> Result<Arc<dyn TakerFeeProvider>> {
    let fees = match &config.taker_fees_file {
        Some(path) => {
            let entries = load_taker_fees_file(path).with_context(|| format!("loading taker fees from {}", path))?;
            InMemoryTakerFees::from_entries(entries)
        }
        None => InMemoryTakerFees::new(),
    };
    Ok(Arc::new(fees))
}

fn resolve(registry: &TokenRegistry, denom: &str) -> String {
    registry.resolve_denom(denom).unwrap_or_else(|_| denom.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config().context("invalid configuration")?;
    setup_logging(&config.log_level).context("failed to initialize logging")?;
    info!("sidecar-router starting");
    config.log_settings();

    let router_config = match &config.router_config_file {
        Some(path) => RouterConfig::from_json_file(path).with_context(|| format!("loading router config {}", path))?,
        None => config.router.clone(),
    };

    let records = JsonFilePoolProvider::new(&config.pools_file)
        .fetch_pools()
        .await
        .with_context(|| format!("loading pools from {}", config.pools_file))?;
    let tokens = Arc::new(load_tokens(&config).await?);
    let metrics = Arc::new(RouterMetrics::new());
    let router = Arc::new(Router::new(
        router_config,
        &records,
        load_taker_fees(&config)?,
        tokens.clone(),
        metrics.clone(),
    )?);

    let ctx = RequestContext::background();
    match cli.command {
        Commands::Quote {
            base,
            quote,
            amount,
            ranked,
        } => {
            let base = resolve(&tokens, &base);
            let quote = resolve(&tokens, &quote);
            let amount = parse_amount(&amount)?;
            if ranked {
                let routes = router.ranked_routes(&ctx, &base, &quote, amount).await?;
                println!("{}", serde_json::to_string_pretty(&routes)?);
            } else {
                let result = router.quote(&ctx, &base, &quote, amount).await?;
                if result == QuoteResult::NoQuoteAvailable {
                    warn!("No quote available for {} {} -> {}", amount, base, quote);
                }
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Commands::Price {
            base,
            quote,
            source,
            recompute,
        } => {
            if !TokensUsecase::is_valid_pricing_source(source) {
                anyhow::bail!("invalid pricing source {}", source);
            }
            let source = PricingSourceType::try_from(source)?;
            let bases: Vec<String> = base.iter().map(|d| resolve(&tokens, d)).collect();
            let quotes: Vec<String> = quote.iter().map(|d| resolve(&tokens, d)).collect();

            let usecase = TokensUsecase::new(tokens.clone(), metrics.clone());
            usecase.register_pricing_source(Arc::new(ChainPricingSource::new(
                router.clone(),
                Duration::from_secs(config.pricing.chain_price_cache_expiry_seconds),
                &config.pricing.coingecko_fallback_quotes,
            )));
            match CoingeckoPricingSource::new(
                &config.pricing.coingecko_url,
                &config.pricing.coingecko_vs_currency,
                tokens.clone(),
            ) {
                Ok(coingecko) => usecase.register_pricing_source(Arc::new(coingecko)),
                Err(e) => error!("CoinGecko pricing unavailable: {}", e),
            }

            let prices = usecase
                .get_prices(
                    &ctx,
                    &bases,
                    &quotes,
                    source,
                    PricingOptions {
                        recompute_prices: recompute,
                    },
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&prices)?);
        }
    }

    metrics.log_summary();
    Ok(())
}
