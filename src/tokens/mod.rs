// src/tokens/mod.rs
//! Token metadata: human <-> chain denominations, precisions and the
//! scaling factors derived from them.

pub mod usecase;

pub use usecase::TokensUsecase;

use crate::error::RouterError;
use crate::utils::ten_pow;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub human_denom: String,
    pub precision: u32,
    #[serde(default)]
    pub coingecko_id: String,
    #[serde(default)]
    pub is_unlisted: bool,
}

/// Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    metadata_by_chain_denom: HashMap<String, Token>,
    human_to_chain_denom: HashMap<String, String>,
    precision_scaling_factors: HashMap<u32, u128>,
}

impl TokenRegistry {
    pub fn new(metadata_by_chain_denom: HashMap<String, Token>) -> Self {
        let mut human_to_chain_denom = HashMap::with_capacity(metadata_by_chain_denom.len());
        let mut precision_scaling_factors = HashMap::new();

        for (chain_denom, token) in &metadata_by_chain_denom {
            human_to_chain_denom.insert(token.human_denom.to_lowercase(), chain_denom.clone());
            if precision_scaling_factors.contains_key(&token.precision) {
                continue;
            }
            match ten_pow(token.precision) {
                Some(factor) => {
                    precision_scaling_factors.insert(token.precision, factor);
                }
                None => warn!(
                    "Precision {} of {} overflows the scaling factor range",
                    token.precision, chain_denom
                ),
            }
        }

        Self {
            metadata_by_chain_denom,
            human_to_chain_denom,
            precision_scaling_factors,
        }
    }

    pub fn len(&self) -> usize {
        self.metadata_by_chain_denom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata_by_chain_denom.is_empty()
    }

    /// Case-insensitive human denomination lookup.
    pub fn chain_denom(&self, human_denom: &str) -> Result<String, RouterError> {
        let lower = human_denom.to_lowercase();
        self.human_to_chain_denom
            .get(&lower)
            .cloned()
            .ok_or_else(|| RouterError::UnknownDenom(format!("chain denom for human denom ({}) is not found", lower)))
    }

    /// Accepts either a chain denomination or a human one.
    pub fn resolve_denom(&self, denom: &str) -> Result<String, RouterError> {
        if self.metadata_by_chain_denom.contains_key(denom) {
            return Ok(denom.to_string());
        }
        self.chain_denom(denom)
    }

    pub fn metadata(&self, chain_denom: &str) -> Result<&Token, RouterError> {
        self.metadata_by_chain_denom
            .get(chain_denom)
            .ok_or_else(|| RouterError::UnknownDenom(format!("metadata for denom ({}) is not found", chain_denom)))
    }

    /// Copy of every token, keyed by chain denomination.
    pub fn full_metadata(&self) -> HashMap<String, Token> {
        self.metadata_by_chain_denom.clone()
    }

    /// `10^precision` of the denomination.
    pub fn chain_scaling_factor(&self, chain_denom: &str) -> Result<u128, RouterError> {
        let token = self.metadata(chain_denom)?;
        self.precision_scaling_factors
            .get(&token.precision)
            .copied()
            .ok_or_else(|| {
                RouterError::InvalidInput(format!(
                    "scaling factor for precision ({}) and denom ({}) not found",
                    token.precision, chain_denom
                ))
            })
    }

    /// Base scaling factor over quote scaling factor.
    pub fn spot_price_scaling_factor(&self, base: &str, quote: &str) -> Result<f64, RouterError> {
        let base_factor = self.chain_scaling_factor(base)?;
        let quote_factor = self.chain_scaling_factor(quote)?;
        if quote_factor == 0 {
            return Err(RouterError::InvalidInput(format!(
                "scaling factor for quote denom ({}) is zero",
                quote
            )));
        }
        Ok(base_factor as f64 / quote_factor as f64)
    }

    /// Listed tokens only.
    pub fn is_valid_chain_denom(&self, chain_denom: &str) -> bool {
        self.metadata_by_chain_denom
            .get(chain_denom)
            .map(|token| !token.is_unlisted)
            .unwrap_or(false)
    }

    pub fn coingecko_id(&self, chain_denom: &str) -> Result<String, RouterError> {
        self.metadata_by_chain_denom
            .get(chain_denom)
            .map(|token| token.coingecko_id.clone())
            .ok_or_else(|| RouterError::UnknownDenom(format!("{} not found in chain registry", chain_denom)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetListEntry {
    coin_minimal_denom: String,
    symbol: String,
    decimals: u32,
    #[serde(default)]
    coingecko_id: String,
    #[serde(default)]
    preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetList {
    #[serde(default)]
    chain_name: String,
    assets: Vec<AssetListEntry>,
}

/// Parses a chain-registry asset list into tokens keyed by chain denomination.
pub fn parse_asset_list(raw: &str) -> Result<HashMap<String, Token>, RouterError> {
    let list: AssetList = serde_json::from_str(raw)?;
    info!("Parsed {} assets for chain '{}'", list.assets.len(), list.chain_name);
    Ok(list
        .assets
        .into_iter()
        .map(|asset| {
            (
                asset.coin_minimal_denom,
                Token {
                    human_denom: asset.symbol,
                    precision: asset.decimals,
                    coingecko_id: asset.coingecko_id,
                    is_unlisted: asset.preview,
                },
            )
        })
        .collect())
}

pub async fn fetch_tokens_from_chain_registry(url: &str) -> Result<HashMap<String, Token>, RouterError> {
    let parsed = url::Url::parse(url).map_err(|e| RouterError::Config(format!("invalid chain registry url {}: {}", url, e)))?;
    let response = reqwest::get(parsed).await?.error_for_status()?;
    let body = response.text().await?;
    parse_asset_list(&body)
}

/// Reads a JSON object of chain denomination -> token metadata.
pub fn load_tokens_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Token>, RouterError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let tokens: HashMap<String, Token> = serde_json::from_str(&raw)?;
    info!("Loaded {} tokens from {}", tokens.len(), path.as_ref().display());
    Ok(tokens)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_human_denoms_are_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.chain_denom("osmo").unwrap(), "uosmo");
        assert_eq!(registry.chain_denom("OsMo").unwrap(), "uosmo");
        assert!(matches!(registry.chain_denom("doge"), Err(RouterError::UnknownDenom(_))));
        assert_eq!(registry.resolve_denom("uatom").unwrap(), "uatom");
        assert_eq!(registry.resolve_denom("ATOM").unwrap(), "uatom");
    }

    #[test]
    fn test_scaling_factors() {
        let registry = registry();
        assert_eq!(registry.chain_scaling_factor("uosmo").unwrap(), 1_000_000);
        assert_eq!(registry.chain_scaling_factor("aevmos").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(registry.spot_price_scaling_factor("aevmos", "uosmo").unwrap(), 1e12);
        assert!(registry.chain_scaling_factor("unknown").is_err());
    }

    #[test]
    fn test_listing_and_coingecko_ids() {
        let registry = registry();
        assert!(registry.is_valid_chain_denom("uosmo"));
        assert!(!registry.is_valid_chain_denom("uhidden"));
        assert!(!registry.is_valid_chain_denom("unknown"));
        assert_eq!(registry.coingecko_id("uatom").unwrap(), "cosmos");
        assert!(registry.coingecko_id("unknown").is_err());
        assert_eq!(registry.full_metadata().len(), 5);
    }

    #[test]
    fn test_parse_asset_list() {
        let raw = r#"{
            "chainName": "osmosis",
            "assets": [
                {"coinMinimalDenom": "uosmo", "symbol": "OSMO", "decimals": 6, "coingeckoId": "osmosis", "preview": false},
                {"coinMinimalDenom": "ibc/ABC", "symbol": "NEW", "decimals": 8, "preview": true}
            ]
        }"#;
        let tokens = parse_asset_list(raw).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens["uosmo"], token("OSMO", 6, "osmosis"));
        assert!(tokens["ibc/ABC"].is_unlisted);
        assert_eq!(tokens["ibc/ABC"].coingecko_id, "");
    }
}
