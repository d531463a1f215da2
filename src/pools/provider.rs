// src/pools/provider.rs
//! Pool data providers: where decoded pool records come from.

use super::PoolRecord;
use crate::error::RouterError;
use async_trait::async_trait;
use log::info;
use std::path::PathBuf;

#[async_trait]
pub trait PoolDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Current snapshot of every pool record the provider knows about.
    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>, RouterError>;
}

/// Reads a JSON array of pool records from disk on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFilePoolProvider {
    path: PathBuf,
}

impl JsonFilePoolProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PoolDataProvider for JsonFilePoolProvider {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>, RouterError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<PoolRecord> = serde_json::from_str(&raw)?;
        info!("Loaded {} pool records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// Fixed in-memory snapshot, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPoolProvider {
    records: Vec<PoolRecord>,
}

impl StaticPoolProvider {
    pub fn new(records: Vec<PoolRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl PoolDataProvider for StaticPoolProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>, RouterError> {
        Ok(self.records.clone())
    }
}
