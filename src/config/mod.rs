// src/config/mod.rs
pub mod settings;

// Re-export the primary Config struct for a cleaner import path, e.g. `config::Config`.
pub use settings::{Config, RouterConfig};

use crate::error::RouterError;
use std::sync::Arc;

/// Loads and returns the application configuration as an `Arc<Config>`.
/// Reads `.env` when present, then the process environment, and rejects
/// settings the router cannot run with.
pub fn load_config() -> Result<Arc<settings::Config>, RouterError> {
    dotenv::dotenv().ok(); // Load .env file if present, ignore errors

    let config = settings::Config::from_env();
    config.validate()?;

    Ok(Arc::new(config))
}
