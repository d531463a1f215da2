// src/lib.rs
pub mod config;
pub mod error;
pub mod fees;
pub mod metrics;
pub mod pools;
pub mod pricing;
pub mod routing;
pub mod tokens;
pub mod utils;

// Re-export the main entry points for easy access
pub use error::{RouterError, Result};
pub use routing::{
    context::RequestContext,
    router::{QuoteResult, Router},
    splitter::SplitQuote,
};
