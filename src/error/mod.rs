// src/error/mod.rs
//! Error taxonomy for the router core and its collaborators.
//!
//! Errors are always scoped to one request or one sub-computation (a route,
//! a quote denomination, a cache slot). Nothing in here is fatal to the
//! process.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    /// Denomination is not part of the current pool snapshot or token registry
    #[error("Unknown denomination: {0}")]
    UnknownDenom(String),

    /// Zero, negative or unparsable input amount
    #[error("Invalid Amount: {0}")]
    InvalidAmount(String),

    /// Any other malformed request parameter
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// The pool was asked to quote a denomination it does not hold
    #[error("Denomination {denom} is not held by pool {pool_id}")]
    DenomNotInPool { pool_id: u64, denom: String },

    /// Pool reserves cannot satisfy the swap
    #[error("Insufficient liquidity in pool {pool_id}: {reason}")]
    InsufficientLiquidity { pool_id: u64, reason: String },

    /// Pool parameters or reserves violate the pool invariant
    #[error("Invalid Pool State: {0}")]
    InvalidPoolState(String),

    /// A referenced pool is missing from the current graph snapshot
    #[error("Pool Not Found: {0}")]
    PoolNotFound(u64),

    /// Pool graph could not be built for the request
    #[error("Graph Construction Error: {0}")]
    GraphConstruction(String),

    /// One hop of a candidate route failed to quote
    #[error("Route {route} failed at hop {hop}: {source}")]
    RouteQuote {
        route: String,
        hop: usize,
        #[source]
        source: Box<RouterError>,
    },

    /// No route exists between the requested denominations
    #[error("No route found: {0}")]
    NoRoute(String),

    /// Externally requested cancellation
    #[error("Request cancelled")]
    Cancelled,

    /// Request context deadline elapsed
    #[error("Deadline exceeded after {0} ms")]
    DeadlineExceeded(u64),

    /// Pricing collaborator failure
    #[error("Pricing Error: {0}")]
    Pricing(String),

    /// No pricing strategy is registered for the requested source
    #[error("Pricing source not registered: {0}")]
    PricingSourceNotFound(String),

    /// HTTP / connectivity failures talking to collaborators
    #[error("Network Error: {0}")]
    Network(String),

    /// Malformed JSON or data files
    #[error("Parse Error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    Config(String),

    /// Unknown/unclassified errors
    #[error("Unknown Error: {0}")]
    Unknown(String),
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::Parse(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for RouterError {
    fn from(err: reqwest::Error) -> Self {
        RouterError::Network(err.to_string())
    }
}

impl From<std::io::Error> for RouterError {
    fn from(err: std::io::Error) -> Self {
        RouterError::Parse(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for RouterError {
    fn from(err: anyhow::Error) -> Self {
        RouterError::Unknown(format!("Anyhow error: {}", err))
    }
}

impl RouterError {
    /// Input errors are rejected before any cache interaction and surfaced verbatim.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RouterError::UnknownDenom(_) | RouterError::InvalidAmount(_) | RouterError::InvalidInput(_)
        )
    }

    /// Determines if a later retry of the same request may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            RouterError::UnknownDenom(_) => false,
            RouterError::InvalidAmount(_) => false,
            RouterError::InvalidInput(_) => false,
            RouterError::DenomNotInPool { .. } => false,
            RouterError::InsufficientLiquidity { .. } => true, // reserves move every block
            RouterError::InvalidPoolState(_) => true,
            RouterError::PoolNotFound(_) => true,
            RouterError::GraphConstruction(_) => true,
            RouterError::RouteQuote { source, .. } => source.is_recoverable(),
            RouterError::NoRoute(_) => true,
            RouterError::Cancelled => false,
            RouterError::DeadlineExceeded(_) => true,
            RouterError::Pricing(_) => true,
            RouterError::PricingSourceNotFound(_) => false,
            RouterError::Network(_) => true,
            RouterError::Parse(_) => false,
            RouterError::Config(_) => false,
            RouterError::Unknown(_) => true,
        }
    }

    /// Categorizes error for metrics labels
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            RouterError::UnknownDenom(_)
            | RouterError::InvalidAmount(_)
            | RouterError::InvalidInput(_) => ErrorCategory::Input,
            RouterError::DenomNotInPool { .. }
            | RouterError::InsufficientLiquidity { .. }
            | RouterError::InvalidPoolState(_)
            | RouterError::PoolNotFound(_)
            | RouterError::RouteQuote { .. } => ErrorCategory::Quoting,
            RouterError::GraphConstruction(_) | RouterError::NoRoute(_) => ErrorCategory::Routing,
            RouterError::Cancelled | RouterError::DeadlineExceeded(_) => ErrorCategory::Cancellation,
            RouterError::Pricing(_)
            | RouterError::PricingSourceNotFound(_)
            | RouterError::Network(_) => ErrorCategory::Collaborator,
            RouterError::Parse(_) | RouterError::Config(_) => ErrorCategory::Configuration,
            RouterError::Unknown(_) => ErrorCategory::Critical,
        }
    }

    /// Wraps a hop failure into a route-level error
    pub fn route_failure(route: impl Into<String>, hop: usize, source: RouterError) -> Self {
        RouterError::RouteQuote {
            route: route.into(),
            hop,
            source: Box::new(source),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Input,
    Quoting,
    Routing,
    Cancellation,
    Collaborator,
    Configuration,
    Critical,
}

pub type Result<T, E = RouterError> = std::result::Result<T, E>;
