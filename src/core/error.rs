//! Error handling - Lifecycle and validation error hierarchy

use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// swapflow error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected before the lifecycle starts
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Quote routing failures
    #[error("Routing error: {0}")]
    Routing(String),

    /// Execution failures
    #[error("Execution error: {0}")]
    Execution(String),

    /// A lifecycle stage exceeded its deadline
    #[error("{stage} timed out after {elapsed_ms}ms")]
    Timeout { stage: &'static str, elapsed_ms: u64 },

    /// Dispatch queue failures
    #[error("Queue error: {0}")]
    Queue(String),

    /// Persistence adapter failures
    #[error("Store error: {0}")]
    Store(String),

    /// Cache adapter failures
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Lookup for an order id nothing was recorded under
    #[error("Unknown order: {0}")]
    UnknownOrder(crate::core::types::OrderId),
}

/// Why a request was rejected at the door
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("token symbol must not be empty")]
    EmptyToken,

    #[error("input and output tokens must differ, both were {0}")]
    SameToken(String),

    #[error("slippage tolerance {0} outside [0, 1)")]
    SlippageOutOfRange(Decimal),
}
