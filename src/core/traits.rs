//! Core traits - Seams for liquidity sources, execution, and collaborators

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core::Result;
use crate::core::types::{ExecutionResult, Order, OrderId, OrderSnapshot, Quote, StatusEvent, Token};

/// A liquidity source that can price a swap
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Venue tag reported in routing events
    fn tag(&self) -> &str;

    /// Price the given swap after a simulated network delay
    async fn quote(&self, token_in: &Token, token_out: &Token, amount_in: Decimal)
    -> Result<Quote>;
}

/// Executes a swap against the chosen source
#[async_trait]
pub trait Executor: Send + Sync {
    /// Carry out the swap at the quoted terms; may fail with a reason
    async fn execute(&self, order: &Order, quote: &Quote) -> Result<ExecutionResult>;
}

/// Durable order persistence, keyed by order id
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Record a newly accepted order
    async fn create(&self, order: &Order) -> Result<()>;

    /// Append one event to the order's history
    async fn append(&self, event: &StatusEvent) -> Result<()>;

    /// Full status history, oldest first
    async fn history(&self, order_id: OrderId) -> Result<Vec<StatusEvent>>;
}

/// Ephemeral active-order cache with TTL expiry
#[async_trait]
pub trait ActiveCache: Send + Sync {
    /// Upsert the latest snapshot for an in-flight order
    async fn put(&self, snapshot: OrderSnapshot) -> Result<()>;

    /// Drop the entry once the order reaches a terminal status
    async fn remove(&self, order_id: OrderId) -> Result<()>;

    /// Current snapshot, if present and not expired
    async fn get(&self, order_id: OrderId) -> Result<Option<OrderSnapshot>>;
}
