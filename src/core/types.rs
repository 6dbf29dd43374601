//! Core types - Orders, quotes, and lifecycle status events

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token symbol (e.g., "SOL")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token(String);

impl Token {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order identifier, unique per submission and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order kind - only market swaps are supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Market,
}

/// Incoming swap request, as received on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub kind: OrderKind,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_tolerance: Option<Decimal>,
}

/// An accepted order. Immutable once created; only its status history grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub kind: OrderKind,
    pub token_in: Token,
    pub token_out: Token,
    pub amount_in: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_tolerance: Option<Decimal>,
    pub accepted_at: DateTime<Utc>,
}

/// A price quote from one liquidity source, ephemeral per routing attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub source: String,
    pub price: Decimal,
    pub fee: Decimal,
}

/// Settlement outcome of one execution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub settlement_id: String,
    pub realized_price: Decimal,
}

/// Lifecycle status carried by every event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Routing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chosen: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<Decimal>,
    },
    Building,
    Submitted,
    #[serde(rename_all = "camelCase")]
    Confirmed {
        settlement_id: String,
        realized_price: Decimal,
    },
    Failed {
        reason: String,
    },
}

impl OrderStatus {
    /// Routing started, no source chosen yet
    pub fn routing() -> Self {
        OrderStatus::Routing {
            chosen: None,
            price: None,
        }
    }

    /// Routing finished with a chosen quote
    pub fn routed(quote: &Quote) -> Self {
        OrderStatus::Routing {
            chosen: Some(quote.source.clone()),
            price: Some(quote.price),
        }
    }

    /// Wire tag for this status
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Routing { .. } => "routing",
            OrderStatus::Building => "building",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Confirmed { .. } => "confirmed",
            OrderStatus::Failed { .. } => "failed",
        }
    }

    /// Terminal statuses absorb; no further events follow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed { .. } | OrderStatus::Failed { .. }
        )
    }
}

/// One entry in an order's status history. Append-only, strictly ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub order_id: OrderId,
    pub sequence: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub status: OrderStatus,
}

/// Active-cache entry: the order's static fields plus its latest status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    #[serde(flatten)]
    pub order: Order,
    pub sequence: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: OrderStatus,
}

impl OrderSnapshot {
    pub fn new(order: &Order, event: &StatusEvent) -> Self {
        Self {
            order: order.clone(),
            sequence: event.sequence,
            updated_at: event.timestamp,
            status: event.status.clone(),
        }
    }
}

/// Shift a price by a signed basis-point delta, exactly in Decimal
pub fn apply_bps(price: Decimal, bps: i64) -> Decimal {
    price * Decimal::from(10_000 + bps) / Decimal::from(10_000)
}
