//! Router - Concurrent quote fan-out and best-price selection

use std::sync::Arc;

use tracing::debug;

use crate::core::{Order, Quote, QuoteSource, Result};

/// Routing outcome: the winning quote plus the one it beat
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub chosen: Quote,
    pub other: Quote,
}

/// Fans a quote request out to both sources at once and picks the
/// better price.
pub struct Router {
    primary: Arc<dyn QuoteSource>,
    secondary: Arc<dyn QuoteSource>,
}

impl Router {
    pub fn new(primary: Arc<dyn QuoteSource>, secondary: Arc<dyn QuoteSource>) -> Self {
        Self { primary, secondary }
    }

    /// Quote both sources concurrently. The lower price wins; an exact
    /// tie goes to the primary source. No retries here, the first error
    /// propagates.
    pub async fn route(&self, order: &Order) -> Result<RouteDecision> {
        let (first, second) = tokio::join!(
            self.primary
                .quote(&order.token_in, &order.token_out, order.amount_in),
            self.secondary
                .quote(&order.token_in, &order.token_out, order.amount_in),
        );
        let first = first?;
        let second = second?;

        debug!(
            "quotes for {}: {}={} {}={}",
            order.id, first.source, first.price, second.source, second.price
        );

        let (chosen, other) = if second.price < first.price {
            (second, first)
        } else {
            (first, second)
        };

        debug!("routing {} via {} at {}", order.id, chosen.source, chosen.price);

        Ok(RouteDecision { chosen, other })
    }
}
