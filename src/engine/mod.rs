//! Lifecycle engine - Drives an order from pending to a terminal status

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::core::config::EngineConfig;
use crate::core::{
    ActiveCache, Error, Executor, Order, OrderSnapshot, OrderStatus, OrderStore, Result,
    StatusEvent,
};
use crate::router::Router;
use crate::status::StatusDistributor;

/// The order state machine. One call to [`process`](Self::process)
/// drives one attempt: pending, routing, building, submitted, then
/// confirmed or failed. Every transition is published before the
/// persistence and cache side writes happen.
pub struct LifecycleEngine {
    config: EngineConfig,
    router: Router,
    executor: Arc<dyn Executor>,
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn ActiveCache>,
    distributor: Arc<StatusDistributor>,
}

impl LifecycleEngine {
    pub fn new(
        config: EngineConfig,
        router: Router,
        executor: Arc<dyn Executor>,
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn ActiveCache>,
        distributor: Arc<StatusDistributor>,
    ) -> Self {
        Self {
            config,
            router,
            executor,
            store,
            cache,
            distributor,
        }
    }

    /// Drive one attempt to a terminal status. Any failure is converted
    /// into a failed event before the error is returned to the caller.
    pub async fn process(&self, order: &Order) -> Result<String> {
        match self.run(order).await {
            Ok(settlement_id) => Ok(settlement_id),
            Err(err) => {
                self.emit(
                    order,
                    OrderStatus::Failed {
                        reason: err.to_string(),
                    },
                )
                .await;
                Err(err)
            }
        }
    }

    async fn run(&self, order: &Order) -> Result<String> {
        self.emit(order, OrderStatus::Pending).await;
        info!(
            "processing {} ({} -> {}, amount {})",
            order.id, order.token_in, order.token_out, order.amount_in
        );

        self.emit(order, OrderStatus::routing()).await;
        let decision = match timeout(
            Duration::from_millis(self.config.routing_timeout_ms),
            self.router.route(order),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout {
                    stage: "routing",
                    elapsed_ms: self.config.routing_timeout_ms,
                });
            }
        };
        if decision.chosen.price <= Decimal::ZERO {
            return Err(Error::Routing(format!(
                "non-positive quoted price {} from {}",
                decision.chosen.price, decision.chosen.source
            )));
        }
        self.emit(order, OrderStatus::routed(&decision.chosen)).await;

        self.emit(order, OrderStatus::Building).await;
        sleep(Duration::from_millis(self.config.build_delay_ms)).await;

        self.emit(order, OrderStatus::Submitted).await;
        let result = match timeout(
            Duration::from_millis(self.config.execution_timeout_ms),
            self.executor.execute(order, &decision.chosen),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout {
                    stage: "execution",
                    elapsed_ms: self.config.execution_timeout_ms,
                });
            }
        };

        if let Some(tolerance) = order.slippage_tolerance {
            let deviation =
                ((result.realized_price - decision.chosen.price) / decision.chosen.price).abs();
            if deviation > tolerance {
                return Err(Error::Execution(format!(
                    "slippage exceeded: deviation {} above tolerance {}",
                    deviation, tolerance
                )));
            }
        }

        self.emit(
            order,
            OrderStatus::Confirmed {
                settlement_id: result.settlement_id.clone(),
                realized_price: result.realized_price,
            },
        )
        .await;
        info!(
            "confirmed {} settlement {} at {}",
            order.id, result.settlement_id, result.realized_price
        );

        Ok(result.settlement_id)
    }

    /// Publish to observers first, then mirror the event to the store
    /// and cache. Adapter failures are logged and swallowed; they never
    /// change the order's outcome.
    async fn emit(&self, order: &Order, status: OrderStatus) -> StatusEvent {
        let event = self.distributor.publish(order.id, status);

        if let Err(err) = self.store.append(&event).await {
            warn!("store append failed for {}: {}", order.id, err);
        }

        if event.status.is_terminal() {
            if let Err(err) = self.cache.remove(order.id).await {
                warn!("cache remove failed for {}: {}", order.id, err);
            }
        } else {
            let snapshot = OrderSnapshot::new(order, &event);
            if let Err(err) = self.cache.put(snapshot).await {
                warn!("cache put failed for {}: {}", order.id, err);
            }
        }

        event
    }
}
