//! Dispatch queue - Bounded worker pool with per-order claims and retry

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::config::QueueConfig;
use crate::core::{Error, Order, OrderId, Result};
use crate::engine::LifecycleEngine;

/// Hands accepted orders to a fixed pool of lifecycle workers.
///
/// At most one worker runs a given order id at a time; a duplicate
/// dispatch while the first is still in flight is dropped. A failed
/// attempt is retried from scratch with exponential backoff.
pub struct DispatchQueue {
    tx: Mutex<Option<flume::Sender<Order>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchQueue {
    pub fn new(config: QueueConfig, engine: Arc<LifecycleEngine>) -> Self {
        let (tx, rx) = flume::bounded::<Order>(config.capacity);
        let in_flight: Arc<DashSet<OrderId>> = Arc::new(DashSet::new());
        let config = Arc::new(config);

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers.max(1) {
            let rx = rx.clone();
            let engine = engine.clone();
            let in_flight = in_flight.clone();
            let config = config.clone();
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, rx, engine, in_flight, config).await;
            }));
        }

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Queue an order for processing, waiting when the queue is full.
    pub async fn dispatch(&self, order: Order) -> Result<()> {
        let tx = { self.tx.lock().clone() };
        let Some(tx) = tx else {
            return Err(Error::Queue("queue is shut down".into()));
        };
        tx.send_async(order)
            .await
            .map_err(|err| Error::Queue(format!("queue closed, rejected {}", err.into_inner().id)))
    }

    /// Close the queue and wait for the workers to drain it.
    pub async fn shutdown(&self) {
        self.tx.lock().take();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(err) = worker.await {
                error!("worker task panicked: {}", err);
            }
        }
        info!("dispatch queue drained");
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: flume::Receiver<Order>,
    engine: Arc<LifecycleEngine>,
    in_flight: Arc<DashSet<OrderId>>,
    config: Arc<QueueConfig>,
) {
    debug!("worker {} up", worker_id);
    while let Ok(order) = rx.recv_async().await {
        if !in_flight.insert(order.id) {
            warn!(
                "order {} already in flight, dropping duplicate dispatch",
                order.id
            );
            continue;
        }
        run_attempts(&engine, &order, &config).await;
        in_flight.remove(&order.id);
    }
    debug!("worker {} drained", worker_id);
}

async fn run_attempts(engine: &LifecycleEngine, order: &Order, config: &QueueConfig) {
    for attempt in 0..config.max_attempts.max(1) {
        if attempt > 0 {
            let delay = backoff_delay(config.retry_base_ms, attempt - 1, config.retry_cap_ms);
            debug!(
                "retrying {} in {:?} (attempt {}/{})",
                order.id,
                delay,
                attempt + 1,
                config.max_attempts
            );
            tokio::time::sleep(delay).await;
        }
        match engine.process(order).await {
            Ok(settlement_id) => {
                debug!("order {} settled as {}", order.id, settlement_id);
                return;
            }
            Err(err) => {
                warn!(
                    "attempt {}/{} for {} failed: {}",
                    attempt + 1,
                    config.max_attempts,
                    order.id,
                    err
                );
            }
        }
    }
    error!(
        "order {} exhausted {} attempts",
        order.id, config.max_attempts
    );
}

/// Exponential backoff: base * 2^retry, capped.
fn backoff_delay(base_ms: u64, retry: u32, cap_ms: u64) -> Duration {
    let delay = base_ms
        .saturating_mul(2u64.saturating_pow(retry))
        .min(cap_ms);
    Duration::from_millis(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryActiveCache, MemoryOrderStore};
    use crate::core::config::EngineConfig;
    use crate::core::{
        ExecutionResult, Executor, OrderKind, OrderStatus, Quote, QuoteSource, Token,
    };
    use crate::router::Router;
    use crate::status::StatusDistributor;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    struct InstantSource(&'static str, Decimal);

    #[async_trait]
    impl QuoteSource for InstantSource {
        fn tag(&self) -> &str {
            self.0
        }

        async fn quote(&self, _: &Token, _: &Token, _: Decimal) -> Result<Quote> {
            Ok(Quote {
                source: self.0.to_string(),
                price: self.1,
                fee: dec!(0.0025),
            })
        }
    }

    /// Fails the first `failures` attempts, then settles.
    struct FlakyExecutor {
        failures_left: AtomicU32,
        settle_delay_ms: u64,
    }

    impl FlakyExecutor {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                settle_delay_ms: 0,
            }
        }

        fn slow(delay_ms: u64) -> Self {
            Self {
                failures_left: AtomicU32::new(0),
                settle_delay_ms: delay_ms,
            }
        }
    }

    #[async_trait]
    impl Executor for FlakyExecutor {
        async fn execute(&self, _order: &Order, quote: &Quote) -> Result<ExecutionResult> {
            tokio::time::sleep(Duration::from_millis(self.settle_delay_ms)).await;
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::Execution("venue rejected".into()));
            }
            Ok(ExecutionResult {
                settlement_id: format!("sim-{}", uuid::Uuid::new_v4().simple()),
                realized_price: quote.price,
            })
        }
    }

    fn test_order() -> Order {
        Order {
            id: crate::core::OrderId::new(),
            kind: OrderKind::Market,
            token_in: Token::new("SOL"),
            token_out: Token::new("USDC"),
            amount_in: dec!(100),
            slippage_tolerance: None,
            accepted_at: Utc::now(),
        }
    }

    fn build_queue(
        executor: FlakyExecutor,
        queue_config: QueueConfig,
    ) -> (DispatchQueue, Arc<StatusDistributor>) {
        let distributor = Arc::new(StatusDistributor::new(32));
        let store = Arc::new(MemoryOrderStore::new());
        let cache = Arc::new(MemoryActiveCache::new(60));
        let router = Router::new(
            Arc::new(InstantSource("alpha", dec!(100))),
            Arc::new(InstantSource("beta", dec!(101))),
        );
        let engine = Arc::new(LifecycleEngine::new(
            EngineConfig {
                build_delay_ms: 2,
                routing_timeout_ms: 500,
                execution_timeout_ms: 500,
            },
            router,
            Arc::new(executor),
            store,
            cache,
            distributor.clone(),
        ));
        (DispatchQueue::new(queue_config, engine), distributor)
    }

    fn fast_queue_config() -> QueueConfig {
        QueueConfig {
            workers: 2,
            capacity: 16,
            max_attempts: 3,
            retry_base_ms: 40,
            retry_cap_ms: 1_000,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(500, 0, 5_000), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 1, 5_000), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(500, 2, 5_000), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(500, 10, 5_000), Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn test_retries_until_success_with_backoff() {
        let (queue, distributor) = build_queue(FlakyExecutor::new(2), fast_queue_config());
        let order = test_order();
        let mut sub = distributor.subscribe(order.id);

        let started = Instant::now();
        queue.dispatch(order).await.unwrap();

        let mut failed = 0;
        let mut confirmed = 0;
        while let Some(event) = sub.next().await {
            match event.status {
                OrderStatus::Failed { .. } => failed += 1,
                OrderStatus::Confirmed { .. } => {
                    confirmed += 1;
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(failed, 2);
        assert_eq!(confirmed, 1);
        // two retries: 40ms then 80ms
        assert!(
            started.elapsed() >= Duration::from_millis(120),
            "retries came back too fast: {:?}",
            started.elapsed()
        );

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_dispatch_is_dropped() {
        let (queue, distributor) = build_queue(FlakyExecutor::slow(300), fast_queue_config());
        let order = test_order();
        let mut sub = distributor.subscribe(order.id);

        queue.dispatch(order.clone()).await.unwrap();
        queue.dispatch(order).await.unwrap();

        let mut pendings = 0;
        while let Some(event) = sub.next().await {
            if event.status.label() == "pending" {
                pendings += 1;
            }
            if event.status.is_terminal() {
                break;
            }
        }
        assert_eq!(pendings, 1);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_errors() {
        let (queue, _distributor) = build_queue(FlakyExecutor::new(0), fast_queue_config());
        queue.shutdown().await;

        let err = queue.dispatch(test_order()).await.unwrap_err();
        assert!(err.to_string().contains("shut down"));
    }
}
