//! Service - Validated submission surface and order lookups

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::adapters::{MemoryActiveCache, MemoryOrderStore};
use crate::core::error::ValidationError;
use crate::core::{
    ActiveCache, Config, Error, Executor, Order, OrderId, OrderRequest, OrderSnapshot, OrderStore,
    QuoteSource, Result, StatusEvent, Token,
};
use crate::engine::LifecycleEngine;
use crate::execution::SimExecutor;
use crate::queue::DispatchQueue;
use crate::router::Router;
use crate::sources::{PriceTable, SimQuoteSource};
use crate::status::{StatusDistributor, Subscription};

/// An accepted submission: the order id plus a live event stream.
pub struct Submission {
    pub order_id: OrderId,
    pub events: Subscription,
}

/// Front door for swap orders. Owns the wiring between validation, the
/// dispatch queue, and the lookup surfaces.
pub struct SwapService {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn ActiveCache>,
    distributor: Arc<StatusDistributor>,
    queue: Arc<DispatchQueue>,
}

impl SwapService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn ActiveCache>,
        distributor: Arc<StatusDistributor>,
        queue: Arc<DispatchQueue>,
    ) -> Self {
        Self {
            store,
            cache,
            distributor,
            queue,
        }
    }

    /// Assemble the full simulated stack from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let [first, second] = config.sources.as_slice() else {
            return Err(Error::Config(format!(
                "expected exactly 2 sources, got {}",
                config.sources.len()
            )));
        };

        let prices = PriceTable::new(&config.pricing);
        let primary: Arc<dyn QuoteSource> =
            Arc::new(SimQuoteSource::new(first.clone(), prices.clone()));
        let secondary: Arc<dyn QuoteSource> =
            Arc::new(SimQuoteSource::new(second.clone(), prices));
        let executor: Arc<dyn Executor> =
            Arc::new(SimExecutor::new(config.execution.clone(), &config.sources));

        let store: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
        let cache: Arc<dyn ActiveCache> = Arc::new(MemoryActiveCache::new(config.cache.ttl_secs));
        let distributor = Arc::new(StatusDistributor::new(config.status.replay_capacity));

        let engine = Arc::new(LifecycleEngine::new(
            config.engine.clone(),
            Router::new(primary, secondary),
            executor,
            store.clone(),
            cache.clone(),
            distributor.clone(),
        ));
        let queue = Arc::new(DispatchQueue::new(config.queue.clone(), engine));

        Ok(Self::new(store, cache, distributor, queue))
    }

    /// Validate and accept a swap request. The subscription is registered
    /// before the order is queued, so the caller never misses an event.
    pub async fn submit(&self, request: OrderRequest) -> Result<Submission> {
        let order = Self::validate(request)?;

        if let Err(err) = self.store.create(&order).await {
            warn!("store create failed for {}: {}", order.id, err);
        }

        let events = self.distributor.subscribe(order.id);
        if let Err(err) = self.queue.dispatch(order.clone()).await {
            self.distributor.release(order.id);
            return Err(err);
        }

        info!(
            "accepted {} ({} -> {}, amount {})",
            order.id, order.token_in, order.token_out, order.amount_in
        );

        Ok(Submission {
            order_id: order.id,
            events,
        })
    }

    /// Attach another observer to an order's event stream.
    pub fn subscribe(&self, order_id: OrderId) -> Subscription {
        self.distributor.subscribe(order_id)
    }

    /// Full persisted status history, oldest first.
    pub async fn history(&self, order_id: OrderId) -> Result<Vec<StatusEvent>> {
        self.store.history(order_id).await
    }

    /// Latest cached snapshot for an in-flight order.
    pub async fn active(&self, order_id: OrderId) -> Result<Option<OrderSnapshot>> {
        self.cache.get(order_id).await
    }

    /// Drop an order's fan-out topic once every observer is done.
    pub fn release(&self, order_id: OrderId) {
        self.distributor.release(order_id);
    }

    /// Drain the dispatch queue and stop its workers.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    fn validate(request: OrderRequest) -> Result<Order> {
        let token_in = Token::new(request.token_in);
        let token_out = Token::new(request.token_out);

        if token_in.is_empty() || token_out.is_empty() {
            return Err(ValidationError::EmptyToken.into());
        }
        if token_in == token_out {
            return Err(ValidationError::SameToken(token_in.to_string()).into());
        }
        if request.amount_in <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(request.amount_in).into());
        }
        if let Some(tolerance) = request.slippage_tolerance {
            if tolerance < Decimal::ZERO || tolerance >= Decimal::ONE {
                return Err(ValidationError::SlippageOutOfRange(tolerance).into());
            }
        }

        Ok(Order {
            id: OrderId::new(),
            kind: request.kind,
            token_in,
            token_out,
            amount_in: request.amount_in,
            slippage_tolerance: request.slippage_tolerance,
            accepted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{
        EngineConfig, ExecutionConfig, PricingConfig, QueueConfig, SourceConfig,
    };
    use crate::core::{OrderKind, OrderStatus};
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, HashSet};

    fn instant_source_config(tag: &str) -> SourceConfig {
        SourceConfig {
            tag: tag.to_string(),
            fee: dec!(0.0025),
            noise_bps: 0,
            bias_bps: 0,
            latency_ms: 0,
            jitter_ms: 0,
        }
    }

    fn instant_source(tag: &str, mid: Decimal) -> Arc<dyn QuoteSource> {
        let pricing = PricingConfig {
            mids: HashMap::new(),
            default_mid: mid,
        };
        Arc::new(SimQuoteSource::new(
            instant_source_config(tag),
            PriceTable::new(&pricing),
        ))
    }

    struct TestStack {
        service: Arc<SwapService>,
        store: Arc<MemoryOrderStore>,
        distributor: Arc<StatusDistributor>,
    }

    fn build_stack(
        primary: Arc<dyn QuoteSource>,
        secondary: Arc<dyn QuoteSource>,
        executor: Arc<dyn Executor>,
        max_attempts: u32,
    ) -> TestStack {
        let store = Arc::new(MemoryOrderStore::new());
        let cache = Arc::new(MemoryActiveCache::new(60));
        let distributor = Arc::new(StatusDistributor::new(32));
        let engine = Arc::new(LifecycleEngine::new(
            EngineConfig {
                build_delay_ms: 2,
                routing_timeout_ms: 500,
                execution_timeout_ms: 500,
            },
            Router::new(primary, secondary),
            executor,
            store.clone(),
            cache.clone(),
            distributor.clone(),
        ));
        let queue = Arc::new(DispatchQueue::new(
            QueueConfig {
                workers: 10,
                capacity: 64,
                max_attempts,
                retry_base_ms: 10,
                retry_cap_ms: 100,
            },
            engine,
        ));
        TestStack {
            service: Arc::new(SwapService::new(
                store.clone(),
                cache,
                distributor.clone(),
                queue,
            )),
            store,
            distributor,
        }
    }

    fn instant_executor(failure_rate: f64) -> Arc<dyn Executor> {
        Arc::new(SimExecutor::new(
            ExecutionConfig {
                latency_ms: 0,
                jitter_ms: 0,
                noise_bps: 5,
                failure_rate,
            },
            &[],
        ))
    }

    fn market_request(token_in: &str, token_out: &str, amount: Decimal) -> OrderRequest {
        OrderRequest {
            kind: OrderKind::Market,
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            amount_in: amount,
            slippage_tolerance: None,
        }
    }

    async fn collect_until_terminal(sub: &mut Subscription) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Some(event) = sub.next().await {
            let terminal = event.status.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn test_market_order_confirms_end_to_end() {
        let stack = build_stack(
            instant_source("raydium", dec!(150)),
            instant_source("orca", dec!(150.4)),
            instant_executor(0.0),
            3,
        );

        let mut submission = stack
            .service
            .submit(market_request("SOL", "USDC", dec!(100)))
            .await
            .unwrap();

        let events = collect_until_terminal(&mut submission.events).await;
        let labels: Vec<_> = events.iter().map(|e| e.status.label()).collect();
        assert_eq!(
            labels,
            ["pending", "routing", "routing", "building", "submitted", "confirmed"]
        );
        match &events[5].status {
            OrderStatus::Confirmed {
                settlement_id,
                realized_price,
            } => {
                assert!(!settlement_id.is_empty());
                assert!(*realized_price > Decimal::ZERO);
            }
            other => panic!("expected confirmed, got {:?}", other),
        }

        let history = stack.service.history(submission.order_id).await.unwrap();
        assert_eq!(history.len(), 6);

        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_cheaper_source_tag_is_chosen() {
        let stack = build_stack(
            instant_source("raydium", dec!(120)),
            instant_source("orca", dec!(100)),
            instant_executor(0.0),
            3,
        );

        let mut submission = stack
            .service
            .submit(market_request("SOL", "USDC", dec!(100)))
            .await
            .unwrap();

        let events = collect_until_terminal(&mut submission.events).await;
        match &events[2].status {
            OrderStatus::Routing { chosen, price } => {
                assert_eq!(chosen.as_deref(), Some("orca"));
                assert_eq!(*price, Some(dec!(100)));
            }
            other => panic!("expected routed status, got {:?}", other),
        }

        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_execution_failure_reaches_the_subscriber() {
        let stack = build_stack(
            instant_source("raydium", dec!(150)),
            instant_source("orca", dec!(150.4)),
            instant_executor(1.0),
            1,
        );

        let mut submission = stack
            .service
            .submit(market_request("SOL", "USDC", dec!(100)))
            .await
            .unwrap();

        let events = collect_until_terminal(&mut submission.events).await;
        match &events.last().unwrap().status {
            OrderStatus::Failed { reason } => assert!(reason.contains("swap failed")),
            other => panic!("expected failed, got {:?}", other),
        }
        assert!(events.iter().all(|e| e.status.label() != "confirmed"));

        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_priced_pair_fails_cleanly() {
        let stack = build_stack(
            instant_source("raydium", dec!(0)),
            instant_source("orca", dec!(0)),
            instant_executor(0.0),
            1,
        );

        let mut request = market_request("SOL", "USDC", dec!(100));
        request.slippage_tolerance = Some(dec!(0.01));
        let mut submission = stack.service.submit(request).await.unwrap();

        let events = collect_until_terminal(&mut submission.events).await;
        match &events.last().unwrap().status {
            OrderStatus::Failed { reason } => {
                assert!(reason.contains("non-positive quoted price"))
            }
            other => panic!("expected failed, got {:?}", other),
        }

        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejections_happen_before_any_event() {
        let stack = build_stack(
            instant_source("raydium", dec!(150)),
            instant_source("orca", dec!(150.4)),
            instant_executor(0.0),
            3,
        );

        let zero_amount = market_request("SOL", "USDC", dec!(0));
        assert!(matches!(
            stack.service.submit(zero_amount).await,
            Err(Error::Validation(ValidationError::NonPositiveAmount(_)))
        ));

        let same_token = market_request("SOL", "sol", dec!(100));
        assert!(matches!(
            stack.service.submit(same_token).await,
            Err(Error::Validation(ValidationError::SameToken(_)))
        ));

        let empty_token = market_request("  ", "USDC", dec!(100));
        assert!(matches!(
            stack.service.submit(empty_token).await,
            Err(Error::Validation(ValidationError::EmptyToken))
        ));

        let mut bad_slippage = market_request("SOL", "USDC", dec!(100));
        bad_slippage.slippage_tolerance = Some(dec!(1));
        assert!(matches!(
            stack.service.submit(bad_slippage).await,
            Err(Error::Validation(ValidationError::SlippageOutOfRange(_)))
        ));

        // nothing was recorded or published for any of them
        assert!(stack.store.is_empty());
        assert_eq!(stack.distributor.topic_count(), 0);

        stack.service.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_thousand_orders_get_distinct_settlements() {
        let stack = build_stack(
            instant_source("raydium", dec!(150)),
            instant_source("orca", dec!(150.4)),
            instant_executor(0.0),
            3,
        );

        let mut watchers = Vec::with_capacity(1_000);
        for _ in 0..1_000 {
            let service = stack.service.clone();
            watchers.push(tokio::spawn(async move {
                let submission = service
                    .submit(market_request("SOL", "USDC", dec!(100)))
                    .await
                    .unwrap();
                let mut events = submission.events;
                while let Some(event) = events.next().await {
                    match event.status {
                        OrderStatus::Confirmed { settlement_id, .. } => return settlement_id,
                        OrderStatus::Failed { reason } => {
                            panic!("unexpected failure: {}", reason)
                        }
                        _ => {}
                    }
                }
                panic!("stream ended before confirmation");
            }));
        }

        let ids: HashSet<String> = futures::future::join_all(watchers)
            .await
            .into_iter()
            .map(|res| res.unwrap())
            .collect();
        assert_eq!(ids.len(), 1_000);
        assert_eq!(stack.store.len(), 1_000);

        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_from_config_wires_a_working_stack() {
        let mut config = Config::default();
        config.engine.build_delay_ms = 2;
        for source in &mut config.sources {
            source.latency_ms = 0;
            source.jitter_ms = 0;
        }
        config.execution.latency_ms = 0;
        config.execution.jitter_ms = 0;

        let service = SwapService::from_config(&config).unwrap();
        let mut submission = service
            .submit(market_request("SOL", "USDC", dec!(100)))
            .await
            .unwrap();

        let events = collect_until_terminal(&mut submission.events).await;
        assert_eq!(events.last().unwrap().status.label(), "confirmed");

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_from_config_requires_two_sources() {
        let mut config = Config::default();
        config.sources.truncate(1);
        assert!(SwapService::from_config(&config).is_err());
    }
}
