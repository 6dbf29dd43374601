//! Execution - Simulated settlement with venue bias and slippage noise

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::RngExt;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::core::config::{ExecutionConfig, SourceConfig};
use crate::core::{Error, ExecutionResult, Executor, Order, Quote, Result, apply_bps};

/// Simulated executor. The realized price drifts from the quote by a
/// per-venue systematic bias plus symmetric random noise.
pub struct SimExecutor {
    config: ExecutionConfig,
    bias_bps: HashMap<String, i32>,
}

impl SimExecutor {
    pub fn new(config: ExecutionConfig, sources: &[SourceConfig]) -> Self {
        let bias_bps = sources
            .iter()
            .map(|s| (s.tag.clone(), s.bias_bps))
            .collect();
        Self { config, bias_bps }
    }

    fn jittered_latency(&self) -> Duration {
        let base = self.config.latency_ms;
        let jitter = self.config.jitter_ms;
        let drawn = if jitter == 0 {
            base
        } else {
            (base + rand::rng().random_range(0..=jitter * 2)).saturating_sub(jitter)
        };
        Duration::from_millis(drawn)
    }

    fn realized_price(&self, quote: &Quote) -> Decimal {
        let bias = i64::from(self.bias_bps.get(&quote.source).copied().unwrap_or(0));
        let noise = if self.config.noise_bps == 0 {
            0
        } else {
            let span = i64::from(self.config.noise_bps);
            rand::rng().random_range(-span..=span)
        };
        apply_bps(quote.price, bias + noise)
    }

    fn draw_failure(&self) -> bool {
        self.config.failure_rate > 0.0 && rand::rng().random::<f64>() < self.config.failure_rate
    }
}

#[async_trait]
impl Executor for SimExecutor {
    async fn execute(&self, order: &Order, quote: &Quote) -> Result<ExecutionResult> {
        tokio::time::sleep(self.jittered_latency()).await;

        if self.draw_failure() {
            return Err(Error::Execution(format!("swap failed on {}", quote.source)));
        }

        let result = ExecutionResult {
            settlement_id: format!("sim-{}", Uuid::new_v4().simple()),
            realized_price: self.realized_price(quote),
        };

        debug!(
            "{} settled {} at {}",
            quote.source, order.id, result.realized_price
        );

        Ok(result)
    }
}
