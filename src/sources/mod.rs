//! Liquidity sources - Simulated venue quoting with configurable noise

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::RngExt;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::core::config::{PricingConfig, SourceConfig};
use crate::core::{Quote, QuoteSource, Result, Token, apply_bps};

/// Mid prices per token pair, shared by every simulated source
#[derive(Debug, Clone)]
pub struct PriceTable {
    mids: HashMap<(Token, Token), Decimal>,
    default_mid: Decimal,
}

impl PriceTable {
    pub fn new(config: &PricingConfig) -> Self {
        let mut mids = HashMap::new();
        for (pair, mid) in &config.mids {
            match pair.split_once('/') {
                Some((base, quote)) => {
                    mids.insert((Token::new(base), Token::new(quote)), *mid);
                }
                None => warn!("ignoring malformed pricing pair {:?}", pair),
            }
        }
        Self {
            mids,
            default_mid: config.default_mid,
        }
    }

    /// Mid price for a pair; inverse pairs use the reciprocal
    pub fn mid(&self, token_in: &Token, token_out: &Token) -> Decimal {
        if let Some(mid) = self.mids.get(&(token_in.clone(), token_out.clone())) {
            return *mid;
        }
        if let Some(mid) = self.mids.get(&(token_out.clone(), token_in.clone())) {
            if !mid.is_zero() {
                return Decimal::ONE / *mid;
            }
        }
        self.default_mid
    }
}

/// A simulated venue. Venues differ only in fee, noise, and latency.
pub struct SimQuoteSource {
    config: SourceConfig,
    prices: PriceTable,
}

impl SimQuoteSource {
    pub fn new(config: SourceConfig, prices: PriceTable) -> Self {
        Self { config, prices }
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

    fn noisy(&self, mid: Decimal) -> Decimal {
        if self.config.noise_bps == 0 {
            return mid;
        }
        let span = i64::from(self.config.noise_bps);
        apply_bps(mid, rand::rng().random_range(-span..=span))
    }
}

#[async_trait]
impl QuoteSource for SimQuoteSource {
    fn tag(&self) -> &str {
        &self.config.tag
    }

    async fn quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: Decimal,
    ) -> Result<Quote> {
        tokio::time::sleep(self.jittered_latency()).await;

        let price = self.noisy(self.prices.mid(token_in, token_out));

        debug!(
            "{} quoted {}/{} amount {} at {}",
            self.config.tag, token_in, token_out, amount_in, price
        );

        Ok(Quote {
            source: self.config.tag.clone(),
            price,
            fee: self.config.fee,
        })
    }
}
