//! Configuration - Typed, TOML-backed settings for the simulation stack

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::core::error::{Error, Result};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lifecycle engine pacing and deadlines
    pub engine: EngineConfig,

    /// The two liquidity sources, in preference order
    pub sources: Vec<SourceConfig>,

    /// Execution simulator
    pub execution: ExecutionConfig,

    /// Dispatch queue
    pub queue: QueueConfig,

    /// Active-order cache
    pub cache: CacheConfig,

    /// Status distribution
    pub status: StatusConfig,

    /// Mid prices used by the quote model
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulated build/preparation delay
    pub build_delay_ms: u64,

    /// Deadline for the whole quote fan-out
    pub routing_timeout_ms: u64,

    /// Deadline for execution
    pub execution_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Venue tag reported in routing events
    pub tag: String,

    /// Fee fraction in [0, 1)
    pub fee: Decimal,

    /// Quote noise half-width in basis points
    pub noise_bps: u32,

    /// Systematic execution bias in basis points, signed
    pub bias_bps: i32,

    /// Base quote latency
    pub latency_ms: u64,

    /// Uniform latency jitter half-width
    pub jitter_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Base settlement latency
    pub latency_ms: u64,

    /// Uniform latency jitter half-width
    pub jitter_ms: u64,

    /// Slippage noise half-width in basis points
    pub noise_bps: u32,

    /// Probability that an attempt fails outright (0.0-1.0)
    pub failure_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Concurrent lifecycle workers
    pub workers: usize,

    /// Bounded channel capacity
    pub capacity: usize,

    /// Attempts per order before giving up
    pub max_attempts: u32,

    /// First retry delay; doubles per retry
    pub retry_base_ms: u64,

    /// Upper bound on a single retry delay
    pub retry_cap_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Active-entry lifetime
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Events replayed to late subscribers, per order
    pub replay_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Mid prices per "BASE/QUOTE" pair
    pub mids: HashMap<String, Decimal>,

    /// Fallback mid for unknown pairs
    pub default_mid: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            build_delay_ms: 250,
            routing_timeout_ms: 2_000,
            execution_timeout_ms: 5_000,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            latency_ms: 350,
            jitter_ms: 150,
            noise_bps: 20,
            failure_rate: 0.0,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            capacity: 256,
            max_attempts: 3,
            retry_base_ms: 500,
            retry_cap_ms: 5_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { replay_capacity: 64 }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let mut mids = HashMap::new();
        mids.insert("SOL/USDC".to_string(), dec!(150));
        mids.insert("SOL/USDT".to_string(), dec!(150.2));
        mids.insert("ETH/USDC".to_string(), dec!(3200));
        mids.insert("BTC/USDC".to_string(), dec!(64000));
        Self {
            mids,
            default_mid: Decimal::ONE,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            sources: vec![
                SourceConfig {
                    tag: "raydium".to_string(),
                    fee: dec!(0.0025),
                    noise_bps: 20,
                    bias_bps: 5,
                    latency_ms: 40,
                    jitter_ms: 25,
                },
                SourceConfig {
                    tag: "orca".to_string(),
                    fee: dec!(0.003),
                    noise_bps: 35,
                    bias_bps: -4,
                    latency_ms: 55,
                    jitter_ms: 30,
                },
            ],
            execution: ExecutionConfig::default(),
            queue: QueueConfig::default(),
            cache: CacheConfig::default(),
            status: StatusConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Load from the path in SWAPFLOW_CONFIG, falling back to defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var("SWAPFLOW_CONFIG") {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }
}
