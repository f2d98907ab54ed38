//! # Pipeline Configuration
//!
//! Defaults overridden by `FANOUT_*` environment variables.
//!
//! ```text
//! FANOUT_ORDER_BATCH_SIZE        1      messages per order-recorder batch
//! FANOUT_INVENTORY_BATCH_SIZE    10     messages per inventory batch
//! FANOUT_PAYMENT_BATCH_SIZE      5      messages per payment batch
//! FANOUT_WORKERS_PER_QUEUE       1      concurrent consumers per queue
//! FANOUT_VISIBILITY_TIMEOUT_SECS 30     hide time of a received message
//! FANOUT_POLL_WAIT_MS            1000   long-poll wait of a receive
//! FANOUT_MAX_RECEIVE_COUNT       unset  redrive limit (unset = redeliver forever)
//! FANOUT_BUS_MAX_ATTEMPTS        3      send attempts per bus target
//! FANOUT_BUS_BASE_DELAY_MS       100    first bus retry delay, doubled per attempt
//! FANOUT_SETTLEMENT_RATIO        0.9    share of payments that complete
//! FANOUT_SETTLEMENT_SEED         unset  seed for reproducible settlements
//! FANOUT_REORDER_LEVEL           10     low-stock threshold for seeded products
//! FANOUT_DECREMENT_STRATEGY      item_by_item | all_or_nothing
//! ```
//!
//! Values are checked at load; a bad value is a [`ConfigError`], never a
//! silent fallback.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::domain::inventory::DEFAULT_REORDER_LEVEL;
use crate::impls::DEFAULT_SUCCESS_RATIO;

/// Largest batch a queue hands out per receive.
pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key}={value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Multi-item policy of the inventory consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecrementMode {
    /// One conditional write per item; earlier items survive a rejection.
    #[default]
    ItemByItem,
    /// All items of a message in one transaction.
    AllOrNothing,
}

impl fmt::Display for DecrementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecrementMode::ItemByItem => write!(f, "item_by_item"),
            DecrementMode::AllOrNothing => write!(f, "all_or_nothing"),
        }
    }
}

impl FromStr for DecrementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "item_by_item" | "item-by-item" => Ok(DecrementMode::ItemByItem),
            "all_or_nothing" | "all-or-nothing" | "transactional" => {
                Ok(DecrementMode::AllOrNothing)
            }
            other => Err(format!(
                "unknown decrement strategy '{other}', expected item_by_item or all_or_nothing"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub order_batch_size: usize,
    pub inventory_batch_size: usize,
    pub payment_batch_size: usize,
    pub workers_per_queue: usize,
    pub visibility_timeout: Duration,
    pub poll_wait: Duration,
    pub max_receive_count: Option<u32>,
    pub bus_max_attempts: u32,
    pub bus_base_delay: Duration,
    pub settlement_ratio: f64,
    pub settlement_seed: Option<u64>,
    pub reorder_level: u32,
    pub decrement: DecrementMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            order_batch_size: 1,
            inventory_batch_size: 10,
            payment_batch_size: 5,
            workers_per_queue: 1,
            visibility_timeout: Duration::from_secs(30),
            poll_wait: Duration::from_millis(1000),
            max_receive_count: None,
            bus_max_attempts: 3,
            bus_base_delay: Duration::from_millis(100),
            settlement_ratio: DEFAULT_SUCCESS_RATIO,
            settlement_seed: None,
            reorder_level: DEFAULT_REORDER_LEVEL,
            decrement: DecrementMode::ItemByItem,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let env = Lookup(&lookup);

        if let Some(n) = env.parse("FANOUT_ORDER_BATCH_SIZE")? {
            config.order_batch_size = batch_size("FANOUT_ORDER_BATCH_SIZE", n)?;
        }
        if let Some(n) = env.parse("FANOUT_INVENTORY_BATCH_SIZE")? {
            config.inventory_batch_size = batch_size("FANOUT_INVENTORY_BATCH_SIZE", n)?;
        }
        if let Some(n) = env.parse("FANOUT_PAYMENT_BATCH_SIZE")? {
            config.payment_batch_size = batch_size("FANOUT_PAYMENT_BATCH_SIZE", n)?;
        }
        if let Some(n) = env.parse::<usize>("FANOUT_WORKERS_PER_QUEUE")? {
            if n == 0 {
                return Err(ConfigError::invalid("FANOUT_WORKERS_PER_QUEUE", "0", "must be at least 1"));
            }
            config.workers_per_queue = n;
        }
        if let Some(secs) = env.parse("FANOUT_VISIBILITY_TIMEOUT_SECS")? {
            config.visibility_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env.parse("FANOUT_POLL_WAIT_MS")? {
            config.poll_wait = Duration::from_millis(ms);
        }
        if let Some(n) = env.parse::<u32>("FANOUT_MAX_RECEIVE_COUNT")? {
            if n == 0 {
                return Err(ConfigError::invalid("FANOUT_MAX_RECEIVE_COUNT", "0", "must be at least 1"));
            }
            config.max_receive_count = Some(n);
        }
        if let Some(n) = env.parse::<u32>("FANOUT_BUS_MAX_ATTEMPTS")? {
            if n == 0 {
                return Err(ConfigError::invalid("FANOUT_BUS_MAX_ATTEMPTS", "0", "must be at least 1"));
            }
            config.bus_max_attempts = n;
        }
        if let Some(ms) = env.parse("FANOUT_BUS_BASE_DELAY_MS")? {
            config.bus_base_delay = Duration::from_millis(ms);
        }
        if let Some(ratio) = env.parse::<f64>("FANOUT_SETTLEMENT_RATIO")? {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::invalid(
                    "FANOUT_SETTLEMENT_RATIO",
                    &ratio.to_string(),
                    "must be between 0 and 1",
                ));
            }
            config.settlement_ratio = ratio;
        }
        if let Some(seed) = env.parse("FANOUT_SETTLEMENT_SEED")? {
            config.settlement_seed = Some(seed);
        }
        if let Some(level) = env.parse("FANOUT_REORDER_LEVEL")? {
            config.reorder_level = level;
        }
        if let Some(mode) = env.parse("FANOUT_DECREMENT_STRATEGY")? {
            config.decrement = mode;
        }

        debug!(?config, "pipeline config loaded");
        Ok(config)
    }
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// `None` when the key is unset or blank.
    fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = (self.0)(key) else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string()))
    }
}

fn batch_size(key: &'static str, n: usize) -> Result<usize, ConfigError> {
    if (1..=MAX_BATCH_SIZE).contains(&n) {
        Ok(n)
    } else {
        Err(ConfigError::invalid(
            key,
            &n.to_string(),
            format!("must be between 1 and {MAX_BATCH_SIZE}"),
        ))
    }
}
