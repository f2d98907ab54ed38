//! Failure policies: backoff for bus target delivery, redrive for queues.

use std::time::Duration;

/// Exponential backoff for re-sending an event to a target that refused it.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total send attempts per target, including the first.
    pub max_attempts: u32,

    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
        }
    }

    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// Delay before the next attempt, `attempts` being the attempts made so
    /// far (1-indexed): `base_delay * multiplier^(attempts - 1)`.
    ///
    /// With base_delay=100ms, multiplier=2.0: 100ms, 200ms, 400ms, ...
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        if delay_secs.is_finite() {
            Duration::from_secs_f64(delay_secs)
        } else {
            Duration::MAX
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), 2.0)
    }
}

/// How many deliveries a message gets before it is moved to the dead state.
/// `None` keeps redelivering forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedrivePolicy {
    pub max_receive_count: Option<u32>,
}

impl RedrivePolicy {
    pub fn unlimited() -> Self {
        Self {
            max_receive_count: None,
        }
    }

    pub fn max_receives(count: u32) -> Self {
        Self {
            max_receive_count: Some(count),
        }
    }

    /// Whether a message already received `receive_count` times may be
    /// delivered again.
    pub fn allows_delivery(&self, receive_count: u32) -> bool {
        self.max_receive_count
            .is_none_or(|max| receive_count < max)
    }
}
