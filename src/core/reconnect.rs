use std::time::Duration;

use rand::Rng;

use super::types::WsReconnectStrategy;

/// Highest exponent applied to the initial delay; `2^16` seconds already dwarfs any sane cap.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Tunables for [`ExponentialBackoffReconnect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_millis(30_000),
            jitter: false,
        }
    }
}

/// Bounded doubling backoff: `min(initial * 2^attempt, max)`.
///
/// With the defaults this yields 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...
#[derive(Clone, Debug)]
pub struct ExponentialBackoffReconnect {
    config: BackoffConfig,
    attempt: u32,
    retry: bool,
}

impl ExponentialBackoffReconnect {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self::with_config(BackoffConfig {
            initial,
            max,
            jitter: false,
        })
    }

    pub fn with_config(config: BackoffConfig) -> Self {
        Self {
            config,
            attempt: 0,
            retry: true,
        }
    }

    pub fn abort(mut self) -> Self {
        self.retry = false;
        self
    }

    /// Delay for a given consecutive-failure count, without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.config
            .initial
            .checked_mul(factor)
            .unwrap_or(self.config.max)
            .min(self.config.max)
    }
}

impl Default for ExponentialBackoffReconnect {
    fn default() -> Self {
        Self::with_config(BackoffConfig::default())
    }
}

impl WsReconnectStrategy for ExponentialBackoffReconnect {
    fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        if self.config.jitter {
            jitter_delay(delay)
        } else {
            delay
        }
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn should_retry(&self) -> bool {
        self.retry
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Scale a delay into `[base / 2, base]`.
pub fn jitter_delay(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }

    let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.0);
    let nanos = (base.as_nanos() as f64 * jitter) as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}
