//! Backoff strategies, jitter and the retry policy seam
//!
//! The delay before retry `n` (1-based, i.e. after the `n`-th failed
//! attempt) is
//!
//! ```text
//! delay = min(backoff(n) + jitter, max_delay)
//! ```
//!
//! where `backoff(n)` for the exponential strategy is
//! `initial_delay * multiplier^(n-1)`.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Invalid retry configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryConfigError {
    #[error("max_attempts must be greater than 0")]
    ZeroAttempts,

    #[error("exponential multiplier must be >= 1.0, got {0}")]
    InvalidMultiplier(f64),
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide what to do after `attempt` (1-based) failed with `error`
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the configured backoff delay
    Retry,
    /// Retry the operation after a server-provided delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        !matches!(self, Self::Stop)
    }
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: initial_delay * multiplier^(attempt-1)
    Exponential { initial_delay: Duration, multiplier: f64 },
}

impl BackoffStrategy {
    /// Calculate the un-jittered delay for retry number `attempt` (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, multiplier } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let factor = multiplier.powi(exponent);
                if factor.is_finite() {
                    initial_delay.mul_f64(factor.min(1e9))
                } else {
                    Duration::MAX
                }
            }
        }
    }
}

/// Jitter added on top of the backoff delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// No jitter
    None,
    /// Uniform jitter drawn from `[0, max)`
    Uniform { max: Duration },
}

impl Jitter {
    /// Draw a jitter sample
    pub fn sample(&self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Uniform { max } => {
                let max_micros = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
                if max_micros == 0 {
                    return Duration::ZERO;
                }
                Duration::from_micros(rand::thread_rng().gen_range(0..max_micros))
            }
        }
    }

    /// Upper bound (exclusive) of the jitter this produces
    pub fn bound(&self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Uniform { max } => *max,
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter added to each delay
    pub jitter: Jitter,
    /// Cap applied after jitter
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_secs(1),
                multiplier: 2.0,
            },
            jitter: Jitter::Uniform { max: Duration::from_secs(1) },
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError::ZeroAttempts);
        }
        if let BackoffStrategy::Exponential { multiplier, .. } = self.backoff {
            if multiplier.is_nan() || multiplier < 1.0 {
                return Err(RetryConfigError::InvalidMultiplier(multiplier));
            }
        }
        Ok(())
    }

    /// Whether another attempt is allowed after `attempt` attempts were made
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Jittered, capped delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, self.jitter.sample())
    }

    /// Capped delay before retry `attempt` with an explicit jitter sample
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        self.backoff.calculate_delay(attempt).saturating_add(jitter).min(self.max_delay)
    }
}
