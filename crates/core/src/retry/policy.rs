use std::time::Duration;

use steadfast_common::resilience::{
    BackoffStrategy, Jitter, RetryConfig, RetryDecision, RetryPolicy,
};
use steadfast_domain::{ApiError, RetrySettings};

/// Retry policy for outbound API calls
///
/// Connection failures, timeouts, 408, 429 and 5xx are retried up to the
/// attempt ceiling; every other status is terminal. A server `Retry-After`
/// hint replaces the computed backoff, capped at the maximum delay.
#[derive(Debug, Clone)]
pub struct HttpRetryPolicy {
    config: RetryConfig,
}

impl HttpRetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(RetryConfig {
            max_attempts: settings.max_attempts.max(1),
            backoff: BackoffStrategy::Exponential {
                initial_delay: settings.base_delay(),
                multiplier: settings.multiplier,
            },
            jitter: Jitter::Uniform { max: settings.max_jitter() },
            max_delay: settings.max_delay(),
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Jittered backoff before retry number `attempt`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.config.delay_for(attempt)
    }

    /// Wait implied by `decision`, `None` for [`RetryDecision::Stop`]
    pub fn wait_for(&self, decision: &RetryDecision, attempt: u32) -> Option<Duration> {
        match decision {
            RetryDecision::Retry => Some(self.backoff_delay(attempt)),
            RetryDecision::RetryAfter(delay) => Some(*delay),
            RetryDecision::Stop => None,
        }
    }
}

impl Default for HttpRetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy<ApiError> for HttpRetryPolicy {
    fn should_retry(&self, error: &ApiError, attempt: u32) -> RetryDecision {
        if !error.is_transient() || !self.config.has_attempts_left(attempt) {
            return RetryDecision::Stop;
        }
        match error.retry_after() {
            Some(hint) => RetryDecision::RetryAfter(hint.min(self.config.max_delay)),
            None => RetryDecision::Retry,
        }
    }
}
