use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry schedule for a single downstream call.
///
/// The delay after attempt `n` is `initial_backoff * backoff_factor^(n-1)`,
/// capped at `max_backoff`. Every attempt is bounded by `attempt_timeout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    pub backoff_factor: u32,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    #[serde(with = "millis")]
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_factor: 2,
            max_backoff: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// All attempts failed. `last_error` describes the final failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: String,
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DispatchError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_factor == 0 {
            return Err(DispatchError::ConfigError(
                "backoff_factor must be at least 1".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(DispatchError::ConfigError(
                "attempt_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_factor.saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `op` until it succeeds or `max_attempts` attempts have failed.
    ///
    /// Never returns early with an error: every failure, including an attempt
    /// timeout, is folded into the next attempt or into `RetryExhausted`.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> std::result::Result<T, RetryExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match tokio::time::timeout(self.attempt_timeout, op(attempt)).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!(
                        "attempt timed out after {}ms",
                        self.attempt_timeout.as_millis()
                    )
                }
            }

            if attempt < max_attempts {
                let delay = self.delay_after(attempt);
                tracing::debug!(
                    attempt,
                    error = %last_error,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(RetryExhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
