//! Retry with exponential backoff and a per-call timeout.
//!
//! Every call into the ledger, content store or idempotency index goes
//! through [`Retry::call`]: each attempt is bounded by a timeout, and only
//! errors classified transient by [`StoreError::is_transient`] are retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use receipt_vault_store::StoreError;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = just the initial attempt).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Jitter factor (0.0-1.0) applied around the computed delay.
    pub jitter: f64,
    /// Upper bound on a single attempt.
    pub call_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.3,
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Fast retries with no jitter, for local backends and tests.
    pub fn fast() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
            jitter: 0.0,
            call_timeout: Duration::from_secs(1),
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::fast()
        }
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter factor.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let delay = if self.jitter > 0.0 {
            let range = capped * self.jitter;
            let offset = rand::thread_rng().gen_range(-range..=range);
            (capped + offset).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }
}

/// Runs store calls under a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    /// Create a retry executor.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run a store call with timeout and retry.
    ///
    /// `context` names the call in logs.
    pub async fn call<F, Fut, T>(&self, context: &'static str, operation: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = match tokio::time::timeout(self.config.call_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout),
            };

            match outcome {
                Ok(value) => {
                    if attempts > 1 {
                        tracing::debug!(context, attempts, "store call succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempts <= self.config.max_retries => {
                    let delay = self.config.delay_for_attempt(attempts - 1);
                    tracing::warn!(
                        context,
                        attempt = attempts,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "store call failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(context, attempts, error = %e, "store call failed after all retries");
                    }
                    return Err(e);
                }
            }
        }
    }
}
