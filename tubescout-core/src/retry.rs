use crate::error::CoreError;
use crate::quota::{self, FailureClass, QuotaExceeded};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Snapshot of retry counters for the run summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryMetrics {
    pub total_calls: u64,
    pub total_retries: u64,
    pub exhausted: u64,
    pub aborted: u64,
    pub quota_halts: u64,
}

#[derive(Debug, Default)]
struct RetryCounters {
    total_calls: AtomicU64,
    total_retries: AtomicU64,
    exhausted: AtomicU64,
    aborted: AtomicU64,
    quota_halts: AtomicU64,
}

/// Wraps remote calls with bounded, fixed-delay retry.
///
/// The outcome of [`RetryExecutor::execute`] has three shapes:
/// `Ok(Some(value))` on success, `Ok(None)` when the call failed for good
/// (retries exhausted or a non-transient error), and `Err(QuotaExceeded)`
/// when the quota guard fired. Only the last one may abort a run.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    classifier: fn(&CoreError) -> FailureClass,
    counters: Arc<RetryCounters>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            classifier: quota::classify,
            counters: Arc::new(RetryCounters::default()),
        }
    }

    /// Replace the failure classifier (defaults to [`quota::classify`]).
    pub fn with_classifier(mut self, classifier: fn(&CoreError) -> FailureClass) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<Option<T>, QuotaExceeded>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        self.counters.total_calls.fetch_add(1, Ordering::Relaxed);

        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            "Operation {} succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(Some(result));
                }
                Err(error) => error,
            };

            match (self.classifier)(&error) {
                FailureClass::Quota => {
                    self.counters.quota_halts.fetch_add(1, Ordering::Relaxed);
                    error!(
                        operation = operation_name,
                        "Quota exhausted, halting without retry: {}", error
                    );
                    return Err(QuotaExceeded {
                        operation: operation_name.to_string(),
                        detail: error.to_string(),
                    });
                }
                FailureClass::Other => {
                    self.counters.aborted.fetch_add(1, Ordering::Relaxed);
                    error!(
                        operation = operation_name,
                        "Unexpected error, not retrying: {}", error
                    );
                    return Ok(None);
                }
                FailureClass::Transient => {
                    error!(
                        "[{}] Attempt {}/{} -> error: {}",
                        operation_name, attempt, self.config.max_attempts, error
                    );
                    if attempt < self.config.max_attempts {
                        self.counters.total_retries.fetch_add(1, Ordering::Relaxed);
                        info!(
                            "Waiting {:?} and then will retry {}",
                            self.config.delay, operation_name
                        );
                        sleep(self.config.delay).await;
                    }
                }
            }
        }

        self.counters.exhausted.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Retry limit exceeded for {} after {} attempts",
            operation_name, self.config.max_attempts
        );
        Ok(None)
    }

    pub fn get_metrics(&self) -> RetryMetrics {
        RetryMetrics {
            total_calls: self.counters.total_calls.load(Ordering::Relaxed),
            total_retries: self.counters.total_retries.load(Ordering::Relaxed),
            exhausted: self.counters.exhausted.load(Ordering::Relaxed),
            aborted: self.counters.aborted.load(Ordering::Relaxed),
            quota_halts: self.counters.quota_halts.load(Ordering::Relaxed),
        }
    }
}
