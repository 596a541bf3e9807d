//! Retry policy with exponential backoff and jitter.
//!
//! Every remote call the driver makes goes through a [`RetryPolicy`]. Calls
//! that fail with a retryable error (throttling or a server fault) are retried
//! with an increasing delay until the attempt bound is reached; any other
//! failure is returned immediately.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hemmer_provider_oci::retry::RetryPolicy;
//! use hemmer_provider_oci::testing::{FakeCall, FakeCloud};
//! use hemmer_provider_oci::{ProviderError, RemoteResource, ResourceClient, ResourceId};
//!
//! # tokio_test::block_on(async {
//! let cloud = FakeCloud::new();
//! let id = ResourceId::new("ocid1.snapshot.oc1..nightly")?;
//! cloud.insert(RemoteResource::new(id.clone(), "ACTIVE"));
//! cloud.fail(FakeCall::Get, 503, 2);
//!
//! let policy = RetryPolicy::for_service("file_storage", false)
//!     .with_delays(Duration::from_millis(1), Duration::from_millis(10));
//! let snapshot = policy.execute("GetSnapshot", || cloud.get(&id)).await?;
//! assert_eq!(snapshot.state.as_str(), "ACTIVE");
//! assert_eq!(cloud.calls(FakeCall::Get), 3);
//! # Ok::<(), ProviderError>(())
//! # }).unwrap();
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::error::ProviderError;

/// Predicate deciding whether an error is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

/// Default attempt bound for synchronous operations.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Default attempt bound for operations backed by a work request.
pub const WORK_REQUEST_MAX_ATTEMPTS: u32 = 10;

/// Bounded exponential backoff around a remote call.
///
/// Policies are cheap to clone and are shared read-only between drivers.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Service the policy applies to, used for logging.
    pub service: String,
    /// Whether the policy guards a work-request based operation.
    pub work_request: bool,
    /// Total number of attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub backoff_multiplier: f64,
    /// Scale each delay by a random factor in `[0.5, 1.5)`.
    pub jitter: bool,
    should_retry: RetryPredicate,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("service", &self.service)
            .field("work_request", &self.work_request)
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_service("default", false)
    }
}

impl RetryPolicy {
    /// The default policy for a service.
    ///
    /// Work-request operations provision asynchronously on the remote side
    /// and get a longer backoff and a higher attempt bound.
    pub fn for_service(service: impl Into<String>, work_request: bool) -> Self {
        let (max_attempts, initial_delay, max_delay) = if work_request {
            (
                WORK_REQUEST_MAX_ATTEMPTS,
                Duration::from_secs(5),
                Duration::from_secs(60),
            )
        } else {
            (
                DEFAULT_MAX_ATTEMPTS,
                Duration::from_secs(1),
                Duration::from_secs(30),
            )
        };

        Self {
            service: service.into(),
            work_request,
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier: 2.0,
            jitter: true,
            should_retry: Arc::new(ProviderError::is_retryable),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry(service: impl Into<String>) -> Self {
        Self::for_service(service, false).with_max_attempts(1)
    }

    /// Set the total number of attempts. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the initial and maximum delay.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max.max(initial);
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the retryability predicate.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ProviderError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Whether the policy would retry this error.
    pub fn should_retry(&self, err: &ProviderError) -> bool {
        (self.should_retry)(err)
    }

    /// The un-jittered delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }

    /// Run `operation` under this policy.
    ///
    /// Returns as soon as the operation succeeds or fails with an error the
    /// predicate rejects. A persistently retryable failure is attempted
    /// exactly `max_attempts` times and the last error is returned.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            service = %self.service,
                            operation = %operation_name,
                            attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                },
                Err(e) if !self.should_retry(&e) => return Err(e),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        error!(
                            service = %self.service,
                            operation = %operation_name,
                            attempt,
                            error = %e,
                            "Operation failed after max retries"
                        );
                        return Err(e);
                    }

                    let delay = self.jittered(self.delay_for(attempt));
                    warn!(
                        service = %self.service,
                        operation = %operation_name,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::for_service("test", false)
            .with_max_attempts(attempts)
            .with_delays(Duration::from_millis(1), Duration::from_millis(10))
            .with_jitter(false)
    }

    fn throttled() -> ProviderError {
        ProviderError::from_status(429, "TooManyRequests", "slow down")
    }

    #[tokio::test]
    async fn test_succeeds_immediately() {
        let calls = AtomicU32::new(0);
        let result = fast(3)
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProviderError>(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = fast(5)
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(throttled())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_exactly_max_attempts() {
        for attempts in [1, 2, 4, 6] {
            let calls = AtomicU32::new(0);
            let result: Result<(), _> = fast(attempts)
                .execute("op", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(ProviderError::from_status(503, "Unavailable", "down")) }
                })
                .await;
            assert!(matches!(
                result,
                Err(ProviderError::RemoteService { status: 503, .. })
            ));
            assert_eq!(calls.load(Ordering::SeqCst), attempts);
        }
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast(5)
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Validation("bad shape".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast(5)
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::NotFound("gone".to_string())) }
            })
            .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let calls = AtomicU32::new(0);
        let policy = fast(3).with_predicate(|e| e.status_code() == Some(409));
        let result: Result<(), _> = policy
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::from_status(409, "IncorrectState", "busy")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_delay_growth_is_capped() {
        let policy = RetryPolicy::for_service("svc", false)
            .with_delays(Duration::from_secs(1), Duration::from_secs(5))
            .with_jitter(false);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn test_work_request_policy_is_longer() {
        let plain = RetryPolicy::for_service("database", false);
        let wr = RetryPolicy::for_service("database", true);
        assert!(wr.work_request);
        assert!(wr.max_attempts > plain.max_attempts);
        assert!(wr.initial_delay > plain.initial_delay);
        assert!(wr.max_delay > plain.max_delay);
    }

    #[test]
    fn test_max_attempts_floor() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryPolicy::no_retry("svc").max_attempts, 1);
    }
}
