//! Call-level retry policy.
//!
//! A call is retried only when it fails with one of the transient codes
//! [`Code::Unavailable`], [`Code::Aborted`], [`Code::DeadlineExceeded`] or
//! [`Code::ResourceExhausted`]. Every other code is terminal and returned as is.
//!
//! With the default policy a call is tried at most three times. The wait after
//! failed attempt `n` is `n` seconds, without jitter.
//!
//! The policy is attached to a connection by the factory and applied by the
//! [`RetryInterceptor`](crate::interceptor::RetryInterceptor). It can also be
//! driven directly with [`retry_with_policy`]:
//!
//! ```ignore
//! use grpcwrap::{Cancellation, RetryPolicy, retry_with_policy};
//!
//! let policy = RetryPolicy::default();
//! let reply = retry_with_policy(&policy, &Cancellation::none(), |_attempt| async {
//!     conn.call_unary::<Req, Res>("pkg.Service/Method", &request).await
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use grpcwrap_core::Code;

use super::options::Cancellation;
use crate::CallError;

/// Default retry configuration.
pub mod defaults {
    use std::time::Duration;

    /// Initial attempt plus two retries.
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Linear backoff step: the wait after attempt `n` is `n * LINEAR_STEP`.
    pub const LINEAR_STEP: Duration = Duration::from_secs(1);
}

/// Wait between attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Backoff {
    /// `attempt * step`.
    Linear(Duration),
    /// `base * multiplier^(attempt - 1)`, capped at `max`.
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Linear(step) => step.saturating_mul(attempt),
            Backoff::Exponential {
                base,
                multiplier,
                max,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = base.as_secs_f64() * multiplier.powi(exponent);
                Duration::from_secs_f64(secs.min(max.as_secs_f64()).max(0.0))
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Linear(defaults::LINEAR_STEP)
    }
}

/// Configuration for retry behavior.
///
/// Built once per connection and shared read-only by every call on it.
///
/// # Example
///
/// ```
/// use grpcwrap::{Backoff, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .max_attempts(5)
///     .per_attempt_timeout(Duration::from_secs(2))
///     .backoff(Backoff::Linear(Duration::from_millis(200)));
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the initial one included. At least 1.
    pub max_attempts: u32,

    /// Bound on each attempt. `None` leaves attempts unbounded.
    pub per_attempt_timeout: Option<Duration>,

    pub backoff: Backoff,

    /// Codes that trigger another attempt.
    pub retryable_codes: Vec<Code>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            per_attempt_timeout: None,
            backoff: Backoff::default(),
            retryable_codes: Code::RETRYABLE.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set the total number of attempts.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be >= 1");
        self.max_attempts = max_attempts;
        self
    }

    pub fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = Some(timeout);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the set of retryable codes.
    ///
    /// # Panics
    ///
    /// Panics if `codes` contains [`Code::Ok`].
    pub fn retryable_codes(mut self, codes: impl IntoIterator<Item = Code>) -> Self {
        let codes: Vec<Code> = codes.into_iter().collect();
        assert!(!codes.contains(&Code::Ok), "Ok is not a retryable code");
        self.retryable_codes = codes;
        self
    }

    /// Validate the policy configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be >= 1");
        }
        if self.per_attempt_timeout == Some(Duration::ZERO) {
            return Err("per_attempt_timeout must be positive");
        }
        if self.retryable_codes.contains(&Code::Ok) {
            return Err("Ok is not a retryable code");
        }
        if let Backoff::Exponential {
            base,
            multiplier,
            max,
        } = self.backoff
        {
            if multiplier < 1.0 {
                return Err("backoff multiplier must be >= 1.0");
            }
            if base > max {
                return Err("backoff base must not exceed max");
            }
        }
        Ok(())
    }

    pub fn is_retryable(&self, code: Code) -> bool {
        self.retryable_codes.contains(&code)
    }

    /// Decide whether attempt `attempt` (1-based), which failed with `code`,
    /// is followed by another one. Returns the wait before it.
    pub fn should_retry(&self, code: Code, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts || !self.is_retryable(code) {
            return None;
        }
        Some(self.backoff.delay(attempt))
    }
}

/// Run `f` under `policy` until it succeeds, fails terminally, runs out of
/// attempts or `cancel` interrupts it.
///
/// `f` receives the 1-based attempt number. When attempts run out the last
/// error is returned unchanged. An interruption aborts the in-flight attempt
/// and any pending backoff sleep and surfaces `DeadlineExceeded` (deadline)
/// or `Canceled` (signal).
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    cancel: &Cancellation,
    mut f: F,
) -> Result<T, CallError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    retry_with_cancellation(policy, cancel, |attempt, scoped| {
        let fut = f(attempt);
        async move { scoped.run(fut).await }
    })
    .await
}

/// Like [`retry_with_policy`], but `f` enforces the interruption itself.
///
/// Each attempt receives its own [`Cancellation`]: the call's, with the
/// deadline pulled in by [`RetryPolicy::per_attempt_timeout`]. The loop
/// never drops an attempt in flight, so observers inside `f` see an
/// interrupted attempt complete with `DeadlineExceeded` or `Canceled`.
/// Backoff sleeps are still cut short by `cancel`.
pub async fn retry_with_cancellation<F, Fut, T>(
    policy: &RetryPolicy,
    cancel: &Cancellation,
    mut f: F,
) -> Result<T, CallError>
where
    F: FnMut(u32, Cancellation) -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    if let Err(msg) = policy.validate() {
        return Err(CallError::invalid_argument(msg));
    }

    let mut attempt = 1;
    loop {
        let scoped = cancel.for_attempt(policy.per_attempt_timeout);
        let err = match f(attempt, scoped).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if let Some(interrupted) = cancel.interruption() {
            return Err(interrupted);
        }

        let Some(delay) = policy.should_retry(err.code(), attempt) else {
            return Err(err);
        };

        tracing::debug!(
            error = %err,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retrying after transient error"
        );
        cancel.sleep(delay).await?;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::watch;
    use tokio::time::Instant;

    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.per_attempt_timeout, None);
        assert_eq!(policy.backoff, Backoff::Linear(Duration::from_secs(1)));
        assert_eq!(policy.retryable_codes, Code::RETRYABLE.to_vec());
    }

    #[test]
    fn test_should_retry_linear_schedule() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.should_retry(Code::Unavailable, 1),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            policy.should_retry(Code::ResourceExhausted, 2),
            Some(Duration::from_secs(2))
        );
        // attempts exhausted
        assert_eq!(policy.should_retry(Code::Unavailable, 3), None);
    }

    #[test]
    fn test_should_retry_terminal_codes() {
        let policy = RetryPolicy::default();
        for code in [
            Code::InvalidArgument,
            Code::NotFound,
            Code::PermissionDenied,
            Code::Internal,
            Code::Canceled,
            Code::Unauthenticated,
        ] {
            assert_eq!(policy.should_retry(code, 1), None, "{code} must be terminal");
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            multiplier: 2.0,
            max: Duration::from_millis(500),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(500));
    }

    #[test]
    fn test_retry_policy_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::no_retry().validate().is_ok());

        let invalid = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());

        let invalid = RetryPolicy::new().backoff(Backoff::Exponential {
            base: Duration::from_secs(10),
            multiplier: 2.0,
            max: Duration::from_secs(1),
        });
        assert!(invalid.validate().is_err());
    }

    #[test]
    #[should_panic(expected = "max_attempts must be >= 1")]
    fn test_retry_policy_invalid_max_attempts() {
        RetryPolicy::new().max_attempts(0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_eventual_success_waits_linearly() {
        let attempts = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = retry_with_policy(&RetryPolicy::default(), &Cancellation::none(), |_| {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CallError::unavailable("temporary failure"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_returns_last_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let result = retry_with_policy(&RetryPolicy::default(), &Cancellation::none(), |attempt| {
            seen.lock().unwrap().push(attempt);
            async move { Err::<(), _>(CallError::unavailable(format!("failure {attempt}"))) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
        assert_eq!(err.message(), Some("failure 3"));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_single_attempt() {
        let attempts = AtomicU32::new(0);

        let result = retry_with_policy(&RetryPolicy::default(), &Cancellation::none(), |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CallError::invalid_argument("bad request")) }
        })
        .await;

        assert_eq!(result.unwrap_err().code(), Code::InvalidArgument);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_attempt_timeout_is_retryable() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new()
            .max_attempts(2)
            .per_attempt_timeout(Duration::from_millis(100))
            .backoff(Backoff::Linear(Duration::from_millis(10)));

        let result = retry_with_policy(&policy, &Cancellation::none(), |_| {
            let first = attempts.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok::<_, CallError>("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_backoff_sleep() {
        let attempts = AtomicU32::new(0);
        let started = Instant::now();
        let cancel = Cancellation::none().with_deadline(started + Duration::from_millis(1500));

        let result = retry_with_policy(&RetryPolicy::default(), &cancel, |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CallError::unavailable("down")) }
        })
        .await;

        assert_eq!(result.unwrap_err().code(), Code::DeadlineExceeded);
        // attempt 1, sleep 1s, attempt 2, then the 2s sleep is cut short
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_signal_surfaces_canceled() {
        let (tx, rx) = watch::channel(false);
        let cancel = Cancellation::none().with_signal(rx);

        let result = retry_with_policy(&RetryPolicy::default(), &cancel, |attempt| {
            if attempt == 2 {
                tx.send_replace(true);
            }
            async { Err::<(), _>(CallError::unavailable("down")) }
        })
        .await;

        assert_eq!(result.unwrap_err().code(), Code::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_attempt_completes() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let cancel = Cancellation::none().with_deadline(Instant::now() + Duration::from_secs(1));

        let result = retry_with_cancellation(&RetryPolicy::default(), &cancel, |attempt, scoped| {
            let finished = finished.clone();
            async move {
                let result = scoped
                    .run(async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok::<_, CallError>(())
                    })
                    .await;
                let code = result.as_ref().err().map(CallError::code);
                finished.lock().unwrap().push((attempt, code));
                result
            }
        })
        .await;

        assert_eq!(result.unwrap_err().code(), Code::DeadlineExceeded);
        assert_eq!(*finished.lock().unwrap(), vec![(1, Some(Code::DeadlineExceeded))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_receives_per_attempt_deadline() {
        let policy = RetryPolicy::new()
            .max_attempts(2)
            .per_attempt_timeout(Duration::from_millis(100))
            .backoff(Backoff::Linear(Duration::from_millis(10)));
        let deadlines = Arc::new(Mutex::new(Vec::new()));

        let result = retry_with_cancellation(&policy, &Cancellation::none(), |attempt, scoped| {
            deadlines.lock().unwrap().push(scoped.remaining());
            async move {
                if attempt == 1 {
                    scoped.run(std::future::pending::<Result<(), CallError>>()).await
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(
            *deadlines.lock().unwrap(),
            vec![Some(Duration::from_millis(100)); 2]
        );
    }

    #[tokio::test]
    async fn test_invalid_policy_rejected() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        let result = retry_with_policy(&policy, &Cancellation::none(), |_| async {
            Ok::<_, CallError>(())
        })
        .await;
        assert_eq!(result.unwrap_err().code(), Code::InvalidArgument);
    }
}
