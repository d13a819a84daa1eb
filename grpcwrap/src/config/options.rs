//! Per-call options and cancellation.
//!
//! [`CallOptions`] configures a single call. It turns into a [`Cancellation`]
//! when the call starts, which the client and the retry layer use to abort
//! in-flight attempts and skip pending backoff sleeps.

use std::future::{Future, pending};
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::CallError;

/// Options for configuring individual calls.
///
/// # Example
///
/// ```
/// use grpcwrap::CallOptions;
/// use std::time::Duration;
///
/// let options = CallOptions::new()
///     .timeout(Duration::from_secs(5))
///     .header("x-request-id", "abc-123");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Deadline for the whole call, retries and backoff included.
    pub(crate) timeout: Option<Duration>,
    pub(crate) headers: HeaderMap,
    pub(crate) cancel: Option<watch::Receiver<bool>>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline for this call.
    ///
    /// The deadline is sent to the server as `grpc-timeout` and also enforced
    /// locally: it aborts the in-flight attempt and any pending backoff sleep,
    /// surfacing `DeadlineExceeded`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Cancel the call once `signal` holds `true`.
    ///
    /// A canceled call surfaces `Canceled`. Dropping the sender without
    /// signalling never cancels.
    pub fn cancel_on(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Add a request header for this call.
    ///
    /// Headers beginning with `grpc-` are reserved for the protocol.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Debug,
    {
        let name = name.try_into().expect("invalid header name");
        let value = value.try_into().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// Try to add a request header for this call.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.insert(name, value);
        Some(self)
    }

    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Start the call clock.
    pub(crate) fn cancellation(&self) -> Cancellation {
        Cancellation {
            deadline: self
                .timeout
                .and_then(|t| Instant::now().checked_add(t)),
            signal: self.cancel.clone(),
        }
    }
}

/// Deadline and cancel signal of one logical call.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    deadline: Option<Instant>,
    signal: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// Never interrupts.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_signal(mut self, signal: watch::Receiver<bool>) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The cancellation of one attempt: this one, with the deadline pulled
    /// in to at most `limit` from now.
    pub fn for_attempt(&self, limit: Option<Duration>) -> Cancellation {
        let attempt_deadline = limit.and_then(|limit| Instant::now().checked_add(limit));
        let deadline = match (self.deadline, attempt_deadline) {
            (Some(call), Some(attempt)) => Some(call.min(attempt)),
            (call, attempt) => call.or(attempt),
        };
        Cancellation {
            deadline,
            signal: self.signal.clone(),
        }
    }

    /// Time left until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// The error to surface if the call is already interrupted.
    pub fn interruption(&self) -> Option<CallError> {
        if self.signal.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(canceled());
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Some(deadline_exceeded());
        }
        None
    }

    /// Drive `fut` unless the call is canceled or its deadline passes first.
    ///
    /// The cancel signal wins over the deadline, and both win over `fut`.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, CallError>>,
    {
        let deadline_elapsed = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        let cancel_requested = async {
            match &self.signal {
                Some(rx) => {
                    let mut rx = rx.clone();
                    // a dropped sender can never cancel
                    if rx.wait_for(|flag| *flag).await.is_err() {
                        pending::<()>().await;
                    }
                }
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel_requested => Err(canceled()),
            _ = deadline_elapsed => Err(deadline_exceeded()),
            result = fut => result,
        }
    }

    /// Sleep for `delay`, returning early with an error when interrupted.
    pub async fn sleep(&self, delay: Duration) -> Result<(), CallError> {
        self.run(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}

fn canceled() -> CallError {
    CallError::canceled("call canceled by caller")
}

fn deadline_exceeded() -> CallError {
    CallError::deadline_exceeded("call deadline exceeded")
}

/// Largest value the `grpc-timeout` header may carry.
const MAX_TIMEOUT_VALUE: u128 = 99_999_999;

/// Encode a duration as a `grpc-timeout` header value.
///
/// Picks the finest unit whose value fits in eight digits, rounding up.
pub(crate) fn grpc_timeout_header(timeout: Duration) -> String {
    const UNITS: [(u128, char); 6] = [
        (1, 'n'),
        (1_000, 'u'),
        (1_000_000, 'm'),
        (1_000_000_000, 'S'),
        (60_000_000_000, 'M'),
        (3_600_000_000_000, 'H'),
    ];

    let nanos = timeout.as_nanos();
    for (divisor, unit) in UNITS {
        let value = nanos.div_ceil(divisor);
        if value <= MAX_TIMEOUT_VALUE {
            return format!("{value}{unit}");
        }
    }
    format!("{MAX_TIMEOUT_VALUE}H")
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpcwrap_core::Code;

    #[test]
    fn test_call_options_default() {
        let options = CallOptions::new();
        assert!(options.timeout.is_none());
        assert!(options.cancel.is_none());
    }

    #[test]
    fn test_call_options_header() {
        let options = CallOptions::new()
            .timeout(Duration::from_secs(30))
            .header("authorization", "Bearer token123")
            .header("x-request-id", "abc-123");

        assert_eq!(options.get_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            options.headers.get("authorization").unwrap(),
            "Bearer token123"
        );
        assert_eq!(options.headers.get("x-request-id").unwrap(), "abc-123");
    }

    #[test]
    fn test_call_options_try_header_invalid() {
        let result = CallOptions::new().try_header("invalid\0name", "value");
        assert!(result.is_none());
    }

    #[test]
    fn test_grpc_timeout_header() {
        assert_eq!(grpc_timeout_header(Duration::from_millis(1)), "1000000n");
        assert_eq!(grpc_timeout_header(Duration::from_secs(30)), "30000000u");
        assert_eq!(grpc_timeout_header(Duration::from_secs(3600)), "3600000m");
        assert_eq!(grpc_timeout_header(Duration::ZERO), "0n");
        assert_eq!(
            grpc_timeout_header(Duration::from_secs(u64::MAX)),
            "99999999H"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_future() {
        let cancellation = CallOptions::new()
            .timeout(Duration::from_secs(2))
            .cancellation();

        let err = cancellation
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, CallError>(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert!(cancellation.interruption().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_cancels_sleep() {
        let (tx, rx) = watch::channel(false);
        let cancellation = Cancellation::none().with_signal(rx);

        let sleeper =
            tokio::spawn(async move { cancellation.sleep(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();

        let err = sleeper.await.unwrap().unwrap_err();
        assert_eq!(err.code(), Code::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_never_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let cancellation = Cancellation::none().with_signal(rx);

        cancellation.sleep(Duration::from_secs(1)).await.unwrap();
        assert!(cancellation.interruption().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_deadline_is_the_earlier_one() {
        let now = Instant::now();
        let call = Cancellation::none().with_deadline(now + Duration::from_secs(5));

        let tight = call.for_attempt(Some(Duration::from_secs(1)));
        assert_eq!(tight.deadline(), Some(now + Duration::from_secs(1)));

        let loose = call.for_attempt(Some(Duration::from_secs(30)));
        assert_eq!(loose.deadline(), call.deadline());

        assert_eq!(call.for_attempt(None).deadline(), call.deadline());
        assert_eq!(
            Cancellation::none()
                .for_attempt(Some(Duration::from_secs(2)))
                .deadline(),
            Some(now + Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn test_no_cancellation_passes_result_through() {
        let result = Cancellation::none()
            .run(async { Err::<(), _>(CallError::unavailable("down")) })
            .await;
        assert_eq!(result.unwrap_err().code(), Code::Unavailable);
    }
}
