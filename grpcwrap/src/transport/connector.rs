//! TCP connector with reconnect backoff.
//!
//! [`BackoffConnector`] wraps hyper-util's [`HttpConnector`]. Each connection
//! attempt is bounded by the policy's `min_connect_timeout`. After a failed
//! attempt the next one is held back by the [`ConnectBackoff`] curve; a
//! successful handshake resets the curve.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use http::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tower_service::Service;

use crate::config::{ConnectBackoff, ConnectionTimingPolicy};
use crate::logger::{COST_DETAIL, COST_ROUTINE, Field, Severity, transport_log};

/// Boxed error type accepted by the hyper client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A connection attempt did not finish within `min_connect_timeout`.
#[derive(Debug, thiserror::Error)]
#[error("connect to {uri} timed out after {timeout:?}")]
pub struct ConnectTimeout {
    pub uri: Uri,
    pub timeout: Duration,
}

#[derive(Debug)]
struct BackoffState {
    backoff: ConnectBackoff,
    /// Earliest instant the next attempt may start.
    retry_at: Option<Instant>,
}

impl BackoffState {
    fn on_success(&mut self) {
        self.backoff.reset();
        self.retry_at = None;
    }

    fn on_failure(&mut self) -> (u32, Duration) {
        let delay = self.backoff.next_delay();
        self.retry_at = Some(Instant::now() + delay);
        (self.backoff.attempts(), delay)
    }
}

/// Connector applying the reconnect curve and connect timeout.
#[derive(Clone, Debug)]
pub struct BackoffConnector {
    inner: HttpConnector,
    state: Arc<Mutex<BackoffState>>,
    connect_timeout: Duration,
}

impl BackoffConnector {
    pub fn new(timing: &ConnectionTimingPolicy) -> Self {
        let mut inner = HttpConnector::new();
        inner.enforce_http(true);
        inner.set_nodelay(true);
        // hyper-util's own timeout stays off; the outer one covers resolution too
        inner.set_connect_timeout(None);

        Self {
            inner,
            state: Arc::new(Mutex::new(BackoffState {
                backoff: timing.connect_backoff(),
                retry_at: None,
            })),
            connect_timeout: timing.min_connect_timeout,
        }
    }

    /// Consecutive failed connection attempts.
    pub fn failures(&self) -> u32 {
        self.lock().backoff.attempts()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackoffState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait out the backoff, then attempt one bounded connection.
    pub async fn connect(&self, uri: Uri) -> Result<TokioIo<TcpStream>, BoxError> {
        let retry_at = self.lock().retry_at;
        if let Some(at) = retry_at {
            tokio::time::sleep_until(at).await;
        }

        let mut inner = self.inner.clone();
        let address = uri.authority().map(|a| a.to_string()).unwrap_or_default();

        let connect = tokio::time::timeout(self.connect_timeout, inner.call(uri.clone()));
        let failure: BoxError = match connect.await {
            Ok(Ok(io)) => {
                self.lock().on_success();
                transport_log(
                    Severity::Info,
                    COST_DETAIL,
                    "connection established",
                    &[Field::new("address", &address)],
                );
                return Ok(io);
            }
            Ok(Err(err)) => Box::new(err),
            Err(_) => Box::new(ConnectTimeout {
                uri,
                timeout: self.connect_timeout,
            }),
        };

        let (attempts, delay) = self.lock().on_failure();
        transport_log(
            Severity::Warning,
            COST_ROUTINE,
            "connection attempt failed",
            &[
                Field::new("address", &address),
                Field::new("error", &failure),
                Field::new("attempt", attempts),
                Field::new("retry_in_ms", delay.as_millis()),
            ],
        );
        Err(failure)
    }
}

impl Service<Uri> for BackoffConnector {
    type Response = TokioIo<TcpStream>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // HttpConnector is always ready
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.connect(uri).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connects_and_resets() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connector = BackoffConnector::new(&ConnectionTimingPolicy::default());

        let uri: Uri = format!("http://{addr}").parse().unwrap();
        connector.connect(uri).await.unwrap();
        assert_eq!(connector.failures(), 0);
    }

    #[tokio::test]
    async fn test_failure_advances_backoff() {
        // bind then drop to get a port with nothing listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let timing = ConnectionTimingPolicy::new()
            .initial_backoff(Duration::from_millis(10))
            .max_backoff(Duration::from_millis(20));
        let connector = BackoffConnector::new(&timing);
        let uri: Uri = format!("http://{addr}").parse().unwrap();

        assert!(connector.connect(uri.clone()).await.is_err());
        assert_eq!(connector.failures(), 1);

        let started = std::time::Instant::now();
        assert!(connector.connect(uri).await.is_err());
        assert_eq!(connector.failures(), 2);
        // the second attempt waited out the first backoff (10ms ± 20%)
        assert!(started.elapsed() >= Duration::from_millis(7));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let connector = BackoffConnector::new(
            &ConnectionTimingPolicy::new().initial_backoff(Duration::from_millis(1)),
        );
        let mut clone = connector.clone();

        let uri: Uri = format!("http://{addr}").parse().unwrap();
        assert!(clone.call(uri).await.is_err());
        assert_eq!(connector.failures(), 1);
    }
}
