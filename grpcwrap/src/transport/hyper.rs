//! Hyper-based HTTP/2 transport.
//!
//! This module provides [`HyperTransport`], a cleartext HTTP/2 (prior
//! knowledge) client built on hyper_util's legacy client and the
//! [`BackoffConnector`].

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use super::connector::BackoffConnector;
use crate::CallError;
use crate::config::ConnectionTimingPolicy;

type HyperClient = Client<BackoffConnector, Full<Bytes>>;

/// HTTP/2 transport for one endpoint.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    connector: BackoffConnector,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    pub fn builder(timing: ConnectionTimingPolicy) -> HyperTransportBuilder {
        HyperTransportBuilder::new(timing)
    }

    /// Send a request and receive the response head.
    pub async fn request(
        &self,
        request: http::Request<Full<Bytes>>,
    ) -> Result<http::Response<Incoming>, CallError> {
        self.client
            .request(request)
            .await
            .map_err(|e| CallError::Transport(format!("request failed: {}", error_chain(&e))))
    }

    /// Perform one connection handshake to `uri`, outside the pool.
    ///
    /// Used by blocking dials to confirm the endpoint is reachable.
    pub async fn probe(&self, uri: http::Uri) -> Result<(), CallError> {
        self.connector
            .connect(uri)
            .await
            .map(drop)
            .map_err(|e| CallError::Transport(e.to_string()))
    }
}

/// Render an error with its sources, `outer: inner: root`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Builder for [`HyperTransport`].
///
/// Keepalive settings come from the [`ConnectionTimingPolicy`]; pool and
/// flow-control settings can be tuned here.
pub struct HyperTransportBuilder {
    timing: ConnectionTimingPolicy,
    /// Connection pool idle timeout.
    pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pool_max_idle_per_host: usize,
    /// HTTP/2 initial stream window size.
    h2_initial_stream_window_size: Option<u32>,
    /// HTTP/2 initial connection window size.
    h2_initial_connection_window_size: Option<u32>,
}

impl HyperTransportBuilder {
    pub fn new(timing: ConnectionTimingPolicy) -> Self {
        Self {
            timing,
            pool_idle_timeout: None,
            pool_max_idle_per_host: 1,
            h2_initial_stream_window_size: None,
            h2_initial_connection_window_size: None,
        }
    }

    /// Close pooled connections idle for longer than `timeout`.
    ///
    /// Default: never, the keepalive pings hold the connection open.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Default: 1, HTTP/2 multiplexes every call over one connection.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    pub fn h2_initial_stream_window_size(mut self, size: u32) -> Self {
        self.h2_initial_stream_window_size = Some(size);
        self
    }

    pub fn h2_initial_connection_window_size(mut self, size: u32) -> Self {
        self.h2_initial_connection_window_size = Some(size);
        self
    }

    /// Build the transport.
    pub fn build(self) -> HyperTransport {
        let connector = BackoffConnector::new(&self.timing);

        let mut builder = Client::builder(TokioExecutor::new());

        // Required for pool_idle_timeout and HTTP/2 keepalive to work
        builder.pool_timer(TokioTimer::new());
        builder.timer(TokioTimer::new());

        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        builder.pool_max_idle_per_host(self.pool_max_idle_per_host);

        // gRPC runs over HTTP/2 only; cleartext endpoints use prior knowledge
        builder.http2_only(true);

        if let Some(size) = self.h2_initial_stream_window_size {
            builder.http2_initial_stream_window_size(size);
        }
        if let Some(size) = self.h2_initial_connection_window_size {
            builder.http2_initial_connection_window_size(size);
        }

        builder.http2_keep_alive_interval(self.timing.keepalive_interval);
        builder.http2_keep_alive_timeout(self.timing.keepalive_timeout);
        builder.http2_keep_alive_while_idle(self.timing.keepalive_without_calls);

        let client = builder.build(connector.clone());

        HyperTransport { client, connector }
    }
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("timing", &self.timing)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("h2_initial_stream_window_size", &self.h2_initial_stream_window_size)
            .field("h2_initial_connection_window_size", &self.h2_initial_connection_window_size)
            .finish()
    }
}
