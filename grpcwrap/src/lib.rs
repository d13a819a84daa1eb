//! Resilient gRPC client connections.
//!
//! This crate turns a configuration record into a ready-to-use connection
//! handle. The handle talks gRPC unary over cleartext HTTP/2, retries
//! transient failures, keeps idle connections alive with HTTP/2 pings, and
//! observes every call through an interceptor chain.
//!
//! ## Features
//!
//! - Comma-separated address lists (only the first address is dialed)
//! - Retry with a fixed set of retryable codes and linear backoff
//! - Reconnect backoff and connect timeout on the transport
//! - HTTP/2 keepalive, also while no call is in flight
//! - Tracing spans, per-attempt metrics and per-attempt logs
//! - Transport diagnostics routed to an application logger
//!
//! ## Example
//!
//! ```ignore
//! use grpcwrap::{ClientConfig, connect};
//!
//! let config = ClientConfig::new("127.0.0.1:9102,127.0.0.1:9103");
//! let conn = connect(&config).await?;
//!
//! let reply: HelloReply = conn
//!     .call_unary("helloworld.Greeter/SayHello", &HelloRequest { name: "grpcwrap".into() })
//!     .await?;
//!
//! conn.close();
//! ```
//!
//! ## Configuration
//!
//! [`ClientConfig`] deserializes with serde:
//!
//! | key             | default | meaning                                  |
//! |-----------------|---------|------------------------------------------|
//! | `address`       |         | comma-separated `host:port` list         |
//! | `log_level`     | `2`     | 1 info, 2 warning, 3 error, 4 fatal      |
//! | `log_verbosity` | `1`     | detail of transport diagnostics          |
//!
//! `log_level` and `log_verbosity` only affect the transport diagnostics
//! forwarded through the [`LoggerBridge`]; call logging goes through
//! `tracing`.
//!
//! ## Interceptor Chain
//!
//! The factory assembles, outermost first:
//!
//! 1. [`TracingInterceptor`]: one span per logical call
//! 2. [`RetryInterceptor`]: the retry loop
//! 3. [`MetricsInterceptor`]: one observation per attempt
//! 4. [`LoggingInterceptor`]: one log event per attempt
//!
//! Interceptors added with [`ClientOptions::interceptor`] run below the
//! logging layer, once per attempt.
//!
//! ## Retry Logic
//!
//! Calls failing with `Unavailable`, `Aborted`, `DeadlineExceeded` or
//! `ResourceExhausted` are retried up to three attempts in total. The wait
//! after attempt `n` is `n` seconds. Every other code is returned at once.
//!
//! ```ignore
//! use std::time::Duration;
//! use grpcwrap::{Backoff, ClientOptions, RetryPolicy, connect_with_options};
//!
//! let retry = RetryPolicy::new()
//!     .max_attempts(5)
//!     .per_attempt_timeout(Duration::from_secs(2))
//!     .backoff(Backoff::Exponential {
//!         base: Duration::from_millis(100),
//!         multiplier: 2.0,
//!         max: Duration::from_secs(2),
//!     });
//!
//! let conn = connect_with_options(&config, ClientOptions::new().retry(retry)).await?;
//! ```
//!
//! ## Deadlines and Cancellation
//!
//! A [`CallOptions::timeout`] bounds the whole logical call, backoff sleeps
//! included, and is sent to the server as `grpc-timeout`. A cancel signal
//! installed with [`CallOptions::cancel_on`] aborts the call with `Canceled`.
//!
//! ```ignore
//! let (cancel, signal) = tokio::sync::watch::channel(false);
//! let options = CallOptions::new()
//!     .timeout(Duration::from_secs(5))
//!     .cancel_on(signal);
//! ```

mod address;
mod client;
pub mod config;
mod dial;
mod error;
pub mod interceptor;
pub mod logger;
mod status;
pub mod transport;

pub use address::{ResolvedAddress, resolve};
pub use client::ClientConn;
pub use dial::{ClientOptions, connect, connect_with_options};
pub use error::{CallError, ConnectError};

// Re-export from config module
pub use config::{
    Backoff, CallOptions, Cancellation, ClientConfig, ConnectBackoff, ConnectionTimingPolicy,
    RetryPolicy, retry_with_cancellation, retry_with_policy,
};

// Re-export from interceptor module
pub use interceptor::{
    AttemptRecord, CallSpan, FnInterceptor, GlobalMetrics, HeaderInterceptor, Interceptor,
    InterceptorChain, LoggingInterceptor, MetricsInterceptor, MetricsRecorder, Outcome,
    RetryInterceptor, Tracer, TracingInterceptor, TracingTracer, UnaryFunc, UnaryNext,
    UnaryRequest, UnaryResponse,
};

pub use logger::{Field, LoggerBridge, Severity, StructuredLogger, TracingLogger};

// Re-export core types that users need
pub use grpcwrap_core::{Code, constants};

pub use bytes::Bytes;
