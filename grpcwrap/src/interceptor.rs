//! Interceptors for unary calls.
//!
//! An interceptor wraps the "next" unary function with cross-cutting logic.
//! The connection factory assembles the built-in interceptors in this order,
//! outermost first:
//!
//! 1. [`TracingInterceptor`]: one span per logical call
//! 2. [`RetryInterceptor`]: the retry loop
//! 3. [`MetricsInterceptor`]: one observation per wire attempt
//! 4. [`LoggingInterceptor`]: per-attempt structured logs
//!
//! Interceptors passed through [`ClientOptions::interceptor`](crate::ClientOptions::interceptor)
//! are appended innermost, so they run once per attempt.
//!
//! # Example
//!
//! ```
//! use grpcwrap::interceptor::{FnInterceptor, UnaryNext, UnaryRequest};
//!
//! let stamp = FnInterceptor::unary(|mut req: UnaryRequest, next: UnaryNext| {
//!     Box::pin(async move {
//!         req.headers.insert("x-attempt", req.attempt.into());
//!         next.call(req).await
//!     })
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;

use crate::CallError;
use crate::config::Cancellation;

mod logging;
mod metrics;
mod retry;
mod span;

pub use self::logging::LoggingInterceptor;
pub use self::metrics::{
    AttemptRecord, GlobalMetrics, MetricsInterceptor, MetricsRecorder, Outcome,
};
pub use self::retry::RetryInterceptor;
pub use self::span::{CallSpan, Tracer, TracingInterceptor, TracingTracer};

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unary request as seen by interceptors.
#[derive(Debug, Clone)]
pub struct UnaryRequest {
    /// The method being called (e.g., "package.Service/Method").
    pub method: String,
    /// Request metadata.
    pub headers: HeaderMap,
    /// Encoded request message, without the envelope.
    pub body: Bytes,
    /// 1-based attempt number, set by the retry layer.
    pub attempt: u32,
    /// Deadline and cancel signal of the logical call.
    pub cancellation: Cancellation,
}

impl UnaryRequest {
    pub fn new(method: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method: method.into(),
            headers,
            body,
            attempt: 1,
            cancellation: Cancellation::none(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// A unary response as seen by interceptors.
#[derive(Debug, Clone)]
pub struct UnaryResponse {
    /// Response metadata.
    pub headers: HeaderMap,
    /// Encoded response message, without the envelope.
    pub body: Bytes,
}

impl UnaryResponse {
    pub fn new(headers: HeaderMap, body: Bytes) -> Self {
        Self { headers, body }
    }
}

/// The signature of a unary call.
pub type UnaryFunc =
    Arc<dyn Fn(UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>> + Send + Sync>;

/// The "next" function in the interceptor chain.
#[derive(Clone)]
pub struct UnaryNext {
    inner: UnaryFunc,
}

impl UnaryNext {
    pub(crate) fn new(inner: UnaryFunc) -> Self {
        Self { inner }
    }

    /// Call the next interceptor or the wire.
    pub async fn call(self, request: UnaryRequest) -> Result<UnaryResponse, CallError> {
        (self.inner)(request).await
    }
}

/// Wraps unary calls with cross-cutting logic.
///
/// Implementations observe and may decorate the request, but return the
/// error classification of the inner layers unchanged.
pub trait Interceptor: Send + Sync {
    /// Wrap a unary call. The default passes through unchanged.
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        next
    }

    /// Short name used when listing a chain.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Ordered interceptors. The first pushed is the outermost.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Interceptor names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Wrap a unary function with all interceptors in the chain.
    ///
    /// Interceptors are applied in reverse order so that the first interceptor
    /// added is the first to process the request.
    pub fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let mut wrapped = next;
        for interceptor in self.interceptors.iter().rev() {
            wrapped = interceptor.wrap_unary(wrapped);
        }
        wrapped
    }
}

/// Adds a fixed header to every request.
#[derive(Clone)]
pub struct HeaderInterceptor {
    name: http::HeaderName,
    value: http::HeaderValue,
}

impl HeaderInterceptor {
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.parse().expect("invalid header name"),
            value: value.parse().expect("invalid header value"),
        }
    }

    pub fn try_new(name: &str, value: &str) -> Result<Self, CallError> {
        let name = name
            .parse()
            .map_err(|_| CallError::invalid_argument(format!("invalid header name: {name}")))?;
        let value = value
            .parse()
            .map_err(|_| CallError::invalid_argument(format!("invalid header value: {value}")))?;
        Ok(Self { name, value })
    }
}

impl Interceptor for HeaderInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let name = self.name.clone();
        let value = self.value.clone();
        Arc::new(move |mut request: UnaryRequest| {
            request.headers.insert(name.clone(), value.clone());
            next(request)
        })
    }

    fn name(&self) -> &'static str {
        "header"
    }
}

/// A closure-based unary interceptor.
pub struct FnInterceptor<F> {
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(UnaryRequest, UnaryNext) -> BoxFuture<'static, Result<UnaryResponse, CallError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    pub fn unary(func: F) -> Self {
        Self { func }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(UnaryRequest, UnaryNext) -> BoxFuture<'static, Result<UnaryResponse, CallError>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let func = self.func.clone();
        Arc::new(move |request: UnaryRequest| {
            let func = func.clone();
            let next = UnaryNext::new(next.clone());
            func(request, next)
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    pub(crate) use super::metrics::testing::RecordingMetrics;
    pub(crate) use super::span::testing::RecordingTracer;

    /// A wire stand-in that answers from a script, then succeeds.
    pub(crate) fn scripted_wire(failures: Vec<CallError>) -> (UnaryFunc, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let script = Arc::new(Mutex::new(failures.into_iter()));
        let counter = calls.clone();
        let wire: UnaryFunc = Arc::new(move |request: UnaryRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            let next = script.lock().unwrap().next();
            Box::pin(async move {
                match next {
                    Some(err) => Err(err),
                    None => Ok(UnaryResponse::new(HeaderMap::new(), request.body)),
                }
            })
        });
        (wire, calls)
    }

    /// A wire stand-in that never answers. It honors the request's
    /// cancellation the way the real wire does.
    pub(crate) fn hanging_wire() -> (UnaryFunc, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let wire: UnaryFunc = Arc::new(move |request: UnaryRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                request
                    .cancellation
                    .run(std::future::pending::<Result<UnaryResponse, CallError>>())
                    .await
            })
        });
        (wire, calls)
    }

    /// A wire stand-in that records the headers it receives.
    pub(crate) fn capturing_wire() -> (UnaryFunc, Arc<Mutex<Option<HeaderMap>>>) {
        let captured = Arc::new(Mutex::new(None));
        let slot = captured.clone();
        let wire: UnaryFunc = Arc::new(move |request: UnaryRequest| {
            let slot = slot.clone();
            Box::pin(async move {
                *slot.lock().unwrap() = Some(request.headers.clone());
                Ok(UnaryResponse::new(HeaderMap::new(), Bytes::new()))
            })
        });
        (wire, captured)
    }
}
