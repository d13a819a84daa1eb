//! Call tracing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, HeaderValue};
use tracing::Instrument;
use tracing::field::Empty;

use super::{Interceptor, UnaryFunc, UnaryRequest};
use crate::CallError;

/// Opens one span per logical call.
pub trait Tracer: Send + Sync + 'static {
    fn start_span(&self, method: &str) -> Box<dyn CallSpan>;
}

/// A span covering one logical call, retries included.
///
/// `finish` consumes the span, so it is closed exactly once.
pub trait CallSpan: Send {
    /// Propagate the trace context into the outgoing request metadata.
    fn inject(&self, headers: &mut HeaderMap) {
        let _ = headers;
    }

    /// The `tracing` span the call runs in, if any.
    fn current(&self) -> Option<tracing::Span> {
        None
    }

    /// Close the span with the total elapsed time and the final outcome.
    fn finish(self: Box<Self>, elapsed: Duration, error: Option<&CallError>);
}

/// Default tracer backed by `tracing` spans.
///
/// Each call gets a fresh W3C `traceparent` header with random trace and
/// span ids. The caller's span is not consulted, so downstream spans start
/// a new trace instead of joining the caller's.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTracer;

struct TracingSpan {
    span: tracing::Span,
    traceparent: String,
}

impl Tracer for TracingTracer {
    fn start_span(&self, method: &str) -> Box<dyn CallSpan> {
        let trace_id = format!("{:032x}", rand::random::<u128>());
        let span_id = format!("{:016x}", rand::random::<u64>());
        let span = tracing::info_span!(
            "grpc.client",
            rpc.method = %method,
            rpc.outcome = Empty,
            rpc.code = Empty,
            elapsed_ms = Empty,
            trace_id = %trace_id,
        );
        Box::new(TracingSpan {
            span,
            traceparent: format!("00-{trace_id}-{span_id}-01"),
        })
    }
}

impl CallSpan for TracingSpan {
    fn inject(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.traceparent) {
            headers.insert("traceparent", value);
        }
    }

    fn current(&self) -> Option<tracing::Span> {
        Some(self.span.clone())
    }

    fn finish(self: Box<Self>, elapsed: Duration, error: Option<&CallError>) {
        let code = error.map_or(grpcwrap_core::Code::Ok, CallError::code);
        self.span
            .record("rpc.outcome", if error.is_none() { "success" } else { "failure" })
            .record("rpc.code", code.as_str())
            .record("elapsed_ms", elapsed.as_millis() as u64);
    }
}

/// Closes the span when the call future is dropped before completing.
struct SpanGuard {
    span: Option<Box<dyn CallSpan>>,
    started: Instant,
}

impl SpanGuard {
    fn new(span: Box<dyn CallSpan>) -> Self {
        Self {
            span: Some(span),
            started: Instant::now(),
        }
    }

    fn finish(&mut self, error: Option<&CallError>) {
        if let Some(span) = self.span.take() {
            span.finish(self.started.elapsed(), error);
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if self.span.is_some() {
            self.finish(Some(&CallError::canceled("call dropped before completion")));
        }
    }
}

/// Outermost built-in: one span per logical call.
///
/// The span is closed exactly once. A call future dropped mid-flight closes
/// it with `Canceled`.
#[derive(Clone)]
pub struct TracingInterceptor {
    tracer: Arc<dyn Tracer>,
}

impl TracingInterceptor {
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer }
    }
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self::new(Arc::new(TracingTracer))
    }
}

impl Interceptor for TracingInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let tracer = self.tracer.clone();
        Arc::new(move |mut request: UnaryRequest| {
            let span = tracer.start_span(&request.method);
            span.inject(&mut request.headers);
            let next = next.clone();
            Box::pin(async move {
                let current = span.current();
                let mut guard = SpanGuard::new(span);
                let result = match current {
                    Some(current) => next(request).instrument(current).await,
                    None => next(request).await,
                };
                guard.finish(result.as_ref().err());
                result
            })
        })
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;
    use grpcwrap_core::Code;

    /// Records started and finished spans.
    #[derive(Default)]
    pub(crate) struct RecordingTracer {
        pub(crate) started: Mutex<Vec<String>>,
        pub(crate) finished: Arc<Mutex<Vec<(String, Option<Code>)>>>,
    }

    struct RecordingSpan {
        method: String,
        finished: Arc<Mutex<Vec<(String, Option<Code>)>>>,
    }

    impl Tracer for RecordingTracer {
        fn start_span(&self, method: &str) -> Box<dyn CallSpan> {
            self.started.lock().unwrap().push(method.to_owned());
            Box::new(RecordingSpan {
                method: method.to_owned(),
                finished: self.finished.clone(),
            })
        }
    }

    impl CallSpan for RecordingSpan {
        fn inject(&self, headers: &mut HeaderMap) {
            headers.insert("x-test-span", HeaderValue::from_static("1"));
        }

        fn finish(self: Box<Self>, _elapsed: Duration, error: Option<&CallError>) {
            let RecordingSpan { method, finished } = *self;
            finished
                .lock()
                .unwrap()
                .push((method, error.map(CallError::code)));
        }
    }
}
