//! Per-attempt call metrics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use grpcwrap_core::Code;
use metrics::{counter, describe_counter, describe_histogram, histogram};

use super::{Interceptor, UnaryFunc, UnaryRequest};

pub const ATTEMPTS_TOTAL: &str = "grpc_client_attempts_total";
pub const ATTEMPT_DURATION_SECONDS: &str = "grpc_client_attempt_duration_seconds";

/// Result of a single attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// One wire attempt as seen by a [`MetricsRecorder`].
#[derive(Clone, Copy, Debug)]
pub struct AttemptRecord<'a> {
    pub method: &'a str,
    pub attempt: u32,
    pub outcome: Outcome,
    /// `Ok` on success.
    pub code: Code,
    pub elapsed: Duration,
}

/// Sink for attempt observations.
pub trait MetricsRecorder: Send + Sync + 'static {
    fn record_attempt(&self, record: &AttemptRecord<'_>);
}

/// Records through the global `metrics` recorder.
///
/// Without an installed exporter the observations are discarded.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalMetrics;

impl GlobalMetrics {
    /// Register descriptions for the emitted metrics.
    pub fn describe() {
        describe_counter!(ATTEMPTS_TOTAL, "Total gRPC client call attempts");
        describe_histogram!(
            ATTEMPT_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "gRPC client call attempt duration in seconds"
        );
    }
}

impl MetricsRecorder for GlobalMetrics {
    fn record_attempt(&self, record: &AttemptRecord<'_>) {
        let method = record.method.to_owned();

        counter!(
            ATTEMPTS_TOTAL,
            "method" => method.clone(),
            "outcome" => record.outcome.as_str(),
            "code" => record.code.as_str()
        )
        .increment(1);

        histogram!(
            ATTEMPT_DURATION_SECONDS,
            "method" => method,
            "outcome" => record.outcome.as_str()
        )
        .record(record.elapsed.as_secs_f64());
    }
}

/// One observation per wire attempt.
///
/// Sits inside the retry layer, so a call retried twice yields three
/// observations.
#[derive(Clone)]
pub struct MetricsInterceptor {
    recorder: Arc<dyn MetricsRecorder>,
}

impl MetricsInterceptor {
    pub fn new(recorder: Arc<dyn MetricsRecorder>) -> Self {
        Self { recorder }
    }
}

impl Default for MetricsInterceptor {
    fn default() -> Self {
        Self::new(Arc::new(GlobalMetrics))
    }
}

impl Interceptor for MetricsInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let recorder = self.recorder.clone();
        Arc::new(move |request: UnaryRequest| {
            let recorder = recorder.clone();
            let next = next.clone();
            Box::pin(async move {
                let method = request.method.clone();
                let attempt = request.attempt;
                let started = Instant::now();

                let result = next(request).await;

                let (outcome, code) = match &result {
                    Ok(_) => (Outcome::Success, Code::Ok),
                    Err(err) => (Outcome::Failure, err.code()),
                };
                recorder.record_attempt(&AttemptRecord {
                    method: &method,
                    attempt,
                    outcome,
                    code,
                    elapsed: started.elapsed(),
                });
                result
            })
        })
    }

    fn name(&self) -> &'static str {
        "metrics"
    }
}
