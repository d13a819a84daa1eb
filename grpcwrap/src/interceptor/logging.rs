//! Per-attempt structured logging.

use std::sync::Arc;
use std::time::Instant;

use super::{Interceptor, UnaryFunc, UnaryRequest};

/// Logs every attempt at `debug` and every failed attempt at `warn`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInterceptor;

impl Interceptor for LoggingInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        Arc::new(move |request: UnaryRequest| {
            let next = next.clone();
            Box::pin(async move {
                let method = request.method.clone();
                let attempt = request.attempt;
                let started = Instant::now();

                let result = next(request).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(response) => tracing::debug!(
                        rpc.method = %method,
                        attempt,
                        elapsed_ms,
                        response_bytes = response.body.len(),
                        "grpc call attempt finished"
                    ),
                    Err(err) => {
                        tracing::debug!(
                            rpc.method = %method,
                            attempt,
                            elapsed_ms,
                            rpc.code = %err.code(),
                            "grpc call attempt finished"
                        );
                        tracing::warn!(
                            rpc.method = %method,
                            attempt,
                            rpc.code = %err.code(),
                            error = %err,
                            "grpc call attempt failed"
                        );
                    }
                }
                result
            })
        })
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
