//! Retry layer.

use std::sync::Arc;

use super::{Interceptor, UnaryFunc, UnaryRequest};
use crate::config::{RetryPolicy, retry_with_cancellation};

/// Runs the retry loop around every layer inside it.
///
/// Each attempt gets a fresh copy of the request with
/// [`UnaryRequest::attempt`] set and its cancellation narrowed to the
/// attempt. The wire enforces it, so an interrupted attempt still returns
/// through the layers below this one. Backoff sleeps are cut short here.
#[derive(Clone, Debug)]
pub struct RetryInterceptor {
    policy: Arc<RetryPolicy>,
}

impl RetryInterceptor {
    pub fn new(policy: Arc<RetryPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl Default for RetryInterceptor {
    fn default() -> Self {
        Self::new(Arc::new(RetryPolicy::default()))
    }
}

impl Interceptor for RetryInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let policy = self.policy.clone();
        Arc::new(move |request: UnaryRequest| {
            let policy = policy.clone();
            let next = next.clone();
            Box::pin(async move {
                let cancellation = request.cancellation.clone();
                retry_with_cancellation(&policy, &cancellation, |attempt, scoped| {
                    let mut request = request.clone();
                    request.attempt = attempt;
                    request.cancellation = scoped;
                    next(request)
                })
                .await
            })
        })
    }

    fn name(&self) -> &'static str {
        "retry"
    }
}
