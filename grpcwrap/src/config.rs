//! Configuration for connections and calls.
//!
//! - [`ClientConfig`]: address and transport log settings
//! - [`ConnectionTimingPolicy`]: reconnect backoff and keepalive
//! - [`RetryPolicy`]: call-level retries
//! - [`CallOptions`]: per-call deadline, headers and cancellation

mod client;
mod options;
mod retry;
mod timing;

pub use client::{ClientConfig, DEFAULT_LOG_LEVEL, DEFAULT_LOG_VERBOSITY};
pub use options::{CallOptions, Cancellation};
pub(crate) use options::grpc_timeout_header;
pub use retry::{Backoff, RetryPolicy, retry_with_cancellation, retry_with_policy};
pub use timing::{ConnectBackoff, ConnectionTimingPolicy};

/// Default policy values.
pub mod defaults {
    pub use super::retry::defaults as retry;
    pub use super::timing::defaults as timing;
}
