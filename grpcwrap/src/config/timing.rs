//! Connection timing: reconnect backoff and keepalive.
//!
//! The reconnect curve follows the
//! [gRPC connection backoff specification](https://github.com/grpc/grpc/blob/master/doc/connection-backoff.md):
//! the first retry waits `initial_backoff`, every following wait grows by
//! `backoff_multiplier` up to `max_backoff`, and each wait is randomized by
//! `±backoff_jitter`. Each connection attempt is bounded by
//! `min_connect_timeout`.
//!
//! Keepalive pings are sent every `keepalive_interval`, also while no call is
//! active. A ping unanswered within `keepalive_timeout` closes the connection.

use std::time::Duration;

/// Default connection timing values.
pub mod defaults {
    use std::time::Duration;

    pub const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
    pub const BACKOFF_MULTIPLIER: f64 = 1.6;
    pub const BACKOFF_JITTER: f64 = 0.2;
    pub const MAX_BACKOFF: Duration = Duration::from_secs(3);
    pub const MIN_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
    pub const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const KEEPALIVE_WITHOUT_CALLS: bool = true;
}

/// Reconnect backoff and keepalive parameters of a connection.
///
/// # Example
///
/// ```
/// use grpcwrap::ConnectionTimingPolicy;
/// use std::time::Duration;
///
/// let timing = ConnectionTimingPolicy::new()
///     .max_backoff(Duration::from_secs(10))
///     .keepalive_interval(Duration::from_secs(60));
/// assert!(timing.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionTimingPolicy {
    /// Wait before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Growth factor between reconnect waits. Greater than 1.
    pub backoff_multiplier: f64,
    /// Randomization of each wait, in `[0, 1)`.
    pub backoff_jitter: f64,
    /// Cap on a single reconnect wait.
    pub max_backoff: Duration,
    /// Bound on a single connection attempt.
    pub min_connect_timeout: Duration,
    pub keepalive_interval: Duration,
    pub keepalive_timeout: Duration,
    /// Send keepalive pings while no call is active.
    pub keepalive_without_calls: bool,
}

impl Default for ConnectionTimingPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: defaults::INITIAL_BACKOFF,
            backoff_multiplier: defaults::BACKOFF_MULTIPLIER,
            backoff_jitter: defaults::BACKOFF_JITTER,
            max_backoff: defaults::MAX_BACKOFF,
            min_connect_timeout: defaults::MIN_CONNECT_TIMEOUT,
            keepalive_interval: defaults::KEEPALIVE_INTERVAL,
            keepalive_timeout: defaults::KEEPALIVE_TIMEOUT,
            keepalive_without_calls: defaults::KEEPALIVE_WITHOUT_CALLS,
        }
    }
}

impl ConnectionTimingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Set the backoff multiplier.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is not greater than 1.0.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        assert!(multiplier > 1.0, "backoff multiplier must be > 1.0");
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the jitter factor.
    ///
    /// # Panics
    ///
    /// Panics if `jitter` is not in `[0.0, 1.0)`.
    pub fn backoff_jitter(mut self, jitter: f64) -> Self {
        assert!(
            (0.0..1.0).contains(&jitter),
            "backoff jitter must be in [0.0, 1.0)"
        );
        self.backoff_jitter = jitter;
        self
    }

    pub fn max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    pub fn min_connect_timeout(mut self, timeout: Duration) -> Self {
        self.min_connect_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = timeout;
        self
    }

    pub fn keepalive_without_calls(mut self, enabled: bool) -> Self {
        self.keepalive_without_calls = enabled;
        self
    }

    /// Validate the policy configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.backoff_multiplier <= 1.0 {
            return Err("backoff multiplier must be > 1.0");
        }
        if !(0.0..1.0).contains(&self.backoff_jitter) {
            return Err("backoff jitter must be in [0.0, 1.0)");
        }
        if self.initial_backoff > self.max_backoff {
            return Err("initial backoff must not exceed max backoff");
        }
        if self.min_connect_timeout.is_zero() {
            return Err("min connect timeout must be positive");
        }
        if self.keepalive_interval.is_zero() || self.keepalive_timeout.is_zero() {
            return Err("keepalive interval and timeout must be positive");
        }
        Ok(())
    }

    /// Create the reconnect backoff state for this policy.
    pub fn connect_backoff(&self) -> ConnectBackoff {
        ConnectBackoff::new(self.clone())
    }
}

/// Reconnect backoff state.
///
/// Yields `initial × multiplier^n` capped at `max_backoff`, each with
/// `±jitter` applied. Reset after a successful handshake.
///
/// ```
/// use grpcwrap::ConnectionTimingPolicy;
/// use std::time::Duration;
///
/// let mut backoff = ConnectionTimingPolicy::new().connect_backoff();
/// let first = backoff.next_delay();
/// assert!(first >= Duration::from_millis(80) && first <= Duration::from_millis(120));
/// ```
#[derive(Clone, Debug)]
pub struct ConnectBackoff {
    policy: ConnectionTimingPolicy,
    /// Current delay without jitter, stored as f64 to avoid rounding errors.
    current_delay_secs: f64,
    /// Consecutive failed attempts.
    attempts: u32,
}

impl ConnectBackoff {
    pub fn new(policy: ConnectionTimingPolicy) -> Self {
        let current_delay_secs = policy.initial_backoff.as_secs_f64();
        Self {
            policy,
            current_delay_secs,
            attempts: 0,
        }
    }

    /// Reset to the initial state.
    pub fn reset(&mut self) {
        self.current_delay_secs = self.policy.initial_backoff.as_secs_f64();
        self.attempts = 0;
    }

    /// Consecutive failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait before the next connection attempt. Advances the curve.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay_secs;
        let max = self.policy.max_backoff.as_secs_f64();

        // delay * (1 + jitter * random(-1, 1))
        let jittered = if self.policy.backoff_jitter > 0.0 {
            let jitter = self.policy.backoff_jitter;
            let random_factor = rand::random::<f64>() * jitter * 2.0 - jitter;
            delay * (1.0 + random_factor)
        } else {
            delay
        };

        self.current_delay_secs =
            (self.current_delay_secs * self.policy.backoff_multiplier).min(max);
        self.attempts += 1;

        Duration::from_secs_f64(jittered.min(max).max(0.0))
    }
}
