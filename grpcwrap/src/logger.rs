//! Logger bridge for transport diagnostics.
//!
//! The transport layer does not log through the application logger directly.
//! Instead the connection factory installs a [`LoggerBridge`] into a
//! process-wide slot, and the transport emits through [`transport_log`].
//! The bridge filters by severity and summarizes events whose verbosity cost
//! exceeds the configured verbosity.
//!
//! The slot is process-wide: when several handles are created with different
//! settings, the last installed bridge wins.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Target of factory and handle events forwarded to `tracing`.
pub const CLIENT_TARGET: &str = "grpcwrap";
/// Target of transport diagnostics forwarded to `tracing`.
pub const TRANSPORT_TARGET: &str = "grpcwrap::transport";

/// Log severity, ordered from least to most severe.
///
/// Serialized as the ordinal `1..=4`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    Info = 1,
    #[default]
    Warning = 2,
    Error = 3,
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a severity ordinal outside `1..=4`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("log level must be between 1 and 4, got {0}")]
pub struct InvalidSeverity(pub u8);

impl TryFrom<u8> for Severity {
    type Error = InvalidSeverity;

    fn try_from(value: u8) -> Result<Self, InvalidSeverity> {
        match value {
            1 => Ok(Severity::Info),
            2 => Ok(Severity::Warning),
            3 => Ok(Severity::Error),
            4 => Ok(Severity::Fatal),
            other => Err(InvalidSeverity(other)),
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> u8 {
        severity as u8
    }
}

/// A key/value pair attached to a log event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub value: String,
}

impl Field {
    pub fn new(key: &'static str, value: impl fmt::Display) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// Renders fields as `k=v k=v`.
struct DisplayFields<'a>(&'a [Field]);

impl fmt::Display for DisplayFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", field.key, field.value)?;
        }
        Ok(())
    }
}

/// Application logger consumed by the factory and the bridge.
pub trait StructuredLogger: Send + Sync + 'static {
    fn log(&self, severity: Severity, message: &str, fields: &[Field]);

    /// Entry point of the [`LoggerBridge`]. Defaults to [`log`](Self::log).
    fn log_transport(&self, severity: Severity, message: &str, fields: &[Field]) {
        self.log(severity, message, fields);
    }
}

macro_rules! emit {
    ($target:expr, $severity:expr, $message:expr, $fields:expr) => {
        match $severity {
            Severity::Info => tracing::info!(target: $target, fields = %$fields, "{}", $message),
            Severity::Warning => tracing::warn!(target: $target, fields = %$fields, "{}", $message),
            Severity::Error => tracing::error!(target: $target, fields = %$fields, "{}", $message),
            Severity::Fatal => {
                tracing::error!(target: $target, fatal = true, fields = %$fields, "{}", $message)
            }
        }
    };
}

/// Forwards events to `tracing`.
///
/// Factory and handle entries use the [`CLIENT_TARGET`] target, bridged
/// transport diagnostics use [`TRANSPORT_TARGET`]. `Fatal` is emitted at
/// `ERROR` with `fatal = true`; it never aborts.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl StructuredLogger for TracingLogger {
    fn log(&self, severity: Severity, message: &str, fields: &[Field]) {
        emit!(CLIENT_TARGET, severity, message, DisplayFields(fields));
    }

    fn log_transport(&self, severity: Severity, message: &str, fields: &[Field]) {
        emit!(TRANSPORT_TARGET, severity, message, DisplayFields(fields));
    }
}

/// Verbosity cost of routine events (connection failures, state changes).
pub const COST_ROUTINE: u32 = 1;
/// Verbosity cost of detailed events (per-handshake details).
pub const COST_DETAIL: u32 = 2;

/// Adapts a [`StructuredLogger`] to the transport's severity/verbosity model.
#[derive(Clone)]
pub struct LoggerBridge {
    sink: Arc<dyn StructuredLogger>,
    threshold: Severity,
    verbosity: u32,
}

impl fmt::Debug for LoggerBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerBridge")
            .field("threshold", &self.threshold)
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}

impl LoggerBridge {
    pub fn new(sink: Arc<dyn StructuredLogger>, threshold: Severity, verbosity: u32) -> Self {
        Self {
            sink,
            threshold,
            verbosity,
        }
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn verbosity(&self) -> u32 {
        self.verbosity
    }

    /// Whether events of `severity` reach the sink.
    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.threshold
    }

    /// Forward one event.
    ///
    /// Dropped below the threshold. When `cost` exceeds the configured
    /// verbosity the message is kept and the fields are replaced by
    /// `elided_fields=<count>`.
    pub fn log(&self, severity: Severity, cost: u32, message: &str, fields: &[Field]) {
        if !self.enabled(severity) {
            return;
        }

        if cost > self.verbosity && !fields.is_empty() {
            let summary = [Field::new("elided_fields", fields.len())];
            self.sink.log_transport(severity, message, &summary);
        } else {
            self.sink.log_transport(severity, message, fields);
        }
    }
}

static TRANSPORT_LOGGER: RwLock<Option<Arc<LoggerBridge>>> = RwLock::new(None);

/// Install `bridge` as the process-wide transport logger, replacing any
/// previous one. Returns the installed handle.
pub fn install(bridge: LoggerBridge) -> Arc<LoggerBridge> {
    let bridge = Arc::new(bridge);
    let mut slot = TRANSPORT_LOGGER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = Some(bridge.clone());
    bridge
}

/// The currently installed bridge, if any.
pub fn installed() -> Option<Arc<LoggerBridge>> {
    TRANSPORT_LOGGER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Emit a transport diagnostic through the installed bridge.
pub(crate) fn transport_log(severity: Severity, cost: u32, message: &str, fields: &[Field]) {
    if let Some(bridge) = installed() {
        bridge.log(severity, cost, message, fields);
    }
}
