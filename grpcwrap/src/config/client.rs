//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::ConnectError;
use crate::logger::Severity;

/// Default log level: warning.
pub const DEFAULT_LOG_LEVEL: Severity = Severity::Warning;
/// Default log verbosity.
pub const DEFAULT_LOG_VERBOSITY: u32 = 1;

/// Configuration for one client connection.
///
/// Deserializes from the keys `address`, `log_level` and `log_verbosity`;
/// missing log keys take their defaults.
///
/// ```
/// use grpcwrap::ClientConfig;
///
/// let config = ClientConfig::new("127.0.0.1:9102, 127.0.0.1:9103");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// One or more `host:port` endpoints separated by commas.
    pub address: String,

    /// Minimum severity of transport diagnostics, `1..=4`
    /// (info, warning, error, fatal).
    #[serde(default = "default_log_level")]
    pub log_level: Severity,

    /// Transport diagnostics detail. Events costing more are summarized.
    #[serde(default = "default_log_verbosity")]
    pub log_verbosity: u32,
}

fn default_log_level() -> Severity {
    DEFAULT_LOG_LEVEL
}

fn default_log_verbosity() -> u32 {
    DEFAULT_LOG_VERBOSITY
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            log_level: DEFAULT_LOG_LEVEL,
            log_verbosity: DEFAULT_LOG_VERBOSITY,
        }
    }

    pub fn log_level(mut self, level: Severity) -> Self {
        self.log_level = level;
        self
    }

    pub fn log_verbosity(mut self, verbosity: u32) -> Self {
        self.log_verbosity = verbosity;
        self
    }

    /// Check the invariants not already enforced by the types.
    ///
    /// The address itself is checked by [`resolve`](crate::resolve).
    pub fn validate(&self) -> Result<(), ConnectError> {
        if self.log_verbosity < 1 {
            return Err(ConnectError::InvalidConfig(format!(
                "log_verbosity must be >= 1, got {}",
                self.log_verbosity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"address": "127.0.0.1:9102"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("127.0.0.1:9102"));
        assert_eq!(config.log_level, Severity::Warning);
        assert_eq!(config.log_verbosity, 1);
    }

    #[test]
    fn test_deserialize_full() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"address": "a:1,b:2", "log_level": 3, "log_verbosity": 4}"#,
        )
        .unwrap();
        assert_eq!(config.log_level, Severity::Error);
        assert_eq!(config.log_verbosity, 4);
    }

    #[test]
    fn test_deserialize_rejects_level_out_of_range() {
        for level in [0, 5] {
            let raw = format!(r#"{{"address": "a:1", "log_level": {level}}}"#);
            let err = serde_json::from_str::<ClientConfig>(&raw).unwrap_err();
            assert!(err.to_string().contains("between 1 and 4"), "{err}");
        }
    }

    #[test]
    fn test_serialize_level_as_ordinal() {
        let json =
            serde_json::to_value(ClientConfig::new("a:1").log_level(Severity::Fatal)).unwrap();
        assert_eq!(json["log_level"], 4);
    }

    #[test]
    fn test_validate_verbosity() {
        let config = ClientConfig::new("a:1").log_verbosity(0);
        assert!(matches!(
            config.validate(),
            Err(ConnectError::InvalidConfig(_))
        ));
    }
}
