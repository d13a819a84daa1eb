//! Error types for dialing and calling.
//!
//! [`ConnectError`] is returned by the connection factory and is never retried.
//! [`CallError`] is returned by every call made through a [`ClientConn`](crate::ClientConn);
//! its [`code()`](CallError::code) decides whether the retry layer tries again.

use grpcwrap_core::{Code, EnvelopeError};

/// Failure to produce a connection handle.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The address string held no usable endpoint.
    #[error("invalid address: {address:?}")]
    InvalidAddress { address: String },

    /// A configuration or policy invariant does not hold.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport could not be set up for the endpoint, or a blocking
    /// dial failed its first handshake.
    #[error("dial {address}: {reason}")]
    Dial { address: String, reason: String },
}

impl ConnectError {
    pub(crate) fn dial(address: impl Into<String>, reason: impl ToString) -> Self {
        ConnectError::Dial {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure of a single logical call.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CallError {
    /// The server (or a local deadline) produced a gRPC status.
    #[error("{code}: {}", .message.as_deref().unwrap_or("<no message>"))]
    Status { code: Code, message: Option<String> },

    /// Transport-level error (connection refused, reset, handshake timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Request message encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Response message decoding error.
    #[error("decode error: {0}")]
    Decode(String),

    /// The peer violated the wire protocol (bad framing, missing status).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl CallError {
    /// Create a new status error with a code and message.
    pub fn new<S: Into<String>>(code: Code, message: S) -> Self {
        CallError::Status {
            code,
            message: Some(message.into()),
        }
    }

    /// Create a new status error with just a code.
    pub fn from_code(code: Code) -> Self {
        CallError::Status {
            code,
            message: None,
        }
    }

    /// Get the status code.
    ///
    /// For non-status variants:
    /// - Transport: `Unavailable`
    /// - Encode/Decode/Protocol: `Internal`
    pub fn code(&self) -> Code {
        match self {
            CallError::Status { code, .. } => *code,
            CallError::Transport(_) => Code::Unavailable,
            CallError::Encode(_) | CallError::Decode(_) | CallError::Protocol(_) => {
                Code::Internal
            }
        }
    }

    /// Get the error message.
    pub fn message(&self) -> Option<&str> {
        match self {
            CallError::Status { message, .. } => message.as_deref(),
            CallError::Transport(msg)
            | CallError::Encode(msg)
            | CallError::Decode(msg)
            | CallError::Protocol(msg) => Some(msg),
        }
    }

    /// Whether the fixed retry set classifies this error as transient.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    pub fn canceled<S: Into<String>>(message: S) -> Self {
        Self::new(Code::Canceled, message)
    }

    pub fn deadline_exceeded<S: Into<String>>(message: S) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::new(Code::InvalidArgument, message)
    }
}

impl From<EnvelopeError> for CallError {
    fn from(err: EnvelopeError) -> Self {
        CallError::Protocol(err.to_string())
    }
}

impl From<prost::DecodeError> for CallError {
    fn from(err: prost::DecodeError) -> Self {
        CallError::Decode(err.to_string())
    }
}

impl From<prost::EncodeError> for CallError {
    fn from(err: prost::EncodeError) -> Self {
        CallError::Encode(err.to_string())
    }
}
