//! Core types for grpcwrap.
//!
//! This crate holds the pieces that are independent of any transport:
//!
//! - [`Code`]: the gRPC status code set and its retry classification
//! - [`envelope`]: length-prefixed message framing for unary calls
//! - [`constants`]: workflow, instance and workspace state tables

mod code;
pub mod constants;
pub mod envelope;

pub use code::{Code, ParseCodeError};
pub use envelope::{EnvelopeError, parse_envelope_header, unwrap_message, wrap_message};
