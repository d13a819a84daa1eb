//! HTTP/2 transport layer.
//!
//! [`HyperTransport`] sends gRPC requests over cleartext HTTP/2 with prior
//! knowledge, using hyper_util's legacy client for pooling and keepalive.
//! Connections are made by a [`BackoffConnector`], which bounds each attempt
//! and spaces reconnects along the [`ConnectBackoff`](crate::ConnectBackoff)
//! curve.

mod connector;
mod hyper;

pub use connector::{BackoffConnector, BoxError, ConnectTimeout};
pub use hyper::{HyperTransport, HyperTransportBuilder};
