//! Shared pieces of the grpcwrap demo binaries.

use std::net::SocketAddr;

/// Fully qualified method served by `greeter-server`.
pub const SAY_HELLO: &str = "helloworld.Greeter/SayHello";

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloReply {
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Returns the server address from PORT env var, defaulting to 9102.
///
/// # Example
///
/// ```ignore
/// let addr = grpcwrap_examples::server_addr();
/// let listener = tokio::net::TcpListener::bind(addr).await?;
/// ```
pub fn server_addr() -> SocketAddr {
    let port = std::env::var("PORT").unwrap_or_else(|_| "9102".into());
    format!("127.0.0.1:{port}")
        .parse()
        .expect("invalid PORT env var")
}
