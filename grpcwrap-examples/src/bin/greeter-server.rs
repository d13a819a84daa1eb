//! Demo gRPC server over h2c.
//!
//! The first `FAILURES` calls (default 2) are answered with UNAVAILABLE so the
//! client's retry loop has something to do. A request with an empty name is
//! rejected with INVALID_ARGUMENT, which is never retried.
//!
//! Run with: cargo run --bin greeter-server
//! Then:     cargo run --bin greeter-client

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use bytes::{Bytes, BytesMut};
use grpcwrap_core::{Code, unwrap_message, wrap_message};
use grpcwrap_examples::{HelloReply, HelloRequest, SAY_HELLO, server_addr};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::StreamBody;
use hyper::body::Frame;
use prost::Message;

#[derive(Clone)]
struct Greeter {
    calls: Arc<AtomicU32>,
    failures: u32,
}

fn reply(message: &HelloReply) -> Response {
    let mut buf = BytesMut::with_capacity(message.encoded_len());
    // encoding into a growable buffer cannot fail
    let _ = message.encode(&mut buf);

    let mut trailers = HeaderMap::new();
    trailers.insert("grpc-status", HeaderValue::from_static("0"));
    let frames = futures::stream::iter([
        Ok::<_, Infallible>(Frame::data(wrap_message(&buf))),
        Ok(Frame::trailers(trailers)),
    ]);

    let mut response = Response::new(Body::new(StreamBody::new(frames)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    response
}

fn status(code: Code, message: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    headers.insert("grpc-status", HeaderValue::from(code.as_i32()));
    if let Ok(value) = HeaderValue::from_str(message) {
        headers.insert("grpc-message", value);
    }
    response
}

async fn say_hello(State(greeter): State<Greeter>, body: Bytes) -> Response {
    let call = greeter.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if call <= greeter.failures {
        tracing::info!(call, "rejecting call while warming up");
        return status(Code::Unavailable, "warming up");
    }

    let request = match unwrap_message(body)
        .map_err(|e| e.to_string())
        .and_then(|m| HelloRequest::decode(m).map_err(|e| e.to_string()))
    {
        Ok(request) => request,
        Err(err) => return status(Code::Internal, &err),
    };

    if request.name.is_empty() {
        return status(Code::InvalidArgument, "name is required");
    }

    tracing::info!(call, name = %request.name, "greeting");
    reply(&HelloReply {
        message: format!("Hello, {}!", request.name),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let failures = std::env::var("FAILURES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2);
    let greeter = Greeter {
        calls: Arc::new(AtomicU32::new(0)),
        failures,
    };

    let app = Router::new()
        .route(&format!("/{SAY_HELLO}"), post(say_hello))
        .with_state(greeter);

    let addr = server_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("=== grpcwrap greeter server ===");
    println!("Listening on {addr} (h2c)");
    println!("  - POST /{SAY_HELLO}");
    println!("  - first {failures} calls fail with UNAVAILABLE");

    axum::serve(listener, app).await?;
    Ok(())
}
