#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use grpcwrap::{
    AttemptRecord, CallError, CallSpan, Code, Field, MetricsRecorder, Outcome, Severity,
    StructuredLogger, Tracer,
};
use grpcwrap_core::wrap_message;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::StreamBody;
use hyper::body::Frame;
use tokio::net::TcpListener;

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoReply {
    #[prost(string, tag = "1")]
    pub text: String,
}

/// Serve `router` over h2c on an ephemeral port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// An address with nothing listening.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A successful response: one enveloped message, then `grpc-status: 0`.
pub fn grpc_ok(message: Bytes) -> Response {
    let mut trailers = HeaderMap::new();
    trailers.insert("grpc-status", HeaderValue::from_static("0"));

    let frames = futures::stream::iter([
        Ok::<_, Infallible>(Frame::data(wrap_message(&message))),
        Ok(Frame::trailers(trailers)),
    ]);

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/grpc")
        .body(Body::new(StreamBody::new(frames)))
        .unwrap()
}

/// A trailers-only error response.
pub fn grpc_error(code: Code, message: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/grpc")
        .header("grpc-status", code.as_i32().to_string())
        .header("grpc-message", message)
        .body(Body::empty())
        .unwrap()
}

/// Echoes the enveloped request message back.
pub fn echo(body: Bytes) -> Response {
    match grpcwrap_core::unwrap_message(body) {
        Ok(message) => grpc_ok(message),
        Err(err) => grpc_error(Code::Internal, &err.to_string()),
    }
}

#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(Severity, String, Vec<Field>)>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<(Severity, String, Vec<Field>)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _, _)| *s == severity)
            .count()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message, _)| message.clone())
            .collect()
    }
}

impl StructuredLogger for RecordingLogger {
    fn log(&self, severity: Severity, message: &str, fields: &[Field]) {
        self.entries
            .lock()
            .unwrap()
            .push((severity, message.to_owned(), fields.to_vec()));
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    attempts: Mutex<Vec<(u32, Outcome, Code)>>,
}

impl RecordingMetrics {
    pub fn attempts(&self) -> Vec<(u32, Outcome, Code)> {
        self.attempts.lock().unwrap().clone()
    }
}

impl MetricsRecorder for RecordingMetrics {
    fn record_attempt(&self, record: &AttemptRecord<'_>) {
        self.attempts
            .lock()
            .unwrap()
            .push((record.attempt, record.outcome, record.code));
    }
}

/// Finished spans as `(method, final code)`.
#[derive(Default)]
pub struct RecordingTracer {
    finished: Arc<Mutex<Vec<(String, Code)>>>,
}

impl RecordingTracer {
    pub fn finished(&self) -> Vec<(String, Code)> {
        self.finished.lock().unwrap().clone()
    }
}

struct RecordingSpan {
    method: String,
    finished: Arc<Mutex<Vec<(String, Code)>>>,
}

impl Tracer for RecordingTracer {
    fn start_span(&self, method: &str) -> Box<dyn CallSpan> {
        Box::new(RecordingSpan {
            method: method.to_owned(),
            finished: self.finished.clone(),
        })
    }
}

impl CallSpan for RecordingSpan {
    fn finish(self: Box<Self>, _elapsed: Duration, error: Option<&CallError>) {
        let code = error.map_or(Code::Ok, CallError::code);
        self.finished.lock().unwrap().push((self.method.clone(), code));
    }
}
