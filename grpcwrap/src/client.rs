//! The connection handle.
//!
//! [`ClientConn`] is what the factory returns. Every call enters the
//! interceptor chain assembled at dial time and ends in a single gRPC unary
//! exchange over the HTTP/2 transport.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use grpcwrap_core::{unwrap_message, wrap_message};
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use prost::Message;

use crate::address::ResolvedAddress;
use crate::config::{CallOptions, grpc_timeout_header};
use crate::interceptor::{UnaryFunc, UnaryRequest, UnaryResponse};
use crate::logger::{Field, Severity, StructuredLogger};
use crate::status::{grpc_status, http_error, status_result};
use crate::transport::HyperTransport;
use crate::CallError;

const GRPC_CONTENT_TYPE: &str = "application/grpc";
const GRPC_TIMEOUT: &str = "grpc-timeout";
const USER_AGENT: &str = concat!("grpcwrap/", env!("CARGO_PKG_VERSION"));

/// Headers the wire layer owns; caller-provided values are dropped.
fn is_reserved_header(name: &HeaderName) -> bool {
    let name = name.as_str();
    name.starts_with("grpc-")
        || name == "content-type"
        || name == "content-length"
        || name == "te"
}

/// A logical connection to the first resolved endpoint.
///
/// Not `Clone`: the caller owns it and releases it with [`close`](Self::close)
/// or by dropping it. It is `Send + Sync`, so calls may run concurrently
/// through shared references.
pub struct ClientConn {
    target: String,
    resolved: ResolvedAddress,
    call: UnaryFunc,
    interceptors: Vec<&'static str>,
    logger: Arc<dyn StructuredLogger>,
}

impl fmt::Debug for ClientConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConn")
            .field("target", &self.target)
            .field("resolved", &self.resolved)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

impl ClientConn {
    pub(crate) fn new(
        target: String,
        resolved: ResolvedAddress,
        call: UnaryFunc,
        interceptors: Vec<&'static str>,
        logger: Arc<dyn StructuredLogger>,
    ) -> Self {
        Self {
            target,
            resolved,
            call,
            interceptors,
            logger,
        }
    }

    /// The dialed endpoint.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Every endpoint the address resolved to. Only the first is dialed.
    pub fn resolved(&self) -> &ResolvedAddress {
        &self.resolved
    }

    /// Names of the interceptors, outermost first.
    pub fn interceptors(&self) -> &[&'static str] {
        &self.interceptors
    }

    /// Make a unary call with an already encoded request message.
    ///
    /// `method` is `package.Service/Method`, with or without a leading `/`.
    pub async fn call_unary_raw(
        &self,
        method: &str,
        body: Bytes,
        options: CallOptions,
    ) -> Result<UnaryResponse, CallError> {
        let cancellation = options.cancellation();

        let mut headers = options.headers;
        strip_reserved_headers(&mut headers);

        if let Some(interrupted) = cancellation.interruption() {
            return Err(interrupted);
        }

        let request = UnaryRequest::new(method.trim_start_matches('/'), headers, body)
            .with_cancellation(cancellation);
        (self.call)(request).await
    }

    /// Make a unary call with protobuf messages.
    pub async fn call_unary<Req, Res>(&self, method: &str, request: &Req) -> Result<Res, CallError>
    where
        Req: Message,
        Res: Message + Default,
    {
        self.call_unary_with_options(method, request, CallOptions::default())
            .await
    }

    /// Make a unary call with protobuf messages and per-call options.
    pub async fn call_unary_with_options<Req, Res>(
        &self,
        method: &str,
        request: &Req,
        options: CallOptions,
    ) -> Result<Res, CallError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let mut buf = BytesMut::with_capacity(request.encoded_len());
        request.encode(&mut buf)?;

        let response = self.call_unary_raw(method, buf.freeze(), options).await?;
        Ok(Res::decode(response.body)?)
    }

    /// Release the connection.
    ///
    /// In-flight calls holding a reference finish first; pooled HTTP/2
    /// connections close once the last transport clone is dropped.
    pub fn close(self) {
        self.logger.log(
            Severity::Info,
            "closing grpc connection",
            &[Field::new("address", &self.target)],
        );
    }
}

fn strip_reserved_headers(headers: &mut HeaderMap) {
    let reserved: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_reserved_header(name))
        .cloned()
        .collect();
    for name in reserved {
        headers.remove(&name);
    }
}

/// Build the innermost unary function: one gRPC request over `transport`.
pub(crate) fn wire_call(transport: HyperTransport, base: Uri) -> UnaryFunc {
    let base = Arc::new(base);
    Arc::new(move |request: UnaryRequest| {
        let transport = transport.clone();
        let base = base.clone();
        Box::pin(async move {
            // interruption surfaces as an error through every layer above
            let cancellation = request.cancellation.clone();
            cancellation
                .run(send_unary(&transport, &base, request))
                .await
        })
    })
}

async fn send_unary(
    transport: &HyperTransport,
    base: &Uri,
    request: UnaryRequest,
) -> Result<UnaryResponse, CallError> {
    let authority = base
        .authority()
        .ok_or_else(|| CallError::internal("endpoint has no authority"))?;
    let uri = Uri::builder()
        .scheme(base.scheme_str().unwrap_or("http"))
        .authority(authority.as_str())
        .path_and_query(format!("/{}", request.method))
        .build()
        .map_err(|e| {
            CallError::invalid_argument(format!("invalid method {:?}: {e}", request.method))
        })?;

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, GRPC_CONTENT_TYPE)
        .header(header::TE, "trailers")
        .header(header::USER_AGENT, USER_AGENT);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in request.headers.iter() {
            headers.append(name, value.clone());
        }
        // the budget left for this attempt, not the original timeout
        if let Some(remaining) = request.cancellation.remaining() {
            let value = HeaderValue::from_str(&grpc_timeout_header(remaining))
                .map_err(|e| CallError::internal(e.to_string()))?;
            headers.insert(GRPC_TIMEOUT, value);
        }
    }
    let http_request = builder
        .body(Full::new(wrap_message(&request.body)))
        .map_err(|e| CallError::internal(format!("failed to build request: {e}")))?;

    let response = transport.request(http_request).await?;
    let (parts, body) = response.into_parts();

    // trailers-only response
    if let Some((code, message)) = grpc_status(&parts.headers) {
        status_result(code, message)?;
        return Ok(UnaryResponse::new(parts.headers, Bytes::new()));
    }

    if parts.status != StatusCode::OK {
        return Err(http_error(parts.status));
    }

    let collected = body
        .collect()
        .await
        .map_err(|e| CallError::Transport(format!("failed to read response body: {e}")))?;
    let trailers = collected.trailers().cloned().unwrap_or_default();
    let data = collected.to_bytes();

    match grpc_status(&trailers) {
        Some((code, message)) => status_result(code, message)?,
        None => {
            return Err(CallError::Protocol(
                "response ended without grpc-status".into(),
            ));
        }
    }

    let message = unwrap_message(data)?;
    Ok(UnaryResponse::new(parts.headers, message))
}
