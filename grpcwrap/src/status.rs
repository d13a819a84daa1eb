//! gRPC status extraction from response metadata.
//!
//! The status of a call travels in the `grpc-status` and `grpc-message`
//! trailers, or in the headers of a trailers-only response. When neither is
//! present the HTTP status decides the code.

use grpcwrap_core::Code;
use http::{HeaderMap, StatusCode};

use crate::CallError;

pub(crate) const GRPC_STATUS: &str = "grpc-status";
pub(crate) const GRPC_MESSAGE: &str = "grpc-message";

/// Read the status carried in `map`, if any.
///
/// An unparseable `grpc-status` is reported as `Unknown`.
pub(crate) fn grpc_status(map: &HeaderMap) -> Option<(Code, Option<String>)> {
    let raw = map.get(GRPC_STATUS)?;
    let code = raw
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .map_or(Code::Unknown, Code::from_i32);

    let message = map
        .get(GRPC_MESSAGE)
        .and_then(|v| v.to_str().ok())
        .map(decode_grpc_message)
        .filter(|m| !m.is_empty());

    Some((code, message))
}

/// Turn a status into a call result.
pub(crate) fn status_result(code: Code, message: Option<String>) -> Result<(), CallError> {
    if code == Code::Ok {
        return Ok(());
    }
    Err(CallError::Status { code, message })
}

/// Map an HTTP status to a gRPC code, for responses without `grpc-status`.
pub(crate) fn http_status_to_code(status: StatusCode) -> Code {
    match status {
        StatusCode::BAD_REQUEST => Code::Internal,
        StatusCode::UNAUTHORIZED => Code::Unauthenticated,
        StatusCode::FORBIDDEN => Code::PermissionDenied,
        StatusCode::NOT_FOUND => Code::Unimplemented,
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Code::Unavailable,
        _ => Code::Unknown,
    }
}

/// Build the error for a non-200 response without `grpc-status`.
pub(crate) fn http_error(status: StatusCode) -> CallError {
    CallError::new(
        http_status_to_code(status),
        format!(
            "unexpected HTTP status {}",
            status.canonical_reason().unwrap_or(status.as_str())
        ),
    )
}

/// Percent-decode a `grpc-message` value. Invalid escapes are kept verbatim.
pub(crate) fn decode_grpc_message(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                decoded.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
