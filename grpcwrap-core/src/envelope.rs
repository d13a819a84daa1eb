//! gRPC length-prefixed message framing.
//!
//! Every gRPC message on the wire is preceded by a 5-byte header:
//!
//! ```text
//! [compressed:1][length:4][payload:length]
//! ```
//!
//! Unary calls carry exactly one message in each direction.

use bytes::{BufMut, Bytes, BytesMut};

/// Envelope flag values.
pub mod envelope_flags {
    /// Uncompressed message.
    pub const MESSAGE: u8 = 0x00;
    /// Compressed message.
    pub const COMPRESSED: u8 = 0x01;
}

/// Envelope header size (flag + length).
pub const ENVELOPE_HEADER_SIZE: usize = 5;

/// Envelope framing errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Fewer than five header bytes.
    #[error("incomplete envelope header: expected {expected} bytes, got {actual}")]
    IncompleteHeader { expected: usize, actual: usize },

    /// The header announces more bytes than the body holds.
    #[error("truncated message: header announced {announced} bytes, got {actual}")]
    Truncated { announced: usize, actual: usize },

    /// Bytes remain after the single unary message.
    #[error("unexpected {0} trailing bytes after unary message")]
    TrailingData(usize),

    /// The flag byte is not a known value.
    #[error("invalid frame flags: 0x{0:02x}")]
    InvalidFlags(u8),

    /// The peer compressed a message although no encoding was negotiated.
    #[error("compressed message received without negotiated encoding")]
    UnexpectedCompression,
}

/// Wrap a payload in an uncompressed gRPC envelope.
pub fn wrap_message(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(ENVELOPE_HEADER_SIZE + payload.len());
    frame.put_u8(envelope_flags::MESSAGE);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);
    frame.freeze()
}

/// Parse an envelope header. Returns `(flags, length)`.
pub fn parse_envelope_header(data: &[u8]) -> Result<(u8, u32), EnvelopeError> {
    if data.len() < ENVELOPE_HEADER_SIZE {
        return Err(EnvelopeError::IncompleteHeader {
            expected: ENVELOPE_HEADER_SIZE,
            actual: data.len(),
        });
    }

    let flags = data[0];
    let length = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    Ok((flags, length))
}

/// Extract the single message of a unary response body.
///
/// An empty body yields an empty message, which is how servers encode a
/// default-valued protobuf response in some implementations.
pub fn unwrap_message(body: Bytes) -> Result<Bytes, EnvelopeError> {
    if body.is_empty() {
        return Ok(body);
    }

    let (flags, length) = parse_envelope_header(&body)?;
    match flags {
        envelope_flags::MESSAGE => {}
        envelope_flags::COMPRESSED => return Err(EnvelopeError::UnexpectedCompression),
        other => return Err(EnvelopeError::InvalidFlags(other)),
    }

    let length = length as usize;
    let available = body.len() - ENVELOPE_HEADER_SIZE;
    if available < length {
        return Err(EnvelopeError::Truncated {
            announced: length,
            actual: available,
        });
    }
    if available > length {
        return Err(EnvelopeError::TrailingData(available - length));
    }

    Ok(body.slice(ENVELOPE_HEADER_SIZE..))
}
