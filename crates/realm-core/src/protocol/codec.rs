//! Frame envelope and protocol errors.
//!
//! Wire format:
//! ```text
//! [length:2][opcode:1..7][payload:N]
//! ```
//! `length` is a little-endian `u16` that counts the whole frame, including the
//! two length bytes themselves.  A frame must carry at least one opcode byte,
//! so the smallest valid frame is 3 bytes and the largest is 65 535.

use thiserror::Error;

/// Size of the little-endian length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Smallest legal frame: the length prefix plus one primary opcode byte.
pub const MIN_FRAME_LEN: usize = LENGTH_PREFIX_SIZE + 1;

/// Largest legal frame, bounded by the `u16` length prefix.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Errors that can occur while framing, reading, or writing packets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A read needed more bytes than the frame holds.
    #[error("truncated frame: need {needed} bytes, got {available}")]
    TruncatedFrame { needed: usize, available: usize },

    /// A decoded field holds a value outside its legal range.
    #[error("field `{field}` out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: i64 },

    /// The payload could not be parsed (invalid UTF-16, inconsistent counts, ...).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The length prefix is smaller than [`MIN_FRAME_LEN`] or larger than the
    /// configured limit.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(usize),

    /// An outbound frame would not fit in the `u16` length prefix.
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN}-byte limit")]
    OversizedFrame(usize),

    /// An outbound packet has no wire identifier in the registry.
    #[error("no wire id registered for outbound packet {0}")]
    UnregisteredPacket(String),
}

/// Wraps an already-encoded frame body (opcode + payload) with its length prefix.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidFrameLength`] for an empty body and
/// [`ProtocolError::OversizedFrame`] when the result would exceed
/// [`MAX_FRAME_LEN`].
///
/// # Examples
///
/// ```rust
/// use realm_core::protocol::{decode_frame, encode_frame};
///
/// let frame = encode_frame(&[0x1F]).unwrap();
/// assert_eq!(frame, vec![0x03, 0x00, 0x1F]);
/// let (body, consumed) = decode_frame(&frame).unwrap();
/// assert_eq!(body, &[0x1F]);
/// assert_eq!(consumed, 3);
/// ```
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if body.is_empty() {
        return Err(ProtocolError::InvalidFrameLength(LENGTH_PREFIX_SIZE));
    }
    let total = body.len() + LENGTH_PREFIX_SIZE;
    if total > MAX_FRAME_LEN {
        return Err(ProtocolError::OversizedFrame(total));
    }

    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&(total as u16).to_le_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Splits one frame off the front of `bytes`.
///
/// Returns the frame body (opcode + payload) and the total number of bytes
/// consumed, so the caller can advance past the frame.
///
/// # Errors
///
/// Returns [`ProtocolError::TruncatedFrame`] if `bytes` does not yet hold the
/// complete frame and [`ProtocolError::InvalidFrameLength`] if the length
/// prefix is below [`MIN_FRAME_LEN`].
pub fn decode_frame(bytes: &[u8]) -> Result<(&[u8], usize), ProtocolError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::TruncatedFrame {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        });
    }

    let total = frame_len([bytes[0], bytes[1]], MAX_FRAME_LEN)?;
    if bytes.len() < total {
        return Err(ProtocolError::TruncatedFrame {
            needed: total,
            available: bytes.len(),
        });
    }

    Ok((&bytes[LENGTH_PREFIX_SIZE..total], total))
}

/// Validates a raw length prefix against the protocol minimum and `max_len`.
///
/// Returns the total frame length (prefix included).  Stream readers call this
/// after reading the first two bytes of a frame to learn how many more to read.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidFrameLength`] if the prefix is out of range.
pub fn frame_len(prefix: [u8; 2], max_len: usize) -> Result<usize, ProtocolError> {
    let total = u16::from_le_bytes(prefix) as usize;
    if total < MIN_FRAME_LEN || total > max_len {
        return Err(ProtocolError::InvalidFrameLength(total));
    }
    Ok(total)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_prefixes_total_length_little_endian() {
        // Arrange
        let body = [0xD0, 0x9D, 0x00, 0x2A, 0x00, 0x00, 0x00];

        // Act
        let frame = encode_frame(&body).expect("encode");

        // Assert
        assert_eq!(&frame[..2], &[9, 0], "length must include the prefix itself");
        assert_eq!(&frame[2..], &body);
    }

    #[test]
    fn test_encode_frame_rejects_empty_body() {
        assert_eq!(
            encode_frame(&[]),
            Err(ProtocolError::InvalidFrameLength(LENGTH_PREFIX_SIZE))
        );
    }

    #[test]
    fn test_encode_frame_accepts_exact_maximum() {
        let body = vec![0u8; MAX_FRAME_LEN - LENGTH_PREFIX_SIZE];
        let frame = encode_frame(&body).expect("max-size frame must encode");
        assert_eq!(frame.len(), MAX_FRAME_LEN);
        assert_eq!(&frame[..2], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_frame_rejects_one_byte_over_maximum() {
        let body = vec![0u8; MAX_FRAME_LEN - LENGTH_PREFIX_SIZE + 1];
        assert_eq!(
            encode_frame(&body),
            Err(ProtocolError::OversizedFrame(MAX_FRAME_LEN + 1))
        );
    }

    #[test]
    fn test_decode_frame_returns_body_and_consumed_length() {
        // Arrange – two frames back to back
        let mut bytes = encode_frame(&[0x01, 0x2A, 0, 0, 0]).unwrap();
        bytes.extend(encode_frame(&[0x00]).unwrap());

        // Act
        let (first, used) = decode_frame(&bytes).expect("first frame");
        let (second, used2) = decode_frame(&bytes[used..]).expect("second frame");

        // Assert
        assert_eq!(first, &[0x01, 0x2A, 0, 0, 0]);
        assert_eq!(used, 7);
        assert_eq!(second, &[0x00]);
        assert_eq!(used2, 3);
    }

    #[test]
    fn test_decode_frame_empty_input_is_truncated() {
        assert_eq!(
            decode_frame(&[]),
            Err(ProtocolError::TruncatedFrame { needed: 2, available: 0 })
        );
    }

    #[test]
    fn test_decode_frame_partial_body_is_truncated() {
        // Prefix announces 7 bytes, only 4 present
        let bytes = [0x07, 0x00, 0x01, 0x2A];
        assert_eq!(
            decode_frame(&bytes),
            Err(ProtocolError::TruncatedFrame { needed: 7, available: 4 })
        );
    }

    #[test]
    fn test_decode_frame_length_below_minimum_is_invalid() {
        assert_eq!(
            decode_frame(&[0x02, 0x00]),
            Err(ProtocolError::InvalidFrameLength(2))
        );
    }

    #[test]
    fn test_frame_len_enforces_configured_maximum() {
        assert_eq!(frame_len([0x00, 0x01], 1024), Ok(256));
        assert_eq!(
            frame_len([0x01, 0x04], 1024),
            Err(ProtocolError::InvalidFrameLength(1025))
        );
    }
}
