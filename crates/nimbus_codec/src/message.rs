//! Length-prefixed message envelope.
//!
//! Message format: `[length:4][header:20][payload:N]`
//!
//! - **length**: total message size including the prefix (little-endian u32)
//! - **header**: a [`RequestFrame`]
//! - **payload**: opaque request body

use crate::error::{CodecError, CodecResult};
use crate::frame::{RequestFrame, FRAME_HEADER_LEN};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Smallest valid message: prefix plus header, empty payload.
pub const MIN_MESSAGE_LEN: usize = LENGTH_PREFIX_LEN + FRAME_HEADER_LEN;

/// Default upper bound on a whole message (2 MiB).
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// A decoded message: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Request header.
    pub frame: RequestFrame,
    /// Request body.
    pub payload: Bytes,
}

/// Frames a header and payload into a single message.
///
/// # Errors
///
/// Returns `MessageTooLarge` if the message would exceed `max_size`.
///
/// # Examples
///
/// ```
/// use nimbus_codec::{decode_message, encode_message, OperationType, RequestFrame, ResourceType, MAX_MESSAGE_SIZE};
/// use uuid::Uuid;
///
/// let frame = RequestFrame::new(Uuid::new_v4(), OperationType::Read, ResourceType::Document).unwrap();
/// let bytes = encode_message(&frame, b"{}", MAX_MESSAGE_SIZE).unwrap();
/// let message = decode_message(&bytes, MAX_MESSAGE_SIZE).unwrap();
/// assert_eq!(message.frame, frame);
/// assert_eq!(&message.payload[..], b"{}");
/// ```
pub fn encode_message(frame: &RequestFrame, payload: &[u8], max_size: usize) -> CodecResult<Bytes> {
    let total = MIN_MESSAGE_LEN + payload.len();
    if total > max_size || u32::try_from(total).is_err() {
        return Err(CodecError::MessageTooLarge {
            size: total,
            max: max_size,
        });
    }

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u32_le(total as u32);
    frame.encode(&mut buf);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decodes exactly one complete message.
///
/// # Errors
///
/// - `InsufficientData` if `data` holds less than the full message
/// - `InvalidLength` / `MessageTooLarge` for a malformed prefix
/// - any error from [`RequestFrame::decode`]
pub fn decode_message(data: &[u8], max_size: usize) -> CodecResult<Message> {
    let length = read_length(data, max_size)?.ok_or(CodecError::InsufficientData {
        needed: MIN_MESSAGE_LEN,
        have: data.len(),
    })?;

    if data.len() < length {
        return Err(CodecError::InsufficientData {
            needed: length,
            have: data.len(),
        });
    }

    let mut body = &data[LENGTH_PREFIX_LEN..length];
    let frame = RequestFrame::decode(&mut body)?;
    Ok(Message {
        frame,
        payload: Bytes::copy_from_slice(body),
    })
}

/// Decodes one message from a buffer that may hold partial data.
///
/// Returns `Ok(None)` until a whole message is buffered. On success exactly
/// one message is split off the front of `buf`; trailing bytes stay.
///
/// # Errors
///
/// Same as [`decode_message`], except that partial input is not an error.
pub fn try_decode_message(buf: &mut BytesMut, max_size: usize) -> CodecResult<Option<Message>> {
    let Some(length) = read_length(buf, max_size)? else {
        return Ok(None);
    };
    if buf.len() < length {
        return Ok(None);
    }

    let mut message = buf.split_to(length).freeze();
    message.advance(LENGTH_PREFIX_LEN);
    let frame = RequestFrame::decode(&mut message)?;
    Ok(Some(Message {
        frame,
        payload: message,
    }))
}

/// Reads and validates the length prefix, if enough bytes are present.
fn read_length(data: &[u8], max_size: usize) -> CodecResult<Option<usize>> {
    if data.len() < LENGTH_PREFIX_LEN {
        return Ok(None);
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if (length as usize) < MIN_MESSAGE_LEN {
        return Err(CodecError::InvalidLength { length });
    }
    if length as usize > max_size {
        return Err(CodecError::MessageTooLarge {
            size: length as usize,
            max: max_size,
        });
    }
    Ok(Some(length as usize))
}
