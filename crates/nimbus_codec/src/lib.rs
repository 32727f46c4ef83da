//! # Nimbus Codec
//!
//! Binary request framing for the Nimbus driver.
//!
//! Every request sent over a direct connection starts with a fixed
//! 20-byte header:
//! - resource type (u16, little-endian)
//! - operation type (u16, little-endian)
//! - activity id (128-bit correlation id)
//!
//! The header is wrapped in a length-prefixed envelope together with the
//! request body. The codec performs no I/O and keeps no state between calls.
//!
//! ## Usage
//!
//! ```
//! use nimbus_codec::{OperationType, RequestFrame, ResourceType};
//! use uuid::Uuid;
//!
//! let frame = RequestFrame::new(Uuid::new_v4(), OperationType::Read, ResourceType::Document).unwrap();
//! let mut bytes = frame.to_bytes();
//! let decoded = RequestFrame::decode(&mut bytes).unwrap();
//! assert_eq!(frame, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod message;
mod types;

pub use error::{CodecError, CodecResult};
pub use frame::{RequestFrame, FRAME_HEADER_LEN};
pub use message::{
    decode_message, encode_message, try_decode_message, Message, LENGTH_PREFIX_LEN,
    MAX_MESSAGE_SIZE, MIN_MESSAGE_LEN,
};
pub use types::{OperationType, ResourceType, WireOperationType, WireResourceType};
