//! Fixed-size request header.
//!
//! Layout (all integers little-endian):
//!
//! | Offset | Size | Field          |
//! |--------|------|----------------|
//! | 0      | 2    | resource type  |
//! | 2      | 2    | operation type |
//! | 4      | 16   | activity id    |
//!
//! The activity id is written as its most significant 64 bits followed by
//! its least significant 64 bits, each little-endian.

use crate::error::{CodecError, CodecResult};
use crate::types::{OperationType, ResourceType, WireOperationType, WireResourceType};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// Length of an encoded [`RequestFrame`] in bytes.
pub const FRAME_HEADER_LEN: usize = 2 + 2 + 16;

/// The header that precedes every request on a connection.
///
/// A frame is built once per attempt and never mutated afterwards; each
/// retry gets a fresh activity id and therefore a fresh frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestFrame {
    activity_id: Uuid,
    operation_type: WireOperationType,
    resource_type: WireResourceType,
}

impl RequestFrame {
    /// Builds a frame from logical operation and resource types.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedOperation`] or
    /// [`CodecError::UnsupportedResource`] if either type has no wire id.
    pub fn new(
        activity_id: Uuid,
        operation_type: OperationType,
        resource_type: ResourceType,
    ) -> CodecResult<Self> {
        Ok(Self::from_wire(
            activity_id,
            operation_type.to_wire()?,
            resource_type.to_wire()?,
        ))
    }

    /// Builds a frame from wire types directly.
    pub const fn from_wire(
        activity_id: Uuid,
        operation_type: WireOperationType,
        resource_type: WireResourceType,
    ) -> Self {
        Self {
            activity_id,
            operation_type,
            resource_type,
        }
    }

    /// Returns the correlation id of this attempt.
    pub fn activity_id(&self) -> Uuid {
        self.activity_id
    }

    /// Returns the operation type.
    pub fn operation_type(&self) -> WireOperationType {
        self.operation_type
    }

    /// Returns the resource type.
    pub fn resource_type(&self) -> WireResourceType {
        self.resource_type
    }

    /// Writes the header into `out`, advancing its cursor by
    /// [`FRAME_HEADER_LEN`] bytes.
    pub fn encode<B: BufMut>(&self, out: &mut B) {
        out.put_u16_le(self.resource_type.id());
        out.put_u16_le(self.operation_type.id());
        let id = self.activity_id.as_u128();
        out.put_u64_le((id >> 64) as u64);
        out.put_u64_le(id as u64);
    }

    /// Encodes the header into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Reads a header from `input`, advancing its cursor by
    /// [`FRAME_HEADER_LEN`] bytes on success.
    ///
    /// # Errors
    ///
    /// - `InsufficientData` if fewer than [`FRAME_HEADER_LEN`] bytes remain
    ///   (nothing is consumed)
    /// - `ProtocolDecode` if either type code is unknown
    pub fn decode<B: Buf>(input: &mut B) -> CodecResult<Self> {
        if input.remaining() < FRAME_HEADER_LEN {
            return Err(CodecError::InsufficientData {
                needed: FRAME_HEADER_LEN,
                have: input.remaining(),
            });
        }

        let resource_type = WireResourceType::from_id(input.get_u16_le())?;
        let operation_type = WireOperationType::from_id(input.get_u16_le())?;
        let most = u128::from(input.get_u64_le());
        let least = u128::from(input.get_u64_le());
        let activity_id = Uuid::from_u128((most << 64) | least);

        Ok(Self::from_wire(activity_id, operation_type, resource_type))
    }
}
