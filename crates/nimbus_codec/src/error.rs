//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while framing or unframing a message.
///
/// None of these are transient: an unsupported type is a programming
/// error on the client side, and an unknown wire code means client and
/// server disagree about the protocol version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The operation type has no wire representation.
    #[error("unrecognized operation type: {operation}")]
    UnsupportedOperation {
        /// Name of the operation type.
        operation: &'static str,
    },

    /// The resource type has no wire representation.
    #[error("unrecognized resource type: {resource}")]
    UnsupportedResource {
        /// Name of the resource type.
        resource: &'static str,
    },

    /// A header field carried a code this client does not know.
    #[error("unknown {field} code on the wire: {code:#06x}")]
    ProtocolDecode {
        /// Header field that failed to decode.
        field: &'static str,
        /// The raw code that was read.
        code: u16,
    },

    /// Not enough bytes to decode.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// Message exceeds the configured maximum size.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge {
        /// Size of the offending message.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// The length prefix is smaller than the fixed header.
    #[error("invalid message length: {length}")]
    InvalidLength {
        /// The length value read from the prefix.
        length: u32,
    },
}

impl CodecError {
    /// Returns true if this error was caused by the caller presenting a
    /// value the codec cannot represent.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            CodecError::UnsupportedOperation { .. } | CodecError::UnsupportedResource { .. }
        )
    }

    /// Returns true if this error indicates a version skew between the
    /// client and the server.
    pub fn is_version_skew(&self) -> bool {
        matches!(self, CodecError::ProtocolDecode { .. })
    }
}
