//! Wire test vectors for the request envelope.
//!
//! Other driver implementations check their encoders against the same
//! bytes.

use nimbus_codec::{decode_message, encode_message, CodecError, RequestFrame, MAX_MESSAGE_SIZE};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message that must encode to exactly `expected_hex`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Operation type name.
    pub operation: String,
    /// Resource type name.
    pub resource: String,
    /// Activity id.
    pub activity_id: Uuid,
    /// Payload (hex-encoded).
    pub payload_hex: String,
    /// Expected message bytes (hex-encoded).
    pub expected_hex: String,
}

/// Bytes that must fail to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeErrorVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input bytes (hex-encoded).
    pub input_hex: String,
    /// Expected error kind.
    pub expected_error: String,
}

/// Envelope encoding vectors.
pub fn encode_vectors() -> Vec<EncodeVector> {
    vec![
        EncodeVector {
            id: "read_document".into(),
            description: "Read of a document with a JSON body".into(),
            operation: "Read".into(),
            resource: "Document".into(),
            activity_id: Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff),
            payload_hex: "7b7d".into(),
            expected_hex: "1a000000030003007766554433221100ffeeddccbbaa99887b7d".into(),
        },
        EncodeVector {
            id: "query_nil_id".into(),
            description: "Query with the nil activity id and no body".into(),
            operation: "Query".into(),
            resource: "Document".into(),
            activity_id: Uuid::nil(),
            payload_hex: String::new(),
            expected_hex: "1800000003000f0000000000000000000000000000000000".into(),
        },
        EncodeVector {
            id: "create_collection_max_id".into(),
            description: "Create of a collection with an all-ones activity id".into(),
            operation: "Create".into(),
            resource: "Collection".into(),
            activity_id: Uuid::max(),
            payload_hex: "78".into(),
            expected_hex: "1900000002000100ffffffffffffffffffffffffffffffff78".into(),
        },
        EncodeVector {
            id: "execute_stored_procedure".into(),
            description: "Stored procedure execution, halves written separately".into(),
            operation: "ExecuteJavaScript".into(),
            resource: "StoredProcedure".into(),
            activity_id: Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef),
            payload_hex: String::new(),
            expected_hex: "1800000007000800efcdab8967452301efcdab8967452301".into(),
        },
    ]
}

/// Malformed envelope vectors.
pub fn decode_error_vectors() -> Vec<DecodeErrorVector> {
    let zeros = "00".repeat(16);
    vec![
        DecodeErrorVector {
            id: "truncated".into(),
            description: "Length prefix promises more than is present".into(),
            input_hex: "1a00000003000300".into(),
            expected_error: "InsufficientData".into(),
        },
        DecodeErrorVector {
            id: "length_below_header".into(),
            description: "Length prefix smaller than prefix plus header".into(),
            input_hex: format!("10000000{}", "00".repeat(20)),
            expected_error: "InvalidLength".into(),
        },
        DecodeErrorVector {
            id: "unknown_resource".into(),
            description: "Resource id 0x0017 is not assigned".into(),
            input_hex: format!("1800000017000300{zeros}"),
            expected_error: "ProtocolDecode".into(),
        },
        DecodeErrorVector {
            id: "unknown_operation".into(),
            description: "Operation id 0x0007 is not assigned".into(),
            input_hex: format!("1800000003000700{zeros}"),
            expected_error: "ProtocolDecode".into(),
        },
    ]
}

/// Returns the kind name of a codec error, as used in vectors.
pub fn error_kind(err: &CodecError) -> &'static str {
    match err {
        CodecError::UnsupportedOperation { .. } => "UnsupportedOperation",
        CodecError::UnsupportedResource { .. } => "UnsupportedResource",
        CodecError::ProtocolDecode { .. } => "ProtocolDecode",
        CodecError::InsufficientData { .. } => "InsufficientData",
        CodecError::MessageTooLarge { .. } => "MessageTooLarge",
        CodecError::InvalidLength { .. } => "InvalidLength",
    }
}

/// Encodes `vector`, returning the hex of the produced bytes.
///
/// Returns `None` if the vector names an unknown type or holds bad hex.
pub fn encode_vector(vector: &EncodeVector) -> Option<String> {
    let frame = RequestFrame::new(
        vector.activity_id,
        vector.operation.parse().ok()?,
        vector.resource.parse().ok()?,
    )
    .ok()?;
    let payload = hex_decode(&vector.payload_hex)?;
    let bytes = encode_message(&frame, &payload, MAX_MESSAGE_SIZE).ok()?;
    Some(hex_encode(&bytes))
}

/// Decodes `vector` and returns the kind of the resulting error, or `None`
/// if it decoded.
pub fn decode_error_kind(vector: &DecodeErrorVector) -> Option<&'static str> {
    let input = hex_decode(&vector.input_hex)?;
    decode_message(&input, MAX_MESSAGE_SIZE)
        .err()
        .map(|err| error_kind(&err))
}

/// All vectors as pretty JSON.
pub fn all_vectors_json() -> serde_json::Result<String> {
    #[derive(Serialize)]
    struct AllVectors {
        encode: Vec<EncodeVector>,
        decode_errors: Vec<DecodeErrorVector>,
    }

    serde_json::to_string_pretty(&AllVectors {
        encode: encode_vectors(),
        decode_errors: decode_error_vectors(),
    })
}

/// Encodes bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes hex, ignoring whitespace. Returns `None` on malformed input.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
