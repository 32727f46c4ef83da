//! Frame encode/decode commands.

use super::{hex_decode, hex_encode};
use nimbus_codec::{
    decode_message, encode_message, OperationType, RequestFrame, ResourceType, FRAME_HEADER_LEN,
    MAX_MESSAGE_SIZE,
};
use serde::Serialize;
use uuid::Uuid;

/// A decoded header, plus envelope details when present.
#[derive(Debug, Serialize)]
pub struct DecodedFrame {
    /// Envelope length prefix, if the input was a whole message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Resource type name.
    pub resource_type: String,
    /// Resource type wire id.
    pub resource_id: u16,
    /// Operation type name.
    pub operation_type: String,
    /// Operation type wire id.
    pub operation_id: u16,
    /// Activity id.
    pub activity_id: String,
    /// Payload length in bytes.
    pub payload_len: usize,
}

/// Builds an envelope and returns it as hex.
pub fn encode(
    operation: &str,
    resource: &str,
    activity_id: Option<&str>,
    payload: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let operation: OperationType = operation.parse()?;
    let resource: ResourceType = resource.parse()?;
    let activity_id = match activity_id {
        Some(id) => Uuid::parse_str(id)?,
        None => Uuid::new_v4(),
    };

    let frame = RequestFrame::new(activity_id, operation, resource)?;
    let bytes = encode_message(&frame, payload.as_bytes(), MAX_MESSAGE_SIZE)?;
    Ok(hex_encode(&bytes))
}

/// Decodes a whole envelope, or a bare header if exactly
/// [`FRAME_HEADER_LEN`] bytes are given.
pub fn decode(hex: &str) -> Result<DecodedFrame, Box<dyn std::error::Error>> {
    let bytes = hex_decode(hex).ok_or("input is not valid hex")?;

    let (frame, length, payload_len) = if bytes.len() == FRAME_HEADER_LEN {
        (RequestFrame::decode(&mut bytes.as_slice())?, None, 0)
    } else {
        let message = decode_message(&bytes, MAX_MESSAGE_SIZE)?;
        (message.frame, Some(bytes.len()), message.payload.len())
    };

    Ok(DecodedFrame {
        length,
        resource_type: frame.resource_type().to_string(),
        resource_id: frame.resource_type().id(),
        operation_type: frame.operation_type().to_string(),
        operation_id: frame.operation_type().id(),
        activity_id: frame.activity_id().to_string(),
        payload_len,
    })
}

/// Runs the encode-frame command.
pub fn run_encode(
    operation: &str,
    resource: &str,
    activity_id: Option<&str>,
    payload: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", encode(operation, resource, activity_id, payload)?);
    Ok(())
}

/// Runs the decode-frame command.
pub fn run_decode(hex: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let decoded = decode(hex)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
        _ => {
            if let Some(length) = decoded.length {
                println!("Length:      {length}");
            }
            println!(
                "Resource:    {} ({:#06x})",
                decoded.resource_type, decoded.resource_id
            );
            println!(
                "Operation:   {} ({:#06x})",
                decoded.operation_type, decoded.operation_id
            );
            println!("Activity ID: {}", decoded.activity_id);
            println!("Payload:     {} bytes", decoded.payload_len);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVITY_ID: &str = "00112233-4455-6677-8899-aabbccddeeff";

    #[test]
    fn encode_known_message() {
        let hex = encode("read", "document", Some(ACTIVITY_ID), "{}").unwrap();
        assert_eq!(hex, "1a000000030003007766554433221100ffeeddccbbaa99887b7d");
    }

    #[test]
    fn decode_whole_message() {
        let decoded = decode("1a000000030003007766554433221100ffeeddccbbaa99887b7d").unwrap();
        assert_eq!(decoded.length, Some(26));
        assert_eq!(decoded.resource_type, "Document");
        assert_eq!(decoded.operation_id, 3);
        assert_eq!(decoded.activity_id, ACTIVITY_ID);
        assert_eq!(decoded.payload_len, 2);
    }

    #[test]
    fn decode_bare_header() {
        let decoded = decode("03000f007766554433221100ffeeddccbbaa9988").unwrap();
        assert_eq!(decoded.length, None);
        assert_eq!(decoded.operation_type, "Query");
        assert_eq!(decoded.activity_id, ACTIVITY_ID);
    }

    #[test]
    fn encode_rejects_gateway_only_operation() {
        let err = encode("QueryPlan", "Document", None, "").unwrap_err();
        assert!(err.to_string().contains("QueryPlan"));
    }

    #[test]
    fn encode_rejects_unknown_names() {
        assert!(encode("Teleport", "Document", None, "").is_err());
        assert!(encode("Read", "Document", Some("not-a-uuid"), "").is_err());
    }

    #[test]
    fn decoded_names_encode_again() {
        let hex = encode("create", "document-collection", Some(ACTIVITY_ID), "x").unwrap();
        let decoded = decode(&hex).unwrap();
        assert_eq!(decoded.resource_type, "Collection");

        let again = encode(
            &decoded.operation_type,
            &decoded.resource_type,
            Some(&decoded.activity_id),
            "x",
        )
        .unwrap();
        assert_eq!(again, hex);
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(decode("zz").is_err());
        assert!(decode("1a00000003000300").is_err());
    }
}
