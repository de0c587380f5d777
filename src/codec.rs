//! Frame codec for the SafeUM wire protocol
//!
//! Outgoing messages are UTF-8 JSON text, one message per WebSocket frame.
//! Incoming frames are usually gzip-compressed JSON but the servers are not
//! consistent about it, so decode always attempts decompression first and
//! falls back to treating the frame as plain text. The fallback is a defined
//! part of the protocol, not an error path.

use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::debug;

use crate::types::{AuthError, Result};

/// Serialize one outgoing message to its on-the-wire text form.
pub fn encode_frame(message: &Value) -> String {
    message.to_string()
}

/// Decode one incoming frame to JSON.
///
/// Attempts gzip decompression; on failure the raw bytes are taken as
/// already-plain UTF-8. Only malformed JSON after decode is an error.
pub fn decode_frame(raw: &[u8]) -> Result<Value> {
    let text = decompress_or_passthrough(raw)?;
    serde_json::from_str(&text)
        .map_err(|e| AuthError::Protocol(format!("Malformed JSON frame: {e}")))
}

fn decompress_or_passthrough(raw: &[u8]) -> Result<String> {
    let mut decoder = GzDecoder::new(raw);
    let mut decompressed = String::new();
    match decoder.read_to_string(&mut decompressed) {
        Ok(_) => Ok(decompressed),
        Err(e) => {
            debug!("Frame not gzip-compressed, using raw bytes ({e})");
            String::from_utf8(raw.to_vec())
                .map_err(|e| AuthError::Protocol(format!("Frame is neither gzip nor UTF-8: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::json;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_compressed_round_trip() {
        let message = json!({"status": "Success", "key": {"x": "nonce123"}});
        let wire = gzip(encode_frame(&message).as_bytes());

        let decoded = decode_frame(&wire).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_plain_text_fallback() {
        let message = json!({"status": "Success"});
        let wire = encode_frame(&message).into_bytes();

        let decoded = decode_frame(&wire).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_malformed_json_is_protocol_error() {
        let err = decode_frame(b"{not json").unwrap_err();
        assert!(matches!(err, AuthError::Protocol(_)));
    }

    #[test]
    fn test_decode_compressed_malformed_json_is_protocol_error() {
        let wire = gzip(b"still {not json");
        let err = decode_frame(&wire).unwrap_err();
        assert!(matches!(err, AuthError::Protocol(_)));
    }

    #[test]
    fn test_encode_is_compact_single_line() {
        let message = json!({"action": "Balancer", "subaction": "Query"});
        let text = encode_frame(&message);
        assert!(!text.contains('\n'));
        assert!(text.contains("\"action\""));
    }
}
