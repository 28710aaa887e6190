//! Value-only deserialization strategies for Kafka payloads
//!
//! A [`ValueDeserializer`] turns the raw value bytes of a message into a typed
//! value. The message key is never consulted.

use serde::Serialize;

/// Serialization error type
#[derive(Debug)]
pub enum SerializationError {
    SerializationFailed(String),
    DeserializationFailed(String),
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::SerializationFailed(msg) => {
                write!(f, "Serialization failed: {}", msg)
            }
            SerializationError::DeserializationFailed(msg) => {
                write!(f, "Deserialization failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for SerializationError {}

/// Strategy for decoding a message value
pub trait ValueDeserializer<T>: Send + Sync {
    /// Decode a payload. `None` (a null payload) decodes to `Ok(None)`.
    fn decode(&self, payload: Option<&[u8]>) -> Result<Option<T>, SerializationError>;

    /// Whether `next` marks the logical end of the stream
    fn is_end_of_stream(&self, next: &T) -> bool;

    /// Name of the produced type, for logging
    fn produced_type(&self) -> &'static str;
}

/// Decodes payloads as UTF-8 text
///
/// Invalid byte sequences are replaced with U+FFFD rather than failing the
/// record. The stream is unbounded, so no element ever ends it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8StringDeserializer;

impl ValueDeserializer<String> for Utf8StringDeserializer {
    fn decode(&self, payload: Option<&[u8]>) -> Result<Option<String>, SerializationError> {
        Ok(payload.map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
    }

    fn is_end_of_stream(&self, _next: &String) -> bool {
        false
    }

    fn produced_type(&self) -> &'static str {
        "String"
    }
}

/// Serialize a value to JSON bytes
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec(value).map_err(|e| {
        SerializationError::SerializationFailed(format!("Failed to serialize to JSON bytes: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_decode() {
        let de = Utf8StringDeserializer;
        let decoded = de.decode(Some("héllo".as_bytes())).unwrap();
        assert_eq!(decoded.as_deref(), Some("héllo"));
    }

    #[test]
    fn test_null_payload_is_absent_not_error() {
        let de = Utf8StringDeserializer;
        assert!(de.decode(None).unwrap().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let de = Utf8StringDeserializer;
        let decoded = de.decode(Some(&[0x61, 0xff, 0x62])).unwrap().unwrap();
        assert_eq!(decoded, "a\u{FFFD}b");
    }

    #[test]
    fn test_never_end_of_stream() {
        let de = Utf8StringDeserializer;
        assert!(!de.is_end_of_stream(&String::new()));
        assert!(!de.is_end_of_stream(&"{}".to_string()));
        assert_eq!(de.produced_type(), "String");
    }

    #[test]
    fn test_to_json() {
        let bytes = to_json(&serde_json::json!({"id": "1"})).unwrap();
        assert_eq!(bytes, br#"{"id":"1"}"#);
    }
}
