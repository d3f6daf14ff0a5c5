//! Response envelope codec
//!
//! Every response payload is a JSON document followed by a single zero byte.
//! The agent encodes structured [`Value`]s; the controller decodes into
//! `serde_json::Value` or any deserializable type.
//!
//! ```
//! use itg_remote_protocol::codec::{decode_envelope, encode_envelope};
//! use itg_remote_protocol::value::{Table, Value};
//!
//! let envelope = Value::from(Table::new().with("ok", true));
//! let bytes = encode_envelope(&envelope).unwrap();
//! assert_eq!(&bytes[..], b"{\"ok\":true}\0");
//!
//! let decoded = decode_envelope(&bytes).unwrap();
//! assert_eq!(decoded["ok"], true);
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtocolError, Result};
use crate::value::Value;

/// Terminator appended to every response body
pub const ENVELOPE_TERMINATOR: u8 = 0;

/// Renders any serializable value as compact JSON text
pub fn encode_text<T: Serialize + ?Sized>(message: &T) -> Result<String> {
    serde_json::to_string(message)
        .map_err(|e| ProtocolError::CodecError(format!("JSON encode failed: {}", e)))
}

/// Encodes a response envelope as JSON text followed by a zero byte
pub fn encode_envelope(envelope: &Value) -> Result<Bytes> {
    encode_serialized(envelope)
}

/// Same as [`encode_envelope`] for any serializable type
pub fn encode_serialized<T: Serialize + ?Sized>(message: &T) -> Result<Bytes> {
    let text = encode_text(message)?;
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(ENVELOPE_TERMINATOR);
    Ok(buf.freeze())
}

/// Returns the JSON body of a response payload
///
/// The body ends at the first zero byte; a payload without one is taken
/// whole.
pub fn envelope_body(payload: &[u8]) -> &[u8] {
    match payload.iter().position(|&b| b == ENVELOPE_TERMINATOR) {
        Some(end) => &payload[..end],
        None => payload,
    }
}

/// Decodes a response payload into a JSON document
pub fn decode_envelope(payload: &[u8]) -> Result<serde_json::Value> {
    decode_envelope_as(payload)
}

/// Decodes a response payload into `T`
pub fn decode_envelope_as<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(envelope_body(payload))
        .map_err(|e| ProtocolError::CodecError(format!("JSON decode failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Table;
    use serde::Deserialize;

    #[test]
    fn test_encode_appends_single_terminator() {
        let bytes = encode_envelope(&Value::from(Table::new().with("ok", false))).unwrap();
        assert_eq!(bytes.last(), Some(&0));
        assert_eq!(bytes.iter().filter(|&&b| b == 0).count(), 1);
    }

    #[test]
    fn test_decode_without_terminator() {
        let decoded = decode_envelope(b"{\"ok\":true,\"count\":2}").unwrap();
        assert_eq!(decoded["count"], 2);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let decoded = decode_envelope(b"{\"ok\":true}\0garbage").unwrap();
        assert_eq!(decoded["ok"], true);
    }

    #[test]
    fn test_decode_as_typed() {
        #[derive(Deserialize)]
        struct Groups {
            ok: bool,
            groups: Vec<String>,
        }

        let envelope = Table::new()
            .with("ok", true)
            .with("groups", vec!["Pack A", "Pack B"]);
        let bytes = encode_envelope(&Value::from(envelope)).unwrap();

        let groups: Groups = decode_envelope_as(&bytes).unwrap();
        assert!(groups.ok);
        assert_eq!(groups.groups, vec!["Pack A", "Pack B"]);
    }

    #[test]
    fn test_decode_invalid_json() {
        let err = decode_envelope(b"{not json}\0").unwrap_err();
        assert!(matches!(err, ProtocolError::CodecError(_)));
    }
}
