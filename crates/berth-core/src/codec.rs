//! Serialization of entity records to stored bytes.
//!
//! Records are stored as JSON. The encoding is stable across versions as
//! long as field names are preserved; unknown fields are tolerated on
//! decode so newer writers do not break older readers.
//!
//! Decode failures (unparseable bytes, missing required fields) map to
//! [`Error::InvalidRecord`], the taxonomy kind callers use to distinguish
//! corrupt storage from absent storage.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Encodes a record into its stored byte representation.
///
/// # Errors
///
/// Returns [`Error::InvalidRecord`] if the value cannot be serialized; this
/// does not happen for the record types berth stores.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    let raw = serde_json::to_vec(value).map_err(|e| Error::InvalidRecord {
        message: format!("failed to encode record: {e}"),
    })?;
    Ok(Bytes::from(raw))
}

/// Decodes a record from its stored byte representation.
///
/// Unknown fields in the stored bytes are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidRecord`] if the bytes do not parse or required
/// fields are absent.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::InvalidRecord {
        message: format!("failed to decode record: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Record {
        guid: String,
        count: u32,
    }

    #[test]
    fn roundtrip_preserves_value() {
        let record = Record {
            guid: "abc".into(),
            count: 7,
        };

        let bytes = encode(&record).expect("encode should succeed");
        let decoded: Record = decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded, record);
    }

    #[test]
    fn garbage_is_invalid_record() {
        let err = decode::<Record>(b"not json").expect_err("should fail");
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }

    #[test]
    fn missing_required_field_is_invalid_record() {
        let err = decode::<Record>(br#"{"guid":"abc"}"#).expect_err("should fail");
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let decoded: Record =
            decode(br#"{"guid":"abc","count":1,"added_later":true}"#).expect("should decode");
        assert_eq!(decoded.guid, "abc");
        assert_eq!(decoded.count, 1);
    }
}
