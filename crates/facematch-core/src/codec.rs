//! Decoding of embeddings as persisted by the store.
//!
//! Two encodings are accepted:
//! - text: a JSON array of numbers, e.g. `[0.12, -0.5, ...]`. A JSON string
//!   wrapping such an array (double-encoded column) is unwrapped once.
//! - bytes: packed little-endian `f32`.

use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An embedding as it arrives from the store, before decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawEmbedding {
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid embedding JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("embedding byte length {0} is not a multiple of 4")]
    ByteLength(usize),
    #[error("embedding is empty")]
    Empty,
    #[error("embedding component {index} is not finite")]
    NonFinite { index: usize },
}

/// Decode a raw store value into an embedding.
pub fn decode(raw: &RawEmbedding) -> Result<Embedding, DecodeError> {
    let values = match raw {
        RawEmbedding::Text(text) => decode_text(text)?,
        RawEmbedding::Bytes(bytes) => decode_bytes(bytes)?,
    };

    if values.is_empty() {
        return Err(DecodeError::Empty);
    }
    // Large JSON numbers saturate to infinity when narrowed to f32.
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(DecodeError::NonFinite { index });
    }
    Ok(Embedding::new(values))
}

fn decode_text(text: &str) -> Result<Vec<f32>, DecodeError> {
    let text = text.trim();
    match serde_json::from_str::<Vec<f32>>(text) {
        Ok(values) => Ok(values),
        Err(err) => match serde_json::from_str::<String>(text) {
            Ok(inner) => Ok(serde_json::from_str::<Vec<f32>>(inner.trim())?),
            Err(_) => Err(err.into()),
        },
    }
}

fn decode_bytes(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::ByteLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Encode an embedding as a JSON array, the text form [`decode`] reads.
///
/// JSON has no representation for NaN or infinity, so those are refused.
pub fn encode_text(embedding: &Embedding) -> Result<String, DecodeError> {
    if let Some(index) = embedding.first_non_finite() {
        return Err(DecodeError::NonFinite { index });
    }
    Ok(serde_json::to_string(&embedding.values)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_text() {
        let e = decode(&RawEmbedding::Text(" [0.5, -1, 2.25] \n".into())).unwrap();
        assert_eq!(e.values, vec![0.5, -1.0, 2.25]);
    }

    #[test]
    fn test_decode_double_encoded_text() {
        let e = decode(&RawEmbedding::Text("\"[0.5, 1.0]\"".into())).unwrap();
        assert_eq!(e.values, vec![0.5, 1.0]);
    }

    #[test]
    fn test_decode_malformed_text() {
        for text in ["", "[0.5, ", "{\"a\": 1}", "[\"x\"]", "\"not an array\""] {
            let err = decode(&RawEmbedding::Text(text.into())).unwrap_err();
            assert!(matches!(err, DecodeError::Json(_)), "{text:?} gave {err}");
        }
    }

    #[test]
    fn test_decode_empty_array() {
        assert!(matches!(
            decode(&RawEmbedding::Text("[]".into())),
            Err(DecodeError::Empty)
        ));
    }

    #[test]
    fn test_decode_overflowing_number() {
        assert!(matches!(
            decode(&RawEmbedding::Text("[0.0, 1e300]".into())),
            Err(DecodeError::NonFinite { index: 1 })
        ));
    }

    #[test]
    fn test_decode_bytes() {
        let mut bytes = Vec::new();
        for v in [1.5f32, -0.25, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let e = decode(&RawEmbedding::Bytes(bytes)).unwrap();
        assert_eq!(e.values, vec![1.5, -0.25, 0.0]);
    }

    #[test]
    fn test_decode_bytes_bad_length() {
        assert!(matches!(
            decode(&RawEmbedding::Bytes(vec![0u8; 7])),
            Err(DecodeError::ByteLength(7))
        ));
    }

    #[test]
    fn test_decode_bytes_nan() {
        let mut bytes = 1.0f32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&f32::NAN.to_le_bytes());
        assert!(matches!(
            decode(&RawEmbedding::Bytes(bytes)),
            Err(DecodeError::NonFinite { index: 1 })
        ));
    }

    #[test]
    fn test_encode_text_rejects_non_finite() {
        let e = Embedding::new(vec![0.5, f32::INFINITY]);
        assert!(matches!(encode_text(&e), Err(DecodeError::NonFinite { index: 1 })));
    }

    #[test]
    fn test_encode_text_is_decodable() {
        let e = Embedding::new(vec![0.125, -3.0]);
        let text = encode_text(&e).unwrap();
        assert_eq!(decode(&RawEmbedding::Text(text)).unwrap(), e);
    }
}
