//! CBOR encoding of values and value-bearing structures.
//!
//! Used by the document adapter for its on-disk snapshot and for the
//! digest that goes into revision tokens. Map-based structures should use
//! ordered maps (`BTreeMap`) so identical inputs produce identical bytes.

use crate::error::{ValueError, ValueResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode any serializable structure to CBOR bytes.
///
/// # Errors
///
/// Returns [`ValueError::EncodingFailed`] if serialization fails.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> ValueResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| ValueError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Decode a structure from CBOR bytes.
///
/// # Errors
///
/// Returns [`ValueError::DecodingFailed`] if the bytes are not valid CBOR
/// for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> ValueResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ValueError::decoding_failed(e.to_string()))
}
