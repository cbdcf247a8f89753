//! Error types for value operations.

use crate::value::ValueKind;
use thiserror::Error;

/// Result type for value operations.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur when assigning, reading or encoding values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A payload of a different kind was assigned to an already-set value.
    #[error("kind mismatch: value holds {current}, cannot assign {requested}")]
    KindMismatch {
        /// Kind currently held.
        current: ValueKind,
        /// Kind of the rejected payload.
        requested: ValueKind,
    },

    /// The value has never been assigned.
    #[error("value is not set")]
    NotSet,

    /// The value holds a different kind than the one requested.
    #[error("wrong kind: expected {expected}, found {actual}")]
    WrongKind {
        /// Kind the caller asked for.
        expected: ValueKind,
        /// Kind actually held.
        actual: ValueKind,
    },

    /// Failed to encode to CBOR.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode CBOR bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },
}

impl ValueError {
    /// Create a wrong kind error.
    pub fn wrong_kind(expected: ValueKind, actual: ValueKind) -> Self {
        Self::WrongKind { expected, actual }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}
