//! Error types for the mapping engine.

use kaspdb_value::{ValueError, ValueKind};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in engine, backend and entity operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Value misuse (kind mismatch, unset or wrong-kind read).
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// A value does not fit the declared type of a field.
    #[error("field {entity}.{field} expects {expected}, got {actual}")]
    FieldKindMismatch {
        /// Entity (schema) name.
        entity: &'static str,
        /// Field name.
        field: String,
        /// Declared field type.
        expected: String,
        /// Kind of the offending value.
        actual: ValueKind,
    },

    /// A clause or accessor names a field the schema does not declare.
    #[error("unknown field {field} in {entity}")]
    UnknownField {
        /// Entity (schema) name.
        entity: &'static str,
        /// The unknown field name.
        field: String,
    },

    /// The backend cannot express a predicate of the clause tree.
    #[error("{backend} backend cannot express predicate: {predicate}")]
    UnsupportedPredicate {
        /// Backend name.
        backend: &'static str,
        /// Description of the predicate.
        predicate: String,
    },

    /// A uniqueness, non-null or reference constraint was violated.
    #[error("constraint violation on {entity}: {message}")]
    ConstraintViolation {
        /// Entity (schema) name.
        entity: &'static str,
        /// Description of the violated constraint.
        message: String,
    },

    /// No stored record matches the given identity.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity (schema) name.
        entity: &'static str,
        /// The identity that was looked up.
        id: String,
    },

    /// The stored revision no longer matches the caller's revision.
    #[error("revision conflict on {entity} {id}: have {expected}, store has {actual}")]
    RevisionConflict {
        /// Entity (schema) name.
        entity: &'static str,
        /// The record identity.
        id: String,
        /// Revision supplied by the caller.
        expected: String,
        /// Revision currently stored.
        actual: String,
    },

    /// A stored value could not be converted to the declared field type.
    #[error("cannot hydrate {entity}.{field}: {message}")]
    Hydration {
        /// Entity (schema) name.
        entity: &'static str,
        /// Field name.
        field: String,
        /// Description of the mismatch.
        message: String,
    },

    /// Transport or storage failure in the backend.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// Text does not name a member of an enumeration.
    #[error("invalid {enumeration} text: {text:?}")]
    InvalidEnumText {
        /// Enumeration name.
        enumeration: &'static str,
        /// The unrecognised text.
        text: String,
    },

    /// The instance was deleted; no further storage operations are allowed.
    #[error("{entity} instance was already deleted")]
    AlreadyDeleted {
        /// Entity (schema) name.
        entity: &'static str,
    },

    /// The instance has no identity yet.
    #[error("{entity} instance has not been persisted")]
    NotPersisted {
        /// Entity (schema) name.
        entity: &'static str,
    },

    /// `begin` was called on a cursor that has already advanced.
    #[error("cursor already consumed; run the query again")]
    CursorConsumed,

    /// Invalid or missing configuration option.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// Persisted state cannot be decoded.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown field error.
    pub fn unknown_field(entity: &'static str, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity,
            field: field.into(),
        }
    }

    /// Creates an unsupported predicate error.
    pub fn unsupported_predicate(backend: &'static str, predicate: impl Into<String>) -> Self {
        Self::UnsupportedPredicate {
            backend,
            predicate: predicate.into(),
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint_violation(entity: &'static str, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            entity,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates a hydration error.
    pub fn hydration(
        entity: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Hydration {
            entity,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a corrupted store error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors the caller may resolve by re-reading and retrying.
    #[must_use]
    pub fn is_revision_conflict(&self) -> bool {
        matches!(self, Self::RevisionConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_errors_convert() {
        let err: CoreError = ValueError::NotSet.into();
        assert!(matches!(err, CoreError::Value(ValueError::NotSet)));
    }

    #[test]
    fn messages_carry_context() {
        let err = CoreError::not_found("hsm_key", 42);
        assert_eq!(err.to_string(), "hsm_key 42 not found");

        let err = CoreError::RevisionConflict {
            entity: "policy",
            id: "abc".into(),
            expected: "1-aa".into(),
            actual: "2-bb".into(),
        };
        assert!(err.is_revision_conflict());
        assert!(err.to_string().contains("2-bb"));
    }
}
