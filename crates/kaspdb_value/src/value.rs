//! Dynamic field value type.

use crate::error::{ValueError, ValueResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a [`Value`].
///
/// Declaration order is the ordinal used for cross-kind ordering:
/// values of different kinds sort by this ordinal first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Never assigned.
    Unset,
    /// Explicit null.
    Null,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// UTF-8 text.
    Text,
    /// Opaque bytes.
    Binary,
    /// Enumeration member (code plus symbolic text).
    Enum,
}

impl ValueKind {
    /// Returns a stable lowercase name for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Null => "null",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Enum => "enum",
        }
    }

    /// Returns true for the four integer kinds.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int32 | Self::UInt32 | Self::Int64 | Self::UInt64)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An enumeration member as stored in a value.
///
/// Backends pick the representation they persist: the relational adapter
/// stores `code`, the document adapter stores `text`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnumValue {
    /// Integer code of the member.
    pub code: i32,
    /// Symbolic text of the member.
    pub text: String,
}

impl EnumValue {
    /// Creates an enumeration value.
    pub fn new(code: i32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }
}

/// A backend-neutral value for one field.
///
/// Ordering is total: kind ordinal first (see [`ValueKind`]), then payload.
/// The derived `Ord` relies on variant declaration order matching
/// `ValueKind`, so do not reorder the variants.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Value {
    /// Never assigned since construction or reset.
    #[default]
    Unset,
    /// Explicit null.
    Null,
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Binary(Vec<u8>),
    /// Enumeration member.
    Enum(EnumValue),
}

impl Value {
    /// Creates an unset value.
    #[must_use]
    pub const fn new() -> Self {
        Value::Unset
    }

    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Value::Unset => ValueKind::Unset,
            Value::Null => ValueKind::Null,
            Value::Int32(_) => ValueKind::Int32,
            Value::UInt32(_) => ValueKind::UInt32,
            Value::Int64(_) => ValueKind::Int64,
            Value::UInt64(_) => ValueKind::UInt64,
            Value::Text(_) => ValueKind::Text,
            Value::Binary(_) => ValueKind::Binary,
            Value::Enum(_) => ValueKind::Enum,
        }
    }

    /// Check if this value has never been assigned.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Check if this value is an explicit null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Assigns a new payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::KindMismatch`] if this value is already set to
    /// a different kind. Call [`Value::reset`] first to change kind.
    pub fn set(&mut self, value: Value) -> ValueResult<()> {
        let current = self.kind();
        let requested = value.kind();
        if current != ValueKind::Unset && current != requested {
            return Err(ValueError::KindMismatch { current, requested });
        }
        *self = value;
        Ok(())
    }

    /// Resets and assigns in one step, returning the previous value.
    pub fn replace(&mut self, value: Value) -> Value {
        std::mem::replace(self, value)
    }

    /// Returns this value to the unset state.
    pub fn reset(&mut self) {
        *self = Value::Unset;
    }

    fn kind_error(&self, expected: ValueKind) -> ValueError {
        match self.kind() {
            ValueKind::Unset => ValueError::NotSet,
            actual => ValueError::wrong_kind(expected, actual),
        }
    }

    /// Get this value as a signed 32-bit integer.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotSet`] if unset, [`ValueError::WrongKind`] otherwise.
    pub fn as_int32(&self) -> ValueResult<i32> {
        match self {
            Value::Int32(n) => Ok(*n),
            _ => Err(self.kind_error(ValueKind::Int32)),
        }
    }

    /// Get this value as an unsigned 32-bit integer.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotSet`] if unset, [`ValueError::WrongKind`] otherwise.
    pub fn as_uint32(&self) -> ValueResult<u32> {
        match self {
            Value::UInt32(n) => Ok(*n),
            _ => Err(self.kind_error(ValueKind::UInt32)),
        }
    }

    /// Get this value as a signed 64-bit integer.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotSet`] if unset, [`ValueError::WrongKind`] otherwise.
    pub fn as_int64(&self) -> ValueResult<i64> {
        match self {
            Value::Int64(n) => Ok(*n),
            _ => Err(self.kind_error(ValueKind::Int64)),
        }
    }

    /// Get this value as an unsigned 64-bit integer.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotSet`] if unset, [`ValueError::WrongKind`] otherwise.
    pub fn as_uint64(&self) -> ValueResult<u64> {
        match self {
            Value::UInt64(n) => Ok(*n),
            _ => Err(self.kind_error(ValueKind::UInt64)),
        }
    }

    /// Get this value as text.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotSet`] if unset, [`ValueError::WrongKind`] otherwise.
    pub fn as_text(&self) -> ValueResult<&str> {
        match self {
            Value::Text(s) => Ok(s),
            _ => Err(self.kind_error(ValueKind::Text)),
        }
    }

    /// Get this value as bytes.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotSet`] if unset, [`ValueError::WrongKind`] otherwise.
    pub fn as_binary(&self) -> ValueResult<&[u8]> {
        match self {
            Value::Binary(b) => Ok(b),
            _ => Err(self.kind_error(ValueKind::Binary)),
        }
    }

    /// Get this value as an enumeration member.
    ///
    /// # Errors
    ///
    /// [`ValueError::NotSet`] if unset, [`ValueError::WrongKind`] otherwise.
    pub fn as_enum(&self) -> ValueResult<&EnumValue> {
        match self {
            Value::Enum(e) => Ok(e),
            _ => Err(self.kind_error(ValueKind::Enum)),
        }
    }

    /// Widens any integer kind to `i64`.
    ///
    /// Returns `None` for non-integers and for `UInt64` values above `i64::MAX`.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(i64::from(*n)),
            Value::UInt32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            Value::UInt64(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => f.write_str("<unset>"),
            Value::Null => f.write_str("null"),
            Value::Int32(n) => write!(f, "{n}"),
            Value::UInt32(n) => write!(f, "{n}"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::UInt64(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Value::Enum(e) => write!(f, "{}({})", e.text, e.code),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::UInt32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt64(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Binary(b.to_vec())
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
