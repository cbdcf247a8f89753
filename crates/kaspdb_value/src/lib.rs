//! # kaspdb Value
//!
//! Backend-neutral field values for the kaspdb mapping engine.
//!
//! A [`Value`] holds the content of exactly one column or document field.
//! It distinguishes between a field that was never assigned ([`Value::Unset`])
//! and a field that was explicitly assigned "no value" ([`Value::Null`]).
//!
//! Values carry no backend encoding. Mapping to SQLite columns or document
//! fields is done by the backend adapters in `kaspdb_core`.
//!
//! ## Kind discipline
//!
//! - A fresh value is unset
//! - `set` accepts a payload only if the value is unset or already of the
//!   same kind
//! - Changing kind requires an explicit `reset` (or `replace`)
//!
//! ## Usage
//!
//! ```
//! use kaspdb_value::{Value, ValueError, ValueKind};
//!
//! let mut value = Value::new();
//! value.set(Value::UInt32(2048)).unwrap();
//! assert_eq!(value.as_uint32().unwrap(), 2048);
//!
//! let err = value.set(Value::from("text")).unwrap_err();
//! assert!(matches!(err, ValueError::KindMismatch { .. }));
//!
//! value.reset();
//! assert_eq!(value.kind(), ValueKind::Unset);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod value;

pub use codec::{from_cbor, to_cbor};
pub use error::{ValueError, ValueResult};
pub use value::{EnumValue, Value, ValueKind};
