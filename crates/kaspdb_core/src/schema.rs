//! Object schema descriptors.
//!
//! A [`Schema`] describes one entity type: its table or collection name,
//! its ordered fields and which of them reference other schemas. Schemas
//! are built once (usually inside a `LazyLock`) and shared by every
//! instance of the entity for the lifetime of the process.
//!
//! Every schema has an implicit primary key named [`Schema::PRIMARY_KEY`]
//! whose representation is chosen by the backend: an integer assigned by
//! the relational store, or a generated text id in the document store.

use crate::enumeration::EnumSet;
use crate::error::{CoreError, CoreResult};
use kaspdb_value::Value;
use std::fmt;

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
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
    /// Member of an enumeration.
    Enum(&'static EnumSet),
    /// Identity of a record (primary or foreign key). Integer on relational
    /// backends, text on the document store.
    Key,
}

impl FieldType {
    /// Converts a non-null value to this type's canonical representation.
    ///
    /// Integers are range-checked across integer kinds, enumeration fields
    /// accept a member value, its code or its text. Returns `None` if the
    /// value cannot represent this type.
    #[must_use]
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (FieldType::Int32, v) => v.to_i64().and_then(|n| i32::try_from(n).ok()).map(Value::Int32),
            (FieldType::UInt32, v) => v.to_i64().and_then(|n| u32::try_from(n).ok()).map(Value::UInt32),
            (FieldType::Int64, v) => v.to_i64().map(Value::Int64),
            (FieldType::UInt64, Value::UInt64(n)) => Some(Value::UInt64(n)),
            (FieldType::UInt64, v) => v.to_i64().and_then(|n| u64::try_from(n).ok()).map(Value::UInt64),
            (FieldType::Text, v @ Value::Text(_)) => Some(v),
            (FieldType::Binary, v @ Value::Binary(_)) => Some(v),
            (FieldType::Enum(set), Value::Enum(e)) => set.contains(&e).then_some(Value::Enum(e)),
            (FieldType::Enum(set), Value::Text(t)) => set.value_of_text(&t).ok().map(Value::Enum),
            (FieldType::Enum(set), v) => v
                .to_i64()
                .and_then(|n| i32::try_from(n).ok())
                .and_then(|code| set.value_of_code(code))
                .map(Value::Enum),
            (FieldType::Key, v @ Value::Text(_)) => Some(v),
            (FieldType::Key, v) => v.to_i64().map(Value::Int64),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int32 => f.write_str("int32"),
            FieldType::UInt32 => f.write_str("uint32"),
            FieldType::Int64 => f.write_str("int64"),
            FieldType::UInt64 => f.write_str("uint64"),
            FieldType::Text => f.write_str("text"),
            FieldType::Binary => f.write_str("binary"),
            FieldType::Enum(set) => write!(f, "enum {}", set.name()),
            FieldType::Key => f.write_str("key"),
        }
    }
}

/// Definition of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    name: &'static str,
    field_type: FieldType,
    nullable: bool,
    unique: bool,
    references: Option<&'static str>,
}

impl FieldDef {
    fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: false,
            unique: false,
            references: None,
        }
    }

    /// A signed 32-bit integer field.
    #[must_use]
    pub fn int32(name: &'static str) -> Self {
        Self::new(name, FieldType::Int32)
    }

    /// An unsigned 32-bit integer field.
    #[must_use]
    pub fn uint32(name: &'static str) -> Self {
        Self::new(name, FieldType::UInt32)
    }

    /// A signed 64-bit integer field.
    #[must_use]
    pub fn int64(name: &'static str) -> Self {
        Self::new(name, FieldType::Int64)
    }

    /// An unsigned 64-bit integer field.
    #[must_use]
    pub fn uint64(name: &'static str) -> Self {
        Self::new(name, FieldType::UInt64)
    }

    /// A text field.
    #[must_use]
    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// A binary field.
    #[must_use]
    pub fn binary(name: &'static str) -> Self {
        Self::new(name, FieldType::Binary)
    }

    /// An enumeration field.
    #[must_use]
    pub fn enumeration(name: &'static str, set: &'static EnumSet) -> Self {
        Self::new(name, FieldType::Enum(set))
    }

    /// A foreign key referencing the primary key of schema `target`.
    #[must_use]
    pub fn foreign_key(name: &'static str, target: &'static str) -> Self {
        Self {
            references: Some(target),
            ..Self::new(name, FieldType::Key)
        }
    }

    /// Marks the field as accepting null.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the field as unique across all records of the schema.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns true if the field accepts null.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns true if values must be unique.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the referenced schema name for foreign keys.
    #[must_use]
    pub fn references(&self) -> Option<&'static str> {
        self.references
    }
}

/// Static descriptor of an entity type.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    name: &'static str,
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Name of the implicit primary-key field.
    pub const PRIMARY_KEY: &'static str = "id";

    /// Name of the revision field used by revision-tracking backends.
    pub const REVISION: &'static str = "rev";

    /// Starts building a schema.
    #[must_use]
    pub fn builder(name: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            name,
            fields: Vec::new(),
        }
    }

    /// Returns the entity (table or collection) name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared fields in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the position of a field in the declared order.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Looks up a declared field, failing with [`CoreError::UnknownField`].
    ///
    /// # Errors
    ///
    /// Returns an error if the schema has no such field.
    pub fn require(&self, name: &str) -> CoreResult<(usize, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .ok_or_else(|| CoreError::unknown_field(self.name, name))
    }

    /// Resolves a name usable in a clause: any declared field or the primary key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] for any other name.
    pub fn resolve(&self, name: &str) -> CoreResult<(&'static str, FieldType)> {
        if name == Self::PRIMARY_KEY {
            return Ok((Self::PRIMARY_KEY, FieldType::Key));
        }
        self.require(name).map(|(_, f)| (f.name, f.field_type))
    }

    /// Iterates over foreign-key fields.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.references.is_some())
    }
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: &'static str,
    fields: Vec<FieldDef>,
}

impl SchemaBuilder {
    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Finishes the schema.
    ///
    /// # Panics
    ///
    /// Panics on duplicate field names or on fields named like the reserved
    /// `id`/`rev` fields. Schemas are static data; these are programming errors.
    #[must_use]
    pub fn build(self) -> Schema {
        for (i, field) in self.fields.iter().enumerate() {
            assert!(
                field.name != Schema::PRIMARY_KEY && field.name != Schema::REVISION,
                "field name {} is reserved in schema {}",
                field.name,
                self.name
            );
            assert!(
                self.fields[..i].iter().all(|f| f.name != field.name),
                "duplicate field {} in schema {}",
                field.name,
                self.name
            );
        }
        Schema {
            name: self.name,
            fields: self.fields,
        }
    }
}
