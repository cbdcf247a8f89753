//! Field storage for one entity instance and raw backend rows.

use crate::error::{CoreError, CoreResult};
use crate::schema::{FieldDef, Schema};
use kaspdb_value::Value;
use std::cmp::Ordering;

/// A raw row as produced by a backend cursor.
///
/// `values` follow the schema's field order but hold whatever the backend
/// stored; [`Record::hydrate`] converts them to the declared types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Primary key in the backend's native representation.
    pub id: Value,
    /// Revision token, unset on backends without revisions.
    pub revision: Value,
    /// Field values in schema order.
    pub values: Vec<Value>,
}

/// One value per schema field, validated against the declared types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    schema: &'static Schema,
    values: Vec<Value>,
}

impl Record {
    /// Creates a record with every field unset.
    #[must_use]
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            values: vec![Value::Unset; schema.fields().len()],
        }
    }

    /// Converts raw stored values to a record.
    ///
    /// Missing or null values are accepted only for nullable fields;
    /// everything else must coerce to the declared field type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Hydration`] naming the first offending field.
    pub fn hydrate(schema: &'static Schema, raw: Vec<Value>) -> CoreResult<Self> {
        if raw.len() != schema.fields().len() {
            return Err(CoreError::hydration(
                schema.name(),
                "*",
                format!("expected {} values, got {}", schema.fields().len(), raw.len()),
            ));
        }
        let values = schema
            .fields()
            .iter()
            .zip(raw)
            .map(|(field, value)| hydrate_value(schema.name(), field, value))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self { schema, values })
    }

    /// Returns the schema this record follows.
    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Returns the value of a field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if the schema lacks the field.
    pub fn get(&self, field: &str) -> CoreResult<&Value> {
        let (index, _) = self.schema.require(field)?;
        Ok(&self.values[index])
    }

    /// Assigns a field.
    ///
    /// Null is accepted only by nullable fields and may replace a value of
    /// any kind; `Unset` clears the field.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownField`], [`CoreError::ConstraintViolation`] for
    /// null on a non-nullable field, [`CoreError::FieldKindMismatch`] if the
    /// value cannot represent the declared type.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> CoreResult<()> {
        let (index, def) = self.schema.require(field)?;
        let value = value.into();
        let slot = &mut self.values[index];
        match value {
            Value::Unset => slot.reset(),
            Value::Null if def.is_nullable() => {
                slot.replace(Value::Null);
            }
            Value::Null => {
                return Err(CoreError::constraint_violation(
                    self.schema.name(),
                    format!("{field} may not be null"),
                ));
            }
            value => {
                let actual = value.kind();
                let coerced =
                    def.field_type()
                        .coerce(value)
                        .ok_or_else(|| CoreError::FieldKindMismatch {
                            entity: self.schema.name(),
                            field: field.to_string(),
                            expected: def.field_type().to_string(),
                            actual,
                        })?;
                if slot.is_null() {
                    slot.replace(coerced);
                } else {
                    slot.set(coerced)?;
                }
            }
        }
        Ok(())
    }

    /// Returns every field to unset.
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(Value::reset);
    }

    /// Turns unset nullable fields into null, as a store records them.
    pub fn settle_nulls(&mut self) {
        for (field, value) in self.schema.fields().iter().zip(&mut self.values) {
            if field.is_nullable() && value.is_unset() {
                value.replace(Value::Null);
            }
        }
    }

    /// Copies every field value from another record of the same schema.
    pub fn copy_from(&mut self, other: &Record) {
        self.values.clone_from(&other.values);
    }

    /// Field-by-field comparison in schema order.
    #[must_use]
    pub fn compare(&self, other: &Record) -> Ordering {
        self.values.cmp(&other.values)
    }

    /// Iterates over fields with their current values.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDef, &Value)> {
        self.schema.fields().iter().zip(&self.values)
    }

    /// Returns the values in schema order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

fn hydrate_value(entity: &'static str, field: &FieldDef, raw: Value) -> CoreResult<Value> {
    match raw {
        Value::Unset | Value::Null if field.is_nullable() => Ok(Value::Null),
        Value::Unset | Value::Null => Err(CoreError::hydration(
            entity,
            field.name(),
            "stored value is null",
        )),
        raw => {
            let description = raw.to_string();
            field.field_type().coerce(raw).ok_or_else(|| {
                CoreError::hydration(
                    entity,
                    field.name(),
                    format!("{description} is not a valid {}", field.field_type()),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumeration::EnumSet;
    use crate::schema::FieldDef;
    use kaspdb_value::{EnumValue, ValueError, ValueKind};
    use std::sync::LazyLock;

    static KINDS: LazyLock<EnumSet> =
        LazyLock::new(|| EnumSet::new("kind", &[("a", 0), ("b", 1)]));

    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
        Schema::builder("thing")
            .field(FieldDef::text("name"))
            .field(FieldDef::uint32("size"))
            .field(FieldDef::enumeration("kind", &KINDS))
            .field(FieldDef::text("note").nullable())
            .build()
    });

    #[test]
    fn new_record_is_unset() {
        let record = Record::new(&SCHEMA);
        assert!(record.values().iter().all(Value::is_unset));
        assert!(matches!(
            record.get("nope"),
            Err(CoreError::UnknownField { .. })
        ));
    }

    #[test]
    fn set_coerces_to_declared_type() {
        let mut record = Record::new(&SCHEMA);
        record.set("size", 2048i64).unwrap();
        record.set("kind", "b").unwrap();
        assert_eq!(record.get("size").unwrap(), &Value::UInt32(2048));
        assert_eq!(
            record.get("kind").unwrap(),
            &Value::Enum(EnumValue::new(1, "b"))
        );
    }

    #[test]
    fn set_rejects_wrong_kind() {
        let mut record = Record::new(&SCHEMA);
        let err = record.set("size", "big").unwrap_err();
        assert!(matches!(
            err,
            CoreError::FieldKindMismatch {
                actual: ValueKind::Text,
                ..
            }
        ));
        assert!(record.set("size", -1i32).is_err());
        assert!(record.get("size").unwrap().is_unset());
    }

    #[test]
    fn null_only_on_nullable_fields() {
        let mut record = Record::new(&SCHEMA);
        record.set("note", "hello").unwrap();
        record.set("note", Value::Null).unwrap();
        record.set("note", "again").unwrap();
        assert_eq!(record.get("note").unwrap().as_text().unwrap(), "again");

        let err = record.set("name", Value::Null).unwrap_err();
        assert!(matches!(err, CoreError::ConstraintViolation { .. }));
    }

    #[test]
    fn reset_and_copy() {
        let mut a = Record::new(&SCHEMA);
        a.set("name", "x").unwrap();
        let mut b = Record::new(&SCHEMA);
        b.copy_from(&a);
        assert_eq!(a.compare(&b), Ordering::Equal);

        b.set("name", "y").unwrap();
        assert_eq!(a.get("name").unwrap().as_text().unwrap(), "x");
        assert_eq!(a.compare(&b), Ordering::Less);

        b.reset();
        assert!(b.values().iter().all(Value::is_unset));
    }

    #[test]
    fn settle_nulls_touches_only_unset_nullable_fields() {
        let mut record = Record::new(&SCHEMA);
        record.set("name", "n").unwrap();
        record.settle_nulls();
        assert_eq!(record.get("note").unwrap(), &Value::Null);
        assert!(record.get("size").unwrap().is_unset());
        assert_eq!(record.get("name").unwrap().as_text().unwrap(), "n");

        record.set("note", "kept").unwrap();
        record.settle_nulls();
        assert_eq!(record.get("note").unwrap().as_text().unwrap(), "kept");
    }

    #[test]
    fn hydrate_converts_native_values() {
        let record = Record::hydrate(
            &SCHEMA,
            vec![
                Value::Text("n".into()),
                Value::Int64(7),
                Value::Int64(0),
                Value::Unset,
            ],
        )
        .unwrap();
        assert_eq!(record.get("size").unwrap(), &Value::UInt32(7));
        assert_eq!(
            record.get("kind").unwrap(),
            &Value::Enum(EnumValue::new(0, "a"))
        );
        assert_eq!(record.get("note").unwrap(), &Value::Null);
    }

    #[test]
    fn hydrate_reports_offending_field() {
        let err = Record::hydrate(
            &SCHEMA,
            vec![
                Value::Text("n".into()),
                Value::Text("seven".into()),
                Value::Int64(0),
                Value::Null,
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Hydration { ref field, .. } if field == "size"));

        let err = Record::hydrate(
            &SCHEMA,
            vec![Value::Null, Value::Int64(1), Value::Int64(0), Value::Null],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Hydration { ref field, .. } if field == "name"));

        let err = Record::hydrate(
            &SCHEMA,
            vec![
                Value::Text("n".into()),
                Value::Int64(1),
                Value::Int64(9),
                Value::Null,
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Hydration { ref field, .. } if field == "kind"));
    }

    #[test]
    fn kind_stays_fixed_for_key_fields() {
        static KEYED: LazyLock<Schema> = LazyLock::new(|| {
            Schema::builder("keyed")
                .field(FieldDef::foreign_key("owner_id", "owner"))
                .build()
        });
        let mut record = Record::new(&KEYED);
        record.set("owner_id", 5i64).unwrap();
        let err = record.set("owner_id", "abc").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Value(ValueError::KindMismatch { .. })
        ));
    }
}
