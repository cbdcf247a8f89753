//! Entity instances and the typed wrapper pattern.
//!
//! An [`Instance`] is the untyped state of one entity: its CRUD engine,
//! identity, revision, field values and lifecycle. Typed entities wrap an
//! instance and implement [`Entity`], which supplies the shared CRUD sugar;
//! the wrapper only adds typed accessors for its fields.
//!
//! ```text
//! Unpersisted --create/get_by_id--> Persisted --update--> Persisted
//!                                        |
//!                                     delete
//!                                        v
//!                                     Deleted (terminal)
//! ```

use crate::clause::{ClauseBuilder, ClauseTree};
use crate::connection::Connection;
use crate::cursor::ResultCursor;
use crate::enumeration::DbEnum;
use crate::error::{CoreError, CoreResult};
use crate::object::DbObject;
use crate::record::{Record, Row};
use crate::schema::{FieldType, Schema};
use kaspdb_value::Value;
use std::cmp::Ordering;
use std::marker::PhantomData;
use tracing::warn;

/// Storage state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No identity yet.
    Unpersisted,
    /// Created or loaded; has an identity.
    Persisted,
    /// Deleted from storage; no further storage operations.
    Deleted,
}

/// Untyped state of one entity instance.
#[derive(Debug, Clone)]
pub struct Instance<'c> {
    object: DbObject<'c>,
    id: Value,
    revision: Value,
    record: Record,
    lifecycle: Lifecycle,
}

impl<'c> Instance<'c> {
    /// Creates an empty, unpersisted instance.
    #[must_use]
    pub fn new(connection: &'c Connection, schema: &'static Schema) -> Self {
        Self {
            object: DbObject::new(connection, schema),
            id: Value::Unset,
            revision: Value::Unset,
            record: Record::new(schema),
            lifecycle: Lifecycle::Unpersisted,
        }
    }

    /// Builds a persisted instance from a raw row.
    ///
    /// # Errors
    ///
    /// [`CoreError::Hydration`] if a stored value does not fit its field.
    pub fn from_row(object: DbObject<'c>, row: Row) -> CoreResult<Self> {
        let (id, revision, record) = object.hydrate(row)?;
        Ok(Self {
            object,
            id,
            revision,
            record,
            lifecycle: Lifecycle::Persisted,
        })
    }

    /// Returns the CRUD engine of this instance.
    #[must_use]
    pub fn object(&self) -> DbObject<'c> {
        self.object
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.object.schema()
    }

    /// Returns the primary key, unset until persisted.
    #[must_use]
    pub fn id(&self) -> &Value {
        &self.id
    }

    /// Returns the revision token, unset on backends without revisions.
    #[must_use]
    pub fn revision(&self) -> &Value {
        &self.revision
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns the field values.
    #[must_use]
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Returns a field value.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownField`] for an undeclared field.
    pub fn get(&self, field: &str) -> CoreResult<&Value> {
        self.record.get(field)
    }

    /// Assigns a field; see [`Record::set`].
    ///
    /// # Errors
    ///
    /// See [`Record::set`].
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.record.set(field, value)
    }

    /// Reads a text field.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned, `WrongKind` if null or not text.
    pub fn get_text(&self, field: &str) -> CoreResult<&str> {
        Ok(self.get(field)?.as_text()?)
    }

    /// Reads a nullable text field.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned.
    pub fn get_optional_text(&self, field: &str) -> CoreResult<Option<&str>> {
        match self.get(field)? {
            Value::Null => Ok(None),
            value => Ok(Some(value.as_text()?)),
        }
    }

    /// Reads an unsigned 32-bit field.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned, `WrongKind` otherwise.
    pub fn get_uint32(&self, field: &str) -> CoreResult<u32> {
        Ok(self.get(field)?.as_uint32()?)
    }

    /// Reads a signed 32-bit field.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned, `WrongKind` otherwise.
    pub fn get_int32(&self, field: &str) -> CoreResult<i32> {
        Ok(self.get(field)?.as_int32()?)
    }

    /// Reads an enumeration field as its Rust enum.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned, `WrongKind` otherwise.
    pub fn get_enum<E: DbEnum>(&self, field: &str) -> CoreResult<E> {
        let value = self.get(field)?.as_enum()?;
        E::from_code(value.code).ok_or_else(|| CoreError::InvalidEnumText {
            enumeration: E::enum_set().name(),
            text: value.text.clone(),
        })
    }

    /// Reads the symbolic text of an enumeration field.
    ///
    /// # Errors
    ///
    /// `NotSet` if never assigned, `WrongKind` otherwise.
    pub fn get_enum_text(&self, field: &str) -> CoreResult<&str> {
        Ok(self.get(field)?.as_enum()?.text.as_str())
    }

    /// Assigns an enumeration field from its symbolic text.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidEnumText`] for text that names no member,
    /// [`CoreError::FieldKindMismatch`] if the field is not an enumeration.
    pub fn set_enum_text(&mut self, field: &str, text: &str) -> CoreResult<()> {
        let (_, def) = self.schema().require(field)?;
        match def.field_type() {
            FieldType::Enum(set) => {
                let value = set.value_of_text(text)?;
                self.record.set(field, value)
            }
            other => Err(CoreError::FieldKindMismatch {
                entity: self.schema().name(),
                field: field.to_string(),
                expected: other.to_string(),
                actual: kaspdb_value::ValueKind::Enum,
            }),
        }
    }

    /// Returns the instance to its just-constructed state. Storage is untouched.
    pub fn reset(&mut self) {
        self.id.reset();
        self.revision.reset();
        self.record.reset();
        self.lifecycle = Lifecycle::Unpersisted;
    }

    /// Copies all field values from `other`; identity and revision are kept.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] if `other` has another schema.
    pub fn copy_from(&mut self, other: &Instance<'_>) -> CoreResult<()> {
        if self.schema().name() != other.schema().name() {
            return Err(CoreError::invalid_operation(format!(
                "cannot copy {} into {}",
                other.schema().name(),
                self.schema().name()
            )));
        }
        self.record.copy_from(&other.record);
        Ok(())
    }

    /// Field-by-field comparison; identity and revision are ignored.
    #[must_use]
    pub fn compare(&self, other: &Instance<'_>) -> Ordering {
        self.record.compare(&other.record)
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.lifecycle == Lifecycle::Deleted {
            return Err(CoreError::AlreadyDeleted {
                entity: self.schema().name(),
            });
        }
        Ok(())
    }

    fn ensure_persisted(&self) -> CoreResult<()> {
        self.ensure_live()?;
        if self.lifecycle == Lifecycle::Unpersisted {
            return Err(CoreError::NotPersisted {
                entity: self.schema().name(),
            });
        }
        Ok(())
    }

    fn load(&mut self, row: Row) -> CoreResult<()> {
        let (id, revision, record) = self.object.hydrate(row)?;
        self.id = id;
        self.revision = revision;
        self.record = record;
        self.lifecycle = Lifecycle::Persisted;
        Ok(())
    }

    /// Stores the instance as a new record and takes the assigned identity.
    ///
    /// # Errors
    ///
    /// `AlreadyDeleted`, `InvalidOperation` if already persisted, or any
    /// error of [`DbObject::create`].
    pub fn create(&mut self) -> CoreResult<()> {
        self.ensure_live()?;
        if self.lifecycle == Lifecycle::Persisted {
            return Err(CoreError::invalid_operation(format!(
                "{} {} is already persisted",
                self.schema().name(),
                self.id
            )));
        }
        let created = self.object.create(&self.record)?;
        self.record.settle_nulls();
        self.id = created.id;
        self.revision = created.revision;
        self.lifecycle = Lifecycle::Persisted;
        Ok(())
    }

    /// Loads the record with the given id into this instance.
    ///
    /// # Errors
    ///
    /// `AlreadyDeleted`, `NotFound` if no record has this id, `Hydration`.
    pub fn get_by_id(&mut self, id: &Value) -> CoreResult<()> {
        self.ensure_live()?;
        match self.object.read(id)? {
            Some(row) => self.load(row),
            None => Err(CoreError::not_found(self.schema().name(), id)),
        }
    }

    /// Loads the first record matching `tree` into this instance.
    ///
    /// # Errors
    ///
    /// `AlreadyDeleted`, `NotFound` if nothing matches, `Hydration`, or any
    /// query error.
    pub fn get_by_clause(&mut self, tree: &ClauseTree) -> CoreResult<()> {
        self.ensure_live()?;
        let row = self.object.get_by_clause(tree)?.begin()?;
        match row {
            Some(row) => self.load(row),
            None => Err(CoreError::not_found(self.schema().name(), tree)),
        }
    }

    /// Writes the current field values to storage.
    ///
    /// # Errors
    ///
    /// `NotPersisted`, `AlreadyDeleted`, `RevisionConflict` (re-read and
    /// retry), or any error of [`DbObject::update`].
    pub fn update(&mut self) -> CoreResult<()> {
        self.ensure_persisted()?;
        self.revision = self
            .object
            .update(&self.id, &self.revision, &self.record)?;
        Ok(())
    }

    /// Removes the record from storage; the instance becomes terminal.
    ///
    /// # Errors
    ///
    /// `NotPersisted`, `AlreadyDeleted`, `RevisionConflict`, `NotFound`.
    pub fn delete(&mut self) -> CoreResult<()> {
        self.ensure_persisted()?;
        self.object.delete(&self.id, &self.revision)?;
        self.lifecycle = Lifecycle::Deleted;
        Ok(())
    }

    /// Resolves a foreign key to the referenced entity.
    ///
    /// Returns `None` for a null reference or when the target no longer exists.
    ///
    /// # Errors
    ///
    /// `UnknownField`, `InvalidOperation` if the field does not reference
    /// `T`'s schema, or any read error.
    pub fn resolve<T: Entity<'c>>(&self, field: &str) -> CoreResult<Option<T>> {
        let (_, def) = self.schema().require(field)?;
        if def.references() != Some(T::schema().name()) {
            return Err(CoreError::invalid_operation(format!(
                "{}.{field} does not reference {}",
                self.schema().name(),
                T::schema().name()
            )));
        }
        let key = self.get(field)?;
        if key.is_null() || key.is_unset() {
            return Ok(None);
        }
        let mut target = T::new(self.object.connection());
        match target.instance_mut().get_by_id(key) {
            Ok(()) => Ok(Some(target)),
            Err(CoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A typed entity backed by an [`Instance`].
///
/// Implementors provide the schema and access to the instance; every CRUD
/// operation comes from the provided methods.
pub trait Entity<'c>: Sized {
    /// The schema shared by all instances of this entity.
    fn schema() -> &'static Schema;

    /// Wraps an instance of [`Entity::schema`].
    fn from_instance(instance: Instance<'c>) -> Self;

    /// Returns the wrapped instance.
    fn instance(&self) -> &Instance<'c>;

    /// Returns the wrapped instance mutably.
    fn instance_mut(&mut self) -> &mut Instance<'c>;

    /// Creates an empty, unpersisted entity.
    fn new(connection: &'c Connection) -> Self {
        Self::from_instance(Instance::new(connection, Self::schema()))
    }

    /// Hydrates an entity from a raw row.
    ///
    /// # Errors
    ///
    /// [`CoreError::Hydration`] if a stored value does not fit its field.
    fn from_row(connection: &'c Connection, row: Row) -> CoreResult<Self> {
        Instance::from_row(DbObject::new(connection, Self::schema()), row).map(Self::from_instance)
    }

    /// Returns the primary key.
    fn id<'s>(&'s self) -> &'s Value
    where
        'c: 's,
    {
        self.instance().id()
    }

    /// Returns the revision token.
    fn revision<'s>(&'s self) -> &'s Value
    where
        'c: 's,
    {
        self.instance().revision()
    }

    /// Returns the lifecycle state.
    fn lifecycle(&self) -> Lifecycle {
        self.instance().lifecycle()
    }

    /// Returns the entity to its just-constructed state.
    fn reset(&mut self) {
        self.instance_mut().reset();
    }

    /// Copies all field values from `other`, keeping identity and revision.
    ///
    /// # Errors
    ///
    /// See [`Instance::copy_from`].
    fn copy_from(&mut self, other: &Self) -> CoreResult<()> {
        self.instance_mut().copy_from(other.instance())
    }

    /// Field-by-field comparison.
    fn compare(&self, other: &Self) -> Ordering {
        self.instance().compare(other.instance())
    }

    /// See [`Instance::create`].
    ///
    /// # Errors
    ///
    /// See [`Instance::create`].
    fn create(&mut self) -> CoreResult<()> {
        self.instance_mut().create()
    }

    /// See [`Instance::get_by_id`].
    ///
    /// # Errors
    ///
    /// See [`Instance::get_by_id`].
    fn get_by_id(&mut self, id: &Value) -> CoreResult<()> {
        self.instance_mut().get_by_id(id)
    }

    /// See [`Instance::update`].
    ///
    /// # Errors
    ///
    /// See [`Instance::update`].
    fn update(&mut self) -> CoreResult<()> {
        self.instance_mut().update()
    }

    /// See [`Instance::delete`].
    ///
    /// # Errors
    ///
    /// See [`Instance::delete`].
    fn delete(&mut self) -> CoreResult<()> {
        self.instance_mut().delete()
    }

    /// Starts a clause builder for this entity's schema.
    fn clause() -> ClauseBuilder {
        ClauseBuilder::new(Self::schema())
    }

    /// Lists every stored entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot start.
    fn list(connection: &'c Connection) -> CoreResult<EntityList<'c, Self>> {
        Self::list_by_clause(connection, &ClauseTree::all(Self::schema()))
    }

    /// Lists entities matching `tree`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot start.
    fn list_by_clause(connection: &'c Connection, tree: &ClauseTree) -> CoreResult<EntityList<'c, Self>> {
        let object = DbObject::new(connection, Self::schema());
        Ok(EntityList::new(object, object.get_by_clause(tree)?))
    }

    /// Counts entities matching `tree`.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn count(connection: &'c Connection, tree: &ClauseTree) -> CoreResult<u64> {
        DbObject::new(connection, Self::schema()).count(tree)
    }
}

/// Typed cursor over query results.
///
/// Each item is hydrated on demand. A row that fails hydration yields an
/// error item and iteration continues with the next row, unless
/// [`EntityList::strict`] was requested, in which case the first error
/// ends the iteration.
#[derive(Debug)]
pub struct EntityList<'c, E> {
    object: DbObject<'c>,
    cursor: ResultCursor<'c>,
    strict: bool,
    _entity: PhantomData<E>,
}

impl<'c, E: Entity<'c>> EntityList<'c, E> {
    fn new(object: DbObject<'c>, cursor: ResultCursor<'c>) -> Self {
        Self {
            object,
            cursor,
            strict: false,
            _entity: PhantomData,
        }
    }

    /// Ends iteration at the first error instead of skipping the row.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Returns the first entity, `None` for an empty result.
    ///
    /// # Errors
    ///
    /// `CursorConsumed` if iteration already started, or a hydration error.
    pub fn begin(&mut self) -> CoreResult<Option<E>> {
        match self.cursor.begin()? {
            Some(row) => self.hydrate(row).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the next entity as an independent owned value.
    ///
    /// # Errors
    ///
    /// A backend or hydration error for this row.
    pub fn get_next(&mut self) -> CoreResult<Option<E>> {
        self.next().transpose()
    }

    fn hydrate(&mut self, row: Row) -> CoreResult<E> {
        let id = row.id.clone();
        Instance::from_row(self.object, row)
            .map(E::from_instance)
            .inspect_err(|e| {
                if self.strict {
                    self.cursor.close();
                } else {
                    warn!(entity = self.object.schema().name(), %id, error = %e, "skipping row");
                }
            })
    }
}

impl<'c, E: Entity<'c>> Iterator for EntityList<'c, E> {
    type Item = CoreResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.next()? {
            Ok(row) => Some(self.hydrate(row)),
            Err(e) => Some(Err(e)),
        }
    }
}
