//! Generic CRUD engine.
//!
//! A [`DbObject`] pairs a schema with a connection and performs every
//! storage operation for that schema. Entity wrappers are thin typed layers
//! over it; nothing here knows about individual entity types.

use crate::backend::Statement;
use crate::clause::ClauseTree;
use crate::connection::Connection;
use crate::cursor::ResultCursor;
use crate::error::CoreResult;
use crate::record::{Record, Row};
use crate::schema::Schema;
use kaspdb_value::Value;
use tracing::debug;

/// Identity and revision assigned by the store on create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// Primary key.
    pub id: Value,
    /// Initial revision, unset on backends without revisions.
    pub revision: Value,
}

/// Schema-bound CRUD operations over one connection.
#[derive(Debug, Clone, Copy)]
pub struct DbObject<'c> {
    connection: &'c Connection,
    schema: &'static Schema,
}

impl<'c> DbObject<'c> {
    /// Binds a schema to a connection.
    #[must_use]
    pub fn new(connection: &'c Connection, schema: &'static Schema) -> Self {
        Self { connection, schema }
    }

    /// Returns the connection.
    #[must_use]
    pub fn connection(&self) -> &'c Connection {
        self.connection
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Revision to hand to the backend: the caller's on revision-tracking
    /// backends, nothing otherwise.
    fn revision_for<'v>(&self, revision: &'v Value) -> &'v Value {
        const NONE: &Value = &Value::Unset;
        if self.connection.capabilities().supports_revisions {
            revision
        } else {
            NONE
        }
    }

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` for uniqueness, non-null or reference
    /// violations, `Connection` on storage failure.
    pub fn create(&self, record: &Record) -> CoreResult<Created> {
        let outcome = self
            .connection
            .execute(self.schema, Statement::Insert { record })?;
        debug!(entity = self.schema.name(), id = %outcome.id, "created");
        let revision = if self.connection.capabilities().supports_revisions {
            outcome.revision
        } else {
            Value::Unset
        };
        Ok(Created {
            id: outcome.id,
            revision,
        })
    }

    /// Queries the record with the given id; the cursor yields zero or one row.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid key or the query fails.
    pub fn get_by_id(&self, id: &Value) -> CoreResult<ResultCursor<'c>> {
        let tree = ClauseTree::by_id(self.schema, id.clone())?;
        self.get_by_clause(&tree)
    }

    /// Queries all records matching `tree`.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for a tree of another schema,
    /// `UnsupportedPredicate` or `Connection` from the backend.
    pub fn get_by_clause(&self, tree: &ClauseTree) -> CoreResult<ResultCursor<'c>> {
        debug!(entity = self.schema.name(), clause = %tree, "query");
        self.connection.query(self.schema, tree)
    }

    /// Reads the single record with the given id.
    ///
    /// # Errors
    ///
    /// Same as [`DbObject::get_by_id`].
    pub fn read(&self, id: &Value) -> CoreResult<Option<Row>> {
        let mut cursor = self.get_by_id(id)?;
        cursor.begin()
    }

    /// Writes the set fields of `record` to the record with `id`.
    ///
    /// On revision-tracking backends `revision` must be the stored revision.
    /// Returns the new revision (unset on backends without revisions).
    ///
    /// # Errors
    ///
    /// `NotFound`, `RevisionConflict`, `ConstraintViolation` or `Connection`.
    pub fn update(&self, id: &Value, revision: &Value, record: &Record) -> CoreResult<Value> {
        let outcome = self.connection.execute(
            self.schema,
            Statement::Update {
                id,
                revision: self.revision_for(revision),
                record,
            },
        )?;
        debug!(entity = self.schema.name(), %id, revision = %outcome.revision, "updated");
        Ok(outcome.revision)
    }

    /// Deletes the record with `id`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `RevisionConflict`, `ConstraintViolation` while other
    /// records reference it, or `Connection`.
    pub fn delete(&self, id: &Value, revision: &Value) -> CoreResult<()> {
        self.connection.execute(
            self.schema,
            Statement::Delete {
                id,
                revision: self.revision_for(revision),
            },
        )?;
        debug!(entity = self.schema.name(), %id, "deleted");
        Ok(())
    }

    /// Counts records matching `tree`.
    ///
    /// # Errors
    ///
    /// Same as [`DbObject::get_by_clause`].
    pub fn count(&self, tree: &ClauseTree) -> CoreResult<u64> {
        tree.ensure_schema(self.schema)?;
        self.connection.count(self.schema, tree)
    }

    /// Converts a raw row to a typed record.
    ///
    /// # Errors
    ///
    /// [`crate::CoreError::Hydration`] if a stored value does not fit its field.
    pub fn hydrate(&self, row: Row) -> CoreResult<(Value, Value, Record)> {
        let record = Record::hydrate(self.schema, row.values)?;
        Ok((row.id, row.revision, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{ClauseBuilder, Comparator};
    use crate::config::Config;
    use crate::error::CoreError;
    use crate::schema::FieldDef;
    use std::sync::LazyLock;

    static NOTES: LazyLock<Schema> = LazyLock::new(|| {
        Schema::builder("note")
            .field(FieldDef::text("title").unique())
            .field(FieldDef::uint32("stars"))
            .build()
    });

    fn connections(store: &str) -> Vec<Connection> {
        let sqlite = Connection::open(&Config::sqlite_in_memory()).unwrap();
        let document = Connection::open(&Config::document_in_memory(store)).unwrap();
        for conn in [&sqlite, &document] {
            conn.install(&NOTES).unwrap();
        }
        vec![sqlite, document]
    }

    fn note(title: &str, stars: u32) -> Record {
        let mut record = Record::new(&NOTES);
        record.set("title", title).unwrap();
        record.set("stars", stars).unwrap();
        record
    }

    #[test]
    fn create_read_update_delete() {
        for (i, conn) in connections("object-crud").iter().enumerate() {
            let notes = DbObject::new(conn, &NOTES);
            let title = format!("crud-{i}");
            let created = notes.create(&note(&title, 1)).unwrap();
            assert_eq!(
                created.revision.is_unset(),
                !conn.capabilities().supports_revisions
            );

            let row = notes.read(&created.id).unwrap().unwrap();
            let (id, revision, record) = notes.hydrate(row).unwrap();
            assert_eq!(id, created.id);
            assert_eq!(revision, created.revision);
            assert_eq!(record, note(&title, 1));

            let mut changes = Record::new(&NOTES);
            changes.set("stars", 5u32).unwrap();
            let revision = notes.update(&id, &revision, &changes).unwrap();
            let (_, stored_revision, record) =
                notes.hydrate(notes.read(&id).unwrap().unwrap()).unwrap();
            assert_eq!(record.get("stars").unwrap(), &Value::UInt32(5));
            assert_eq!(stored_revision, revision);

            notes.delete(&id, &revision).unwrap();
            assert!(notes.read(&id).unwrap().is_none());
            assert!(matches!(
                notes.delete(&id, &revision),
                Err(CoreError::NotFound { .. })
            ));
        }
    }

    #[test]
    fn count_and_clause_queries() {
        for (i, conn) in connections("object-count").iter().enumerate() {
            let notes = DbObject::new(conn, &NOTES);
            for stars in 0..4 {
                notes.create(&note(&format!("count-{i}-{stars}"), stars)).unwrap();
            }
            let mut builder = ClauseBuilder::new(&NOTES);
            builder
                .add_comparison("stars", Comparator::GreaterOrEqual, 2)
                .unwrap()
                .add_comparison("title", Comparator::GreaterOrEqual, format!("count-{i}"))
                .unwrap();
            let tree = builder.build();
            assert_eq!(notes.count(&tree).unwrap(), 2);
            assert_eq!(notes.get_by_clause(&tree).unwrap().count(), 2);
        }
    }

    #[test]
    fn unique_violation_on_create() {
        for conn in &connections("object-unique") {
            let notes = DbObject::new(conn, &NOTES);
            let title = format!("unique-{}", conn.backend_name());
            notes.create(&note(&title, 1)).unwrap();
            assert!(matches!(
                notes.create(&note(&title, 2)),
                Err(CoreError::ConstraintViolation { .. })
            ));
        }
    }
}
