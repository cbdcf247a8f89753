//! SQLite backend.
//!
//! One table per schema with an `INTEGER PRIMARY KEY AUTOINCREMENT` id.
//! Clause trees become parameterised `WHERE` fragments. Query cursors page
//! through the result by primary key (`"id" > last ORDER BY "id" LIMIT n`)
//! using a cached prepared statement that lives as long as the cursor.

use crate::backend::{Backend, Capabilities, NativeQuery, Outcome, RowSource, Statement};
use crate::clause::{Clause, ClauseTree, Comparator, Connective};
use crate::error::{CoreError, CoreResult};
use crate::record::{Record, Row};
use crate::schema::{FieldType, Schema};
use kaspdb_value::Value;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, CachedStatement, Connection, ErrorCode};
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, info};

const STATEMENT_CACHE_CAPACITY: usize = 32;

/// Backend over a SQLite database file or a private in-memory database.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
    batch_size: usize,
}

impl SqliteBackend {
    /// Opens the database at `path`; `:memory:` opens a private in-memory one.
    ///
    /// Foreign key enforcement is switched on for the connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connection`] if the database cannot be opened.
    pub fn open(path: &Path, batch_size: usize) -> CoreResult<Self> {
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| CoreError::connection(format!("cannot open {}: {e}", path.display())))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| CoreError::connection(format!("cannot enable foreign keys: {e}")))?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);

        info!(path = %path.display(), "opened sqlite database");
        Ok(Self {
            conn,
            batch_size: batch_size.max(1),
        })
    }

    fn insert(&self, schema: &'static Schema, record: &Record) -> CoreResult<Outcome> {
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for (field, value) in record.iter().filter(|(_, v)| !v.is_unset()) {
            columns.push(quote(field.name()));
            params.push(column_value(schema, field.name(), value)?);
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(schema.name()))
        } else {
            let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(schema.name()),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        debug!(entity = schema.name(), %sql, "execute");

        let rows = self
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())))
            .map_err(|e| map_error(schema, e))?;
        Ok(Outcome {
            rows_affected: rows as u64,
            id: Value::Int64(self.conn.last_insert_rowid()),
            revision: Value::Unset,
        })
    }

    fn update(&self, schema: &'static Schema, id: &Value, record: &Record) -> CoreResult<Outcome> {
        let key = integer_key(schema, id)?;
        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (field, value) in record.iter().filter(|(_, v)| !v.is_unset()) {
            params.push(column_value(schema, field.name(), value)?);
            assignments.push(format!("{} = ?{}", quote(field.name()), params.len()));
        }
        params.push(SqlValue::Integer(key));

        let sql = if assignments.is_empty() {
            format!("SELECT COUNT(*) FROM {} WHERE \"id\" = ?1", quote(schema.name()))
        } else {
            format!(
                "UPDATE {} SET {} WHERE \"id\" = ?{}",
                quote(schema.name()),
                assignments.join(", "),
                params.len()
            )
        };
        debug!(entity = schema.name(), %sql, "execute");

        let rows = if assignments.is_empty() {
            self.conn
                .query_row(&sql, [key], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
        } else {
            self.conn
                .prepare_cached(&sql)
                .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())))
        }
        .map_err(|e| map_error(schema, e))?;

        if rows == 0 {
            return Err(CoreError::not_found(schema.name(), id));
        }
        Ok(Outcome {
            rows_affected: rows as u64,
            id: Value::Int64(key),
            revision: Value::Unset,
        })
    }

    fn delete(&self, schema: &'static Schema, id: &Value) -> CoreResult<Outcome> {
        let key = integer_key(schema, id)?;
        let sql = format!("DELETE FROM {} WHERE \"id\" = ?1", quote(schema.name()));
        debug!(entity = schema.name(), %sql, "execute");

        let rows = self
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute([key]))
            .map_err(|e| map_error(schema, e))?;
        if rows == 0 {
            return Err(CoreError::not_found(schema.name(), id));
        }
        Ok(Outcome {
            rows_affected: rows as u64,
            id: Value::Int64(key),
            revision: Value::Unset,
        })
    }

    fn where_clause(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<(String, Vec<SqlValue>)> {
        tree.ensure_schema(schema)?;
        let (sql, params) = translate_tree(tree);
        Ok((sql, params.iter().map(param_value).collect()))
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_revisions: false,
            integer_keys: true,
        }
    }

    fn install(&self, schema: &'static Schema) -> CoreResult<()> {
        let ddl = create_table_sql(schema);
        debug!(entity = schema.name(), %ddl, "install");
        self.conn
            .execute_batch(&ddl)
            .map_err(|e| CoreError::connection(format!("cannot create {}: {e}", schema.name())))
    }

    fn is_installed(&self, schema: &'static Schema) -> CoreResult<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [schema.name()],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)
            .map_err(|e| map_error(schema, e))
    }

    fn execute(&self, schema: &'static Schema, statement: Statement<'_>) -> CoreResult<Outcome> {
        match statement {
            Statement::Insert { record } => self.insert(schema, record),
            Statement::Update { id, record, .. } => self.update(schema, id, record),
            Statement::Delete { id, .. } => self.delete(schema, id),
        }
    }

    fn query<'a>(
        &'a self,
        schema: &'static Schema,
        tree: &ClauseTree,
    ) -> CoreResult<Box<dyn RowSource + 'a>> {
        let (filter, params) = self.where_clause(schema, tree)?;
        let columns: Vec<String> = std::iter::once(quote(Schema::PRIMARY_KEY))
            .chain(schema.fields().iter().map(|f| quote(f.name())))
            .collect();
        let after = params.len() + 1;
        let sql = if filter.is_empty() {
            format!(
                "SELECT {} FROM {} WHERE \"id\" > ?{after} ORDER BY \"id\" LIMIT ?{}",
                columns.join(", "),
                quote(schema.name()),
                after + 1
            )
        } else {
            format!(
                "SELECT {} FROM {} WHERE ({filter}) AND \"id\" > ?{after} ORDER BY \"id\" LIMIT ?{}",
                columns.join(", "),
                quote(schema.name()),
                after + 1
            )
        };
        debug!(entity = schema.name(), %sql, "query");

        let statement = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| map_error(schema, e))?;
        Ok(Box::new(SqliteRows {
            statement: Some(statement),
            schema,
            params,
            batch_size: self.batch_size,
            buffer: VecDeque::new(),
            last_id: i64::MIN,
        }))
    }

    fn count(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<u64> {
        let (filter, params) = self.where_clause(schema, tree)?;
        let sql = if filter.is_empty() {
            format!("SELECT COUNT(*) FROM {}", quote(schema.name()))
        } else {
            format!("SELECT COUNT(*) FROM {} WHERE {filter}", quote(schema.name()))
        };
        debug!(entity = schema.name(), %sql, "count");

        let count: i64 = self
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.query_row(params_from_iter(params.iter()), |row| row.get(0)))
            .map_err(|e| map_error(schema, e))?;
        Ok(count.max(0) as u64)
    }

    fn translate(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<NativeQuery> {
        tree.ensure_schema(schema)?;
        let (sql, params) = translate_tree(tree);
        Ok(NativeQuery::Sql { sql, params })
    }
}

/// Keyset-paginated cursor over one query.
struct SqliteRows<'c> {
    statement: Option<CachedStatement<'c>>,
    schema: &'static Schema,
    params: Vec<SqlValue>,
    batch_size: usize,
    buffer: VecDeque<Row>,
    last_id: i64,
}

impl SqliteRows<'_> {
    fn fill(&mut self) -> CoreResult<()> {
        let Some(statement) = self.statement.as_mut() else {
            return Ok(());
        };
        let schema = self.schema;
        let mut params = self.params.clone();
        params.push(SqlValue::Integer(self.last_id));
        params.push(SqlValue::Integer(self.batch_size as i64));

        let mut fetched = 0;
        let mut rows = statement
            .query(params_from_iter(params.iter()))
            .map_err(|e| map_error(schema, e))?;
        while let Some(row) = rows.next().map_err(|e| map_error(schema, e))? {
            let id: i64 = row.get(0).map_err(|e| map_error(schema, e))?;
            let values = (1..=schema.fields().len())
                .map(|i| row.get_ref(i).map(native_value))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| map_error(schema, e))?;
            self.buffer.push_back(Row {
                id: Value::Int64(id),
                revision: Value::Unset,
                values,
            });
            self.last_id = id;
            fetched += 1;
        }
        drop(rows);

        debug!(entity = schema.name(), fetched, "fetched batch");
        if fetched < self.batch_size {
            self.statement = None;
        }
        Ok(())
    }
}

impl RowSource for SqliteRows<'_> {
    fn fetch(&mut self) -> CoreResult<Option<Row>> {
        if self.buffer.is_empty() {
            if let Err(e) = self.fill() {
                self.close();
                return Err(e);
            }
        }
        Ok(self.buffer.pop_front())
    }

    fn close(&mut self) {
        self.statement = None;
        self.buffer.clear();
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "TEXT",
        FieldType::Binary => "BLOB",
        FieldType::Int32
        | FieldType::UInt32
        | FieldType::Int64
        | FieldType::UInt64
        | FieldType::Enum(_)
        | FieldType::Key => "INTEGER",
    }
}

fn create_table_sql(schema: &Schema) -> String {
    let mut columns = vec![format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote(Schema::PRIMARY_KEY)
    )];
    for field in schema.fields() {
        let mut column = format!("{} {}", quote(field.name()), column_type(field.field_type()));
        if !field.is_nullable() {
            column.push_str(" NOT NULL");
        }
        if field.is_unique() {
            column.push_str(" UNIQUE");
        }
        if let Some(target) = field.references() {
            column.push_str(&format!(
                " REFERENCES {}({})",
                quote(target),
                quote(Schema::PRIMARY_KEY)
            ));
        }
        columns.push(column);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        quote(schema.name()),
        columns.join(",\n    ")
    )
}

fn integer_key(schema: &Schema, id: &Value) -> CoreResult<i64> {
    id.to_i64().ok_or_else(|| CoreError::not_found(schema.name(), id))
}

/// Converts a field value for storage.
fn column_value(schema: &Schema, field: &str, value: &Value) -> CoreResult<SqlValue> {
    match value {
        Value::UInt64(n) => i64::try_from(*n).map(SqlValue::Integer).map_err(|_| {
            CoreError::constraint_violation(
                schema.name(),
                format!("{field} value {n} exceeds the sqlite integer range"),
            )
        }),
        other => Ok(param_value(other)),
    }
}

/// Converts a query parameter. Unsigned values past the integer range are
/// compared as reals.
fn param_value(value: &Value) -> SqlValue {
    match value {
        Value::Unset | Value::Null => SqlValue::Null,
        Value::Int32(n) => SqlValue::Integer(i64::from(*n)),
        Value::UInt32(n) => SqlValue::Integer(i64::from(*n)),
        Value::Int64(n) => SqlValue::Integer(*n),
        Value::UInt64(n) => {
            i64::try_from(*n).map_or(SqlValue::Real(*n as f64), SqlValue::Integer)
        }
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Binary(b) => SqlValue::Blob(b.clone()),
        Value::Enum(e) => SqlValue::Integer(i64::from(e.code)),
    }
}

fn native_value(raw: ValueRef<'_>) -> Value {
    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int64(n),
        ValueRef::Real(r) => Value::Text(r.to_string()),
        ValueRef::Text(t) => std::str::from_utf8(t)
            .map_or_else(|_| Value::Binary(t.to_vec()), Value::from),
        ValueRef::Blob(b) => Value::Binary(b.to_vec()),
    }
}

fn map_error(schema: &Schema, err: rusqlite::Error) -> CoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => {
            CoreError::constraint_violation(schema.name(), err.to_string())
        }
        _ => CoreError::connection(err.to_string()),
    }
}

fn translate_tree(tree: &ClauseTree) -> (String, Vec<Value>) {
    let mut sql = String::new();
    let mut params = Vec::new();
    if let Some(root) = tree.root() {
        write_clause(root, &mut sql, &mut params);
    }
    (sql, params)
}

fn write_clause(clause: &Clause, sql: &mut String, params: &mut Vec<Value>) {
    match clause {
        Clause::Compare {
            field, op, operand, ..
        } => {
            let column = quote(field);
            match op {
                Comparator::IsNull => sql.push_str(&format!("{column} IS NULL")),
                Comparator::IsNotNull => sql.push_str(&format!("{column} IS NOT NULL")),
                Comparator::Contains => {
                    params.push(operand.clone());
                    sql.push_str(&format!("instr({column}, ?{}) > 0", params.len()));
                }
                op => {
                    params.push(operand.clone());
                    let symbol = match op {
                        Comparator::NotEqual => "<>",
                        other => other.symbol(),
                    };
                    sql.push_str(&format!("{column} {symbol} ?{}", params.len()));
                }
            }
        }
        Clause::Group {
            connective: Connective::Not,
            children,
        } => {
            for child in children {
                sql.push_str("NOT (");
                write_clause(child, sql, params);
                sql.push(')');
            }
        }
        Clause::Group {
            connective,
            children,
        } => {
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    sql.push_str(&format!(" {connective} "));
                }
                sql.push('(');
                write_clause(child, sql, params);
                sql.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::ClauseBuilder;
    use crate::enumeration::EnumSet;
    use crate::schema::FieldDef;
    use std::sync::LazyLock;

    static ROLES: LazyLock<EnumSet> =
        LazyLock::new(|| EnumSet::new("role", &[("KSK", 1), ("ZSK", 2)]));

    static OWNERS: LazyLock<Schema> = LazyLock::new(|| {
        Schema::builder("owner")
            .field(FieldDef::text("name").unique())
            .build()
    });

    static ITEMS: LazyLock<Schema> = LazyLock::new(|| {
        Schema::builder("item")
            .field(FieldDef::foreign_key("owner_id", "owner"))
            .field(FieldDef::uint32("bits"))
            .field(FieldDef::enumeration("role", &ROLES))
            .field(FieldDef::text("note").nullable())
            .build()
    });

    fn backend(batch_size: usize) -> SqliteBackend {
        let backend = SqliteBackend::open(Path::new(":memory:"), batch_size).unwrap();
        backend.install(&OWNERS).unwrap();
        backend.install(&ITEMS).unwrap();
        backend
    }

    fn owner(backend: &SqliteBackend, name: &str) -> Value {
        let mut record = Record::new(&OWNERS);
        record.set("name", name).unwrap();
        backend
            .execute(&OWNERS, Statement::Insert { record: &record })
            .unwrap()
            .id
    }

    fn item(backend: &SqliteBackend, owner: &Value, bits: u32, note: Option<&str>) -> Value {
        let mut record = Record::new(&ITEMS);
        record.set("owner_id", owner.clone()).unwrap();
        record.set("bits", bits).unwrap();
        record.set("role", "KSK").unwrap();
        record.set("note", note).unwrap();
        backend
            .execute(&ITEMS, Statement::Insert { record: &record })
            .unwrap()
            .id
    }

    fn collect(source: &mut dyn RowSource) -> Vec<Row> {
        let mut rows = Vec::new();
        while let Some(row) = source.fetch().unwrap() {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn ddl_declares_constraints() {
        let ddl = create_table_sql(&ITEMS);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"item\""));
        assert!(ddl.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(ddl.contains("\"owner_id\" INTEGER NOT NULL REFERENCES \"owner\"(\"id\")"));
        assert!(ddl.contains("\"note\" TEXT,") || ddl.contains("\"note\" TEXT\n"));
        assert!(create_table_sql(&OWNERS).contains("\"name\" TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn install_is_visible() {
        let backend = SqliteBackend::open(Path::new(":memory:"), 8).unwrap();
        assert!(!backend.is_installed(&OWNERS).unwrap());
        backend.install(&OWNERS).unwrap();
        assert!(backend.is_installed(&OWNERS).unwrap());
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let backend = backend(8);
        let a = owner(&backend, "a");
        let b = owner(&backend, "b");
        assert!(matches!((a, b), (Value::Int64(x), Value::Int64(y)) if y > x));
    }

    #[test]
    fn translation_is_parameterised_and_deterministic() {
        let backend = backend(8);
        let mut builder = ClauseBuilder::new(&ITEMS);
        let low = builder.leaf("bits", Comparator::LessThan, 1024).unwrap();
        let note = builder.leaf("note", Comparator::Contains, "x").unwrap();
        builder
            .add_equals("role", "ZSK")
            .unwrap()
            .add_connective(Connective::Or, vec![low, note.clone()])
            .unwrap()
            .add_connective(Connective::Not, vec![note])
            .unwrap()
            .add_equals("note", Value::Null)
            .unwrap();
        let tree = builder.build();

        let first = backend.translate(&ITEMS, &tree).unwrap();
        assert_eq!(first, backend.translate(&ITEMS, &tree).unwrap());
        let NativeQuery::Sql { sql, params } = first else {
            panic!("expected sql");
        };
        assert_eq!(
            sql,
            "(\"role\" = ?1) AND ((\"bits\" < ?2) OR (instr(\"note\", ?3) > 0)) \
             AND (NOT (instr(\"note\", ?4) > 0)) AND (\"note\" IS NULL)"
        );
        assert_eq!(params.len(), 4);
        assert_eq!(param_value(&params[0]), SqlValue::Integer(2));
    }

    #[test]
    fn cursor_pages_through_all_matches() {
        let backend = backend(2);
        let owner = owner(&backend, "o");
        for bits in 0..7 {
            item(&backend, &owner, bits, None);
        }
        let mut builder = ClauseBuilder::new(&ITEMS);
        builder
            .add_comparison("bits", Comparator::GreaterOrEqual, 2)
            .unwrap();
        let tree = builder.build();

        let mut source = backend.query(&ITEMS, &tree).unwrap();
        let rows = collect(source.as_mut());
        let bits: Vec<_> = rows.iter().map(|r| r.values[1].clone()).collect();
        assert_eq!(
            bits,
            (2..7).map(Value::Int64).collect::<Vec<_>>()
        );
        assert!(rows.iter().all(|r| r.revision.is_unset()));
        assert_eq!(backend.count(&ITEMS, &tree).unwrap(), 5);
        assert_eq!(backend.count(&ITEMS, &ClauseTree::all(&ITEMS)).unwrap(), 7);
    }

    #[test]
    fn enums_are_stored_as_codes() {
        let backend = backend(8);
        let owner = owner(&backend, "o");
        item(&backend, &owner, 1, Some("n"));
        let mut source = backend.query(&ITEMS, &ClauseTree::all(&ITEMS)).unwrap();
        let row = source.fetch().unwrap().unwrap();
        assert_eq!(row.values[2], Value::Int64(1));
        assert_eq!(row.values[3], Value::Text("n".into()));
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let backend = backend(8);
        let id = owner(&backend, "a");
        let mut record = Record::new(&OWNERS);
        record.set("name", "renamed").unwrap();
        let revision = Value::Unset;

        let outcome = backend
            .execute(
                &OWNERS,
                Statement::Update {
                    id: &id,
                    revision: &revision,
                    record: &record,
                },
            )
            .unwrap();
        assert_eq!(outcome.rows_affected, 1);

        backend
            .execute(&OWNERS, Statement::Delete { id: &id, revision: &revision })
            .unwrap();
        let err = backend
            .execute(&OWNERS, Statement::Delete { id: &id, revision: &revision })
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        let err = backend
            .execute(
                &OWNERS,
                Statement::Update {
                    id: &id,
                    revision: &revision,
                    record: &record,
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn constraints_map_to_constraint_violation() {
        let backend = backend(8);
        owner(&backend, "dup");
        let mut record = Record::new(&OWNERS);
        record.set("name", "dup").unwrap();
        let err = backend
            .execute(&OWNERS, Statement::Insert { record: &record })
            .unwrap_err();
        assert!(matches!(err, CoreError::ConstraintViolation { .. }));

        let empty = Record::new(&OWNERS);
        let err = backend
            .execute(&OWNERS, Statement::Insert { record: &empty })
            .unwrap_err();
        assert!(matches!(err, CoreError::ConstraintViolation { .. }));

        let missing_owner = Value::Int64(999);
        let mut record = Record::new(&ITEMS);
        record.set("owner_id", missing_owner).unwrap();
        record.set("bits", 1u32).unwrap();
        record.set("role", "KSK").unwrap();
        let err = backend
            .execute(&ITEMS, Statement::Insert { record: &record })
            .unwrap_err();
        assert!(matches!(err, CoreError::ConstraintViolation { .. }));
    }

    #[test]
    fn foreign_clause_tree_is_rejected() {
        let backend = backend(8);
        let tree = ClauseTree::all(&OWNERS);
        assert!(matches!(
            backend.query(&ITEMS, &tree).err(),
            Some(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn oversized_unsigned_is_rejected_for_storage() {
        static WIDE: LazyLock<Schema> = LazyLock::new(|| {
            Schema::builder("wide").field(FieldDef::uint64("n")).build()
        });
        let backend = SqliteBackend::open(Path::new(":memory:"), 8).unwrap();
        backend.install(&WIDE).unwrap();
        let mut record = Record::new(&WIDE);
        record.set("n", u64::MAX).unwrap();
        let err = backend
            .execute(&WIDE, Statement::Insert { record: &record })
            .unwrap_err();
        assert!(matches!(err, CoreError::ConstraintViolation { .. }));
    }
}
