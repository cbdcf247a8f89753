//! Backend driver interface.
//!
//! A backend owns one physical store and knows how to translate schemas,
//! records and clause trees into its native form. The engine only talks to
//! the [`Backend`] trait; the two implementations are chosen at connection
//! time from the configuration.
//!
//! ## Native representations
//!
//! | concept   | sqlite                         | document store               |
//! |-----------|--------------------------------|------------------------------|
//! | id        | `INTEGER PRIMARY KEY` (Int64)  | UUID text                    |
//! | revision  | none (always unset)            | `<generation>-<digest>` text |
//! | enum      | integer code                   | symbolic text                |
//! | predicate | parameterised `WHERE` fragment | [`document::Selector`]       |

pub mod document;
pub mod sqlite;

pub use document::DocumentBackend;
pub use sqlite::SqliteBackend;

use crate::clause::ClauseTree;
use crate::error::CoreResult;
use crate::record::{Record, Row};
use crate::schema::Schema;
use kaspdb_value::Value;

/// What a backend can do beyond the common contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Updates and deletes are checked against a revision token.
    pub supports_revisions: bool,
    /// Primary keys are integers assigned by the store.
    pub integer_keys: bool,
}

/// A single mutating request.
#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    /// Insert a new record; unset fields are left to the store.
    Insert {
        /// Field values.
        record: &'a Record,
    },
    /// Overwrite the set fields of an existing record.
    Update {
        /// Primary key.
        id: &'a Value,
        /// Revision the caller last saw; ignored without revision support.
        revision: &'a Value,
        /// Field values; unset fields keep their stored value.
        record: &'a Record,
    },
    /// Remove a record.
    Delete {
        /// Primary key.
        id: &'a Value,
        /// Revision the caller last saw; ignored without revision support.
        revision: &'a Value,
    },
}

impl Statement<'_> {
    /// Returns a short verb for logging.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Result of executing a [`Statement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Number of records written or removed.
    pub rows_affected: u64,
    /// Identity of the affected record.
    pub id: Value,
    /// Revision after the statement; unset without revision support or after delete.
    pub revision: Value,
}

/// A clause tree translated to a backend's query language.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQuery {
    /// SQL `WHERE` fragment with positional parameters.
    Sql {
        /// Fragment text using `?N` placeholders, empty for all rows.
        sql: String,
        /// Parameter values in placeholder order.
        params: Vec<Value>,
    },
    /// Document-store selector.
    Selector(document::Selector),
}

/// Forward-only source of raw rows behind a result cursor.
///
/// Implementations hold whatever backend resource the query needs and must
/// release it in [`RowSource::close`] and on drop.
pub trait RowSource {
    /// Returns the next row, `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Connection`] if the backend fails mid-stream.
    fn fetch(&mut self) -> CoreResult<Option<Row>>;

    /// Releases the backend resource; later fetches return `None`.
    fn close(&mut self);
}

/// A storage backend.
///
/// One backend value is one physical connection. It may be moved between
/// threads but is not shared; callers serialise access.
pub trait Backend: Send {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Capability set of this backend.
    fn capabilities(&self) -> Capabilities;

    /// Creates storage for a schema if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Connection`] on storage failure.
    fn install(&self, schema: &'static Schema) -> CoreResult<()>;

    /// Returns true if storage for a schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Connection`] on storage failure.
    fn is_installed(&self, schema: &'static Schema) -> CoreResult<bool>;

    /// Executes one mutating statement.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation`, `NotFound`, `RevisionConflict` or `Connection`.
    fn execute(&self, schema: &'static Schema, statement: Statement<'_>) -> CoreResult<Outcome>;

    /// Starts a query; rows are produced lazily.
    ///
    /// # Errors
    ///
    /// `UnsupportedPredicate` if the tree cannot be translated, `Connection`
    /// on storage failure.
    fn query<'a>(
        &'a self,
        schema: &'static Schema,
        tree: &ClauseTree,
    ) -> CoreResult<Box<dyn RowSource + 'a>>;

    /// Counts matching records without materialising them.
    ///
    /// # Errors
    ///
    /// Same as [`Backend::query`].
    fn count(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<u64>;

    /// Translates a clause tree to this backend's native query form.
    ///
    /// Translation is deterministic: the same tree always yields the same
    /// native query.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPredicate` for operators the backend cannot express.
    fn translate(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<NativeQuery>;
}
