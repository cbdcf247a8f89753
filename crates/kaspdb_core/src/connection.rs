//! Connections to a configured backend.

use crate::backend::{
    Backend, Capabilities, DocumentBackend, NativeQuery, Outcome, SqliteBackend, Statement,
};
use crate::clause::ClauseTree;
use crate::config::{BackendConfig, Config};
use crate::cursor::ResultCursor;
use crate::error::CoreResult;
use crate::schema::Schema;
use std::fmt;
use tracing::info;

/// An open connection to one physical store.
///
/// A connection can be moved to another thread but not shared between
/// threads; use one connection per worker or guard it with a lock.
/// Several connections to the same store may be used concurrently.
pub struct Connection {
    backend: Box<dyn Backend>,
}

impl Connection {
    /// Connects using the given configuration.
    ///
    /// Either a usable connection is returned or nothing is left open.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Connection`] if the store cannot be opened.
    pub fn open(config: &Config) -> CoreResult<Self> {
        let backend: Box<dyn Backend> = match &config.backend {
            BackendConfig::Sqlite { file } => {
                Box::new(SqliteBackend::open(file, config.cursor_batch_size)?)
            }
            BackendConfig::Document { location } => {
                Box::new(DocumentBackend::open(location, config.cursor_batch_size)?)
            }
        };
        info!(backend = backend.name(), "connection established");
        Ok(Self { backend })
    }

    /// Wraps an already constructed backend.
    #[must_use]
    pub fn from_backend(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Returns the backend name.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Returns the backend capabilities.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    /// Creates storage for a schema if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the storage.
    pub fn install(&self, schema: &'static Schema) -> CoreResult<()> {
        self.backend.install(schema)?;
        info!(backend = self.backend.name(), entity = schema.name(), "installed schema");
        Ok(())
    }

    /// Returns true if storage for a schema exists.
    ///
    /// # Errors
    ///
    /// See [`Backend::is_installed`].
    pub fn is_installed(&self, schema: &'static Schema) -> CoreResult<bool> {
        self.backend.is_installed(schema)
    }

    /// Executes one mutating statement.
    ///
    /// # Errors
    ///
    /// See [`Backend::execute`].
    pub fn execute(&self, schema: &'static Schema, statement: Statement<'_>) -> CoreResult<Outcome> {
        self.backend.execute(schema, statement)
    }

    /// Runs a query and returns a lazy cursor over the raw rows.
    ///
    /// # Errors
    ///
    /// See [`Backend::query`].
    pub fn query(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<ResultCursor<'_>> {
        let source = self.backend.query(schema, tree)?;
        Ok(ResultCursor::new(schema, source))
    }

    /// Counts matching records.
    ///
    /// # Errors
    ///
    /// See [`Backend::count`].
    pub fn count(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<u64> {
        self.backend.count(schema, tree)
    }

    /// Translates a clause tree to the backend's native query.
    ///
    /// # Errors
    ///
    /// See [`Backend::translate`].
    pub fn translate(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<NativeQuery> {
        self.backend.translate(schema, tree)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationList;
    use crate::error::CoreError;
    use tempfile::tempdir;

    #[test]
    fn opens_each_backend() {
        let conn = Connection::open(&Config::sqlite_in_memory()).unwrap();
        assert_eq!(conn.backend_name(), "sqlite");
        assert!(!conn.capabilities().supports_revisions);

        let conn = Connection::open(&Config::document_in_memory("connection-test")).unwrap();
        assert_eq!(conn.backend_name(), "document");
        assert!(conn.capabilities().supports_revisions);
    }

    #[test]
    fn opens_from_configuration_list() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("kasp.db");
        let list: ConfigurationList = [
            ("backend", "sqlite"),
            ("file", file.to_str().unwrap()),
        ]
        .into_iter()
        .collect();
        let conn = Connection::open(&Config::from_list(&list).unwrap()).unwrap();
        assert_eq!(conn.backend_name(), "sqlite");
    }

    #[test]
    fn unreachable_store_fails_atomically() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("missing-dir").join("kasp.db");
        let err = Connection::open(&Config::sqlite(file)).unwrap_err();
        assert!(matches!(err, CoreError::Connection { .. }));
    }

    #[test]
    fn connection_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Connection>();
    }
}
