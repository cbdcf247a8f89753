//! Test fixtures and connection helpers.
//!
//! Provides temporary connections for each backend with automatic cleanup.

use kaspdb_core::{model, Config, Connection};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;

static NEXT_STORE: AtomicU64 = AtomicU64::new(0);

/// Returns a document-store name no other test in this process uses.
pub fn unique_store_name(prefix: &str) -> String {
    let n = NEXT_STORE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{n}", std::process::id())
}

/// The backend under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// SQLite database in a temporary file.
    Sqlite,
    /// Process-local document store.
    Document,
    /// Document store persisted to a temporary file.
    DocumentFile,
}

impl BackendKind {
    /// All backends, in the order [`for_each_backend`] visits them.
    pub const ALL: [BackendKind; 3] = [Self::Sqlite, Self::Document, Self::DocumentFile];
}

/// A connection to a fresh store with the built-in schemas installed.
pub struct TestConnection {
    /// The connection.
    pub conn: Connection,
    kind: BackendKind,
    config: Config,
    /// Kept alive so file stores survive until the fixture is dropped.
    temp_dir: Option<TempDir>,
}

impl TestConnection {
    /// Opens a fresh store of the given kind.
    pub fn new(kind: BackendKind) -> Self {
        Self::with_batch_size(kind, Config::DEFAULT_CURSOR_BATCH_SIZE)
    }

    /// Opens a fresh store with a specific cursor batch size.
    pub fn with_batch_size(kind: BackendKind, batch_size: usize) -> Self {
        let (config, temp_dir) = match kind {
            BackendKind::Sqlite => {
                let dir = TempDir::new().expect("Failed to create temp directory");
                (Config::sqlite(dir.path().join("kasp.db")), Some(dir))
            }
            BackendKind::Document => (
                Config::document_in_memory(unique_store_name("testkit")),
                None,
            ),
            BackendKind::DocumentFile => {
                let dir = TempDir::new().expect("Failed to create temp directory");
                (Config::document_file(dir.path().join("kasp.cbor")), Some(dir))
            }
        };
        let config = config.cursor_batch_size(batch_size);
        let conn = Connection::open(&config).expect("Failed to open test connection");
        model::install(&conn).expect("Failed to install schemas");
        Self {
            conn,
            kind,
            config,
            temp_dir,
        }
    }

    /// Returns the backend kind.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Returns the configuration the connection was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens a second, independent connection to the same store.
    pub fn second_handle(&self) -> Connection {
        Connection::open(&self.config).expect("Failed to open second connection")
    }

    /// Returns the backing file if the store is file based.
    pub fn path(&self) -> Option<PathBuf> {
        let dir = self.temp_dir.as_ref()?;
        Some(match self.kind {
            BackendKind::Sqlite => dir.path().join("kasp.db"),
            BackendKind::Document => return None,
            BackendKind::DocumentFile => dir.path().join("kasp.cbor"),
        })
    }

    /// Returns true if the backend tracks revisions.
    pub fn tracks_revisions(&self) -> bool {
        self.conn.capabilities().supports_revisions
    }
}

impl std::ops::Deref for TestConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::fmt::Debug for TestConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestConnection")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish()
    }
}

/// Runs `f` once against a fresh store of every backend kind.
///
/// # Example
///
/// ```rust,ignore
/// use kaspdb_testkit::for_each_backend;
///
/// #[test]
/// fn my_test() {
///     for_each_backend(|conn| {
///         let policy = Policy::create_named(conn, "default", None).unwrap();
///         // ... test operations
///     });
/// }
/// ```
pub fn for_each_backend<F>(mut f: F)
where
    F: FnMut(&TestConnection),
{
    for kind in BackendKind::ALL {
        let conn = TestConnection::new(kind);
        f(&conn);
    }
}

/// Runs `f` against a fresh store of the given kind.
pub fn with_backend<F, R>(kind: BackendKind, f: F) -> R
where
    F: FnOnce(&TestConnection) -> R,
{
    let conn = TestConnection::new(kind);
    f(&conn)
}
