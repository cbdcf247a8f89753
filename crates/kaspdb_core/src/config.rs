//! Connection configuration.
//!
//! Configuration arrives as a flat list of string pairs (for example
//! `backend = sqlite`, `file = kasp.db`) and is parsed into a typed
//! [`Config`] before connecting.

use crate::error::{CoreError, CoreResult};
use std::path::PathBuf;
use tracing::warn;

/// Ordered list of `name = value` configuration pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationList {
    entries: Vec<(String, String)>,
}

impl ConfigurationList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configuration pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or already present.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> CoreResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::configuration("option name must not be empty"));
        }
        if self.get(&name).is_some() {
            return Err(CoreError::configuration(format!(
                "option {name} given more than once"
            )));
        }
        self.entries.push((name, value.into()));
        Ok(())
    }

    /// Looks up the value of an option.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn require(&self, name: &str) -> CoreResult<&str> {
        self.get(name)
            .ok_or_else(|| CoreError::configuration(format!("missing option {name}")))
    }
}

/// Where a document store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    /// Process-local store; connections naming the same store share it.
    Memory(String),
    /// Store persisted to a file.
    File(PathBuf),
}

impl DocumentLocation {
    /// Parses a `memory://name` or `file:///path` URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for network or unknown schemes.
    pub fn parse(url: &str) -> CoreResult<Self> {
        if let Some(name) = url.strip_prefix("memory://") {
            if name.is_empty() {
                return Err(CoreError::configuration("memory:// url needs a store name"));
            }
            Ok(Self::Memory(name.to_string()))
        } else if let Some(path) = url.strip_prefix("file://") {
            if path.is_empty() {
                return Err(CoreError::configuration("file:// url needs a path"));
            }
            Ok(Self::File(PathBuf::from(path)))
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Err(CoreError::configuration(format!(
                "network transport not available for {url}"
            )))
        } else {
            Err(CoreError::configuration(format!(
                "unsupported document store url {url}"
            )))
        }
    }

    /// Returns the key used to share one store between connections.
    #[must_use]
    pub fn registry_key(&self) -> String {
        match self {
            Self::Memory(name) => format!("memory://{name}"),
            Self::File(path) => format!("file://{}", path.display()),
        }
    }
}

/// Which backend to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// SQLite database file (`:memory:` for a private in-memory database).
    Sqlite {
        /// Database file path.
        file: PathBuf,
    },
    /// Embedded document store.
    Document {
        /// Store location.
        location: DocumentLocation,
    },
}

/// Configuration for opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend selection and its location.
    pub backend: BackendConfig,

    /// Rows fetched per backend round trip while iterating a cursor.
    pub cursor_batch_size: usize,
}

impl Config {
    /// Default number of rows per cursor batch.
    pub const DEFAULT_CURSOR_BATCH_SIZE: usize = 64;

    /// Configuration for a SQLite database file.
    #[must_use]
    pub fn sqlite(file: impl Into<PathBuf>) -> Self {
        Self::with_backend(BackendConfig::Sqlite { file: file.into() })
    }

    /// Configuration for a private in-memory SQLite database.
    #[must_use]
    pub fn sqlite_in_memory() -> Self {
        Self::sqlite(":memory:")
    }

    /// Configuration for a named in-memory document store.
    #[must_use]
    pub fn document_in_memory(name: impl Into<String>) -> Self {
        Self::with_backend(BackendConfig::Document {
            location: DocumentLocation::Memory(name.into()),
        })
    }

    /// Configuration for a file-persisted document store.
    #[must_use]
    pub fn document_file(path: impl Into<PathBuf>) -> Self {
        Self::with_backend(BackendConfig::Document {
            location: DocumentLocation::File(path.into()),
        })
    }

    fn with_backend(backend: BackendConfig) -> Self {
        Self {
            backend,
            cursor_batch_size: Self::DEFAULT_CURSOR_BATCH_SIZE,
        }
    }

    /// Sets the cursor batch size (minimum 1).
    #[must_use]
    pub fn cursor_batch_size(mut self, size: usize) -> Self {
        self.cursor_batch_size = size.max(1);
        self
    }

    /// Parses a flat configuration list.
    ///
    /// Recognised options: `backend` (`sqlite`, `couchdb` or `document`),
    /// `file` (sqlite), `url` (document store) and `cursor_batch_size`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown backends, missing options
    /// or malformed values.
    pub fn from_list(list: &ConfigurationList) -> CoreResult<Self> {
        let backend = match list.require("backend")? {
            "sqlite" => BackendConfig::Sqlite {
                file: PathBuf::from(list.require("file")?),
            },
            "couchdb" | "document" => BackendConfig::Document {
                location: DocumentLocation::parse(list.require("url")?)?,
            },
            other => {
                return Err(CoreError::configuration(format!("unknown backend {other}")));
            }
        };

        let mut config = Self::with_backend(backend);
        if let Some(raw) = list.get("cursor_batch_size") {
            let size: usize = raw.parse().map_err(|_| {
                CoreError::configuration(format!("cursor_batch_size must be a number, got {raw}"))
            })?;
            if size == 0 {
                return Err(CoreError::configuration("cursor_batch_size must be positive"));
            }
            config.cursor_batch_size = size;
        }
        Ok(config)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigurationList {
    /// Collects pairs, keeping the first occurrence of a repeated name.
    /// Skipped pairs are logged.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = Self::new();
        for (name, value) in iter {
            if let Err(e) = list.add(name, value) {
                warn!(error = %e, "ignoring configuration option");
            }
        }
        list
    }
}
