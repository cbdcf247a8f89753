//! Document-store backend.
//!
//! Records are documents with UUID text ids and revision tokens. All
//! connections naming the same location share one [`DocumentStore`], so
//! concurrent writers observe each other through revision conflicts.

mod selector;
mod store;

pub use selector::{Selector, SelectorOp};
pub use store::{DocumentStore, SharedStore, StoredDocument};

use crate::backend::{Backend, Capabilities, NativeQuery, Outcome, RowSource, Statement};
use crate::clause::ClauseTree;
use crate::config::DocumentLocation;
use crate::error::{CoreError, CoreResult};
use crate::record::{Record, Row};
use crate::schema::Schema;
use kaspdb_value::Value;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

const NAME: &str = "document";

/// Backend over an embedded document store.
pub struct DocumentBackend {
    store: SharedStore,
    location: DocumentLocation,
    batch_size: usize,
}

impl std::fmt::Debug for DocumentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBackend")
            .field("location", &self.location)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl DocumentBackend {
    /// Connects to the store at `location`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file store cannot be locked or decoded.
    pub fn open(location: &DocumentLocation, batch_size: usize) -> CoreResult<Self> {
        let store = store::shared(location)?;
        info!(location = %location.registry_key(), "connected to document store");
        Ok(Self {
            store,
            location: location.clone(),
            batch_size: batch_size.max(1),
        })
    }

    /// Returns the location this backend is connected to.
    #[must_use]
    pub fn location(&self) -> &DocumentLocation {
        &self.location
    }

    fn document_id<'v>(schema: &Schema, id: &'v Value) -> CoreResult<&'v str> {
        id.as_text()
            .map_err(|_| CoreError::not_found(schema.name(), id))
    }
}

fn body_of(record: &Record) -> BTreeMap<String, Value> {
    store::native_fields(record.iter().map(|(field, value)| (field.name(), value)))
}

impl Backend for DocumentBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_revisions: true,
            integer_keys: false,
        }
    }

    fn install(&self, schema: &'static Schema) -> CoreResult<()> {
        debug!(entity = schema.name(), "install collection");
        self.store.lock().install(schema)
    }

    fn is_installed(&self, schema: &'static Schema) -> CoreResult<bool> {
        Ok(self.store.lock().has_collection(schema.name()))
    }

    fn execute(&self, schema: &'static Schema, statement: Statement<'_>) -> CoreResult<Outcome> {
        let mut store = self.store.lock();
        match statement {
            Statement::Insert { record } => {
                let (id, revision) = store.insert(schema, body_of(record))?;
                Ok(Outcome {
                    rows_affected: 1,
                    id: Value::Text(id),
                    revision: Value::Text(revision),
                })
            }
            Statement::Update {
                id,
                revision,
                record,
            } => {
                let key = Self::document_id(schema, id)?;
                let revision = store.update(schema, key, revision, body_of(record))?;
                Ok(Outcome {
                    rows_affected: 1,
                    id: id.clone(),
                    revision: Value::Text(revision),
                })
            }
            Statement::Delete { id, revision } => {
                let key = Self::document_id(schema, id)?;
                store.delete(schema, key, revision)?;
                Ok(Outcome {
                    rows_affected: 1,
                    id: id.clone(),
                    revision: Value::Unset,
                })
            }
        }
    }

    fn query<'a>(
        &'a self,
        schema: &'static Schema,
        tree: &ClauseTree,
    ) -> CoreResult<Box<dyn RowSource + 'a>> {
        tree.ensure_schema(schema)?;
        let selector = Selector::from_tree(NAME, tree)?;
        debug!(entity = schema.name(), %selector, "query");
        Ok(Box::new(DocumentRows {
            store: Some(&self.store),
            schema,
            selector,
            batch_size: self.batch_size,
            after: None,
            buffer: VecDeque::new(),
        }))
    }

    fn count(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<u64> {
        tree.ensure_schema(schema)?;
        let selector = Selector::from_tree(NAME, tree)?;
        debug!(entity = schema.name(), %selector, "count");
        Ok(self.store.lock().count(schema.name(), &selector))
    }

    fn translate(&self, schema: &'static Schema, tree: &ClauseTree) -> CoreResult<NativeQuery> {
        tree.ensure_schema(schema)?;
        Selector::from_tree(NAME, tree).map(NativeQuery::Selector)
    }
}

/// Cursor paging through a collection by document id.
struct DocumentRows<'c> {
    store: Option<&'c SharedStore>,
    schema: &'static Schema,
    selector: Selector,
    batch_size: usize,
    after: Option<String>,
    buffer: VecDeque<Row>,
}

impl DocumentRows<'_> {
    fn fill(&mut self) {
        let Some(store) = self.store else {
            return;
        };
        let page = store.lock().page(
            self.schema.name(),
            &self.selector,
            self.after.as_deref(),
            self.batch_size,
        );
        debug!(entity = self.schema.name(), fetched = page.len(), "fetched batch");
        if page.len() < self.batch_size {
            self.store = None;
        }
        for (id, document) in page {
            let values = self
                .schema
                .fields()
                .iter()
                .map(|f| document.body.get(f.name()).cloned().unwrap_or_default())
                .collect();
            self.after = Some(id.clone());
            self.buffer.push_back(Row {
                id: Value::Text(id),
                revision: Value::Text(document.revision),
                values,
            });
        }
    }
}

impl RowSource for DocumentRows<'_> {
    fn fetch(&mut self) -> CoreResult<Option<Row>> {
        if self.buffer.is_empty() {
            self.fill();
        }
        Ok(self.buffer.pop_front())
    }

    fn close(&mut self) {
        self.store = None;
        self.buffer.clear();
    }
}
