//! Embedded document store.
//!
//! Documents live in per-schema collections ordered by id. Every mutation
//! produces a new revision token; updates and deletes must present the
//! current token. A file-backed store writes a CBOR snapshot of all
//! collections after each mutation (temp file, then rename) and holds an
//! exclusive lock on `<path>.lock` while open.

use super::selector::{native, Selector};
use crate::config::DocumentLocation;
use crate::error::{CoreError, CoreResult};
use crate::schema::Schema;
use fs2::FileExt;
use kaspdb_value::{from_cbor, to_cbor, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};
use tracing::{debug, info};
use uuid::Uuid;

/// A shared handle to a store.
pub type SharedStore = Arc<Mutex<DocumentStore>>;

static REGISTRY: LazyLock<Mutex<HashMap<String, Weak<Mutex<DocumentStore>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Returns the open store for a location, opening it if no connection holds it.
///
/// # Errors
///
/// Returns an error if a file store cannot be locked or decoded.
pub fn shared(location: &DocumentLocation) -> CoreResult<SharedStore> {
    let key = location.registry_key();
    let mut registry = REGISTRY.lock();
    if let Some(store) = registry.get(&key).and_then(Weak::upgrade) {
        return Ok(store);
    }
    let store = match location {
        DocumentLocation::Memory(_) => DocumentStore::in_memory(),
        DocumentLocation::File(path) => DocumentStore::open(path)?,
    };
    let store = Arc::new(Mutex::new(store));
    registry.retain(|_, weak| weak.strong_count() > 0);
    registry.insert(key, Arc::downgrade(&store));
    Ok(store)
}

/// One stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Number of writes since creation, starting at 1.
    pub generation: u64,
    /// Current revision token.
    pub revision: String,
    /// Field values in native form; unset fields are absent.
    pub body: BTreeMap<String, Value>,
}

type Collection = BTreeMap<String, StoredDocument>;

/// Foreign key fields per collection, as `(field, target collection)`.
type References = BTreeMap<String, Vec<(String, String)>>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    collections: BTreeMap<String, Collection>,
    #[serde(default)]
    references: References,
}

#[derive(Debug)]
struct Persistence {
    path: PathBuf,
    _lock: File,
}

/// Collections of documents with revision tracking.
#[derive(Debug, Default)]
pub struct DocumentStore {
    collections: BTreeMap<String, Collection>,
    references: References,
    persistence: Option<Persistence>,
}

impl DocumentStore {
    /// Creates an empty store that lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens or creates a file-backed store.
    ///
    /// # Errors
    ///
    /// [`CoreError::Connection`] if the file is locked by another process or
    /// cannot be read, [`CoreError::Corrupted`] if it cannot be decoded.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let lock_path = sibling(path, "lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| CoreError::connection(format!("cannot open {}: {e}", lock_path.display())))?;
        lock.try_lock_exclusive().map_err(|_| {
            CoreError::connection(format!("{} is locked by another process", path.display()))
        })?;

        let snapshot = if path.exists() {
            let bytes = fs::read(path)
                .map_err(|e| CoreError::connection(format!("cannot read {}: {e}", path.display())))?;
            from_cbor::<Snapshot>(&bytes).map_err(|e| {
                CoreError::corrupted(format!("{}: {e}", path.display()))
            })?
        } else {
            Snapshot::default()
        };

        info!(
            path = %path.display(),
            collections = snapshot.collections.len(),
            "opened document store"
        );
        Ok(Self {
            collections: snapshot.collections,
            references: snapshot.references,
            persistence: Some(Persistence {
                path: path.to_path_buf(),
                _lock: lock,
            }),
        })
    }

    /// Creates the collection for a schema and records its constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn install(&mut self, schema: &'static Schema) -> CoreResult<()> {
        let references: Vec<(String, String)> = schema
            .foreign_keys()
            .filter_map(|fk| Some((fk.name().to_string(), fk.references()?.to_string())))
            .collect();
        let known = self.collections.contains_key(schema.name())
            && self.references.get(schema.name()).map_or(references.is_empty(), |r| *r == references);
        if known {
            return Ok(());
        }

        let created = !self.collections.contains_key(schema.name());
        if created {
            self.collections.insert(schema.name().to_string(), Collection::new());
        }
        let previous = if references.is_empty() {
            self.references.remove(schema.name())
        } else {
            self.references.insert(schema.name().to_string(), references)
        };
        if let Err(e) = self.persist() {
            if created {
                self.collections.remove(schema.name());
            }
            match previous {
                Some(previous) => self.references.insert(schema.name().to_string(), previous),
                None => self.references.remove(schema.name()),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Returns true if a collection exists.
    #[must_use]
    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    /// Returns a stored document.
    #[must_use]
    pub fn get(&self, collection: &str, id: &str) -> Option<&StoredDocument> {
        self.collections.get(collection).and_then(|c| c.get(id))
    }

    /// Inserts a new document; returns its id and revision.
    ///
    /// # Errors
    ///
    /// [`CoreError::ConstraintViolation`] for missing required fields,
    /// duplicate unique values or dangling references.
    pub fn insert(
        &mut self,
        schema: &'static Schema,
        fields: BTreeMap<String, Value>,
    ) -> CoreResult<(String, String)> {
        let id = Uuid::new_v4().to_string();
        self.validate(schema, &id, &fields)?;
        let document = StoredDocument {
            generation: 1,
            revision: revision_token(1, &fields)?,
            body: fields,
        };
        let revision = document.revision.clone();

        self.collection_mut(schema)?.insert(id.clone(), document);
        if let Err(e) = self.persist() {
            self.collection_mut(schema)?.remove(&id);
            return Err(e);
        }
        debug!(entity = schema.name(), %id, %revision, "inserted document");
        Ok((id, revision))
    }

    /// Merges `fields` into an existing document; returns the new revision.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`], [`CoreError::RevisionConflict`] if `revision`
    /// is not the stored one, or a constraint violation.
    pub fn update(
        &mut self,
        schema: &'static Schema,
        id: &str,
        revision: &Value,
        fields: BTreeMap<String, Value>,
    ) -> CoreResult<String> {
        let current = self.current(schema, id, revision)?.clone();
        let mut body = current.body.clone();
        body.extend(fields);
        self.validate(schema, id, &body)?;

        let generation = current.generation + 1;
        let document = StoredDocument {
            generation,
            revision: revision_token(generation, &body)?,
            body,
        };
        let new_revision = document.revision.clone();

        self.collection_mut(schema)?.insert(id.to_string(), document);
        if let Err(e) = self.persist() {
            self.collection_mut(schema)?.insert(id.to_string(), current);
            return Err(e);
        }
        debug!(entity = schema.name(), %id, revision = %new_revision, "updated document");
        Ok(new_revision)
    }

    /// Removes a document.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`], [`CoreError::RevisionConflict`], or
    /// [`CoreError::ConstraintViolation`] while other documents reference it.
    pub fn delete(&mut self, schema: &'static Schema, id: &str, revision: &Value) -> CoreResult<()> {
        self.current(schema, id, revision)?;
        if let Some(referrer) = self.referrer_of(schema, id) {
            return Err(CoreError::constraint_violation(
                schema.name(),
                format!("{id} is still referenced by {referrer}"),
            ));
        }

        let removed = self.collection_mut(schema)?.remove(id);
        if let Err(e) = self.persist() {
            if let Some(document) = removed {
                self.collection_mut(schema)?.insert(id.to_string(), document);
            }
            return Err(e);
        }
        debug!(entity = schema.name(), %id, "deleted document");
        Ok(())
    }

    /// Returns up to `limit` matching documents with ids after `after`, in id order.
    #[must_use]
    pub fn page(
        &self,
        collection: &str,
        selector: &Selector,
        after: Option<&str>,
        limit: usize,
    ) -> Vec<(String, StoredDocument)> {
        let Some(documents) = self.collections.get(collection) else {
            return Vec::new();
        };
        let lower = after.map_or(Bound::Unbounded, |id| Bound::Excluded(id.to_string()));
        documents
            .range((lower, Bound::Unbounded))
            .filter(|(id, doc)| selector.matches(id, &doc.body))
            .take(limit)
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect()
    }

    /// Counts matching documents.
    #[must_use]
    pub fn count(&self, collection: &str, selector: &Selector) -> u64 {
        self.collections.get(collection).map_or(0, |documents| {
            documents
                .iter()
                .filter(|(id, doc)| selector.matches(id, &doc.body))
                .count() as u64
        })
    }

    fn collection_mut(&mut self, schema: &Schema) -> CoreResult<&mut Collection> {
        self.collections
            .get_mut(schema.name())
            .ok_or_else(|| CoreError::connection(format!("collection {} not installed", schema.name())))
    }

    fn current(&self, schema: &Schema, id: &str, revision: &Value) -> CoreResult<&StoredDocument> {
        let document = self
            .get(schema.name(), id)
            .ok_or_else(|| CoreError::not_found(schema.name(), id))?;
        match revision {
            Value::Text(r) if *r == document.revision => Ok(document),
            other => Err(CoreError::RevisionConflict {
                entity: schema.name(),
                id: id.to_string(),
                expected: other.as_text().unwrap_or("<none>").to_string(),
                actual: document.revision.clone(),
            }),
        }
    }

    fn validate(&self, schema: &Schema, id: &str, body: &BTreeMap<String, Value>) -> CoreResult<()> {
        for field in schema.fields() {
            let value = body.get(field.name()).filter(|v| !v.is_null() && !v.is_unset());
            let Some(value) = value else {
                if field.is_nullable() {
                    continue;
                }
                return Err(CoreError::constraint_violation(
                    schema.name(),
                    format!("{} may not be null", field.name()),
                ));
            };

            if field.is_unique() {
                let clash = self
                    .collections
                    .get(schema.name())
                    .into_iter()
                    .flatten()
                    .any(|(other, doc)| other != id && doc.body.get(field.name()) == Some(value));
                if clash {
                    return Err(CoreError::constraint_violation(
                        schema.name(),
                        format!("{} {value} is not unique", field.name()),
                    ));
                }
            }

            if let Some(target) = field.references() {
                let exists = value
                    .as_text()
                    .is_ok_and(|target_id| self.get(target, target_id).is_some());
                if !exists {
                    return Err(CoreError::constraint_violation(
                        schema.name(),
                        format!("{} references missing {target} {value}", field.name()),
                    ));
                }
            }
        }
        Ok(())
    }

    fn referrer_of(&self, schema: &Schema, id: &str) -> Option<String> {
        let target = Value::Text(id.to_string());
        self.references.iter().find_map(|(referrer, keys)| {
            keys.iter()
                .filter(|(_, to)| to == schema.name())
                .find_map(|(field, _)| {
                    self.collections
                        .get(referrer)?
                        .iter()
                        .find(|(_, doc)| doc.body.get(field) == Some(&target))
                        .map(|(other, _)| format!("{referrer} {other}"))
                })
        })
    }

    fn persist(&self) -> CoreResult<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        let snapshot = SnapshotRef {
            collections: &self.collections,
            references: &self.references,
        };
        let bytes = to_cbor(&snapshot)?;
        let tmp = sibling(&persistence.path, "tmp");
        File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, &persistence.path))
            .map_err(|e| {
                CoreError::connection(format!("cannot write {}: {e}", persistence.path.display()))
            })
    }
}

/// Borrowed form of [`Snapshot`] for encoding without cloning.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    collections: &'a BTreeMap<String, Collection>,
    references: &'a References,
}

/// Converts set fields of a record body to native document form.
#[must_use]
pub fn native_fields<'a>(fields: impl Iterator<Item = (&'a str, &'a Value)>) -> BTreeMap<String, Value> {
    fields
        .filter(|(_, value)| !value.is_unset())
        .map(|(name, value)| (name.to_string(), native(value)))
        .collect()
}

/// `<generation>-<first 16 bytes of sha256(cbor(body))>` in hex.
fn revision_token(generation: u64, body: &BTreeMap<String, Value>) -> CoreResult<String> {
    let digest = Sha256::digest(to_cbor(body)?);
    Ok(format!("{generation}-{}", hex::encode(&digest[..16])))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
