//! In-memory storage layer for rpcctx.
//!
//! Provides an [`IdentityResolver`] over JSON rows grouped by entity type.
//! Rows are kept as JSON and turned into a fresh [`Record`] on every lookup,
//! so the store stays `Send + Sync` and callers can never mutate stored rows
//! through a returned record.
//!
//! [`IdentityResolver::find`] resolves the reference and collection slots of
//! the row it returns against the store's own rows, one level deep. A stored
//! reference is an integer id, or an embedded object with an `id`; either
//! becomes a [`Value::Record`] of the target row, and an id with no row reads
//! as `Null`. Embedded objects without an id are kept as records of the
//! target type.
//!
//! # Fixture format
//!
//! ```json
//! { "Invoice": [ { "id": 7, "version": 3, "customer": 2 } ],
//!   "InvoiceLine": [ { "id": 3, "qty": 1, "price": 10 } ] }
//! ```

mod error;

pub use error::{StorageError, StorageResult};

use rpcctx_model::{EntityId, EntityType, FIELD_ID, FieldKind, IdentityResolver, Record, Value};
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, trace};

type Row = Map<String, Json>;
type Tables = HashMap<String, BTreeMap<EntityId, Row>>;

/// Thread-safe in-memory row store keyed by entity type and id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Tables>,
    lookups: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from a fixture document.
    pub fn from_json(fixtures: Json) -> StorageResult<Self> {
        let store = Self::new();
        store.load(fixtures)?;
        Ok(store)
    }

    /// Loads a store from a fixture file.
    pub fn from_path(path: &Path) -> StorageResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(serde_json::from_str(&contents)?)
    }

    /// Adds every row of a fixture document, replacing rows with the same id.
    /// Returns the number of rows loaded.
    pub fn load(&self, fixtures: Json) -> StorageResult<usize> {
        let Json::Object(types) = fixtures else {
            return Err(StorageError::InvalidFixture(
                "top level must be an object keyed by entity type".to_string(),
            ));
        };

        let mut loaded = 0;
        for (entity_type, rows) in types {
            let Json::Array(rows) = rows else {
                return Err(StorageError::InvalidFixture(format!(
                    "rows for {entity_type} must be an array"
                )));
            };
            for row in rows {
                let Json::Object(row) = row else {
                    return Err(StorageError::InvalidFixture(format!(
                        "row of {entity_type} must be an object"
                    )));
                };
                self.insert(&entity_type, row)?;
                loaded += 1;
            }
        }
        debug!(rows = loaded, "Loaded fixture rows");
        Ok(loaded)
    }

    /// Inserts or replaces a row. The row must carry an integer `id`.
    pub fn insert(&self, entity_type: &str, row: Row) -> StorageResult<EntityId> {
        let id = row
            .get(FIELD_ID)
            .and_then(Json::as_i64)
            .map(EntityId::new)
            .ok_or_else(|| {
                StorageError::InvalidFixture(format!("row of {entity_type} has no integer id"))
            })?;

        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity_type.to_string())
            .or_default()
            .insert(id, row);
        Ok(id)
    }

    /// Returns the stored row as a record, without counting a lookup.
    /// Reference slots are left as stored.
    pub fn get(&self, entity_type: &str, id: EntityId) -> Option<Record> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.get(entity_type)
            .and_then(|by_id| by_id.get(&id))
            .map(|row| Record::from_json(entity_type, row.clone()))
    }

    /// Number of rows stored for an entity type.
    pub fn count(&self, entity_type: &str) -> usize {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.get(entity_type).map_or(0, BTreeMap::len)
    }

    /// Number of [`IdentityResolver::find`] calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Builds a record of `entity` from a stored row with its reference and
    /// collection slots resolved.
    fn resolve(tables: &Tables, entity: &EntityType, row: &Row) -> Record {
        let mut record = Record::from_json(entity.name(), row.clone());
        for field in entity.fields() {
            let Some(raw) = row.get(&field.name) else {
                continue;
            };
            let resolved = match (&field.kind, raw) {
                (FieldKind::Reference { target }, raw) => Self::reference(tables, target, raw),
                (FieldKind::Collection { target }, Json::Array(items)) => Value::List(
                    items
                        .iter()
                        .map(|item| Self::reference(tables, target, item))
                        .collect(),
                ),
                _ => continue,
            };
            record.set(field.name.clone(), resolved);
        }
        record
    }

    fn reference(tables: &Tables, target: &str, raw: &Json) -> Value {
        let id = match raw {
            Json::Null => return Value::Null,
            Json::Object(embedded) => match embedded.get(FIELD_ID).and_then(Json::as_i64) {
                Some(id) => id,
                None => return Value::from(Record::from_json(target, embedded.clone())),
            },
            other => match other.as_i64() {
                Some(id) => id,
                None => return Value::from_json(other.clone()),
            },
        };
        match tables.get(target).and_then(|by_id| by_id.get(&EntityId::new(id))) {
            Some(row) => Value::from(Record::from_json(target, row.clone())),
            None => {
                trace!(entity = %target, id, "Stored reference has no row");
                Value::Null
            }
        }
    }
}

impl IdentityResolver for MemoryStore {
    fn find(&self, entity: &EntityType, id: EntityId) -> Option<Record> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let tables = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let found = tables
            .get(entity.name())
            .and_then(|by_id| by_id.get(&id))
            .map(|row| Self::resolve(&tables, entity, row));
        trace!(entity = %entity.name(), %id, hit = found.is_some(), "Identity lookup");
        found
    }
}
