//! Merge engine: reconciles the edit map, the working instance and the
//! persisted instance field by field.

use crate::proxy::{Collaborators, ProxyFactory};
use rpcctx_model::{
    ContextError, ContextResult, EntityId, EntityType, FIELD_SELECTED, FIELD_VERSION,
    FieldDescriptor, Record, Value, ValueMap,
};
use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// Per-proxy resolution state.
///
/// Invariants:
/// - a field is in `validated` iff its authoritative value is on the working instance
/// - `validated` only grows
/// - the working instance is created once and never replaced
/// - the persisted instance is looked up at most once and never written
pub(crate) struct MergeEngine {
    entity: Arc<EntityType>,
    values: ValueMap,
    validated: HashSet<String>,
    unmanaged: Option<Record>,
    managed: Option<Record>,
    searched: bool,
    collaborators: Collaborators,
    factory: Rc<dyn ProxyFactory>,
}

impl MergeEngine {
    pub(crate) fn new(
        entity: Arc<EntityType>,
        values: ValueMap,
        collaborators: Collaborators,
        factory: Rc<dyn ProxyFactory>,
    ) -> Self {
        Self {
            entity,
            values,
            validated: HashSet::new(),
            unmanaged: None,
            managed: None,
            searched: false,
            collaborators,
            factory,
        }
    }

    pub(crate) fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub(crate) fn edit_value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Overwrites an edit-map entry and returns the previous value.
    pub(crate) fn put(&mut self, field: &str, value: Value) -> Option<Value> {
        self.values.insert(field.to_string(), value)
    }

    pub(crate) fn is_validated(&self, field: &str) -> bool {
        self.validated.contains(field)
    }

    /// The persisted instance, looked up by the edit map's `id` on first call.
    /// A missing or malformed id and a lookup miss all yield `None`.
    pub(crate) fn managed(&mut self) -> Option<&Record> {
        if !self.searched {
            self.searched = true;
            if let Some(id) = EntityId::find(&self.values) {
                let found = self.collaborators.resolver.find(&self.entity, id);
                debug!(
                    entity = %self.entity.name(),
                    %id,
                    found = found.is_some(),
                    "Resolved persisted instance"
                );
                self.managed = found;
            }
        }
        self.managed.as_ref()
    }

    /// The working instance, created blank on first call.
    pub(crate) fn unmanaged(&mut self) -> &mut Record {
        self.unmanaged
            .get_or_insert_with(|| self.collaborators.factory.create(&self.entity))
    }

    /// Moves an edit-map value onto the working instance.
    ///
    /// No-op (returns `false`) if the field is undeclared, already validated,
    /// or absent from the edit map; absent fields are served from the
    /// persisted instance instead. Returns `true` when a write happened.
    pub(crate) fn validate(&mut self, field: &str) -> ContextResult<bool> {
        if self.validated.contains(field) {
            return Ok(false);
        }
        let Some(descriptor) = self.entity.field(field).cloned() else {
            return Ok(false);
        };
        let Some(raw) = self.values.get(field).cloned() else {
            return Ok(false);
        };

        let value = self.normalize(&descriptor, raw)?;
        self.write(&descriptor, value)?;
        self.validated.insert(descriptor.name);
        trace!(entity = %self.entity.name(), field, "Validated field");
        Ok(true)
    }

    /// Writes a new setter value onto the working instance.
    ///
    /// The first write goes through [`validate`](Self::validate); later writes
    /// to an already validated field normalize and write directly.
    pub(crate) fn assign(&mut self, descriptor: &FieldDescriptor, value: Value) -> ContextResult<()> {
        if self.validate(&descriptor.name)? {
            return Ok(());
        }
        let value = self.normalize(descriptor, value)?;
        self.write(descriptor, value)
    }

    /// Reads a field off the working instance through the type's getter.
    pub(crate) fn read_working(&mut self, field: &str) -> Value {
        let getter = self.entity.getter(field).cloned();
        let record = self.unmanaged();
        getter.map(|get| get(&*record)).unwrap_or_default()
    }

    /// Reads a field off the persisted instance, or null if there is none.
    pub(crate) fn read_managed(&mut self, field: &str) -> Value {
        let getter = self.entity.getter(field).cloned();
        match (getter, self.managed()) {
            (Some(get), Some(record)) => get(record),
            _ => Value::Null,
        }
    }

    /// Makes every dependency of a computed field authoritative on the
    /// working instance: edit-map values are validated, anything else is
    /// copied from the persisted instance. Each field is resolved at most once.
    pub(crate) fn resolve_dependencies(&mut self, depends: &BTreeSet<String>) -> ContextResult<()> {
        for name in depends {
            if self.validated.contains(name) || self.entity.field(name).is_none() {
                continue;
            }
            if self.values.contains_key(name) {
                self.validate(name)?;
                continue;
            }
            let persisted = self.managed().map(|record| record.get(name));
            if let Some(value) = persisted {
                self.unmanaged().set(name.clone(), value);
            }
            self.validated.insert(name.clone());
            trace!(entity = %self.entity.name(), field = %name, "Resolved dependency");
        }
        Ok(())
    }

    /// Field-complete working instance for serialization.
    pub(crate) fn populated(&mut self) -> ContextResult<Record> {
        let entity = Arc::clone(&self.entity);
        for field in entity.fields() {
            self.validate(&field.name)?;
            if field.computed && self.managed().is_some() {
                self.resolve_dependencies(&field.depends)?;
            }
        }

        if entity.is_versioned() && !self.values.contains_key(FIELD_VERSION) {
            let version = self.managed().map(|record| record.get(FIELD_VERSION));
            if let Some(version) = version {
                self.unmanaged().set(FIELD_VERSION, version);
            }
        }
        Ok(self.unmanaged().clone())
    }

    fn write(&mut self, descriptor: &FieldDescriptor, value: Value) -> ContextResult<()> {
        // Fields inherited from a base type are written with the base's setter.
        let setter = self
            .entity
            .setter(&descriptor.name)
            .or_else(|| self.entity.inherited_setter(&descriptor.name))
            .cloned();
        match setter {
            Some(set) => set(self.unmanaged(), value),
            None => {
                debug!(
                    entity = %self.entity.name(),
                    field = %descriptor.name,
                    "No setter for field, value not written"
                );
                Ok(())
            }
        }
    }

    fn normalize(&self, descriptor: &FieldDescriptor, value: Value) -> ContextResult<Value> {
        match value {
            Value::List(items) if descriptor.is_collection() => items
                .into_iter()
                .map(|item| self.create_or_find(descriptor, item))
                .collect::<ContextResult<Vec<_>>>()
                .map(Value::List),
            value if descriptor.is_reference() => self.create_or_find(descriptor, value),
            value => Ok(value),
        }
    }

    /// Turns one raw reference payload into an instance.
    ///
    /// - null and resolved instances pass through
    /// - a map with a positive id and no `version` key is a reference to a stored row
    /// - any other map is a new or updated row and becomes a nested proxy
    /// - a bare whole number is looked up as an id
    fn create_or_find(&self, descriptor: &FieldDescriptor, item: Value) -> ContextResult<Value> {
        let invalid = || ContextError::InvalidReference {
            field: descriptor.name.clone(),
        };
        match item {
            Value::Null | Value::Record(_) | Value::Object(_) => Ok(item),
            Value::Map(map) => {
                let target = descriptor.target().ok_or_else(invalid)?;
                match EntityId::find(&map) {
                    Some(id) if id.is_persistent() && !map.contains_key(FIELD_VERSION) => {
                        let found = self.find(target, id)?.map(|mut record| {
                            if let Some(selected) = map.get(FIELD_SELECTED) {
                                record.set(FIELD_SELECTED, selected.clone());
                            }
                            record
                        });
                        Ok(found.map(Value::from).unwrap_or_default())
                    }
                    _ => {
                        debug!(
                            entity = %target,
                            field = %descriptor.name,
                            "Creating nested proxy"
                        );
                        let proxy = self.factory.wrap(target, map)?;
                        Ok(Value::Object(Rc::new(proxy)))
                    }
                }
            }
            Value::Int(raw) => {
                let target = descriptor.target().ok_or_else(invalid)?;
                let found = self.find(target, EntityId::new(raw))?;
                Ok(found.map(Value::from).unwrap_or_default())
            }
            // JSON clients may send whole numbers as floats.
            Value::Float(raw) if raw.fract() == 0.0 && raw.is_finite() => {
                self.create_or_find(descriptor, Value::Int(raw as i64))
            }
            _ => {
                debug!(
                    entity = %self.entity.name(),
                    field = %descriptor.name,
                    "Rejected reference value"
                );
                Err(invalid())
            }
        }
    }

    fn find(&self, target: &str, id: EntityId) -> ContextResult<Option<Record>> {
        let entity = self
            .collaborators
            .schema
            .entity(target)
            .ok_or_else(|| ContextError::UnknownEntity(target.to_string()))?;
        Ok(self.collaborators.resolver.find(&entity, id))
    }
}
