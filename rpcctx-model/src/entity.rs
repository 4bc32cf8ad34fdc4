use crate::{ContextResult, EntityId, FIELD_ID, FieldSource, Value, ValueMap};
use serde::Serialize;

/// A concrete entity instance: the entity type name plus one slot per field.
///
/// Used both for the blank working instance a proxy populates and for
/// persisted rows returned by an [`IdentityResolver`](crate::IdentityResolver).
/// Serializes as a flat JSON object of its slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    #[serde(skip)]
    entity_type: String,
    #[serde(flatten)]
    slots: ValueMap,
}

impl Record {
    /// Creates an empty record of the given entity type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            slots: ValueMap::new(),
        }
    }

    /// Creates a record from a JSON object (e.g. a stored row).
    pub fn from_json(
        entity_type: impl Into<String>,
        row: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            slots: row
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the slot value, or `Value::Null` if the slot is unset.
    pub fn get(&self, name: &str) -> Value {
        self.slots.get(name).cloned().unwrap_or_default()
    }

    /// Returns a reference to the slot value if it is set.
    pub fn get_ref(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Writes a slot and returns the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.slots.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// The record's `id` slot, parsed permissively.
    pub fn id(&self) -> Option<EntityId> {
        self.slots.get(FIELD_ID).and_then(EntityId::from_value)
    }

    pub fn slots(&self) -> &ValueMap {
        &self.slots
    }

    pub fn to_json(&self) -> ContextResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl FieldSource for Record {
    fn field(&self, name: &str) -> ContextResult<Value> {
        Ok(self.get(name))
    }
}
