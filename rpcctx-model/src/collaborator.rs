use crate::{EntityId, EntityType, Record, Value};

/// Loads persisted entities by identity.
///
/// A miss is an expected outcome (new or transient entity), so lookups
/// return `None` instead of failing. Timeouts and retries, if any, belong
/// to the implementation.
pub trait IdentityResolver: Send + Sync {
    fn find(&self, entity: &EntityType, id: EntityId) -> Option<Record>;
}

impl<F> IdentityResolver for F
where
    F: Fn(&EntityType, EntityId) -> Option<Record> + Send + Sync,
{
    fn find(&self, entity: &EntityType, id: EntityId) -> Option<Record> {
        self(entity, id)
    }
}

/// Creates blank, detached instances of an entity type.
///
/// Most callers do NOT need to implement this; [`BlankFactory`] covers the
/// default of one empty slot per stored field.
pub trait InstanceFactory: Send + Sync {
    /// Returns a fully default-initialized instance.
    /// Stored fields read as null, collections as an empty list.
    fn create(&self, entity: &EntityType) -> Record {
        let mut record = Record::new(entity.name());
        for field in entity.fields().iter().filter(|f| !f.computed) {
            let blank = if field.is_collection() {
                Value::List(Vec::new())
            } else {
                Value::Null
            };
            record.set(field.name.clone(), blank);
        }
        record
    }
}

/// The default [`InstanceFactory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankFactory;

impl InstanceFactory for BlankFactory {}
