//! Context proxy handle and interception router.

use crate::config::ProxyConfig;
use crate::engine::MergeEngine;
use crate::json::{JsonAttrs, JsonContext};
use crate::listener::{ChangeListeners, FieldChange};
use rpcctx_model::{
    BlankFactory, ContextError, ContextResult, EntityObject, EntityType, FieldSource,
    IdentityResolver, InstanceFactory, Record, SchemaRegistry, Value, ValueMap,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// Shared, thread-safe collaborators a proxy consults.
#[derive(Clone)]
pub struct Collaborators {
    pub schema: Arc<dyn SchemaRegistry>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub factory: Arc<dyn InstanceFactory>,
    pub config: Arc<ProxyConfig>,
}

impl Collaborators {
    /// Collaborators with blank-instance creation and default config.
    pub fn new(schema: Arc<dyn SchemaRegistry>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            schema,
            resolver,
            factory: Arc::new(BlankFactory),
            config: Arc::new(ProxyConfig::default()),
        }
    }

    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn InstanceFactory>) -> Self {
        self.factory = factory;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = Arc::new(config);
        self
    }
}

/// Builds proxies for nested reference payloads.
///
/// Injected into every proxy so nested construction can be observed or
/// replaced in isolation.
pub trait ProxyFactory {
    fn wrap(&self, entity: &str, values: ValueMap) -> ContextResult<ContextProxy>;
}

/// Default [`ProxyFactory`]: resolves the type in the schema registry and
/// builds a proxy sharing the same collaborators.
#[derive(Clone)]
pub struct ContextProxyFactory {
    collaborators: Collaborators,
}

impl ContextProxyFactory {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }
}

impl ProxyFactory for ContextProxyFactory {
    fn wrap(&self, entity: &str, values: ValueMap) -> ContextResult<ContextProxy> {
        let entity_type = self.collaborators.schema.entity(entity).ok_or_else(|| {
            ContextError::InstantiationFailure {
                entity: entity.to_string(),
                reason: "entity type is not registered".to_string(),
            }
        })?;
        Ok(ContextProxy::with_factory(
            entity_type,
            values,
            self.collaborators.clone(),
            Rc::new(self.clone()),
        ))
    }
}

/// A field access routed through a proxy.
#[derive(Debug, Clone)]
pub enum Interception<'a> {
    /// Getter call.
    Get(&'a str),
    /// Setter call.
    Set(&'a str, Value),
    /// Compute-method call for a computed field.
    Compute(&'a str, &'a [Value]),
    /// Full materialization.
    Populate,
}

struct ProxyInner {
    entity: Arc<EntityType>,
    config: Arc<ProxyConfig>,
    engine: RefCell<MergeEngine>,
    listeners: ChangeListeners,
    json: RefCell<Option<Rc<JsonContext>>>,
}

/// An object that behaves like a populated instance of an entity type,
/// backed by a caller edit map and resolved lazily on field access.
///
/// Cloning is cheap and yields a handle to the same proxy.
#[derive(Clone)]
pub struct ContextProxy {
    inner: Rc<ProxyInner>,
}

impl ContextProxy {
    /// Creates a proxy whose nested references use [`ContextProxyFactory`].
    pub fn new(entity: Arc<EntityType>, values: ValueMap, collaborators: Collaborators) -> Self {
        let factory = Rc::new(ContextProxyFactory::new(collaborators.clone()));
        Self::with_factory(entity, values, collaborators, factory)
    }

    /// Creates a proxy with an explicit factory for nested references.
    pub fn with_factory(
        entity: Arc<EntityType>,
        values: ValueMap,
        collaborators: Collaborators,
        factory: Rc<dyn ProxyFactory>,
    ) -> Self {
        let config = Arc::clone(&collaborators.config);
        let engine = MergeEngine::new(Arc::clone(&entity), values, collaborators, factory);
        Self {
            inner: Rc::new(ProxyInner {
                entity,
                config,
                engine: RefCell::new(engine),
                listeners: ChangeListeners::default(),
                json: RefCell::new(None),
            }),
        }
    }

    /// Creates a proxy for a type looked up by name in the schema registry.
    pub fn of(entity: &str, values: ValueMap, collaborators: Collaborators) -> ContextResult<Self> {
        ContextProxyFactory::new(collaborators).wrap(entity, values)
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.inner.entity
    }

    pub(crate) fn config(&self) -> &ProxyConfig {
        &self.inner.config
    }

    /// Routes one field access.
    pub fn intercept(&self, call: Interception<'_>) -> ContextResult<Value> {
        match call {
            Interception::Get(field) => self.intercept_get(field),
            Interception::Set(field, value) => self.intercept_set(field, value).map(|()| Value::Null),
            Interception::Compute(field, args) => self.intercept_compute(field, args),
            Interception::Populate => self.populated().map(Value::from),
        }
    }

    /// Reads a field.
    ///
    /// Edit-map and transient fields come from the working instance, computed
    /// fields from their compute function, everything else from the persisted
    /// instance (null if there is none).
    pub fn get(&self, field: &str) -> ContextResult<Value> {
        self.intercept(Interception::Get(field))
    }

    /// Writes a field and notifies change listeners.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> ContextResult<()> {
        self.intercept(Interception::Set(field, value.into()))
            .map(|_| ())
    }

    /// Runs the compute function of a computed field.
    pub fn compute(&self, field: &str, args: &[Value]) -> ContextResult<Value> {
        self.intercept(Interception::Compute(field, args))
    }

    /// Returns a field-complete copy of the working instance.
    ///
    /// Every edit-map value is merged in, computed fields' dependencies are
    /// pulled from the persisted instance, and the persisted `version` is
    /// carried over when the caller did not send one.
    pub fn populated(&self) -> ContextResult<Record> {
        self.inner.engine.borrow_mut().populated()
    }

    /// Subscribes to every accepted write.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(&FieldChange) -> anyhow::Result<()> + 'static,
    {
        self.inner.listeners.add(Rc::new(listener));
    }

    /// Subscribes to writes of a single field.
    pub fn on_field_change<F>(&self, field: &str, listener: F)
    where
        F: Fn(&FieldChange) -> anyhow::Result<()> + 'static,
    {
        let field = field.to_string();
        self.on_change(move |change| {
            if change.field == field {
                listener(change)
            } else {
                Ok(())
            }
        });
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Key-based accessor over typed fields and JSON attributes.
    /// `None` unless the type declares a JSON-backed attributes field.
    pub fn json_attrs(&self) -> Option<JsonAttrs> {
        let attrs = self.inner.entity.field(&self.inner.config.attrs_field)?;
        attrs.json.then(|| JsonAttrs::new(self.clone()))
    }

    /// True once the field's authoritative value is on the working instance.
    pub fn is_validated(&self, field: &str) -> bool {
        self.inner.engine.borrow().is_validated(field)
    }

    /// The caller's current edit-map value for a field.
    pub fn edit_value(&self, field: &str) -> Option<Value> {
        self.inner.engine.borrow().edit_value(field).cloned()
    }

    pub(crate) fn json_context(&self) -> ContextResult<Rc<JsonContext>> {
        if let Some(context) = self.inner.json.borrow().as_ref() {
            return Ok(Rc::clone(context));
        }
        let context = Rc::new(JsonContext::create(self)?);
        *self.inner.json.borrow_mut() = Some(Rc::clone(&context));
        Ok(context)
    }

    fn intercept_get(&self, field: &str) -> ContextResult<Value> {
        let Some(descriptor) = self.inner.entity.field(field) else {
            return self.undeclared(field).map(|()| Value::Null);
        };
        // Computed fields are only ever produced by their compute function.
        if descriptor.computed {
            return self.intercept_compute(field, &[]);
        }

        let mut engine = self.inner.engine.borrow_mut();
        if engine.contains(field) || descriptor.transient {
            engine.validate(field)?;
            return Ok(engine.read_working(field));
        }
        Ok(engine.read_managed(field))
    }

    fn intercept_set(&self, field: &str, value: Value) -> ContextResult<()> {
        let Some(descriptor) = self.inner.entity.field(field) else {
            return self.undeclared(field);
        };
        if descriptor.computed {
            return Err(ContextError::Unsupported(format!(
                "cannot set computed field '{field}'"
            )));
        }

        let (old, result) = {
            let mut engine = self.inner.engine.borrow_mut();
            let old = engine.put(field, value.clone());
            let result = engine.assign(descriptor, value);
            (old, result)
        };

        // Listeners hear about every write attempt, including failed ones.
        let change = FieldChange {
            field: field.to_string(),
            old: old.unwrap_or_default(),
            new: self.edit_value(field).unwrap_or_default(),
        };
        self.inner.listeners.fire(&change);
        result
    }

    fn intercept_compute(&self, field: &str, args: &[Value]) -> ContextResult<Value> {
        let entity = &self.inner.entity;
        let compute = entity
            .compute_fn(field)
            .cloned()
            .ok_or_else(|| ContextError::UnknownField {
                entity: entity.name().to_string(),
                field: field.to_string(),
            })?;

        let depends = entity.dependencies(field).cloned().unwrap_or_default();
        if depends.is_empty() {
            // Nothing to merge: run against the proxy so reads resolve lazily.
            return compute(self as &dyn FieldSource, args);
        }

        let working = {
            let mut engine = self.inner.engine.borrow_mut();
            engine.resolve_dependencies(&depends)?;
            engine.unmanaged().clone()
        };
        trace!(entity = %entity.name(), field, "Computing field");
        compute(&working as &dyn FieldSource, args)
    }

    fn undeclared(&self, field: &str) -> ContextResult<()> {
        if self.inner.config.strict_fields {
            return Err(ContextError::UnknownField {
                entity: self.inner.entity.name().to_string(),
                field: field.to_string(),
            });
        }
        debug!(entity = %self.inner.entity.name(), field, "Ignoring undeclared field");
        Ok(())
    }
}

impl FieldSource for ContextProxy {
    fn field(&self, name: &str) -> ContextResult<Value> {
        self.get(name)
    }
}

impl EntityObject for ContextProxy {
    fn entity_name(&self) -> &str {
        self.inner.entity.name()
    }

    fn read(&self, field: &str) -> ContextResult<Value> {
        self.get(field)
    }

    fn materialize(&self) -> ContextResult<Record> {
        self.populated()
    }
}

impl fmt::Debug for ContextProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextProxy")
            .field("entity", &self.inner.entity.name())
            .finish_non_exhaustive()
    }
}
