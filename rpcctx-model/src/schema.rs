use crate::{ContextResult, FIELD_VERSION, FieldDescriptor, FieldSource, Record, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Reads a field off a record.
pub type Getter = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Writes a field onto a record. Custom setters may reject a value.
pub type Setter = Arc<dyn Fn(&mut Record, Value) -> ContextResult<()> + Send + Sync>;

/// Computes a derived field from a field source and call arguments.
pub type ComputeFn = Arc<dyn Fn(&dyn FieldSource, &[Value]) -> ContextResult<Value> + Send + Sync>;

/// Getter/setter pair for one stored field. Read-only fields have no setter.
#[derive(Clone)]
pub struct Accessor {
    pub getter: Getter,
    pub setter: Option<Setter>,
}

impl Accessor {
    /// Plain slot access: read and write the record slot named `name`.
    fn slot(name: &str) -> Self {
        let get_name = name.to_string();
        let set_name = name.to_string();
        let getter: Getter = Arc::new(move |record: &Record| record.get(&get_name));
        let setter: Setter = Arc::new(move |record: &mut Record, value: Value| -> ContextResult<()> {
            record.set(set_name.clone(), value);
            Ok(())
        });
        Self {
            getter,
            setter: Some(setter),
        }
    }

    fn read_only(name: &str) -> Self {
        Self {
            setter: None,
            ..Self::slot(name)
        }
    }
}

/// Static field table for one entity type, built once and shared.
///
/// Fields inherited from a base type are listed by [`fields`](Self::fields)
/// but keep their accessors and compute functions on the base, so a derived
/// type may lack a setter for a field its base can still write.
pub struct EntityType {
    name: String,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    accessors: HashMap<String, Accessor>,
    computes: HashMap<String, ComputeFn>,
    base: Option<Arc<EntityType>>,
    dynamic: bool,
}

impl EntityType {
    pub fn builder(name: &str) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.to_string(),
            fields: Vec::new(),
            accessors: HashMap::new(),
            computes: HashMap::new(),
            base: None,
            dynamic: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All declared fields, inherited ones first.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Getter for a stored field, looked up on this type then its base chain.
    pub fn getter(&self, name: &str) -> Option<&Getter> {
        match self.accessors.get(name) {
            Some(accessor) => Some(&accessor.getter),
            None => self.base.as_deref().and_then(|base| base.getter(name)),
        }
    }

    /// Setter declared on this type itself.
    pub fn setter(&self, name: &str) -> Option<&Setter> {
        self.accessors.get(name).and_then(|a| a.setter.as_ref())
    }

    /// Setter declared on the nearest base type that has one.
    pub fn inherited_setter(&self, name: &str) -> Option<&Setter> {
        let base = self.base.as_deref()?;
        base.setter(name).or_else(|| base.inherited_setter(name))
    }

    /// Compute function for a computed field, looked up on this type then its base chain.
    pub fn compute_fn(&self, name: &str) -> Option<&ComputeFn> {
        match self.computes.get(name) {
            Some(compute) => Some(compute),
            None => self.base.as_deref().and_then(|base| base.compute_fn(name)),
        }
    }

    /// Dependency set of a computed field. `None` for stored fields.
    pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.field(name)
            .filter(|f| f.computed)
            .map(|f| &f.depends)
    }

    pub fn base(&self) -> Option<&Arc<EntityType>> {
        self.base.as_ref()
    }

    /// True if the type carries an optimistic-concurrency version field.
    pub fn is_versioned(&self) -> bool {
        self.index.contains_key(FIELD_VERSION)
    }

    /// True for dynamic-record types whose content lives entirely in JSON attributes.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("dynamic", &self.dynamic)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EntityType`].
pub struct EntityTypeBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    accessors: HashMap<String, Accessor>,
    computes: HashMap<String, ComputeFn>,
    base: Option<Arc<EntityType>>,
    dynamic: bool,
}

impl EntityTypeBuilder {
    /// Inherits the base type's fields. Their setters stay on the base.
    #[must_use]
    pub fn base(mut self, base: Arc<EntityType>) -> Self {
        for field in base.fields() {
            self.push(field.clone());
        }
        self.base = Some(base);
        self
    }

    /// Declares a stored field with plain slot access.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.accessors
            .insert(field.name.clone(), Accessor::slot(&field.name));
        self.push(field);
        self
    }

    /// Declares a stored field without a setter.
    #[must_use]
    pub fn read_only(mut self, field: FieldDescriptor) -> Self {
        self.accessors
            .insert(field.name.clone(), Accessor::read_only(&field.name));
        self.push(field);
        self
    }

    /// Replaces the setter of a declared field.
    ///
    /// For a field inherited from the base type this adds an own accessor
    /// that overrides the base setter and reads the plain slot. Names that are
    /// not declared at all are ignored.
    #[must_use]
    pub fn setter<F>(mut self, name: &str, setter: F) -> Self
    where
        F: Fn(&mut Record, Value) -> ContextResult<()> + Send + Sync + 'static,
    {
        let setter: Setter = Arc::new(setter);
        match self.accessors.get_mut(name) {
            Some(accessor) => accessor.setter = Some(setter),
            None if self.fields.iter().any(|f| f.name == name && !f.computed) => {
                let accessor = Accessor {
                    setter: Some(setter),
                    ..Accessor::slot(name)
                };
                self.accessors.insert(name.to_string(), accessor);
            }
            None => {}
        }
        self
    }

    /// Declares a computed field.
    #[must_use]
    pub fn computed<'a, F>(
        mut self,
        name: &str,
        depends: impl IntoIterator<Item = &'a str>,
        compute: F,
    ) -> Self
    where
        F: Fn(&dyn FieldSource, &[Value]) -> ContextResult<Value> + Send + Sync + 'static,
    {
        self.push(FieldDescriptor::computed(name, depends));
        self.computes.insert(name.to_string(), Arc::new(compute));
        self
    }

    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub fn build(self) -> Arc<EntityType> {
        let index = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Arc::new(EntityType {
            name: self.name,
            fields: self.fields,
            index,
            accessors: self.accessors,
            computes: self.computes,
            base: self.base,
            dynamic: self.dynamic,
        })
    }

    fn push(&mut self, field: FieldDescriptor) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }
}

/// Field descriptor registry: resolves entity types by name.
pub trait SchemaRegistry: Send + Sync {
    fn entity(&self, name: &str) -> Option<Arc<EntityType>>;
}

/// In-memory [`SchemaRegistry`].
#[derive(Debug, Default)]
pub struct Schema {
    types: HashMap<String, Arc<EntityType>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type, replacing any previous type of the same name.
    pub fn register(&mut self, entity: Arc<EntityType>) {
        self.types.insert(entity.name().to_string(), entity);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, entity: Arc<EntityType>) -> Self {
        self.register(entity);
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl SchemaRegistry for Schema {
    fn entity(&self, name: &str) -> Option<Arc<EntityType>> {
        self.types.get(name).cloned()
    }
}
