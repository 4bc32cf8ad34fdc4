//! JSON schema documents.
//!
//! Lets entity types be declared in a file instead of code. Computed fields
//! cannot carry closures in JSON, so they pick one of a few declarative
//! [`ComputeRule`]s.

use crate::{
    ContextError, ContextResult, EntityType, FieldDescriptor, FieldSource, Schema, SchemaRegistry,
    Value,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A set of entity type declarations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub entities: Vec<EntityDocument>,
}

/// One entity type declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDocument {
    pub name: String,
    /// Name of a base type declared in the same document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Fields declared without a setter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_only: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub computed: Vec<ComputedDocument>,
}

/// A computed field declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedDocument {
    pub name: String,
    pub rule: ComputeRule,
}

/// Declarative computation for a computed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ComputeRule {
    /// Sum of `field` over every item of `collection`.
    Sum { collection: String, field: String },
    /// Number of items in `collection`.
    Count { collection: String },
    /// Product of the listed numeric fields.
    Product { fields: Vec<String> },
}

impl ComputeRule {
    /// Fields the rule reads.
    pub fn depends(&self) -> Vec<&str> {
        match self {
            Self::Sum { collection, .. } | Self::Count { collection } => vec![collection.as_str()],
            Self::Product { fields } => fields.iter().map(String::as_str).collect(),
        }
    }

    /// Evaluates the rule against a field source.
    pub fn eval(&self, source: &dyn FieldSource) -> ContextResult<Value> {
        match self {
            Self::Sum { collection, field } => {
                let items = source.field(collection)?;
                let mut total = Number::Int(0);
                for item in items.as_list().unwrap_or_default() {
                    total = total.add(&item.field(field)?);
                }
                Ok(total.into())
            }
            Self::Count { collection } => {
                let items = source.field(collection)?;
                let count = items.as_list().map_or(0, <[Value]>::len);
                Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
            }
            Self::Product { fields } => {
                let mut product = Number::Int(1);
                for name in fields {
                    product = product.mul(&source.field(name)?);
                }
                Ok(product.into())
            }
        }
    }
}

/// Running numeric result; stays integral until a float shows up.
/// Null and non-numeric operands count as zero.
#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn operand(value: &Value) -> Self {
        match value {
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(*f),
            _ => Self::Int(0),
        }
    }

    fn add(self, value: &Value) -> Self {
        match (self, Self::operand(value)) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a.saturating_add(b)),
            (a, b) => Self::Float(a.as_f64() + b.as_f64()),
        }
    }

    fn mul(self, value: &Value) -> Self {
        match (self, Self::operand(value)) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a.saturating_mul(b)),
            (a, b) => Self::Float(a.as_f64() * b.as_f64()),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl SchemaDocument {
    pub fn from_json_str(json: &str) -> ContextResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> ContextResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Builds every declared entity type into a [`Schema`].
    ///
    /// Base types may be declared in any order. A base that is never declared
    /// (or a cycle of bases) fails with [`ContextError::UnknownEntity`].
    pub fn into_schema(self) -> ContextResult<Schema> {
        let mut schema = Schema::new();
        let mut pending = self.entities;

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for doc in pending {
                let base = match doc.base.as_deref().map(|name| schema.entity(name)) {
                    Some(None) => {
                        deferred.push(doc);
                        continue;
                    }
                    Some(base) => base,
                    None => None,
                };
                schema.register(doc.build(base));
            }
            if deferred.len() == before {
                let missing = deferred
                    .first()
                    .and_then(|d| d.base.clone())
                    .unwrap_or_default();
                return Err(ContextError::UnknownEntity(missing));
            }
            pending = deferred;
        }
        Ok(schema)
    }
}

impl EntityDocument {
    fn build(self, base: Option<Arc<EntityType>>) -> Arc<EntityType> {
        let mut builder = EntityType::builder(&self.name);
        if let Some(base) = base {
            builder = builder.base(base);
        }
        if self.dynamic {
            builder = builder.dynamic();
        }
        for field in self.fields {
            builder = builder.field(field);
        }
        for field in self.read_only {
            builder = builder.read_only(field);
        }
        for computed in self.computed {
            let depends: Vec<String> =
                computed.rule.depends().into_iter().map(String::from).collect();
            let rule = computed.rule;
            builder = builder.computed(
                &computed.name,
                depends.iter().map(String::as_str),
                move |source: &dyn FieldSource, _args: &[Value]| rule.eval(source),
            );
        }
        builder.build()
    }
}
