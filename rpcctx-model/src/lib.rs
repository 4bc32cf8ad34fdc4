//! Core entity model for rpcctx.
//!
//! Defines the types every context proxy is built on:
//! - [`Value`]: the dynamic value carried by edit maps and records
//! - [`Record`]: a concrete entity instance (working or persisted)
//! - [`FieldDescriptor`]: per-field metadata (reference, collection, computed, transient, JSON)
//! - [`EntityType`]: a static accessor table built once per entity type
//! - [`SchemaRegistry`], [`IdentityResolver`], [`InstanceFactory`]: the
//!   collaborators a proxy consults for metadata, persisted rows and blank instances
//!
//! Edit maps use `id`, `version` and `selected` as reserved keys; see
//! [`FIELD_ID`], [`FIELD_VERSION`] and [`FIELD_SELECTED`].

mod collaborator;
mod document;
mod entity;
mod error;
mod field;
mod id;
mod schema;
mod value;

pub use collaborator::{BlankFactory, IdentityResolver, InstanceFactory};
pub use document::{ComputeRule, ComputedDocument, EntityDocument, SchemaDocument};
pub use entity::Record;
pub use error::{ContextError, ContextResult};
pub use field::{FIELD_ID, FIELD_SELECTED, FIELD_VERSION, FieldDescriptor, FieldKind};
pub use id::EntityId;
pub use schema::{
    Accessor, ComputeFn, EntityType, EntityTypeBuilder, Getter, Schema, SchemaRegistry, Setter,
};
pub use value::{EntityObject, FieldSource, Value, ValueMap};
