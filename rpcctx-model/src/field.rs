use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Edit-map key holding the entity identifier.
pub const FIELD_ID: &str = "id";

/// Edit-map key holding the optimistic-concurrency version. Its presence in a
/// nested reference payload marks the payload as an update, not a plain reference.
pub const FIELD_VERSION: &str = "version";

/// Edit-map key used by multi-select payloads to flag chosen rows.
pub const FIELD_SELECTED: &str = "selected";

/// Metadata for one field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    /// Derived from other fields by a compute function; never stored.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub computed: bool,
    /// Not persisted; always read from the working instance.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub transient: bool,
    /// Holds a JSON document as text.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub json: bool,
    /// Fields a computed field reads. Empty for stored fields.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends: BTreeSet<String>,
}

/// Shape of a field's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Scalar,
    /// Single reference to an entity of the target type.
    Reference { target: String },
    /// Collection of references to entities of the target type.
    Collection { target: String },
}

impl FieldDescriptor {
    fn with_kind(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            computed: false,
            transient: false,
            json: false,
            depends: BTreeSet::new(),
        }
    }

    /// Shorthand for a plain scalar field.
    pub fn scalar(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Scalar)
    }

    /// Shorthand for a single-reference field.
    pub fn reference(name: &str, target: &str) -> Self {
        Self::with_kind(
            name,
            FieldKind::Reference {
                target: target.into(),
            },
        )
    }

    /// Shorthand for a collection-of-references field.
    pub fn collection(name: &str, target: &str) -> Self {
        Self::with_kind(
            name,
            FieldKind::Collection {
                target: target.into(),
            },
        )
    }

    /// Shorthand for a JSON-backed text field.
    pub fn json(name: &str) -> Self {
        Self {
            json: true,
            ..Self::scalar(name)
        }
    }

    /// Shorthand for a computed field reading `depends`.
    pub fn computed<'a>(name: &str, depends: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            computed: true,
            depends: depends.into_iter().map(String::from).collect(),
            ..Self::scalar(name)
        }
    }

    /// Marks the field transient.
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, FieldKind::Collection { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FieldKind::Reference { .. })
    }

    /// Target entity type of a reference or collection field.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Reference { target } | FieldKind::Collection { target } => Some(target),
            FieldKind::Scalar => None,
        }
    }
}
