//! Entity identifiers.
//!
//! Identifiers arrive untyped inside edit maps, so parsing is permissive:
//! anything that is not an integer (or a string holding one) is treated as
//! "no identifier", which is the same case as a new entity.

use crate::{FIELD_ID, Value, ValueMap};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Identifier of a persisted entity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Creates an identifier from a raw integer.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Returns true if the identifier can refer to a stored row.
    /// Zero and negative ids mark client-side placeholders for new rows.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.0 > 0
    }

    /// Parses an identifier out of an untyped value.
    ///
    /// Accepts integers and strings holding exactly a decimal integer, with an
    /// optional sign. Returns `None` for everything else, including floats and
    /// padded text, so that `"abc"`, `" 7"` and `7.5` behave like a missing id.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(raw) => Some(Self(*raw)),
            Value::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    /// Looks up the `id` entry of an edit map.
    #[must_use]
    pub fn find(values: &ValueMap) -> Option<Self> {
        values.get(FIELD_ID).and_then(Self::from_value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}
