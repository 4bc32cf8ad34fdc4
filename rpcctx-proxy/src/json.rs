//! Key-based access to typed fields and JSON attributes.
//!
//! Entity types that declare a JSON-backed attributes field (`attrs` by
//! default) store ad-hoc values as JSON text. [`JsonAttrs`] lets callers read
//! and write both kinds of value through one accessor: declared fields go
//! through the proxy, unknown names go to the attribute document.

use crate::proxy::ContextProxy;
use rpcctx_model::{ContextError, ContextResult, Value};
use serde_json::{Map, Value as Json};
use std::cell::RefCell;
use tracing::trace;

/// Map-like view over a proxy with JSON attributes.
#[derive(Debug, Clone)]
pub struct JsonAttrs {
    proxy: ContextProxy,
}

impl JsonAttrs {
    pub(crate) fn new(proxy: ContextProxy) -> Self {
        Self { proxy }
    }

    /// Reads a declared field through the proxy, or an attribute otherwise.
    pub fn get(&self, name: &str) -> ContextResult<Value> {
        if self.proxy.entity().field(name).is_some() {
            return self.proxy.get(name);
        }
        self.proxy.json_context()?.get(&self.proxy, name)
    }

    /// Writes a field that has a setter through the proxy, or an attribute
    /// otherwise. Returns the previous attribute value; field writes return null.
    pub fn put(&self, name: &str, value: impl Into<Value>) -> ContextResult<Value> {
        let entity = self.proxy.entity();
        let writable = entity.setter(name).is_some() || entity.inherited_setter(name).is_some();
        if writable {
            self.proxy.set(name, value)?;
            return Ok(Value::Null);
        }
        self.proxy.json_context()?.put(&self.proxy, name, value.into())
    }

    /// Dispatches a map operation by name. Only `get` and `put` are supported.
    pub fn invoke(&self, method: &str, args: &[Value]) -> ContextResult<Value> {
        match (method, args) {
            ("get", [Value::Text(name)]) => self.get(name),
            ("put", [Value::Text(name), value]) => self.put(name, value.clone()),
            _ => Err(ContextError::Unsupported(format!(
                "cannot call '{method}' with {} argument(s)",
                args.len()
            ))),
        }
    }

    pub fn proxy(&self) -> &ContextProxy {
        &self.proxy
    }
}

/// Where attribute values are read from.
#[derive(Debug)]
enum JsonSource {
    /// Parsed once from the attributes text seen when the view was first used.
    Snapshot(RefCell<Map<String, Json>>),
    /// Dynamic records: the record's attributes are re-read on every access.
    Record,
}

/// Lazily created attribute store behind a [`JsonAttrs`] view.
#[derive(Debug)]
pub(crate) struct JsonContext {
    field: String,
    source: JsonSource,
}

impl JsonContext {
    pub(crate) fn create(proxy: &ContextProxy) -> ContextResult<Self> {
        let field = proxy.config().attrs_field.clone();
        let source = if proxy.entity().is_dynamic() {
            JsonSource::Record
        } else {
            JsonSource::Snapshot(RefCell::new(read_attrs(proxy, &field)?))
        };
        trace!(entity = %proxy.entity().name(), field = %field, "Created JSON attribute context");
        Ok(Self { field, source })
    }

    fn get(&self, proxy: &ContextProxy, name: &str) -> ContextResult<Value> {
        let value = match &self.source {
            JsonSource::Snapshot(attrs) => attrs.borrow().get(name).cloned(),
            JsonSource::Record => read_attrs(proxy, &self.field)?.remove(name),
        };
        Ok(value.map(Value::from_json).unwrap_or_default())
    }

    fn put(&self, proxy: &ContextProxy, name: &str, value: Value) -> ContextResult<Value> {
        let json = value.to_json()?;
        let (previous, text) = match &self.source {
            JsonSource::Snapshot(attrs) => {
                let mut attrs = attrs.borrow_mut();
                let previous = attrs.insert(name.to_string(), json);
                (previous, serde_json::to_string(&*attrs)?)
            }
            JsonSource::Record => {
                let mut attrs = read_attrs(proxy, &self.field)?;
                let previous = attrs.insert(name.to_string(), json);
                (previous, serde_json::to_string(&attrs)?)
            }
        };
        // Written back through the proxy so merge rules and listeners apply.
        proxy.set(&self.field, Value::Text(text))?;
        Ok(previous.map(Value::from_json).unwrap_or_default())
    }
}

/// Parses the attributes field. Null or blank text is an empty document.
fn read_attrs(proxy: &ContextProxy, field: &str) -> ContextResult<Map<String, Json>> {
    match proxy.get(field)? {
        Value::Text(text) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(Map::new()),
    }
}
