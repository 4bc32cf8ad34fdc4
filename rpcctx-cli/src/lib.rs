//! Loading and evaluation behind the `rpcctx` binary.
//!
//! An [`Evaluator`] owns the collaborators for one run: a schema loaded from
//! a JSON schema document, a [`MemoryStore`] loaded from fixture rows and the
//! proxy config. Each [`Evaluator::evaluate`] call builds a fresh proxy over
//! one edit map.

use anyhow::{Context, Result, bail};
use rpcctx_model::{SchemaDocument, SchemaRegistry, Value, ValueMap};
use rpcctx_proxy::{Collaborators, ContextProxy, ProxyConfig};
use rpcctx_store::MemoryStore;
use serde_json::{Map, Value as Json};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Collaborators shared by every evaluation in one run.
pub struct Evaluator {
    schema: Arc<dyn SchemaRegistry>,
    store: Arc<MemoryStore>,
    config: ProxyConfig,
}

impl Evaluator {
    pub fn new(schema: Arc<dyn SchemaRegistry>, store: Arc<MemoryStore>, config: ProxyConfig) -> Self {
        Self {
            schema,
            store,
            config,
        }
    }

    /// Loads the schema document, the optional fixture file and the optional config file.
    pub fn load(schema: &Path, store: Option<&Path>, config: Option<&Path>) -> Result<Self> {
        let schema = SchemaDocument::from_path(schema)
            .and_then(SchemaDocument::into_schema)
            .with_context(|| format!("Failed to load schema from {}", schema.display()))?;
        info!(entities = schema.len(), "Loaded schema");

        let store = match store {
            Some(path) => MemoryStore::from_path(path)
                .with_context(|| format!("Failed to load rows from {}", path.display()))?,
            None => MemoryStore::new(),
        };
        let config = config.map(ProxyConfig::load_from).unwrap_or_default();

        Ok(Self::new(Arc::new(schema), Arc::new(store), config))
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Builds a proxy for one edit map.
    pub fn proxy(&self, entity: &str, values: ValueMap) -> Result<ContextProxy> {
        let collaborators = Collaborators::new(
            Arc::clone(&self.schema),
            Arc::clone(&self.store) as _,
        )
        .with_config(self.config.clone());
        Ok(ContextProxy::of(entity, values, collaborators)?)
    }

    /// Evaluates an edit map.
    ///
    /// With no `fields`, returns the populated instance. Otherwise returns an
    /// object holding each requested field as read through the proxy.
    pub fn evaluate(&self, entity: &str, values: ValueMap, fields: &[String]) -> Result<Json> {
        let proxy = self.proxy(entity, values)?;

        let output = if fields.is_empty() {
            let record = proxy
                .populated()
                .with_context(|| format!("Failed to populate {entity}"))?;
            record.to_json()?
        } else {
            let mut out = Map::new();
            for field in fields {
                let value = proxy
                    .get(field)
                    .with_context(|| format!("Failed to read {entity}.{field}"))?;
                out.insert(field.clone(), value.to_json()?);
            }
            Json::Object(out)
        };

        debug!(entity, lookups = self.store.lookups(), "Evaluation finished");
        Ok(output)
    }
}

/// Parses an edit map. The document must be a JSON object.
pub fn parse_values(text: &str) -> Result<ValueMap> {
    let json: Json = serde_json::from_str(text).context("Edit map is not valid JSON")?;
    match Value::from_json(json) {
        Value::Map(values) => Ok(values),
        other => bail!("Edit map must be a JSON object, got {}", kind(&other)),
    }
}

/// Reads edit-map text from a file, or from stdin when the path is `-`.
pub fn read_values(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read edit map from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(source).with_context(|| format!("Failed to read edit map {source}"))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Int(_) | Value::Float(_) => "a number",
        Value::Text(_) => "a string",
        Value::List(_) => "an array",
        _ => "an object",
    }
}
