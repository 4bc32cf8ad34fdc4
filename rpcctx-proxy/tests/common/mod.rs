//! Shared invoice fixtures for proxy integration tests.

#![allow(dead_code)]

use rpcctx_model::{
    ContextError, EntityType, FieldDescriptor, FieldSource, Schema, SchemaRegistry, Value,
    ValueMap,
};
use rpcctx_proxy::{Collaborators, ContextProxy, ProxyConfig};
use rpcctx_store::MemoryStore;
use serde_json::json;
use std::sync::Arc;

pub fn audited_type() -> Arc<EntityType> {
    EntityType::builder("Audited")
        .field(FieldDescriptor::scalar("id"))
        .field(FieldDescriptor::scalar("updated_by"))
        .build()
}

pub fn line_type() -> Arc<EntityType> {
    EntityType::builder("InvoiceLine")
        .field(FieldDescriptor::scalar("id"))
        .field(FieldDescriptor::scalar("version"))
        .field(FieldDescriptor::scalar("qty"))
        .field(FieldDescriptor::scalar("price"))
        .field(FieldDescriptor::scalar("selected"))
        .computed("amount", ["qty", "price"], |source: &dyn FieldSource, _: &[Value]| {
            let qty = source.field("qty")?.as_i64().unwrap_or(0);
            let price = source.field("price")?.as_i64().unwrap_or(0);
            Ok(Value::Int(qty * price))
        })
        .build()
}

pub fn customer_type() -> Arc<EntityType> {
    EntityType::builder("Customer")
        .field(FieldDescriptor::scalar("id"))
        .field(FieldDescriptor::scalar("name"))
        .build()
}

/// Invoice inherits `updated_by` from `Audited` without declaring its own setter.
pub fn invoice_type(audited: Arc<EntityType>) -> Arc<EntityType> {
    EntityType::builder("Invoice")
        .base(audited)
        .field(FieldDescriptor::scalar("version"))
        .field(FieldDescriptor::scalar("note"))
        .setter("note", |record, value| {
            if value.as_str() == Some("") {
                return Err(ContextError::rejected("note", "must not be empty"));
            }
            record.set("note", value);
            Ok(())
        })
        .field(FieldDescriptor::reference("customer", "Customer"))
        .field(FieldDescriptor::collection("lines", "InvoiceLine"))
        .field(FieldDescriptor::scalar("draft").transient())
        .field(FieldDescriptor::json("attrs"))
        .read_only(FieldDescriptor::scalar("number"))
        .computed("total", ["lines"], |source: &dyn FieldSource, _: &[Value]| {
            let mut total = 0;
            for line in source.field("lines")?.as_list().unwrap_or_default() {
                total += line.field("qty")?.as_i64().unwrap_or(0);
            }
            Ok(Value::Int(total))
        })
        .computed("label", [], |source: &dyn FieldSource, args: &[Value]| {
            let prefix = args.first().and_then(Value::as_str).unwrap_or("#");
            let id = source.field("id")?.as_i64().unwrap_or(0);
            Ok(Value::Text(format!("{prefix}{id}")))
        })
        .build()
}

pub fn schema() -> Schema {
    let audited = audited_type();
    Schema::new()
        .with(Arc::clone(&audited))
        .with(invoice_type(audited))
        .with(line_type())
        .with(customer_type())
}

pub fn store() -> Arc<MemoryStore> {
    let store = MemoryStore::from_json(json!({
        "Invoice": [
            { "id": 7, "version": 3, "note": "stored", "number": "INV-7",
              "customer": 2, "updated_by": "alice",
              "lines": [ { "id": 3 } ],
              "attrs": "{\"color\":\"red\"}" }
        ],
        "InvoiceLine": [ { "id": 3, "version": 1, "qty": 1, "price": 10 } ],
        "Customer": [ { "id": 2, "name": "Acme" } ]
    }))
    .unwrap();
    Arc::new(store)
}

pub fn collaborators(store: &Arc<MemoryStore>) -> Collaborators {
    let schema: Arc<dyn SchemaRegistry> = Arc::new(schema());
    Collaborators::new(schema, Arc::clone(store) as _)
}

pub fn strict(store: &Arc<MemoryStore>) -> Collaborators {
    collaborators(store).with_config(ProxyConfig {
        strict_fields: true,
        ..ProxyConfig::default()
    })
}

/// Builds an edit map from a JSON object literal.
pub fn edits(json: serde_json::Value) -> ValueMap {
    match Value::from_json(json) {
        Value::Map(map) => map,
        other => panic!("edit map must be an object, got {other:?}"),
    }
}

pub fn invoice(store: &Arc<MemoryStore>, json: serde_json::Value) -> ContextProxy {
    ContextProxy::of("Invoice", edits(json), collaborators(store)).unwrap()
}
