use pretty_assertions::assert_eq;
use rpcctx_model::{
    ComputeRule, ContextError, FieldSource, Record, SchemaDocument, SchemaRegistry, Value,
};
use serde_json::json;

const INVOICE_SCHEMA: &str = r#"
{
  "entities": [
    {
      "name": "Invoice",
      "base": "Audited",
      "fields": [
        { "name": "version" },
        { "name": "lines", "kind": { "type": "collection", "target": "InvoiceLine" } },
        { "name": "attrs", "json": true }
      ],
      "read_only": [ { "name": "number" } ],
      "computed": [
        { "name": "total", "rule": { "op": "sum", "collection": "lines", "field": "qty" } },
        { "name": "line_count", "rule": { "op": "count", "collection": "lines" } }
      ]
    },
    {
      "name": "Audited",
      "fields": [ { "name": "id" }, { "name": "updated_by" } ]
    },
    {
      "name": "InvoiceLine",
      "fields": [ { "name": "id" }, { "name": "qty" }, { "name": "price" } ],
      "computed": [
        { "name": "amount", "rule": { "op": "product", "fields": ["qty", "price"] } }
      ]
    }
  ]
}
"#;

fn invoice_record(lines: serde_json::Value) -> Record {
    let row = json!({ "id": 1, "lines": lines });
    Record::from_json("Invoice", row.as_object().unwrap().clone())
}

// ── Loading ──────────────────────────────────────────────────────

#[test]
fn bases_resolve_regardless_of_order() {
    let schema = SchemaDocument::from_json_str(INVOICE_SCHEMA)
        .unwrap()
        .into_schema()
        .unwrap();
    assert_eq!(schema.len(), 3);

    let invoice = schema.entity("Invoice").unwrap();
    assert_eq!(invoice.base().unwrap().name(), "Audited");
    assert!(invoice.field("updated_by").is_some());
    assert!(invoice.inherited_setter("id").is_some());
    assert!(invoice.setter("number").is_none());
    assert!(invoice.field("attrs").unwrap().json);
    assert!(invoice.is_versioned());
}

#[test]
fn computed_rules_declare_dependencies() {
    let schema = SchemaDocument::from_json_str(INVOICE_SCHEMA)
        .unwrap()
        .into_schema()
        .unwrap();
    let line = schema.entity("InvoiceLine").unwrap();
    let depends: Vec<_> = line
        .dependencies("amount")
        .unwrap()
        .iter()
        .cloned()
        .collect();
    assert_eq!(depends, vec!["price".to_string(), "qty".to_string()]);
}

#[test]
fn missing_base_is_an_unknown_entity() {
    let doc = SchemaDocument::from_json_str(
        r#"{ "entities": [ { "name": "Orphan", "base": "Nowhere" } ] }"#,
    )
    .unwrap();
    let err = doc.into_schema().unwrap_err();
    assert!(matches!(err, ContextError::UnknownEntity(ref name) if name == "Nowhere"));
}

#[test]
fn cyclic_bases_fail() {
    let doc = SchemaDocument::from_json_str(
        r#"{ "entities": [ { "name": "A", "base": "B" }, { "name": "B", "base": "A" } ] }"#,
    )
    .unwrap();
    assert!(doc.into_schema().is_err());
}

#[test]
fn unknown_rule_is_rejected() {
    let err = SchemaDocument::from_json_str(
        r#"{ "entities": [ { "name": "A", "computed": [ { "name": "x", "rule": { "op": "median" } } ] } ] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ContextError::Json(_)));
}

#[test]
fn from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.json");
    std::fs::write(&path, INVOICE_SCHEMA).unwrap();

    let doc = SchemaDocument::from_path(&path).unwrap();
    assert_eq!(doc.entities.len(), 3);

    let missing = SchemaDocument::from_path(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(missing, ContextError::Io(_)));
}

// ── Rules ────────────────────────────────────────────────────────

#[test]
fn sum_adds_field_over_collection() {
    let rule = ComputeRule::Sum {
        collection: "lines".into(),
        field: "qty".into(),
    };
    let record = invoice_record(json!([ { "qty": 2 }, { "qty": 3 }, { "price": 1 } ]));
    assert_eq!(rule.eval(&record).unwrap(), Value::Int(5));
}

#[test]
fn sum_switches_to_float_when_needed() {
    let rule = ComputeRule::Sum {
        collection: "lines".into(),
        field: "qty".into(),
    };
    let record = invoice_record(json!([ { "qty": 2 }, { "qty": 0.5 } ]));
    assert_eq!(rule.eval(&record).unwrap(), Value::Float(2.5));
}

#[test]
fn sum_over_missing_collection_is_zero() {
    let rule = ComputeRule::Sum {
        collection: "lines".into(),
        field: "qty".into(),
    };
    assert_eq!(rule.eval(&Record::new("Invoice")).unwrap(), Value::Int(0));
}

#[test]
fn count_counts_items() {
    let rule = ComputeRule::Count {
        collection: "lines".into(),
    };
    let record = invoice_record(json!([ {}, {}, {} ]));
    assert_eq!(rule.eval(&record).unwrap(), Value::Int(3));
    assert_eq!(rule.depends(), vec!["lines"]);
}

#[test]
fn product_multiplies_fields() {
    let rule = ComputeRule::Product {
        fields: vec!["qty".into(), "price".into()],
    };
    let mut record = Record::new("InvoiceLine");
    record.set("qty", Value::Int(4));
    record.set("price", Value::Int(25));
    assert_eq!(rule.eval(&record).unwrap(), Value::Int(100));

    record.set("price", Value::Null);
    assert_eq!(rule.eval(&record).unwrap(), Value::Int(0));
}

#[test]
fn schema_compute_fn_uses_rule() {
    let schema = SchemaDocument::from_json_str(INVOICE_SCHEMA)
        .unwrap()
        .into_schema()
        .unwrap();
    let invoice = schema.entity("Invoice").unwrap();
    let record = invoice_record(json!([ { "qty": 1 }, { "qty": 6 } ]));

    let total = invoice.compute_fn("total").unwrap();
    let count = invoice.compute_fn("line_count").unwrap();
    assert_eq!(total(&record as &dyn FieldSource, &[]).unwrap(), Value::Int(7));
    assert_eq!(count(&record as &dyn FieldSource, &[]).unwrap(), Value::Int(2));
}
