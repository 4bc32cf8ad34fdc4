use pretty_assertions::assert_eq;
use rpcctx_model::{
    BlankFactory, ContextError, EntityId, EntityType, FieldDescriptor, FieldKind, FieldSource,
    IdentityResolver, InstanceFactory, Record, Schema, SchemaRegistry, Value,
};
use std::sync::Arc;

fn audited() -> Arc<EntityType> {
    EntityType::builder("Audited")
        .field(FieldDescriptor::scalar("id"))
        .field(FieldDescriptor::scalar("updated_by"))
        .build()
}

fn order() -> Arc<EntityType> {
    EntityType::builder("Order")
        .base(audited())
        .field(FieldDescriptor::scalar("version"))
        .field(FieldDescriptor::scalar("qty"))
        .setter("qty", |record, value| match value {
            Value::Int(n) if n < 0 => Err(ContextError::rejected("qty", "negative")),
            value => {
                record.set("qty", value);
                Ok(())
            }
        })
        .field(FieldDescriptor::collection("lines", "Line"))
        .field(FieldDescriptor::reference("customer", "Customer"))
        .read_only(FieldDescriptor::scalar("number"))
        .computed("double", ["qty"], |source: &dyn FieldSource, _: &[Value]| {
            Ok(Value::Int(source.field("qty")?.as_i64().unwrap_or(0) * 2))
        })
        .build()
}

// ── FieldDescriptor constructors ─────────────────────────────────

#[test]
fn scalar_field_defaults() {
    let f = FieldDescriptor::scalar("note");
    assert_eq!(f.name, "note");
    assert_eq!(f.kind, FieldKind::Scalar);
    assert!(!f.computed && !f.transient && !f.json);
    assert_eq!(f.target(), None);
}

#[test]
fn reference_and_collection_targets() {
    let r = FieldDescriptor::reference("customer", "Customer");
    let c = FieldDescriptor::collection("lines", "Line");
    assert!(r.is_reference() && !r.is_collection());
    assert!(c.is_collection() && !c.is_reference());
    assert_eq!(r.target(), Some("Customer"));
    assert_eq!(c.target(), Some("Line"));
}

#[test]
fn computed_field_records_dependencies() {
    let f = FieldDescriptor::computed("total", ["lines", "discount"]);
    assert!(f.computed);
    assert_eq!(
        f.depends.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["discount", "lines"]
    );
}

#[test]
fn descriptor_deserializes_with_defaults() {
    let f: FieldDescriptor = serde_json::from_str(
        r#"{ "name": "lines", "kind": { "type": "collection", "target": "Line" } }"#,
    )
    .unwrap();
    assert_eq!(f, FieldDescriptor::collection("lines", "Line"));

    let t: FieldDescriptor =
        serde_json::from_str(r#"{ "name": "draft", "transient": true }"#).unwrap();
    assert_eq!(t, FieldDescriptor::scalar("draft").transient());
}

// ── EntityType ───────────────────────────────────────────────────

#[test]
fn inherited_fields_are_listed_first() {
    let order = order();
    let names: Vec<_> = order.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["id", "updated_by", "version", "qty", "lines", "customer", "number", "double"]
    );
    assert!(order.is_versioned());
    assert!(!audited().is_versioned());
}

#[test]
fn inherited_field_has_no_own_setter_but_base_has_one() {
    let order = order();
    assert!(order.setter("updated_by").is_none());
    assert!(order.inherited_setter("updated_by").is_some());
    assert!(order.getter("updated_by").is_some());
    assert_eq!(order.base().unwrap().name(), "Audited");
}

#[test]
fn read_only_field_has_getter_only() {
    let order = order();
    assert!(order.getter("number").is_some());
    assert!(order.setter("number").is_none());
    assert!(order.inherited_setter("number").is_none());
}

#[test]
fn custom_setter_can_reject() {
    let order = order();
    let set = order.setter("qty").unwrap();
    let mut record = Record::new("Order");

    set(&mut record, Value::Int(2)).unwrap();
    assert_eq!(record.get("qty"), Value::Int(2));

    let err = set(&mut record, Value::Int(-1)).unwrap_err();
    assert!(matches!(err, ContextError::SetterRejected { ref field, .. } if field == "qty"));
    assert_eq!(record.get("qty"), Value::Int(2));
}

#[test]
fn computed_field_has_compute_fn_and_dependencies() {
    let order = order();
    assert_eq!(order.dependencies("double").unwrap().len(), 1);
    assert_eq!(order.dependencies("qty"), None);
    assert!(order.getter("double").is_none());

    let mut record = Record::new("Order");
    record.set("qty", Value::Int(21));
    let compute = order.compute_fn("double").unwrap();
    assert_eq!(compute(&record as &dyn FieldSource, &[]).unwrap(), Value::Int(42));
}

#[test]
fn redeclared_field_replaces_previous_descriptor() {
    let entity = EntityType::builder("T")
        .field(FieldDescriptor::scalar("a"))
        .field(FieldDescriptor::scalar("a").transient())
        .build();
    assert_eq!(entity.fields().len(), 1);
    assert!(entity.field("a").unwrap().transient);
}

#[test]
fn inherited_computed_field_uses_base_compute_fn() {
    let rush = EntityType::builder("RushOrder").base(order()).build();
    assert!(rush.field("double").unwrap().computed);
    assert_eq!(rush.dependencies("double").unwrap().len(), 1);

    let mut record = Record::new("RushOrder");
    record.set("qty", Value::Int(5));
    let compute = rush.compute_fn("double").unwrap();
    assert_eq!(compute(&record as &dyn FieldSource, &[]).unwrap(), Value::Int(10));
    assert!(rush.compute_fn("qty").is_none());
}

#[test]
fn setter_on_inherited_field_overrides_base() {
    let order = EntityType::builder("Order")
        .base(audited())
        .setter("updated_by", |record, value| match value {
            Value::Text(user) if !user.is_empty() => {
                record.set("updated_by", Value::Text(user.to_uppercase()));
                Ok(())
            }
            _ => Err(ContextError::rejected("updated_by", "blank user")),
        })
        .setter("ghost", |_, _| Ok(()))
        .build();

    let set = order.setter("updated_by").unwrap();
    let mut record = Record::new("Order");
    set(&mut record, Value::from("bob")).unwrap();
    assert_eq!(record.get("updated_by"), Value::from("BOB"));
    assert_eq!((order.getter("updated_by").unwrap())(&record), Value::from("BOB"));
    assert!(set(&mut record, Value::from("")).is_err());

    assert!(order.setter("id").is_none());
    assert!(order.setter("ghost").is_none());
    assert!(order.field("ghost").is_none());
}

// ── Schema registry ──────────────────────────────────────────────

#[test]
fn schema_resolves_registered_types() {
    let schema = Schema::new().with(audited()).with(order());
    assert_eq!(schema.len(), 2);
    assert_eq!(schema.entity("Order").unwrap().name(), "Order");
    assert!(schema.entity("Ghost").is_none());
    assert!(Schema::new().is_empty());
}

// ── Collaborators ────────────────────────────────────────────────

#[test]
fn blank_factory_fills_stored_fields() {
    let record = BlankFactory.create(&order());
    assert_eq!(record.entity_type(), "Order");
    assert_eq!(record.get_ref("qty"), Some(&Value::Null));
    assert_eq!(record.get_ref("lines"), Some(&Value::List(Vec::new())));
    assert_eq!(record.get_ref("updated_by"), Some(&Value::Null));
    assert_eq!(record.get_ref("double"), None);
}

#[test]
fn closure_is_an_identity_resolver() {
    let resolver = |entity: &EntityType, id: EntityId| {
        id.is_persistent().then(|| {
            let mut record = Record::new(entity.name());
            record.set("id", Value::Int(id.get()));
            record
        })
    };
    let order = order();

    let found = resolver.find(&order, EntityId::new(5)).unwrap();
    assert_eq!(found.id(), Some(EntityId::new(5)));
    assert!(IdentityResolver::find(&resolver, &order, EntityId::new(0)).is_none());
}
