use json_vet::{Draft, Error, ReferenceError, Validator, equality, structural};
use serde_json::{Value, json};

fn samples() -> Vec<Value> {
    vec![
        json!(null),
        json!(true),
        json!(0),
        json!(-2.5),
        json!(""),
        json!("Ada"),
        json!([]),
        json!([1, "two", [3]]),
        json!({}),
        json!({"nested": {"a": [1, {"b": null}]}}),
    ]
}

fn failure(schema: &Value, instance: &Value) -> json_vet::ValidationError {
    match Validator::new(schema).unwrap().validate(instance) {
        Err(Error::Invalid(e)) => e,
        other => panic!("expected an instance failure, got {other:?}"),
    }
}

// ---- boolean schemas ---- //

#[test]
fn true_schema_accepts_everything() {
    let v = Validator::new(&json!(true)).unwrap();
    for value in samples() {
        assert!(v.validate(&value).is_ok(), "{value} rejected");
    }
}

#[test]
fn false_schema_rejects_everything() {
    let v = Validator::new(&json!(false)).unwrap();
    for value in samples() {
        assert!(v.validate(&value).unwrap_err().is_invalid(), "{value} accepted");
    }
}

// ---- oneOf ---- //

#[test]
fn one_of_needs_exactly_one_branch() {
    let schema = json!({"oneOf": [{"type": "integer"}, {"minimum": 10}]});
    let v = Validator::new(&schema).unwrap();
    assert!(v.is_valid(&json!(3)));
    assert!(v.is_valid(&json!(10.5)));
    // both branches
    assert!(!v.is_valid(&json!(12)));

    let neither = failure(&schema, &json!(2.5));
    assert_eq!(neither.causes.len(), 2);
    assert_eq!(neither.pointer(), "#");
}

// ---- equality ---- //

#[test]
fn equality_is_symmetric_and_reflexive() {
    let a = json!({"x": 1, "y": {"p": [1, 2], "q": "s"}});
    let b = json!({"y": {"q": "s", "p": [1, 2]}, "x": 1.0});
    assert!(equality::equal(&a, &b));
    assert!(equality::equal(&b, &a));
    for value in samples().iter().chain([&a, &b]) {
        assert!(equality::equal(value, value));
    }
    let c = json!({"x": 1, "y": {"p": [1, 2]}});
    assert!(!equality::equal(&a, &c));
    assert!(!equality::equal(&c, &a));
}

// ---- exclusive bounds per draft ---- //

#[test]
fn exclusive_minimum_2020_12() {
    let v = Validator::new(&json!({"type": "integer", "exclusiveMinimum": 5})).unwrap();
    assert_eq!(v.draft(), Draft::December2020);
    assert!(v.is_valid(&json!(6)));
    assert!(!v.is_valid(&json!(5)));
}

#[test]
fn exclusive_minimum_draft_04() {
    let v = Validator::new(&json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "type": "integer",
        "minimum": 5,
        "exclusiveMinimum": true
    }))
    .unwrap();
    assert_eq!(v.draft(), Draft::Draft04);
    assert!(v.is_valid(&json!(6)));
    assert!(!v.is_valid(&json!(5)));
}

#[test]
fn draft_04_shape_is_rejected_under_2020_12() {
    let err = Validator::new(&json!({"minimum": 5, "exclusiveMinimum": true})).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

// ---- scenarios ---- //

#[test]
fn required_name() {
    let schema = json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]});
    assert!(json_vet::is_valid(&schema, &json!({"name": "Ada"})));
    let e = failure(&schema, &json!({}));
    assert_eq!(e.pointer(), "#");
    assert!(e.message.contains("name"));
}

#[test]
fn integer_list() {
    let schema = json!({"type": "array", "items": {"type": "integer"}, "minItems": 2});
    assert!(json_vet::is_valid(&schema, &json!([1, 2, 3])));
    assert!(failure(&schema, &json!([1])).message.contains("minItems"));
    assert_eq!(failure(&schema, &json!([1, "x"])).pointer(), "#/items/1");
}

#[test]
fn all_of_fails_on_the_second_branch() {
    let schema = json!({"allOf": [{"type": "string"}, {"minLength": 3}]});
    assert!(json_vet::is_valid(&schema, &json!("abcd")));
    let e = failure(&schema, &json!("ab"));
    assert_eq!(e.pointer(), "#/allOf/1");
    assert!(e.message.contains("minLength"));
}

#[test]
fn self_reference_terminates() {
    let schema = json!({"$id": "#", "type": "object", "properties": {"child": {"$ref": "#"}}});
    let v = Validator::new(&schema).unwrap();
    assert!(v.is_valid(&json!({"child": {"child": {}}})));
    let e = v.validate(&json!({"child": {"child": 3}})).unwrap_err();
    assert_eq!(e.as_invalid().unwrap().pointer(), "#/properties/child/$ref/properties/child/$ref");
}

#[test]
fn reference_loops_fail_at_build_time() {
    for schema in [
        json!({"$ref": "#"}),
        json!({"$defs": {"a": {"$ref": "#/$defs/a"}}, "$ref": "#/$defs/a"}),
        json!({"$defs": {"a": {"allOf": [{"$ref": "#/$defs/b"}]}, "b": {"oneOf": [{"$ref": "#/$defs/a"}]}}}),
    ] {
        let err = Validator::new(&schema).unwrap_err();
        assert!(matches!(err, Error::Reference(ReferenceError::Circular(_))), "{schema}: {err}");
    }
}

#[test]
fn external_reference_does_not_borrow_a_local_definition() {
    let schema = json!({"$defs": {"foo.json": {"type": "string"}}, "properties": {"a": {"$ref": "foo.json"}}});
    let err = Validator::new(&schema).unwrap().validate(&json!({"a": 1})).unwrap_err();
    assert!(matches!(err, Error::Reference(ReferenceError::Unresolved { .. })), "{err}");
}

#[test]
fn unique_items_compare_objects_by_value() {
    assert!(!json_vet::is_valid(&json!({"uniqueItems": true}), &json!([{"a": 1}, {"a": 1}])));
}

// ---- canonical form ---- //

#[test]
fn emitted_schemas_pass_the_structural_check() {
    let cases = [
        (json!({
            "type": "object",
            "properties": {
                "tree": {"$ref": "#/$defs/node"},
                "tag": {"$ref": "#/properties/name"},
                "name": {"type": "string", "pattern": "^[a-z]+$"}
            },
            "$defs": {
                "node": {"type": "object", "properties": {"kids": {"type": "array", "items": {"$ref": "#/$defs/node"}}}}
            }
        }),
        vec![
            json!({"name": "ada", "tag": "x"}),
            json!({"name": "Ada"}),
            json!({"tag": 1}),
            json!({"tree": {"kids": [{"kids": []}, {}]}}),
            json!({"tree": {"kids": [{"kids": 3}]}}),
        ]),
        (json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "definitions": {"positive": {"type": "number", "minimum": 0, "exclusiveMinimum": true}},
            "type": "array",
            "items": [{"$ref": "#/definitions/positive"}, {"enum": ["a", "b"]}],
            "additionalItems": false,
            "dependencies": {"a": ["b"]}
        }),
        vec![json!([1, "a"]), json!([0, "a"]), json!([-1]), json!([1, "c"]), json!([1, "a", 2])]),
        (json!({
            "$schema": "https://json-schema.org/draft/2019-09/schema",
            "if": {"properties": {"kind": {"const": "n"}}},
            "then": {"properties": {"value": {"type": "integer", "exclusiveMaximum": 10}}},
            "else": {"properties": {"value": {"type": "string", "format": "date"}}},
            "unevaluatedProperties": false
        }),
        vec![
            json!({"kind": "n", "value": 3}),
            json!({"kind": "n", "value": 10}),
            json!({"kind": "s", "value": "2024-02-30"}),
            json!({"kind": "s", "value": "2024-02-03"}),
            json!({"kind": "n", "value": 3, "extra": true}),
        ]),
    ];
    for (schema, instances) in cases {
        let v = Validator::new(&schema).unwrap();
        let out = v.to_json();
        if let Err(e) = structural::check(&out, v.draft(), false) {
            panic!("canonical form of {schema} rejected: {e}\n{out:#}");
        }
        // and it still means the same thing
        let again = Validator::new(&out).unwrap();
        assert_eq!(again.draft(), v.draft());
        for x in instances.iter().chain(&samples()) {
            assert_eq!(v.is_valid(x), again.is_valid(x), "{x} judged differently after emitting {out:#}");
        }
    }
}

#[test]
fn validators_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Validator>();
}
