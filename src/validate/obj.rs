use serde_json::{Map, Value};

use crate::equality::{accepts_all, rejects_all};
use crate::error::{PathSegment, Result};
use crate::ir::ObjectKeywords;

use super::{Evaluated, Walker, at2, invalid};

impl Walker<'_> {
    pub(super) fn object(
        &self,
        kw: &ObjectKeywords,
        map: &Map<String, Value>,
        path: &[PathSegment],
    ) -> Result<Evaluated> {
        let count = map.len() as u64;
        if let Some(min) = kw.min_properties {
            if count < min {
                return Err(invalid(path, format!("object has {count} properties, fewer than minProperties {min}")));
            }
        }
        if let Some(max) = kw.max_properties {
            if count > max {
                return Err(invalid(path, format!("object has {count} properties, more than maxProperties {max}")));
            }
        }

        let missing: Vec<&str> = kw
            .required
            .iter()
            .filter(|name| !map.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(invalid(path, format!("missing required property {}", quoted(&missing))));
        }

        let mut evaluated = Evaluated::default();
        // vacuous schemas still claim their key; a missing key is `required`'s business alone
        for (name, schema) in &kw.properties {
            if let Some(value) = map.get(name) {
                if !accepts_all(schema) {
                    self.node(schema, value, &at2(path, "properties", name))?;
                }
                evaluated.keys.insert(name.clone());
            }
        }
        for (key, value) in map {
            for (pattern, schema) in &kw.pattern_properties {
                if pattern.is_match(key) {
                    self.node(schema, value, &at2(path, "patternProperties", key))?;
                    evaluated.keys.insert(key.clone());
                }
            }
        }

        if let Some(additional) = &kw.additional_properties {
            let extra: Vec<&String> = map
                .keys()
                .filter(|k| !kw.properties.contains_key(k.as_str()))
                .filter(|k| !kw.pattern_properties.iter().any(|(p, _)| p.is_match(k)))
                .collect();
            if !extra.is_empty() && rejects_all(additional) {
                let names: Vec<&str> = extra.iter().map(|k| k.as_str()).collect();
                return Err(invalid(path, format!("additional property {} is not allowed", quoted(&names))));
            }
            if !accepts_all(additional) {
                for key in extra {
                    self.node(additional, &map[key], &at2(path, "additionalProperties", key))?;
                }
            }
            evaluated.all_keys = true;
        }

        if let Some(names) = &kw.property_names {
            for key in map.keys() {
                self.node(names, &Value::String(key.clone()), &at2(path, "propertyNames", key))?;
            }
        }

        for (name, needed) in &kw.dependent_required {
            if !map.contains_key(name) {
                continue;
            }
            let absent: Vec<&str> = needed
                .iter()
                .filter(|n| !map.contains_key(n.as_str()))
                .map(String::as_str)
                .collect();
            if !absent.is_empty() {
                return Err(invalid(path, format!("property `{name}` requires {}", quoted(&absent))));
            }
        }
        for (name, schema) in &kw.dependent_schemas {
            if map.contains_key(name) {
                // the dependent schema sees the whole object
                let value = Value::Object(map.clone());
                evaluated.merge(self.node(schema, &value, &at2(path, "dependentSchemas", name))?);
            }
        }
        Ok(evaluated)
    }

    pub(super) fn unevaluated_properties(
        &self,
        kw: &ObjectKeywords,
        map: &Map<String, Value>,
        evaluated: &Evaluated,
        path: &[PathSegment],
    ) -> Result<()> {
        let Some(schema) = &kw.unevaluated_properties else { return Ok(()) };
        let leftover: Vec<(&String, &Value)> = map.iter().filter(|(k, _)| !evaluated.has_key(k)).collect();
        if !leftover.is_empty() && rejects_all(schema) {
            let names: Vec<&str> = leftover.iter().map(|(k, _)| k.as_str()).collect();
            return Err(invalid(path, format!("unevaluated property {} is not allowed", quoted(&names))));
        }
        for (key, value) in leftover {
            self.node(schema, value, &at2(path, "unevaluatedProperties", key))?;
        }
        Ok(())
    }
}

fn quoted(names: &[&str]) -> String {
    names.iter().map(|n| format!("`{n}`")).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use crate::Validator;
    use crate::error::Error;
    use serde_json::{Value, json};

    fn failure(schema: Value, instance: Value) -> (String, String) {
        match Validator::new(&schema).unwrap().validate(&instance) {
            Err(Error::Invalid(e)) => (e.pointer(), e.message),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn required_reports_at_the_object() {
        let schema = json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]});
        assert!(Validator::new(&schema).unwrap().is_valid(&json!({"name": "Ada"})));
        let (ptr, msg) = failure(schema.clone(), json!({}));
        assert_eq!(ptr, "#");
        assert!(msg.contains("`name`"));
        assert_eq!(failure(schema, json!({"name": 1})).0, "#/properties/name");
    }

    #[test]
    fn additional_properties_respect_patterns() {
        let schema = json!({
            "properties": {"id": {"type": "integer"}},
            "patternProperties": {"^x-": {"type": "string"}},
            "additionalProperties": false
        });
        let v = Validator::new(&schema).unwrap();
        assert!(v.is_valid(&json!({"id": 1, "x-note": "hi"})));
        let (ptr, msg) = failure(schema.clone(), json!({"id": 1, "other": true}));
        assert_eq!(ptr, "#");
        assert!(msg.contains("`other`"));
        assert_eq!(failure(schema, json!({"x-note": 3})).0, "#/patternProperties/x-note");

        let typed = Validator::new(&json!({"additionalProperties": {"type": "boolean"}})).unwrap();
        assert!(typed.is_valid(&json!({"a": true})));
        assert!(!typed.is_valid(&json!({"a": 1})));
    }

    #[test]
    fn vacuous_property_schemas_claim_keys_but_never_excuse_absence() {
        let schema = json!({
            "properties": {"a": true, "b": {}, "c": {"not": false}},
            "required": ["a"],
            "unevaluatedProperties": false
        });
        let v = Validator::new(&schema).unwrap();
        assert!(v.is_valid(&json!({"a": [1], "b": null, "c": {"x": 1}})));
        let (ptr, msg) = failure(schema.clone(), json!({"b": 1}));
        assert_eq!(ptr, "#");
        assert!(msg.contains("`a`"));
        assert!(failure(schema, json!({"a": 1, "d": 1})).1.contains("`d`"));
    }

    #[test]
    fn property_names_and_counts() {
        let v = Validator::new(&json!({"propertyNames": {"maxLength": 3}, "maxProperties": 2})).unwrap();
        assert!(v.is_valid(&json!({"abc": 1})));
        assert!(!v.is_valid(&json!({"abcd": 1})));
        assert!(!v.is_valid(&json!({"a": 1, "b": 2, "c": 3})));
    }

    #[test]
    fn dependencies_apply_when_the_trigger_exists() {
        let v = Validator::new(&json!({
            "dependentRequired": {"card": ["billing"]},
            "dependentSchemas": {"card": {"properties": {"billing": {"type": "string"}}}}
        }))
        .unwrap();
        assert!(v.is_valid(&json!({})));
        assert!(v.is_valid(&json!({"card": 1, "billing": "addr"})));
        assert!(!v.is_valid(&json!({"card": 1})));
        assert!(!v.is_valid(&json!({"card": 1, "billing": 2})));
    }

    #[test]
    fn unevaluated_properties_see_combinators() {
        let schema = json!({
            "properties": {"a": true},
            "anyOf": [{"properties": {"b": true}}, {"properties": {"c": true}}],
            "unevaluatedProperties": false
        });
        let v = Validator::new(&schema).unwrap();
        assert!(v.is_valid(&json!({"a": 1, "b": 2, "c": 3})));
        let (_, msg) = failure(schema, json!({"a": 1, "d": 4}));
        assert!(msg.contains("`d`"));

        let nested = Validator::new(&json!({
            "allOf": [{"additionalProperties": true}],
            "unevaluatedProperties": false
        }))
        .unwrap();
        assert!(nested.is_valid(&json!({"anything": 1})));
    }
}
