//! Instance validation.
//!
//! A [`Validator`] owns a lowered, resolved schema tree and never mutates it
//! again; validations share it freely across threads. Each call walks schema
//! and instance in lock-step, in a fixed keyword order:
//!
//! 1. boolean schemas short-circuit,
//! 2. `type`, `const`, `enum`,
//! 3. `$ref` (draft-04: `$ref` alone, siblings ignored),
//! 4. `allOf` (fail-fast), `oneOf`, `anyOf`, `not`, `if`/`then`/`else`,
//! 5. the keywords for the instance's kind (see the submodules),
//! 6. `unevaluatedProperties` / `unevaluatedItems`, which need everything
//!    the applicators above have claimed.
//!
//! Combinators probe branches by catching [`Error::Invalid`] only; schema,
//! reference and unsupported-feature errors always abort the run.
pub mod arr;
pub mod content;
pub mod format;
pub mod num;
pub mod obj;
pub mod text;

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::Options;
use crate::draft::Draft;
use crate::emit;
use crate::equality::{contains_with, equal_with};
use crate::error::{
    Error, PathSegment, ReferenceError, Result, UnsupportedFeature, ValidationError, pointer,
};
use crate::ir::{SchemaNode, Type, describe_types};
use crate::lower::lower;
use crate::resolve::{NoSource, SchemaSource, pool_name, resolve_refs};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A resolved schema, ready to validate any number of instances.
#[derive(Debug, Clone)]
pub struct Validator {
    root: SchemaNode,
    draft: Draft,
    options: Options,
    track: bool,
}

/// Read access to a host object's named members, for values that are not
/// JSON documents themselves.
pub trait Members {
    fn member_names(&self) -> Vec<String>;
    fn member(&self, name: &str) -> Option<Value>;
}

impl Members for Map<String, Value> {
    fn member_names(&self) -> Vec<String> { self.keys().cloned().collect() }
    fn member(&self, name: &str) -> Option<Value> { self.get(name).cloned() }
}

/// Instance locations claimed by successful evaluation, consumed by the
/// `unevaluated*` keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluated {
    pub keys: BTreeSet<String>,
    pub all_keys: bool,
    pub items: BTreeSet<usize>,
    pub all_items: bool,
}

impl Evaluated {
    pub fn merge(&mut self, other: Evaluated) {
        self.keys.extend(other.keys);
        self.items.extend(other.items);
        self.all_keys |= other.all_keys;
        self.all_items |= other.all_items;
    }

    pub fn has_key(&self, key: &str) -> bool { self.all_keys || self.keys.contains(key) }

    pub fn has_item(&self, index: usize) -> bool { self.all_items || self.items.contains(&index) }
}

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

impl Validator {
    /// Lower and resolve a raw schema with default options.
    pub fn new(schema: &Value) -> Result<Self> {
        Self::with_options(schema, Options::default(), &NoSource)
    }

    pub fn with_options(schema: &Value, options: Options, source: &dyn SchemaSource) -> Result<Self> {
        let (root, draft) = lower(schema, &options)?;
        Self::from_node(root, draft, options, source)
    }

    /// Freeze an already built tree. References are resolved here, once.
    pub fn from_node(mut root: SchemaNode, draft: Draft, options: Options, source: &dyn SchemaSource) -> Result<Self> {
        resolve_refs(&mut root, source)?;
        let track = root.uses_unevaluated();
        debug!(%draft, definitions = root.defs.len(), track, "validator ready");
        Ok(Self { root, draft, options, track })
    }

    pub fn root(&self) -> &SchemaNode { &self.root }

    pub fn draft(&self) -> Draft { self.draft }

    pub fn options(&self) -> &Options { &self.options }

    pub fn validate(&self, instance: &Value) -> Result<()> {
        self.walker().node(&self.root, instance, &[]).map(|_| ())
    }

    /// `false` for any error, not only instance failures.
    pub fn is_valid(&self, instance: &Value) -> bool { self.validate(instance).is_ok() }

    /// Validate the serialised form of a host value.
    pub fn validate_serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let instance = serde_json::to_value(value)?;
        self.validate(&instance)
    }

    /// Validate a host object through its member accessors.
    pub fn validate_members(&self, host: &dyn Members) -> Result<()> {
        let instance: Map<String, Value> = host
            .member_names()
            .into_iter()
            .filter_map(|name| host.member(&name).map(|v| (name, v)))
            .collect();
        self.validate(&Value::Object(instance))
    }

    /// Canonical JSON form of the resolved schema.
    pub fn to_json(&self) -> Value { emit::serialize(&self.root, self.draft) }

    fn walker(&self) -> Walker<'_> {
        Walker { root: &self.root, draft: self.draft, options: &self.options, track: self.track }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Per-call view of a validator; the keyword submodules extend it.
pub(crate) struct Walker<'a> {
    root: &'a SchemaNode,
    draft: Draft,
    options: &'a Options,
    track: bool,
}

impl Walker<'_> {
    pub(crate) fn node(&self, schema: &SchemaNode, value: &Value, path: &[PathSegment]) -> Result<Evaluated> {
        match schema.unilateral {
            Some(true) => return Ok(Evaluated::default()),
            Some(false) => return Err(invalid(path, "schema rejects everything")),
            None => {}
        }

        if self.draft == Draft::Draft04 && schema.reference.is_some() {
            return self.reference(schema, value, path);
        }

        if !schema.types.is_empty() && !schema.types.iter().any(|t| t.matches(value)) {
            return Err(invalid(
                path,
                format!("expected {}, found {}", describe_types(&schema.types), Type::of(value)),
            ));
        }

        let arrays = self.options.array_equality;
        if let Some(expected) = &schema.const_value {
            if !equal_with(value, expected, arrays) {
                return Err(invalid(path, format!("value does not equal the const value {expected}")));
            }
        }
        if let Some(options) = &schema.enum_values {
            if !contains_with(value, options, arrays) {
                return Err(invalid(path, format!("value is not one of the {} enum values", options.len())));
            }
        }

        let mut evaluated = Evaluated::default();
        if schema.reference.is_some() {
            evaluated.merge(self.reference(schema, value, path)?);
        }
        if let Some(target) = &schema.dynamic_ref {
            let keyword = if self.draft == Draft::September2019 { "$recursiveRef" } else { "$dynamicRef" };
            return Err(UnsupportedFeature {
                path: path.to_vec(),
                keyword: keyword.to_string(),
                detail: format!("dynamic reference `{target}` is not evaluated"),
            }
            .into());
        }

        if let Some(branches) = &schema.all_of {
            for (i, branch) in branches.iter().enumerate() {
                evaluated.merge(self.node(branch, value, &at2(path, "allOf", i))?);
            }
        }
        if let Some(branches) = &schema.one_of {
            evaluated.merge(self.one_of(branches, value, path)?);
        }
        if let Some(branches) = &schema.any_of {
            evaluated.merge(self.any_of(branches, value, path)?);
        }
        if let Some(negated) = &schema.not {
            match probe(self.node(negated, value, &at(path, "not")))? {
                Ok(_) => return Err(invalid(path, "value must not match the `not` schema")),
                Err(_) => {}
            }
        }
        if let Some(condition) = &schema.if_schema {
            evaluated.merge(self.conditional(schema, condition, value, path)?);
        }

        match value {
            Value::String(s) => {
                if let Some(kw) = &schema.string {
                    self.string(kw, s, path)?;
                }
            }
            Value::Number(n) => {
                if let (Some(kw), Some(f)) = (&schema.number, n.as_f64()) {
                    self.number(kw, f, path)?;
                }
            }
            Value::Array(xs) => {
                if let Some(kw) = &schema.array {
                    evaluated.merge(self.array(kw, xs, path)?);
                    self.unevaluated_items(kw, xs, &evaluated, path)?;
                    evaluated.all_items |= kw.unevaluated_items.is_some();
                }
            }
            Value::Object(map) => {
                if let Some(kw) = &schema.object {
                    evaluated.merge(self.object(kw, map, path)?);
                    self.unevaluated_properties(kw, map, &evaluated, path)?;
                    evaluated.all_keys |= kw.unevaluated_properties.is_some();
                }
            }
            Value::Null | Value::Bool(_) => {}
        }
        Ok(evaluated)
    }

    fn reference(&self, schema: &SchemaNode, value: &Value, path: &[PathSegment]) -> Result<Evaluated> {
        let reference = schema.reference.as_deref().unwrap_or_default();
        let resolved = schema.resolved_ref.as_deref().unwrap_or(reference);
        let target = if resolved == "#" {
            Some(self.root)
        } else {
            pool_name(resolved).and_then(|name| self.root.definition(&name))
        };
        let Some(target) = target else {
            return Err(ReferenceError::Unresolved { reference: reference.to_string(), pointer: pointer(path) }.into());
        };
        self.node(target, value, &at(path, "$ref"))
    }

    fn one_of(&self, branches: &[SchemaNode], value: &Value, path: &[PathSegment]) -> Result<Evaluated> {
        let mut passed: Vec<(usize, Evaluated)> = Vec::new();
        let mut failures = Vec::new();
        for (i, branch) in branches.iter().enumerate() {
            match probe(self.node(branch, value, &at2(path, "oneOf", i)))? {
                Ok(ev) => passed.push((i, ev)),
                Err(e) => failures.push(e),
            }
        }
        trace!(path = %pointer(path), passed = passed.len(), failed = failures.len(), "oneOf probed");
        match passed.len() {
            1 => Ok(passed.pop().map(|(_, ev)| ev).unwrap_or_default()),
            0 => Err(ValidationError::new(path, format!("value matches none of the {} oneOf branches", branches.len()))
                .with_causes(failures)
                .into()),
            _ => {
                let indices: Vec<String> = passed.iter().map(|(i, _)| i.to_string()).collect();
                Err(ValidationError::new(
                    path,
                    format!("value matches oneOf branches {} but must match exactly one", indices.join(", ")),
                )
                .with_causes(failures)
                .into())
            }
        }
    }

    fn any_of(&self, branches: &[SchemaNode], value: &Value, path: &[PathSegment]) -> Result<Evaluated> {
        let mut matched: Option<Evaluated> = None;
        let mut failures = Vec::new();
        for (i, branch) in branches.iter().enumerate() {
            match probe(self.node(branch, value, &at2(path, "anyOf", i)))? {
                Ok(ev) => {
                    matched.get_or_insert_with(Evaluated::default).merge(ev);
                    // every passing branch contributes annotations
                    if !self.track {
                        break;
                    }
                }
                Err(e) => failures.push(e),
            }
        }
        trace!(path = %pointer(path), matched = matched.is_some(), failed = failures.len(), "anyOf probed");
        matched.ok_or_else(|| {
            ValidationError::new(path, format!("value matches none of the {} anyOf branches", branches.len()))
                .with_causes(failures)
                .into()
        })
    }

    fn conditional(
        &self,
        schema: &SchemaNode,
        condition: &SchemaNode,
        value: &Value,
        path: &[PathSegment],
    ) -> Result<Evaluated> {
        match probe(self.node(condition, value, &at(path, "if")))? {
            Ok(mut ev) => {
                trace!(path = %pointer(path), "if matched");
                if let Some(then) = &schema.then_schema {
                    ev.merge(self.node(then, value, &at(path, "then"))?);
                }
                Ok(ev)
            }
            Err(_) => match &schema.else_schema {
                Some(otherwise) => self.node(otherwise, value, &at(path, "else")),
                None => Ok(Evaluated::default()),
            },
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Split a branch outcome: instance failures become data, anything else
/// keeps propagating.
fn probe(outcome: Result<Evaluated>) -> Result<std::result::Result<Evaluated, ValidationError>> {
    match outcome {
        Ok(ev) => Ok(Ok(ev)),
        Err(Error::Invalid(e)) => Ok(Err(e)),
        Err(other) => Err(other),
    }
}

pub(crate) fn invalid(path: &[PathSegment], message: impl Into<String>) -> Error {
    ValidationError::new(path, message).into()
}

pub(crate) fn at(path: &[PathSegment], seg: impl Into<PathSegment>) -> Vec<PathSegment> {
    let mut out = Vec::with_capacity(path.len() + 1);
    out.extend_from_slice(path);
    out.push(seg.into());
    out
}

pub(crate) fn at2(path: &[PathSegment], keyword: &str, seg: impl Into<PathSegment>) -> Vec<PathSegment> {
    let mut out = at(path, keyword);
    out.push(seg.into());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(schema: Value, instance: Value) -> Result<()> {
        Validator::new(&schema).unwrap().validate(&instance)
    }

    fn failure(schema: Value, instance: Value) -> ValidationError {
        match check(schema, instance) {
            Err(Error::Invalid(e)) => e,
            other => panic!("expected an instance failure, got {other:?}"),
        }
    }

    #[test]
    fn validator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Validator>();
    }

    #[test]
    fn boolean_schemas_short_circuit() {
        assert!(check(json!(true), json!({"anything": [1, 2]})).is_ok());
        let err = failure(json!(false), json!(null));
        assert_eq!(err.to_string(), "#: schema rejects everything");
    }

    #[test]
    fn type_failures_name_both_kinds() {
        let err = failure(json!({"type": ["string", "null"]}), json!(3));
        assert_eq!(err.message, "expected string or null, found integer");
        assert!(check(json!({"type": "integer"}), json!(1.0)).is_ok());
    }

    #[test]
    fn one_of_needs_exactly_one_branch() {
        let schema = json!({"oneOf": [{"type": "integer"}, {"minimum": 2}]});
        assert!(check(schema.clone(), json!(1)).is_ok());
        let both = failure(schema.clone(), json!(3));
        assert!(both.message.contains("exactly one"));
        let none = failure(json!({"oneOf": [{"type": "string"}, {"type": "boolean"}]}), json!(1.5));
        assert_eq!(none.causes.len(), 2);
        assert_eq!(none.causes[0].pointer(), "#/oneOf/0");
    }

    #[test]
    fn any_of_and_not() {
        let schema = json!({"anyOf": [{"type": "string"}, {"type": "null"}]});
        assert!(check(schema.clone(), json!(null)).is_ok());
        assert_eq!(failure(schema, json!(1)).causes.len(), 2);
        assert!(check(json!({"not": {"type": "string"}}), json!(1)).is_ok());
        assert!(check(json!({"not": {"type": "string"}}), json!("s")).is_err());
    }

    #[test]
    fn conditionals_pick_a_branch() {
        let schema = json!({
            "if": {"type": "integer"},
            "then": {"minimum": 10},
            "else": {"type": "string"}
        });
        assert!(check(schema.clone(), json!(12)).is_ok());
        assert_eq!(failure(schema.clone(), json!(3)).pointer(), "#/then");
        assert!(check(schema.clone(), json!("x")).is_ok());
        assert_eq!(failure(schema, json!(null)).pointer(), "#/else");
    }

    #[test]
    fn draft04_ref_overrides_siblings() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "definitions": {"n": {"type": "integer"}},
            "properties": {"a": {"$ref": "#/definitions/n", "maximum": 1}}
        });
        assert!(check(schema.clone(), json!({"a": 5})).is_ok());
        assert_eq!(failure(schema, json!({"a": "x"})).pointer(), "#/properties/a/$ref");
    }

    #[test]
    fn dynamic_refs_are_unsupported_not_invalid() {
        let result = check(json!({"$dynamicRef": "#meta"}), json!(1));
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }

    #[test]
    fn dangling_refs_are_reference_errors() {
        let result = check(json!({"$ref": "#/$defs/missing"}), json!(1));
        assert!(matches!(result, Err(Error::Reference(ReferenceError::Unresolved { .. }))));
        // a probe does not swallow it either
        let result = check(json!({"anyOf": [{"$ref": "other.json"}, true]}), json!(1));
        assert!(matches!(result, Err(Error::Reference(_))));
    }

    #[test]
    fn host_values_validate_through_serde_and_members() {
        #[derive(Serialize)]
        struct Person {
            name: String,
            age: u8,
        }
        let v = Validator::new(&json!({
            "type": "object",
            "properties": {"age": {"maximum": 150}},
            "required": ["name"]
        }))
        .unwrap();
        assert!(v.validate_serialize(&Person { name: "Ada".into(), age: 36 }).is_ok());

        let mut host = Map::new();
        host.insert("age".into(), json!(200));
        let err = v.validate_members(&host).unwrap_err();
        assert!(err.is_invalid());
    }
}
