//! Schema-of-schema checks over raw documents.
//!
//! Closed world: every keyword must be known to the draft, and every
//! type-specific keyword must belong to one of the types the node can
//! describe (its `type`, the type inherited from a combinator parent, or the
//! types implied by the keywords themselves). Runs before lowering; a
//! document that passes here lowers without surprises.
use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::draft::Draft;
use crate::error::{SchemaError, SchemaErrorKind, push_token};
use crate::ir::{Pattern, Type, describe_types};

/// Detect the document's draft (falling back to `fallback`) and check it.
pub fn check_document(doc: &Value, fallback: Draft, enforce_single_type: bool) -> Result<Draft, SchemaError> {
    let draft = Draft::detect(doc, fallback)?;
    check(doc, draft, enforce_single_type)?;
    Ok(draft)
}

pub fn check(doc: &Value, draft: Draft, enforce_single_type: bool) -> Result<(), SchemaError> {
    Checker { draft, enforce_single_type }.schema(doc, "#", None)
}

/// Non-negative whole number, as used by every length/count keyword.
pub(crate) fn as_count(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| {
        v.as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

struct Checker {
    draft: Draft,
    enforce_single_type: bool,
}

impl Checker {
    fn schema(&self, v: &Value, ptr: &str, inherited: Option<&BTreeSet<Type>>) -> Result<(), SchemaError> {
        let map = match v {
            Value::Object(m) => m,
            Value::Bool(_) if self.draft.allows_boolean_schemas() => return Ok(()),
            _ => return Err(SchemaError::new(ptr, SchemaErrorKind::NotASchema(self.schema_shape()))),
        };

        let declared = self.declared_types(map, ptr)?;
        let types = declared.as_ref().or(inherited);
        let specific: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|k| !self.draft.is_common(k))
            .collect();

        self.placement(types, &specific, ptr)?;
        if self.enforce_single_type {
            self.single_type(types, &specific, ptr)?;
        }
        for (key, value) in map {
            self.keyword(map, key, value, ptr, types)?;
        }
        Ok(())
    }

    fn schema_shape(&self) -> &'static str {
        if self.draft.allows_boolean_schemas() { "an object or a boolean" } else { "an object" }
    }

    fn declared_types(&self, map: &Map<String, Value>, ptr: &str) -> Result<Option<BTreeSet<Type>>, SchemaError> {
        const EXPECTED: &str = "a type name or a non-empty array of unique type names";
        match map.get("type") {
            None => Ok(None),
            Some(Value::String(name)) => Type::parse(name)
                .map(|t| Some(BTreeSet::from([t])))
                .ok_or_else(|| SchemaError::invalid(ptr, "type", EXPECTED)),
            Some(Value::Array(names)) if !names.is_empty() => {
                let mut out = BTreeSet::new();
                for name in names {
                    let ty = name.as_str().and_then(Type::parse);
                    match ty {
                        Some(t) if out.insert(t) => {}
                        _ => return Err(SchemaError::invalid(ptr, "type", EXPECTED)),
                    }
                }
                Ok(Some(out))
            }
            Some(_) => Err(SchemaError::invalid(ptr, "type", EXPECTED)),
        }
    }

    fn placement(&self, types: Option<&BTreeSet<Type>>, specific: &[&str], ptr: &str) -> Result<(), SchemaError> {
        let unknown: Vec<String> = specific
            .iter()
            .filter(|k| self.draft.types_for_keyword(k).is_empty())
            .map(|k| k.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(SchemaError::new(ptr, SchemaErrorKind::UnknownKeywords(unknown)));
        }
        let Some(types) = types else { return Ok(()) };
        let misplaced: Vec<String> = specific
            .iter()
            .filter(|k| !types.iter().any(|t| self.draft.applies_to(k, *t)))
            .map(|k| k.to_string())
            .collect();
        if misplaced.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::new(ptr, SchemaErrorKind::Misplaced {
                keywords: misplaced,
                types: describe_types(types),
            }))
        }
    }

    fn single_type(&self, types: Option<&BTreeSet<Type>>, specific: &[&str], ptr: &str) -> Result<(), SchemaError> {
        if specific.is_empty() {
            return Ok(());
        }
        let candidates: BTreeSet<Type> = match types {
            Some(t) => t.clone(),
            None => specific.iter().flat_map(|k| self.draft.types_for_keyword(k)).collect(),
        };
        // number and integer share one keyword table
        let mut tables = candidates.clone();
        if tables.contains(&Type::Number) {
            tables.remove(&Type::Integer);
        }
        if tables.len() > 1 {
            return Err(SchemaError::new(ptr, SchemaErrorKind::AmbiguousType {
                types: describe_types(&candidates),
                keywords: specific.iter().map(|k| k.to_string()).collect(),
            }));
        }
        Ok(())
    }

    fn keyword(
        &self,
        map: &Map<String, Value>,
        key: &str,
        value: &Value,
        ptr: &str,
        types: Option<&BTreeSet<Type>>,
    ) -> Result<(), SchemaError> {
        let here = push_token(ptr, key);
        let draft = self.draft;
        match key {
            "$schema" | "$ref" | "$id" | "id" | "$anchor" | "$comment" | "title" | "description"
            | "format" | "contentEncoding" | "contentMediaType" | "$dynamicRef" | "$dynamicAnchor"
            | "$recursiveRef" => expect(value.is_string(), ptr, key, "a string"),

            "type" | "default" | "const" => Ok(()),

            "examples" => expect(value.is_array(), ptr, key, "an array"),

            "enum" => match value.as_array() {
                Some(xs) if !(draft == Draft::Draft04 && xs.is_empty()) => Ok(()),
                _ => Err(SchemaError::invalid(ptr, key, "a non-empty array")),
            },

            "deprecated" | "readOnly" | "writeOnly" | "uniqueItems" | "$recursiveAnchor" => {
                expect(value.is_boolean(), ptr, key, "a boolean")
            }

            "$vocabulary" => match value.as_object() {
                Some(m) if m.values().all(Value::is_boolean) => Ok(()),
                _ => Err(SchemaError::invalid(ptr, key, "an object of booleans")),
            },

            "minLength" | "maxLength" | "minItems" | "maxItems" | "minProperties"
            | "maxProperties" | "minContains" | "maxContains" => {
                expect(as_count(value).is_some(), ptr, key, "a non-negative integer")
            }

            "multipleOf" => {
                expect(value.as_f64().is_some_and(|d| d > 0.0), ptr, key, "a number greater than 0")
            }

            "minimum" | "maximum" => expect(value.is_number(), ptr, key, "a number"),

            "exclusiveMinimum" | "exclusiveMaximum" if draft.boolean_exclusive_bounds() => {
                expect(value.is_boolean(), ptr, key, "a boolean")?;
                let (keyword, sibling) = if key == "exclusiveMinimum" {
                    ("exclusiveMinimum", "minimum")
                } else {
                    ("exclusiveMaximum", "maximum")
                };
                if map.contains_key(sibling) {
                    Ok(())
                } else {
                    Err(SchemaError::new(ptr, SchemaErrorKind::MissingSibling { keyword, sibling }))
                }
            }
            "exclusiveMinimum" | "exclusiveMaximum" => expect(value.is_number(), ptr, key, "a number"),

            "pattern" => {
                let Some(src) = value.as_str() else {
                    return Err(SchemaError::invalid(ptr, key, "a string"));
                };
                compile(src, &here)
            }

            "required" => {
                let min = if draft == Draft::Draft04 { 1 } else { 0 };
                expect(unique_strings(value, min), ptr, key, "an array of unique strings")
            }

            "allOf" | "anyOf" | "oneOf" => match value.as_array() {
                Some(members) if !members.is_empty() => {
                    for (i, member) in members.iter().enumerate() {
                        self.branch(member, &push_token(&here, &i.to_string()), types)?;
                    }
                    Ok(())
                }
                _ => Err(SchemaError::invalid(ptr, key, "a non-empty array of schemas")),
            },

            "additionalProperties" | "additionalItems" if value.is_boolean() => Ok(()),
            "not" | "if" | "then" | "else" | "additionalProperties" | "additionalItems"
            | "unevaluatedProperties" | "unevaluatedItems" | "propertyNames" | "contains" => {
                self.schema(value, &here, None)
            }

            "items" => match value {
                Value::Array(xs) if !draft.has_prefix_items() => self.schema_list(xs, &here),
                Value::Array(_) => Err(SchemaError::invalid(ptr, key, "a schema (use prefixItems for tuples)")),
                other => self.schema(other, &here, None),
            },

            "prefixItems" => match value.as_array() {
                Some(xs) if !xs.is_empty() => self.schema_list(xs, &here),
                _ => Err(SchemaError::invalid(ptr, key, "a non-empty array of schemas")),
            },

            "properties" | "$defs" | "definitions" | "dependentSchemas" => {
                let Some(m) = value.as_object() else {
                    return Err(SchemaError::invalid(ptr, key, "an object of schemas"));
                };
                for (name, sub) in m {
                    self.schema(sub, &push_token(&here, name), None)?;
                }
                Ok(())
            }

            "patternProperties" => {
                let Some(m) = value.as_object() else {
                    return Err(SchemaError::invalid(ptr, key, "an object of schemas"));
                };
                for (pattern, sub) in m {
                    let at = push_token(&here, pattern);
                    compile(pattern, &at)?;
                    self.schema(sub, &at, None)?;
                }
                Ok(())
            }

            "dependentRequired" => match value.as_object() {
                Some(m) if m.values().all(|v| unique_strings(v, 0)) => Ok(()),
                _ => Err(SchemaError::invalid(ptr, key, "an object of unique string arrays")),
            },

            "dependencies" => {
                let Some(m) = value.as_object() else {
                    return Err(SchemaError::invalid(ptr, key, "an object"));
                };
                for (name, dep) in m {
                    if dep.is_array() {
                        let ok = unique_strings(dep, 1);
                        expect(ok, &here, name, "a non-empty array of unique strings")?;
                    } else {
                        self.schema(dep, &push_token(&here, name), None)?;
                    }
                }
                Ok(())
            }

            // unknown keywords were already reported by `placement`
            _ => Ok(()),
        }
    }

    /// A combinator member. When the parent carries a type and the member
    /// neither declares one nor defers to `$ref`, it is checked as if it
    /// carried the parent's type.
    fn branch(&self, member: &Value, ptr: &str, parent: Option<&BTreeSet<Type>>) -> Result<(), SchemaError> {
        let (Some(parent), Some(m)) = (parent, member.as_object()) else {
            return self.schema(member, ptr, None);
        };
        if m.contains_key("$ref") {
            return self.schema(member, ptr, None);
        }
        match self.declared_types(m, ptr)? {
            None => self.schema(member, ptr, Some(parent)),
            Some(own) => {
                let consistent = own
                    .iter()
                    .all(|t| parent.contains(t) || (*t == Type::Integer && parent.contains(&Type::Number)));
                if !consistent {
                    return Err(SchemaError::new(ptr, SchemaErrorKind::InconsistentBranch {
                        branch: describe_types(&own),
                        parent: describe_types(parent),
                    }));
                }
                self.schema(member, ptr, None)
            }
        }
    }

    fn schema_list(&self, xs: &[Value], ptr: &str) -> Result<(), SchemaError> {
        for (i, x) in xs.iter().enumerate() {
            self.schema(x, &push_token(ptr, &i.to_string()), None)?;
        }
        Ok(())
    }
}

fn expect(ok: bool, ptr: &str, key: &str, expected: &'static str) -> Result<(), SchemaError> {
    if ok { Ok(()) } else { Err(SchemaError::invalid(ptr, key, expected)) }
}

fn unique_strings(v: &Value, min: usize) -> bool {
    let Some(xs) = v.as_array() else { return false };
    let mut seen = BTreeSet::new();
    xs.len() >= min && xs.iter().all(|x| x.as_str().is_some_and(|s| seen.insert(s)))
}

fn compile(src: &str, ptr: &str) -> Result<(), SchemaError> {
    Pattern::new(src).map(|_| ()).map_err(|e| {
        SchemaError::new(ptr, SchemaErrorKind::InvalidPattern { pattern: src.to_string(), reason: e.to_string() })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind(doc: Value, draft: Draft, single: bool) -> (String, SchemaErrorKind) {
        let err = check(&doc, draft, single).unwrap_err();
        (err.pointer, err.kind)
    }

    #[test]
    fn accepts_well_formed_documents() {
        let doc = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "$defs": {"name": {"type": "string", "minLength": 1}},
            "type": "object",
            "properties": {
                "name": {"$ref": "#/$defs/name"},
                "tags": {"type": "array", "prefixItems": [{"type": "string"}], "items": false}
            },
            "required": ["name"],
            "additionalProperties": false
        });
        assert_eq!(check_document(&doc, Draft::Draft04, true).unwrap(), Draft::December2020);
    }

    #[test]
    fn unknown_keywords_are_rejected_with_their_path() {
        let (ptr, k) = kind(json!({"properties": {"a": {"type": "string", "colour": 1}}}), Draft::December2020, false);
        assert_eq!(ptr, "#/properties/a");
        assert_eq!(k, SchemaErrorKind::UnknownKeywords(vec!["colour".into()]));
    }

    #[test]
    fn keywords_must_fit_the_declared_type() {
        let (_, k) = kind(json!({"type": "integer", "minLength": 2}), Draft::December2020, false);
        assert!(matches!(k, SchemaErrorKind::Misplaced { .. }));
    }

    #[test]
    fn single_type_enforcement_is_opt_in() {
        let doc = json!({"type": ["string", "null"], "maxLength": 4});
        assert!(check(&doc, Draft::December2020, false).is_ok());
        let (_, k) = kind(doc, Draft::December2020, true);
        assert!(matches!(k, SchemaErrorKind::AmbiguousType { .. }));
        assert!(check(&json!({"minimum": 1, "multipleOf": 2}), Draft::December2020, true).is_ok());
    }

    #[test]
    fn combinator_members_inherit_the_parent_type() {
        let (ptr, k) = kind(json!({"type": "string", "allOf": [{"minimum": 3}]}), Draft::December2020, false);
        assert_eq!(ptr, "#/allOf/0");
        assert!(matches!(k, SchemaErrorKind::Misplaced { .. }));
        assert!(check(&json!({"type": "string", "allOf": [{"minLength": 3}]}), Draft::December2020, false).is_ok());
        assert!(check(&json!({"type": "string", "allOf": [{"$ref": "#"}]}), Draft::December2020, false).is_ok());
    }

    #[test]
    fn inconsistent_branch_types_are_rejected() {
        let (_, k) = kind(json!({"type": "string", "oneOf": [{"type": "integer"}]}), Draft::December2020, false);
        assert!(matches!(k, SchemaErrorKind::InconsistentBranch { .. }));
        assert!(check(&json!({"type": "number", "oneOf": [{"type": "integer"}]}), Draft::December2020, false).is_ok());
    }

    #[test]
    fn exclusive_bounds_follow_the_draft() {
        assert!(check(&json!({"minimum": 5, "exclusiveMinimum": true}), Draft::Draft04, false).is_ok());
        let (_, k) = kind(json!({"exclusiveMaximum": true}), Draft::Draft04, false);
        assert!(matches!(k, SchemaErrorKind::MissingSibling { .. }));
        assert!(check(&json!({"exclusiveMinimum": 5}), Draft::December2020, false).is_ok());
        assert!(check(&json!({"exclusiveMinimum": true}), Draft::December2020, false).is_err());
    }

    #[test]
    fn draft04_vocabulary_is_closed() {
        assert!(check(&json!({"const": 1}), Draft::Draft04, false).is_err());
        assert!(check(&json!({"properties": {"a": true}}), Draft::Draft04, false).is_err());
        assert!(check(&json!({"additionalProperties": false}), Draft::Draft04, false).is_ok());
        assert!(check(&json!({"items": [{"type": "integer"}], "additionalItems": false}), Draft::Draft04, false).is_ok());
        assert!(check(&json!({"dependencies": {"a": ["b"], "c": {"required": ["d"]}}}), Draft::Draft04, false).is_ok());
    }

    #[test]
    fn patterns_must_compile() {
        let (ptr, k) = kind(json!({"patternProperties": {"(": {}}}), Draft::December2020, false);
        assert_eq!(ptr, "#/patternProperties/(");
        assert!(matches!(k, SchemaErrorKind::InvalidPattern { .. }));
    }
}
