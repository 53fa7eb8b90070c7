use serde_json::Value;

use crate::draft::Draft;
use crate::equality::equal_with;
use crate::error::{PathSegment, Result};
use crate::ir::{ArrayKeywords, Items, SchemaNode};

use super::{Evaluated, Walker, at2, invalid, probe};

impl Walker<'_> {
    pub(super) fn array(&self, kw: &ArrayKeywords, xs: &[Value], path: &[PathSegment]) -> Result<Evaluated> {
        let len = xs.len() as u64;
        if let Some(min) = kw.min_items {
            if len < min {
                return Err(invalid(path, format!("array has {len} items, fewer than minItems {min}")));
            }
        }
        if let Some(max) = kw.max_items {
            if len > max {
                return Err(invalid(path, format!("array has {len} items, more than maxItems {max}")));
            }
        }
        if kw.unique_items {
            if let Some((i, j)) = first_duplicate(xs, self.options.array_equality) {
                return Err(invalid(path, format!("items {i} and {j} are equal but uniqueItems is set")));
            }
        }

        let mut evaluated = Evaluated::default();

        // tuple head, then the schema for everything after it
        let (head_keyword, head, tail_keyword, tail) = self.layout(kw);
        for (i, (schema, x)) in head.iter().zip(xs).enumerate() {
            self.node(schema, x, &at2(path, head_keyword, i))?;
            evaluated.items.insert(i);
        }
        if let Some(tail) = tail {
            for (i, x) in xs.iter().enumerate().skip(head.len()) {
                self.node(tail, x, &at2(path, tail_keyword, i))?;
            }
            evaluated.all_items = true;
        }

        if let Some(contains) = &kw.contains {
            // contains matches only count as evaluated from 2020-12 on
            let claims = self.draft == Draft::December2020;
            let mut matched = 0u64;
            for (i, x) in xs.iter().enumerate() {
                if probe(self.node(contains, x, &at2(path, "contains", i)))?.is_ok() {
                    matched += 1;
                    if claims {
                        evaluated.items.insert(i);
                    }
                }
            }
            let min = kw.min_contains.unwrap_or(1);
            if matched < min {
                return Err(invalid(
                    path,
                    format!("array contains {matched} matching item(s), at least {min} required"),
                ));
            }
            if let Some(max) = kw.max_contains {
                if matched > max {
                    return Err(invalid(
                        path,
                        format!("array contains {matched} matching item(s), at most {max} allowed"),
                    ));
                }
            }
        }
        Ok(evaluated)
    }

    /// `(head keyword, head schemas, tail keyword, tail schema)` for this draft.
    fn layout<'k>(&self, kw: &'k ArrayKeywords) -> (&'static str, &'k [SchemaNode], &'static str, Option<&'k SchemaNode>) {
        if self.draft.has_prefix_items() {
            let head = kw.prefix_items.as_deref().unwrap_or_default();
            return match &kw.items {
                Some(Items::List(s)) => ("prefixItems", head, "items", Some(&**s)),
                Some(Items::Tuple(xs)) if head.is_empty() => ("items", xs.as_slice(), "items", None),
                _ => ("prefixItems", head, "items", None),
            };
        }
        match &kw.items {
            Some(Items::List(s)) => ("items", &[], "items", Some(&**s)),
            Some(Items::Tuple(xs)) => ("items", xs.as_slice(), "additionalItems", kw.additional_items.as_deref()),
            None => ("items", &[], "items", None),
        }
    }

    pub(super) fn unevaluated_items(
        &self,
        kw: &ArrayKeywords,
        xs: &[Value],
        evaluated: &Evaluated,
        path: &[PathSegment],
    ) -> Result<()> {
        let Some(schema) = &kw.unevaluated_items else { return Ok(()) };
        for (i, x) in xs.iter().enumerate().filter(|(i, _)| !evaluated.has_item(*i)) {
            self.node(schema, x, &at2(path, "unevaluatedItems", i))?;
        }
        Ok(())
    }
}

fn first_duplicate(xs: &[Value], arrays: crate::equality::ArrayEquality) -> Option<(usize, usize)> {
    for (i, a) in xs.iter().enumerate() {
        for (j, b) in xs.iter().enumerate().skip(i + 1) {
            if equal_with(a, b, arrays) {
                return Some((i, j));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use crate::Validator;
    use crate::error::Error;
    use serde_json::{Value, json};

    fn pointer_of(schema: Value, instance: Value) -> String {
        match Validator::new(&schema).unwrap().validate(&instance) {
            Err(Error::Invalid(e)) => e.pointer(),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn list_items_report_their_index() {
        let schema = json!({"type": "array", "items": {"type": "integer"}, "minItems": 2});
        let v = Validator::new(&schema).unwrap();
        assert!(v.is_valid(&json!([1, 2, 3])));
        assert!(!v.is_valid(&json!([1])));
        assert_eq!(pointer_of(schema, json!([1, "x"])), "#/items/1");
    }

    #[test]
    fn prefix_items_then_items() {
        let schema = json!({"prefixItems": [{"type": "string"}], "items": {"type": "integer"}});
        let v = Validator::new(&schema).unwrap();
        assert!(v.is_valid(&json!(["a", 1, 2])));
        assert_eq!(pointer_of(schema.clone(), json!([1])), "#/prefixItems/0");
        assert_eq!(pointer_of(schema, json!(["a", 1, "b"])), "#/items/2");
    }

    #[test]
    fn draft04_tuples_use_additional_items() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "items": [{"type": "string"}],
            "additionalItems": false
        });
        let v = Validator::new(&schema).unwrap();
        assert!(v.is_valid(&json!(["a"])));
        assert_eq!(pointer_of(schema, json!(["a", 1])), "#/additionalItems/1");
    }

    #[test]
    fn contains_counts_matches() {
        let v = Validator::new(&json!({"contains": {"type": "string"}})).unwrap();
        assert!(v.is_valid(&json!([1, "a"])));
        assert!(!v.is_valid(&json!([1, 2])));
        let bounded = Validator::new(&json!({"contains": {"const": 1}, "minContains": 2, "maxContains": 3})).unwrap();
        assert!(bounded.is_valid(&json!([1, 1, 2])));
        assert!(!bounded.is_valid(&json!([1, 2])));
        assert!(!bounded.is_valid(&json!([1, 1, 1, 1])));
        let none = Validator::new(&json!({"contains": {"const": 1}, "minContains": 0})).unwrap();
        assert!(none.is_valid(&json!([])));
    }

    #[test]
    fn contains_claims_items_only_in_2020_12() {
        let body = json!({"contains": {"type": "string"}, "unevaluatedItems": false});
        let mut older = body.clone();
        older["$schema"] = json!("https://json-schema.org/draft/2019-09/schema");
        assert_eq!(pointer_of(older, json!(["a"])), "#/unevaluatedItems/0");
        assert!(Validator::new(&body).unwrap().is_valid(&json!(["a"])));
    }

    #[test]
    fn unique_items_compare_structurally() {
        let v = Validator::new(&json!({"uniqueItems": true})).unwrap();
        assert!(!v.is_valid(&json!([{"a": 1}, {"a": 1}])));
        assert!(!v.is_valid(&json!([1, 1.0])));
        assert!(v.is_valid(&json!([{"a": 1}, {"a": 2}])));
    }

    #[test]
    fn unevaluated_items_see_applicator_claims() {
        let schema = json!({
            "prefixItems": [{"type": "string"}],
            "allOf": [{"prefixItems": [true, {"type": "integer"}]}],
            "unevaluatedItems": false
        });
        let v = Validator::new(&schema).unwrap();
        assert!(v.is_valid(&json!(["a", 1])));
        assert_eq!(pointer_of(schema, json!(["a", 1, null])), "#/unevaluatedItems/2");
    }
}
