//! JSON-Schema equality for `const`, `enum` and `uniqueItems`, plus the
//! vacuity checks used when deciding whether a subschema can be skipped.
//!
//! Arrays compare by two-way containment by default: every element of one
//! side equals some element of the other. Order and repeat counts are
//! ignored, so `[1, 2]` equals `[2, 1, 1]`. [`ArrayEquality::Ordered`]
//! switches to the position-wise comparison the JSON Schema documents
//! describe.
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::ir::SchemaNode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayEquality {
    #[default]
    Unordered,
    Ordered,
}

pub fn equal(a: &Value, b: &Value) -> bool { equal_with(a, b, ArrayEquality::default()) }

pub fn equal_with(a: &Value, b: &Value, arrays: ArrayEquality) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, xv)| y.get(k).is_some_and(|yv| equal_with(xv, yv, arrays)))
        }
        (Value::Array(x), Value::Array(y)) => {
            if x == y {
                return true;
            }
            match arrays {
                ArrayEquality::Ordered => {
                    x.len() == y.len() && x.iter().zip(y).all(|(l, r)| equal_with(l, r, arrays))
                }
                ArrayEquality::Unordered => {
                    x.iter().all(|l| contains_with(l, y, arrays))
                        && y.iter().all(|r| contains_with(r, x, arrays))
                }
            }
        }
        _ => a == b,
    }
}

pub fn contains(needle: &Value, haystack: &[Value]) -> bool {
    contains_with(needle, haystack, ArrayEquality::default())
}

pub fn contains_with(needle: &Value, haystack: &[Value], arrays: ArrayEquality) -> bool {
    haystack.iter().any(|v| equal_with(needle, v, arrays))
}

/// `1` equals `1.0`; integers compare exactly when both sides are integral.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

// ------------------------------- Vacuity ---------------------------------- //

/// `not` over a rejecting schema only counts when nothing sits beside it.
pub fn accepts_all(schema: &SchemaNode) -> bool {
    match (schema.unilateral, schema.not.as_deref()) {
        (Some(verdict), _) => verdict,
        (None, Some(not)) => rejects_all(not) && SchemaNode { not: None, ..schema.clone() }.is_empty_schema(),
        (None, None) => schema.is_empty_schema(),
    }
}

pub fn rejects_all(schema: &SchemaNode) -> bool {
    schema.unilateral == Some(false) || schema.not.as_deref().is_some_and(accepts_all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_ignore_key_order() {
        let a = json!({"x": 1, "y": {"p": [1, 2], "q": null}});
        let b = json!({"y": {"q": null, "p": [1, 2]}, "x": 1.0});
        assert!(equal(&a, &b));
        assert!(equal(&b, &a));
        assert!(equal(&a, &a));
        assert!(!equal(&a, &json!({"x": 1})));
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert!(equal(&json!(1), &json!(1.0)));
        assert!(!equal(&json!(1), &json!(1.5)));
        assert!(equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!equal(&json!(1), &json!(true)));
    }

    #[test]
    fn arrays_are_unordered_by_default() {
        assert!(equal(&json!([1, 2, 3]), &json!([3, 1, 2])));
        assert!(!equal(&json!([1, 2]), &json!([1, 3])));
        assert!(!equal(&json!([1, 2]), &json!([1])));
    }

    #[test]
    fn unordered_arrays_ignore_repeats() {
        assert!(equal(&json!([1, 2]), &json!([1, 2, 2])));
        assert!(equal(&json!([1, 2, 2]), &json!([1, 2])));
        assert!(equal(&json!([1, 1, 2]), &json!([1, 2, 2])));
        assert!(!equal_with(&json!([1, 2]), &json!([1, 2, 2]), ArrayEquality::Ordered));
    }

    #[test]
    fn ordered_mode_respects_positions() {
        let ordered = ArrayEquality::Ordered;
        assert!(!equal_with(&json!([1, 2]), &json!([2, 1]), ordered));
        assert!(equal_with(&json!([[1], {"a": 1.0}]), &json!([[1.0], {"a": 1}]), ordered));
    }

    #[test]
    fn containment_uses_schema_equality() {
        assert!(contains(&json!({"b": 2, "a": 1}), &[json!(null), json!({"a": 1, "b": 2})]));
        assert!(!contains(&json!("1"), &[json!(1)]));
    }

    #[test]
    fn vacuity_checks() {
        assert!(accepts_all(&SchemaNode::any()));
        assert!(accepts_all(&SchemaNode::boolean(true)));
        assert!(rejects_all(&SchemaNode::boolean(false)));
        let mut not_any = SchemaNode::any();
        not_any.not = Some(Box::new(SchemaNode::any()));
        assert!(rejects_all(&not_any));
        assert!(!accepts_all(&not_any));
        assert!(!accepts_all(&SchemaNode::typed(crate::ir::Type::Null)));

        let mut not_false = SchemaNode::any();
        not_false.not = Some(Box::new(SchemaNode::boolean(false)));
        assert!(accepts_all(&not_false));
        let mut guarded = SchemaNode::typed(crate::ir::Type::String);
        guarded.not = Some(Box::new(SchemaNode::boolean(false)));
        assert!(!accepts_all(&guarded));
    }
}
