use crate::error::{Error, PathSegment, Result, SchemaError, pointer};
use crate::ir::{Exclusive, NumberKeywords};

use super::{Walker, invalid};

/// Quotients this close to a whole number count as whole.
const MULTIPLE_OF_EPSILON: f64 = 1e-9;

impl Walker<'_> {
    pub(super) fn number(&self, kw: &NumberKeywords, n: f64, path: &[PathSegment]) -> Result<()> {
        if let Some(divisor) = kw.multiple_of {
            if !is_multiple(n, divisor) {
                return Err(invalid(path, format!("{n} is not a multiple of {divisor}")));
            }
        }

        if self.draft.boolean_exclusive_bounds() {
            let exclusive_min = flag(kw.exclusive_minimum, "exclusiveMinimum", path)?;
            let exclusive_max = flag(kw.exclusive_maximum, "exclusiveMaximum", path)?;
            if let Some(min) = kw.minimum {
                if exclusive_min && n <= min {
                    return Err(invalid(path, format!("{n} is not greater than the exclusive minimum of {min}")));
                }
                if n < min {
                    return Err(invalid(path, format!("{n} is less than the minimum of {min}")));
                }
            }
            if let Some(max) = kw.maximum {
                if exclusive_max && n >= max {
                    return Err(invalid(path, format!("{n} is not less than the exclusive maximum of {max}")));
                }
                if n > max {
                    return Err(invalid(path, format!("{n} is greater than the maximum of {max}")));
                }
            }
            return Ok(());
        }

        if let Some(min) = kw.minimum {
            if n < min {
                return Err(invalid(path, format!("{n} is less than the minimum of {min}")));
            }
        }
        if let Some(max) = kw.maximum {
            if n > max {
                return Err(invalid(path, format!("{n} is greater than the maximum of {max}")));
            }
        }
        if let Some(limit) = limit(kw.exclusive_minimum, "exclusiveMinimum", path)? {
            if n <= limit {
                return Err(invalid(path, format!("{n} is not greater than the exclusive minimum of {limit}")));
            }
        }
        if let Some(limit) = limit(kw.exclusive_maximum, "exclusiveMaximum", path)? {
            if n >= limit {
                return Err(invalid(path, format!("{n} is not less than the exclusive maximum of {limit}")));
            }
        }
        Ok(())
    }
}

pub fn is_multiple(n: f64, divisor: f64) -> bool {
    if divisor <= 0.0 || !divisor.is_finite() {
        return false;
    }
    let quotient = n / divisor;
    quotient.is_finite() && (quotient - quotient.round()).abs() < MULTIPLE_OF_EPSILON
}

// A tree built by hand can carry the other draft's shape; that is a schema
// defect, not an instance failure.

fn flag(bound: Option<Exclusive>, keyword: &str, path: &[PathSegment]) -> Result<bool> {
    match bound {
        None => Ok(false),
        Some(Exclusive::Flag(b)) => Ok(b),
        Some(Exclusive::Limit(_)) => Err(wrong_shape(keyword, "a boolean", path)),
    }
}

fn limit(bound: Option<Exclusive>, keyword: &str, path: &[PathSegment]) -> Result<Option<f64>> {
    match bound {
        None => Ok(None),
        Some(Exclusive::Limit(x)) => Ok(Some(x)),
        Some(Exclusive::Flag(_)) => Err(wrong_shape(keyword, "a number", path)),
    }
}

fn wrong_shape(keyword: &str, expected: &'static str, path: &[PathSegment]) -> Error {
    SchemaError::invalid(&pointer(path), keyword, expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Validator;
    use crate::config::Options;
    use crate::draft::Draft;
    use crate::ir::{SchemaNode, Type};
    use crate::resolve::NoSource;
    use serde_json::json;

    #[test]
    fn multiples_tolerate_float_noise() {
        assert!(is_multiple(0.3, 0.1));
        assert!(is_multiple(10.0, 2.5));
        assert!(!is_multiple(7.0, 2.0));
        assert!(!is_multiple(1e308, 1e-308));
    }

    #[test]
    fn exclusive_bounds_per_draft() {
        let later = Validator::new(&json!({"type": "integer", "exclusiveMinimum": 5})).unwrap();
        assert!(later.is_valid(&json!(6)));
        assert!(!later.is_valid(&json!(5)));

        let draft04 = Validator::new(&json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": "integer",
            "minimum": 5,
            "exclusiveMinimum": true
        }))
        .unwrap();
        assert!(draft04.is_valid(&json!(6)));
        assert!(!draft04.is_valid(&json!(5)));
    }

    #[test]
    fn mismatched_bound_shapes_are_schema_errors() {
        let mut node = SchemaNode::typed(Type::Number);
        node.number = Some(NumberKeywords { exclusive_maximum: Some(Exclusive::Flag(true)), ..Default::default() });
        let v = Validator::from_node(node, Draft::December2020, Options::default(), &NoSource).unwrap();
        assert!(matches!(v.validate(&json!(1)), Err(Error::Schema(_))));
    }
}
