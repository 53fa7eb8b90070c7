// Strongly-typed schema tree. Raw documents are lowered into this once,
// resolved once, and from then on only read.
use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde_json::{Number, Value};

/// Compiled-program ceiling for `pattern`/`patternProperties` regexes.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

// ------------------------------- Types ------------------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    String,
    Number,
    Integer,
    Object,
    Array,
    Boolean,
    Null,
}

impl Type {
    pub const ALL: [Type; 7] = [
        Type::String, Type::Number, Type::Integer, Type::Object,
        Type::Array, Type::Boolean, Type::Null,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Type::String => "string",
            Type::Number => "number",
            Type::Integer => "integer",
            Type::Object => "object",
            Type::Array => "array",
            Type::Boolean => "boolean",
            Type::Null => "null",
        }
    }

    pub fn parse(name: &str) -> Option<Type> {
        Type::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Runtime kind of a value; whole-number floats report as integers.
    pub fn of(value: &Value) -> Type {
        match value {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Boolean,
            Value::Number(n) if is_whole(n) => Type::Integer,
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Array(_) => Type::Array,
            Value::Object(_) => Type::Object,
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Type::Number, Value::Number(_)) => true,
            (Type::Integer, Value::Number(n)) => is_whole(n),
            (other, v) => other == Type::of(v),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Render a type set as `string or null`.
pub fn describe_types(types: &BTreeSet<Type>) -> String {
    types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(" or ")
}

/// `1`, `1.0` and `-3e2` are whole; `1.5` and non-finite values are not.
pub fn is_whole(n: &Number) -> bool {
    if n.is_i64() || n.is_u64() {
        return true;
    }
    n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

// ------------------------------ Keywords ---------------------------------- //

/// A compiled regular expression that remembers its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source).size_limit(PATTERN_SIZE_LIMIT).build()?;
        Ok(Self { source: source.to_string(), regex })
    }

    pub fn as_str(&self) -> &str { &self.source }

    pub fn is_match(&self, haystack: &str) -> bool { self.regex.is_match(haystack) }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool { self.source == other.source }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.source) }
}

/// Draft-04 writes `exclusiveMinimum: true` next to `minimum`; 2019-09 and
/// later write the threshold itself. Both shapes survive lowering untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exclusive {
    Flag(bool),
    Limit(f64),
}

/// `items` as one schema for every element, or a positional tuple
/// (draft-04 / 2019-09 only).
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    List(Box<SchemaNode>),
    Tuple(Vec<SchemaNode>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringKeywords {
    pub format: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Pattern>,
    pub content_encoding: Option<String>,
    pub content_media_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberKeywords {
    pub multiple_of: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<Exclusive>,
    pub exclusive_maximum: Option<Exclusive>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayKeywords {
    pub items: Option<Items>,
    pub prefix_items: Option<Vec<SchemaNode>>,
    pub additional_items: Option<Box<SchemaNode>>,
    pub contains: Option<Box<SchemaNode>>,
    pub min_contains: Option<u64>,
    pub max_contains: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub unevaluated_items: Option<Box<SchemaNode>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectKeywords {
    pub properties: IndexMap<String, SchemaNode>,
    pub pattern_properties: Vec<(Pattern, SchemaNode)>,
    /// `false` is the boolean schema that rejects everything.
    pub additional_properties: Option<Box<SchemaNode>>,
    pub unevaluated_properties: Option<Box<SchemaNode>>,
    pub required: Vec<String>,
    pub property_names: Option<Box<SchemaNode>>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub dependent_schemas: IndexMap<String, SchemaNode>,
    pub dependent_required: IndexMap<String, Vec<String>>,
}

// -------------------------------- Node ------------------------------------ //

/// Entry of the definitions pool. `Placeholder` only exists while the
/// resolver is working on that name.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Placeholder,
    Schema(SchemaNode),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    /// Empty means any type.
    pub types: BTreeSet<Type>,

    pub id: Option<String>,
    pub anchor: Option<String>,
    pub reference: Option<String>,
    /// `$dynamicRef` / `$recursiveRef`: recognised, not evaluated.
    pub dynamic_ref: Option<String>,
    /// Set by the resolver: `#` or `#/$defs/<name>`.
    pub resolved_ref: Option<String>,
    pub defs: IndexMap<String, Definition>,

    pub title: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub examples: Option<Vec<Value>>,
    /// `None` is "no default"; `Some(Value::Null)` is an explicit null.
    pub default: Option<Value>,
    pub deprecated: Option<bool>,
    pub read_only: Option<bool>,
    pub write_only: Option<bool>,

    /// `None` is "no const"; `Some(Value::Null)` requires null.
    pub const_value: Option<Value>,
    pub enum_values: Option<Vec<Value>>,

    pub all_of: Option<Vec<SchemaNode>>,
    pub one_of: Option<Vec<SchemaNode>>,
    pub any_of: Option<Vec<SchemaNode>>,
    pub not: Option<Box<SchemaNode>>,
    pub if_schema: Option<Box<SchemaNode>>,
    pub then_schema: Option<Box<SchemaNode>>,
    pub else_schema: Option<Box<SchemaNode>>,

    pub string: Option<StringKeywords>,
    pub number: Option<NumberKeywords>,
    pub array: Option<ArrayKeywords>,
    pub object: Option<ObjectKeywords>,

    /// Emit `$schema` when serialised as the document root.
    pub is_root: bool,
    /// The boolean schema forms; short-circuits everything else.
    pub unilateral: Option<bool>,
}

impl SchemaNode {
    pub fn any() -> Self { Self::default() }

    pub fn boolean(accept: bool) -> Self {
        Self { unilateral: Some(accept), ..Self::default() }
    }

    pub fn typed(ty: Type) -> Self {
        Self { types: BTreeSet::from([ty]), ..Self::default() }
    }

    pub fn ref_to(target: impl Into<String>) -> Self {
        Self { reference: Some(target.into()), ..Self::default() }
    }

    /// A resolved definition from this node's pool.
    pub fn definition(&self, name: &str) -> Option<&SchemaNode> {
        match self.defs.get(name) {
            Some(Definition::Schema(node)) => Some(node),
            _ => None,
        }
    }

    /// True when no assertion or applicator is present; annotations, ids
    /// and definitions do not count.
    pub fn is_empty_schema(&self) -> bool {
        self.types.is_empty()
            && self.reference.is_none()
            && self.dynamic_ref.is_none()
            && self.const_value.is_none()
            && self.enum_values.is_none()
            && self.all_of.is_none()
            && self.one_of.is_none()
            && self.any_of.is_none()
            && self.not.is_none()
            && self.if_schema.is_none()
            && self.then_schema.is_none()
            && self.else_schema.is_none()
            && self.string.is_none()
            && self.number.is_none()
            && self.array.is_none()
            && self.object.is_none()
            && self.unilateral.is_none()
    }

    /// Direct subschemas, definitions excluded.
    pub fn children(&self) -> Vec<&SchemaNode> {
        let mut out: Vec<&SchemaNode> = Vec::new();
        for list in [&self.all_of, &self.one_of, &self.any_of].into_iter().flatten() {
            out.extend(list.iter());
        }
        for single in [&self.not, &self.if_schema, &self.then_schema, &self.else_schema] {
            out.extend(single.as_deref());
        }
        if let Some(arr) = &self.array {
            match &arr.items {
                Some(Items::List(s)) => out.push(s),
                Some(Items::Tuple(xs)) => out.extend(xs.iter()),
                None => {}
            }
            out.extend(arr.prefix_items.iter().flatten());
            for single in [&arr.additional_items, &arr.contains, &arr.unevaluated_items] {
                out.extend(single.as_deref());
            }
        }
        if let Some(obj) = &self.object {
            out.extend(obj.properties.values());
            out.extend(obj.pattern_properties.iter().map(|(_, s)| s));
            out.extend(obj.dependent_schemas.values());
            for single in [&obj.additional_properties, &obj.unevaluated_properties, &obj.property_names] {
                out.extend(single.as_deref());
            }
        }
        out
    }

    /// Mutable twin of [`SchemaNode::children`].
    pub fn children_mut(&mut self) -> Vec<&mut SchemaNode> {
        let mut out: Vec<&mut SchemaNode> = Vec::new();
        for list in [&mut self.all_of, &mut self.one_of, &mut self.any_of].into_iter().flatten() {
            out.extend(list.iter_mut());
        }
        for single in [&mut self.not, &mut self.if_schema, &mut self.then_schema, &mut self.else_schema] {
            out.extend(single.as_deref_mut());
        }
        if let Some(arr) = &mut self.array {
            match &mut arr.items {
                Some(Items::List(s)) => out.push(s),
                Some(Items::Tuple(xs)) => out.extend(xs.iter_mut()),
                None => {}
            }
            out.extend(arr.prefix_items.iter_mut().flatten());
            for single in [&mut arr.additional_items, &mut arr.contains, &mut arr.unevaluated_items] {
                out.extend(single.as_deref_mut());
            }
        }
        if let Some(obj) = &mut self.object {
            out.extend(obj.properties.values_mut());
            out.extend(obj.pattern_properties.iter_mut().map(|(_, s)| s));
            out.extend(obj.dependent_schemas.values_mut());
            for single in [
                &mut obj.additional_properties,
                &mut obj.unevaluated_properties,
                &mut obj.property_names,
            ] {
                out.extend(single.as_deref_mut());
            }
        }
        out
    }

    /// Whether `unevaluatedProperties`/`unevaluatedItems` appear anywhere
    /// below (definitions included).
    pub fn uses_unevaluated(&self) -> bool {
        let here = self.object.as_ref().is_some_and(|o| o.unevaluated_properties.is_some())
            || self.array.as_ref().is_some_and(|a| a.unevaluated_items.is_some());
        here
            || self.children().into_iter().any(SchemaNode::uses_unevaluated)
            || self.defs.values().any(|d| match d {
                Definition::Schema(node) => node.uses_unevaluated(),
                Definition::Placeholder => false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whole_floats_are_integers() {
        assert!(Type::Integer.matches(&json!(1.0)));
        assert!(Type::Integer.matches(&json!(-7)));
        assert!(!Type::Integer.matches(&json!(1.5)));
        assert!(Type::Number.matches(&json!(2)));
        assert_eq!(Type::of(&json!(3.0)), Type::Integer);
        assert_eq!(Type::of(&json!("x")), Type::String);
    }

    #[test]
    fn empty_schema_ignores_annotations() {
        let mut node = SchemaNode::any();
        node.title = Some("t".into());
        node.default = Some(Value::Null);
        assert!(node.is_empty_schema());
        node.const_value = Some(Value::Null);
        assert!(!node.is_empty_schema());
    }

    #[test]
    fn unevaluated_detection_reaches_nested_nodes() {
        let mut inner = SchemaNode::typed(Type::Object);
        inner.object = Some(ObjectKeywords {
            unevaluated_properties: Some(Box::new(SchemaNode::boolean(false))),
            ..ObjectKeywords::default()
        });
        let mut outer = SchemaNode::any();
        outer.all_of = Some(vec![SchemaNode::any(), inner]);
        assert!(outer.uses_unevaluated());
        assert!(!SchemaNode::typed(Type::String).uses_unevaluated());
    }

    #[test]
    fn patterns_compare_by_source() {
        assert_eq!(Pattern::new("^a+$").unwrap(), Pattern::new("^a+$").unwrap());
        assert!(Pattern::new("(").is_err());
    }
}
