// SchemaNode → JSON Schema document, spelled for a target draft.
//
// Purely functional: nodes are never touched, `$schema` is written wherever
// `is_root` is set. Keywords the target draft lacks are translated when an
// equivalent exists (tuple `items` vs `prefixItems`, boolean vs numeric
// exclusive bounds, `dependencies`) and dropped otherwise.
use serde_json::{Map, Value, json};

use crate::draft::Draft;
use crate::ir::{Definition, Exclusive, Items, SchemaNode};

pub fn serialize(node: &SchemaNode, draft: Draft) -> Value {
    Emitter { draft }.node(node)
}

struct Emitter {
    draft: Draft,
}

impl Emitter {
    fn node(&self, node: &SchemaNode) -> Value {
        if let Some(accept) = node.unilateral {
            return self.boolean(accept);
        }
        let modern = self.draft >= Draft::September2019;
        let mut o = Map::new();

        // ---- identity ----
        if node.is_root {
            o.insert("$schema".into(), Value::from(self.draft.uri()));
        }
        match (&node.id, &node.anchor) {
            (Some(id), _) => {
                o.insert(self.draft.id_keyword().into(), Value::from(id.as_str()));
            }
            (None, Some(anchor)) if !modern => {
                o.insert("id".into(), Value::from(format!("#{anchor}")));
            }
            _ => {}
        }
        if let (Some(anchor), true) = (&node.anchor, modern) {
            o.insert("$anchor".into(), Value::from(anchor.as_str()));
        }
        if let Some(reference) = self.reference(node) {
            o.insert("$ref".into(), Value::from(reference));
        }
        if let Some(dynamic) = &node.dynamic_ref {
            match self.draft {
                Draft::September2019 => o.insert("$recursiveRef".into(), Value::from(dynamic.as_str())),
                Draft::December2020 => o.insert("$dynamicRef".into(), Value::from(dynamic.as_str())),
                Draft::Draft04 => None,
            };
        }

        // ---- annotations ----
        if let (Some(comment), true) = (&node.comment, modern) {
            o.insert("$comment".into(), Value::from(comment.as_str()));
        }
        if let Some(title) = &node.title {
            o.insert("title".into(), Value::from(title.as_str()));
        }
        if let Some(description) = &node.description {
            o.insert("description".into(), Value::from(description.as_str()));
        }
        if let Some(default) = &node.default {
            o.insert("default".into(), default.clone());
        }
        if modern {
            if let Some(examples) = &node.examples {
                o.insert("examples".into(), Value::Array(examples.clone()));
            }
            for (key, flag) in [
                ("deprecated", node.deprecated),
                ("readOnly", node.read_only),
                ("writeOnly", node.write_only),
            ] {
                if let Some(flag) = flag {
                    o.insert(key.into(), Value::Bool(flag));
                }
            }
        }

        // ---- generic assertions ----
        match node.types.len() {
            0 => {}
            1 => {
                let only = node.types.iter().map(|t| Value::from(t.as_str())).next();
                o.extend(only.map(|t| ("type".to_string(), t)));
            }
            _ => {
                o.insert("type".into(), node.types.iter().map(|t| Value::from(t.as_str())).collect());
            }
        }
        match (&node.const_value, &node.enum_values) {
            (Some(c), _) if modern => {
                o.insert("const".into(), c.clone());
            }
            // draft-04 has no const; a one-member enum means the same
            (Some(c), None) => {
                o.insert("enum".into(), Value::Array(vec![c.clone()]));
            }
            _ => {}
        }
        if let Some(values) = &node.enum_values {
            o.insert("enum".into(), Value::Array(values.clone()));
        }

        // ---- applicators ----
        for (key, list) in [("allOf", &node.all_of), ("anyOf", &node.any_of), ("oneOf", &node.one_of)] {
            if let Some(list) = list {
                o.insert(key.into(), self.list(list));
            }
        }
        if let Some(not) = &node.not {
            o.insert("not".into(), self.node(not));
        }
        if modern {
            for (key, sub) in [("if", &node.if_schema), ("then", &node.then_schema), ("else", &node.else_schema)] {
                if let Some(sub) = sub {
                    o.insert(key.into(), self.node(sub));
                }
            }
        }

        self.string(node, &mut o);
        self.number(node, &mut o);
        self.array(node, &mut o);
        self.object(node, &mut o);

        let defs: Map<String, Value> = node
            .defs
            .iter()
            .filter_map(|(name, def)| match def {
                Definition::Schema(s) => Some((name.clone(), self.node(s))),
                Definition::Placeholder => None,
            })
            .collect();
        if !defs.is_empty() {
            o.insert(self.draft.defs_keyword().into(), Value::Object(defs));
        }
        Value::Object(o)
    }

    fn boolean(&self, accept: bool) -> Value {
        match (self.draft, accept) {
            (Draft::Draft04, true) => json!({}),
            (Draft::Draft04, false) => json!({"not": {}}),
            (_, b) => Value::Bool(b),
        }
    }

    /// `additionalProperties`/`additionalItems` take booleans in every draft.
    fn node_or_bool(&self, node: &SchemaNode) -> Value {
        match node.unilateral {
            Some(b) => Value::Bool(b),
            None => self.node(node),
        }
    }

    fn list(&self, nodes: &[SchemaNode]) -> Value {
        Value::Array(nodes.iter().map(|n| self.node(n)).collect())
    }

    fn named<'a>(&self, nodes: impl IntoIterator<Item = (&'a String, &'a SchemaNode)>) -> Value {
        Value::Object(nodes.into_iter().map(|(k, n)| (k.clone(), self.node(n))).collect())
    }

    /// The resolver's canonical target when there is one, so the output is
    /// self-contained; otherwise the reference as written.
    fn reference(&self, node: &SchemaNode) -> Option<String> {
        let written = node.reference.as_ref()?;
        let canonical = node.resolved_ref.as_deref().and_then(|r| r.strip_prefix("#/$defs/"));
        Some(match canonical {
            Some(name) => format!("#/{}/{name}", self.draft.defs_keyword()),
            None => written.clone(),
        })
    }

    fn string(&self, node: &SchemaNode, o: &mut Map<String, Value>) {
        let Some(kw) = &node.string else { return };
        if let Some(min) = kw.min_length {
            o.insert("minLength".into(), Value::from(min));
        }
        if let Some(max) = kw.max_length {
            o.insert("maxLength".into(), Value::from(max));
        }
        if let Some(pattern) = &kw.pattern {
            o.insert("pattern".into(), Value::from(pattern.as_str()));
        }
        if let Some(format) = &kw.format {
            o.insert("format".into(), Value::from(format.as_str()));
        }
        if self.draft >= Draft::September2019 {
            if let Some(encoding) = &kw.content_encoding {
                o.insert("contentEncoding".into(), Value::from(encoding.as_str()));
            }
            if let Some(media) = &kw.content_media_type {
                o.insert("contentMediaType".into(), Value::from(media.as_str()));
            }
        }
    }

    fn number(&self, node: &SchemaNode, o: &mut Map<String, Value>) {
        let Some(kw) = &node.number else { return };
        if let Some(d) = kw.multiple_of {
            o.insert("multipleOf".into(), number(d));
        }
        let (minimum, exclusive_minimum) = self.bound(kw.minimum, kw.exclusive_minimum, |a, b| a >= b);
        let (maximum, exclusive_maximum) = self.bound(kw.maximum, kw.exclusive_maximum, |a, b| a <= b);
        o.extend(minimum.map(|v| ("minimum".to_string(), v)));
        o.extend(exclusive_minimum.map(|v| ("exclusiveMinimum".to_string(), v)));
        o.extend(maximum.map(|v| ("maximum".to_string(), v)));
        o.extend(exclusive_maximum.map(|v| ("exclusiveMaximum".to_string(), v)));
    }

    /// One side of a numeric range, converted to the target draft's shape.
    /// `tighter(a, b)` tells whether limit `a` is at least as strict as `b`.
    fn bound(
        &self,
        inclusive: Option<f64>,
        exclusive: Option<Exclusive>,
        tighter: impl Fn(f64, f64) -> bool,
    ) -> (Option<Value>, Option<Value>) {
        let inclusive_value = inclusive.map(number);
        match (self.draft.boolean_exclusive_bounds(), exclusive) {
            (_, None) => (inclusive_value, None),
            (true, Some(Exclusive::Flag(b))) => (inclusive_value, Some(Value::Bool(b))),
            (false, Some(Exclusive::Limit(x))) => (inclusive_value, Some(number(x))),
            // numeric limit into draft-04: keep whichever bound is stricter
            (true, Some(Exclusive::Limit(x))) => match inclusive {
                Some(m) if !tighter(x, m) => (inclusive_value, None),
                _ => (Some(number(x)), Some(Value::Bool(true))),
            },
            // boolean flag into a later draft: the bound itself becomes exclusive
            (false, Some(Exclusive::Flag(true))) => (None, inclusive_value),
            (false, Some(Exclusive::Flag(false))) => (inclusive_value, None),
        }
    }

    fn array(&self, node: &SchemaNode, o: &mut Map<String, Value>) {
        let Some(kw) = &node.array else { return };
        let modern = self.draft >= Draft::September2019;

        // normalise to (tuple head, schema for the rest)
        let (head, tail): (&[SchemaNode], Option<&SchemaNode>) = match (&kw.prefix_items, &kw.items) {
            (Some(prefix), Some(Items::List(rest))) => (prefix.as_slice(), Some(&**rest)),
            (Some(prefix), _) => (prefix.as_slice(), None),
            (None, Some(Items::Tuple(xs))) => (xs.as_slice(), kw.additional_items.as_deref()),
            (None, Some(Items::List(rest))) => (&[], Some(&**rest)),
            (None, None) => (&[], None),
        };
        if self.draft.has_prefix_items() {
            if !head.is_empty() {
                o.insert("prefixItems".into(), self.list(head));
            }
            if let Some(tail) = tail {
                o.insert("items".into(), self.node(tail));
            }
        } else if head.is_empty() {
            if let Some(tail) = tail {
                o.insert("items".into(), self.node(tail));
            }
        } else {
            o.insert("items".into(), self.list(head));
            if let Some(tail) = tail {
                o.insert("additionalItems".into(), self.node_or_bool(tail));
            }
        }

        if modern {
            if let Some(contains) = &kw.contains {
                o.insert("contains".into(), self.node(contains));
            }
            if let Some(min) = kw.min_contains {
                o.insert("minContains".into(), Value::from(min));
            }
            if let Some(max) = kw.max_contains {
                o.insert("maxContains".into(), Value::from(max));
            }
        }
        if let Some(min) = kw.min_items {
            o.insert("minItems".into(), Value::from(min));
        }
        if let Some(max) = kw.max_items {
            o.insert("maxItems".into(), Value::from(max));
        }
        if kw.unique_items {
            o.insert("uniqueItems".into(), Value::Bool(true));
        }
        if let (Some(rest), true) = (&kw.unevaluated_items, modern) {
            o.insert("unevaluatedItems".into(), self.node(rest));
        }
    }

    fn object(&self, node: &SchemaNode, o: &mut Map<String, Value>) {
        let Some(kw) = &node.object else { return };
        let modern = self.draft >= Draft::September2019;

        if !kw.properties.is_empty() {
            o.insert("properties".into(), self.named(&kw.properties));
        }
        if !kw.pattern_properties.is_empty() {
            let patterns: Map<String, Value> = kw
                .pattern_properties
                .iter()
                .map(|(p, s)| (p.as_str().to_string(), self.node(s)))
                .collect();
            o.insert("patternProperties".into(), Value::Object(patterns));
        }
        if let Some(additional) = &kw.additional_properties {
            o.insert("additionalProperties".into(), self.node_or_bool(additional));
        }
        if !kw.required.is_empty() {
            o.insert("required".into(), kw.required.iter().map(|s| Value::from(s.as_str())).collect());
        }
        if let Some(min) = kw.min_properties {
            o.insert("minProperties".into(), Value::from(min));
        }
        if let Some(max) = kw.max_properties {
            o.insert("maxProperties".into(), Value::from(max));
        }

        if modern {
            if let Some(names) = &kw.property_names {
                o.insert("propertyNames".into(), self.node(names));
            }
            if !kw.dependent_schemas.is_empty() {
                o.insert("dependentSchemas".into(), self.named(&kw.dependent_schemas));
            }
            if !kw.dependent_required.is_empty() {
                let required: Map<String, Value> = kw
                    .dependent_required
                    .iter()
                    .map(|(k, v)| (k.clone(), v.iter().map(|s| Value::from(s.as_str())).collect()))
                    .collect();
                o.insert("dependentRequired".into(), Value::Object(required));
            }
            if let Some(rest) = &kw.unevaluated_properties {
                o.insert("unevaluatedProperties".into(), self.node(rest));
            }
        } else {
            let mut dependencies = Map::new();
            for (k, v) in &kw.dependent_required {
                // draft-04 wants at least one name
                if !v.is_empty() {
                    dependencies.insert(k.clone(), v.iter().map(|s| Value::from(s.as_str())).collect());
                }
            }
            for (k, s) in &kw.dependent_schemas {
                dependencies.insert(k.clone(), self.node(s));
            }
            if !dependencies.is_empty() {
                o.insert("dependencies".into(), Value::Object(dependencies));
            }
        }
    }
}

/// Prefer integers when the value is exact.
fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}
