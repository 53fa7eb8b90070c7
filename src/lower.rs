// Raw JSON → `ir::SchemaNode`.
//
// Lowering trusts the structural checker: every document is checked against
// its draft first, so the walk below only has to translate shapes, never to
// second-guess them. Unexpected shapes fall back to "absent".
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::config::Options;
use crate::draft::Draft;
use crate::error::{SchemaError, SchemaErrorKind, push_token};
use crate::ir::{
    ArrayKeywords, Definition, Exclusive, Items, NumberKeywords, ObjectKeywords, Pattern, SchemaNode,
    StringKeywords, Type,
};
use crate::structural::{self, as_count};

/// Detect the draft, check the document against it and lower it. The
/// returned node is the document root.
pub fn lower(doc: &Value, options: &Options) -> Result<(SchemaNode, Draft), SchemaError> {
    let draft = structural::check_document(doc, options.draft, options.enforce_single_type)?;
    let mut root = lower_checked(doc, draft)?;
    root.is_root = true;
    Ok((root, draft))
}

/// Lower a document already known to satisfy `draft`.
pub fn lower_checked(doc: &Value, draft: Draft) -> Result<SchemaNode, SchemaError> {
    Lowerer { draft }.node(doc, "#")
}

struct Lowerer {
    draft: Draft,
}

impl Lowerer {
    fn node(&self, v: &Value, ptr: &str) -> Result<SchemaNode, SchemaError> {
        let map = match v {
            Value::Bool(b) => return Ok(SchemaNode::boolean(*b)),
            Value::Object(m) => m,
            _ => return Err(SchemaError::new(ptr, SchemaErrorKind::NotASchema("an object or a boolean"))),
        };

        let mut node = SchemaNode { types: types_of(map), ..SchemaNode::default() };

        // ---- identity ----
        node.id = string(map, self.draft.id_keyword());
        node.anchor = string(map, "$anchor");
        if self.draft == Draft::Draft04 {
            // `"id": "#name"` is how draft-04 spells an anchor
            node.anchor = node
                .id
                .as_deref()
                .and_then(|id| id.strip_prefix('#'))
                .filter(|name| !name.is_empty())
                .map(str::to_string);
        }
        node.reference = string(map, "$ref");
        node.dynamic_ref = string(map, "$dynamicRef").or_else(|| string(map, "$recursiveRef"));
        for keyword in ["definitions", "$defs"] {
            if let Some(defs) = map.get(keyword).and_then(Value::as_object) {
                let here = push_token(ptr, keyword);
                for (name, sub) in defs {
                    let lowered = self.node(sub, &push_token(&here, name))?;
                    node.defs.insert(name.clone(), Definition::Schema(lowered));
                }
            }
        }

        // ---- annotations ----
        node.title = string(map, "title");
        node.description = string(map, "description");
        node.comment = string(map, "$comment");
        node.examples = map.get("examples").and_then(Value::as_array).cloned();
        node.default = map.get("default").cloned();
        node.deprecated = map.get("deprecated").and_then(Value::as_bool);
        node.read_only = map.get("readOnly").and_then(Value::as_bool);
        node.write_only = map.get("writeOnly").and_then(Value::as_bool);

        // ---- generic assertions & applicators ----
        node.const_value = map.get("const").cloned();
        node.enum_values = map.get("enum").and_then(Value::as_array).cloned();
        node.all_of = self.list(map, "allOf", ptr)?;
        node.one_of = self.list(map, "oneOf", ptr)?;
        node.any_of = self.list(map, "anyOf", ptr)?;
        node.not = self.single(map, "not", ptr)?;
        if self.draft.has_conditionals() {
            node.if_schema = self.single(map, "if", ptr)?;
            node.then_schema = self.single(map, "then", ptr)?;
            node.else_schema = self.single(map, "else", ptr)?;
        }

        // ---- type-specific payloads ----
        node.string = self.string_keywords(map, ptr)?;
        node.number = number_keywords(map);
        node.array = self.array_keywords(map, ptr)?;
        node.object = self.object_keywords(map, ptr)?;
        Ok(node)
    }

    fn single(&self, map: &Map<String, Value>, key: &str, ptr: &str) -> Result<Option<Box<SchemaNode>>, SchemaError> {
        map.get(key)
            .map(|v| self.node(v, &push_token(ptr, key)).map(Box::new))
            .transpose()
    }

    fn list(&self, map: &Map<String, Value>, key: &str, ptr: &str) -> Result<Option<Vec<SchemaNode>>, SchemaError> {
        let Some(xs) = map.get(key).and_then(Value::as_array) else { return Ok(None) };
        let here = push_token(ptr, key);
        xs.iter()
            .enumerate()
            .map(|(i, x)| self.node(x, &push_token(&here, &i.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn named(&self, map: &Map<String, Value>, key: &str, ptr: &str) -> Result<IndexMap<String, SchemaNode>, SchemaError> {
        let mut out = IndexMap::new();
        if let Some(m) = map.get(key).and_then(Value::as_object) {
            let here = push_token(ptr, key);
            for (name, sub) in m {
                out.insert(name.clone(), self.node(sub, &push_token(&here, name))?);
            }
        }
        Ok(out)
    }

    fn string_keywords(&self, map: &Map<String, Value>, ptr: &str) -> Result<Option<StringKeywords>, SchemaError> {
        const KEYS: &[&str] = &["format", "minLength", "maxLength", "pattern", "contentEncoding", "contentMediaType"];
        if !KEYS.iter().any(|k| map.contains_key(*k)) {
            return Ok(None);
        }
        let pattern = match map.get("pattern").and_then(Value::as_str) {
            Some(src) => Some(compile(src, &push_token(ptr, "pattern"))?),
            None => None,
        };
        Ok(Some(StringKeywords {
            format: string(map, "format"),
            min_length: map.get("minLength").and_then(as_count),
            max_length: map.get("maxLength").and_then(as_count),
            pattern,
            content_encoding: string(map, "contentEncoding"),
            content_media_type: string(map, "contentMediaType"),
        }))
    }

    fn array_keywords(&self, map: &Map<String, Value>, ptr: &str) -> Result<Option<ArrayKeywords>, SchemaError> {
        const KEYS: &[&str] = &[
            "items", "prefixItems", "additionalItems", "contains", "minContains", "maxContains",
            "minItems", "maxItems", "uniqueItems", "unevaluatedItems",
        ];
        if !KEYS.iter().any(|k| map.contains_key(*k)) {
            return Ok(None);
        }
        let items = match map.get("items") {
            None => None,
            Some(Value::Array(_)) => self.list(map, "items", ptr)?.map(Items::Tuple),
            Some(v) => Some(Items::List(Box::new(self.node(v, &push_token(ptr, "items"))?))),
        };
        Ok(Some(ArrayKeywords {
            items,
            prefix_items: self.list(map, "prefixItems", ptr)?,
            additional_items: self.single(map, "additionalItems", ptr)?,
            contains: self.single(map, "contains", ptr)?,
            min_contains: map.get("minContains").and_then(as_count),
            max_contains: map.get("maxContains").and_then(as_count),
            min_items: map.get("minItems").and_then(as_count),
            max_items: map.get("maxItems").and_then(as_count),
            unique_items: map.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false),
            unevaluated_items: self.single(map, "unevaluatedItems", ptr)?,
        }))
    }

    fn object_keywords(&self, map: &Map<String, Value>, ptr: &str) -> Result<Option<ObjectKeywords>, SchemaError> {
        const KEYS: &[&str] = &[
            "properties", "patternProperties", "additionalProperties", "unevaluatedProperties",
            "required", "propertyNames", "minProperties", "maxProperties", "dependentSchemas",
            "dependentRequired", "dependencies",
        ];
        if !KEYS.iter().any(|k| map.contains_key(*k)) {
            return Ok(None);
        }

        let mut pattern_properties = Vec::new();
        if let Some(m) = map.get("patternProperties").and_then(Value::as_object) {
            let here = push_token(ptr, "patternProperties");
            for (src, sub) in m {
                let at = push_token(&here, src);
                pattern_properties.push((compile(src, &at)?, self.node(sub, &at)?));
            }
        }

        let mut dependent_schemas = self.named(map, "dependentSchemas", ptr)?;
        let mut dependent_required: IndexMap<String, Vec<String>> = map
            .get("dependentRequired")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), strings(v))).collect())
            .unwrap_or_default();
        // draft-04 folds both forms into `dependencies`
        if let Some(m) = map.get("dependencies").and_then(Value::as_object) {
            let here = push_token(ptr, "dependencies");
            for (name, dep) in m {
                if dep.is_array() {
                    dependent_required.insert(name.clone(), strings(dep));
                } else {
                    dependent_schemas.insert(name.clone(), self.node(dep, &push_token(&here, name))?);
                }
            }
        }

        Ok(Some(ObjectKeywords {
            properties: self.named(map, "properties", ptr)?,
            pattern_properties,
            additional_properties: self.single(map, "additionalProperties", ptr)?,
            unevaluated_properties: self.single(map, "unevaluatedProperties", ptr)?,
            required: map.get("required").map(strings).unwrap_or_default(),
            property_names: self.single(map, "propertyNames", ptr)?,
            min_properties: map.get("minProperties").and_then(as_count),
            max_properties: map.get("maxProperties").and_then(as_count),
            dependent_schemas,
            dependent_required,
        }))
    }
}

fn types_of(map: &Map<String, Value>) -> BTreeSet<Type> {
    match map.get("type") {
        Some(Value::String(s)) => Type::parse(s).into_iter().collect(),
        Some(Value::Array(xs)) => xs.iter().filter_map(Value::as_str).filter_map(Type::parse).collect(),
        _ => BTreeSet::new(),
    }
}

fn number_keywords(map: &Map<String, Value>) -> Option<NumberKeywords> {
    const KEYS: &[&str] = &["multipleOf", "minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum"];
    if !KEYS.iter().any(|k| map.contains_key(*k)) {
        return None;
    }
    let exclusive = |key: &str| match map.get(key) {
        Some(Value::Bool(b)) => Some(Exclusive::Flag(*b)),
        Some(v) => v.as_f64().map(Exclusive::Limit),
        None => None,
    };
    Some(NumberKeywords {
        multiple_of: map.get("multipleOf").and_then(Value::as_f64),
        minimum: map.get("minimum").and_then(Value::as_f64),
        maximum: map.get("maximum").and_then(Value::as_f64),
        exclusive_minimum: exclusive("exclusiveMinimum"),
        exclusive_maximum: exclusive("exclusiveMaximum"),
    })
}

fn string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn strings(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|xs| xs.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn compile(src: &str, ptr: &str) -> Result<Pattern, SchemaError> {
    Pattern::new(src).map_err(|e| {
        SchemaError::new(ptr, SchemaErrorKind::InvalidPattern { pattern: src.to_string(), reason: e.to_string() })
    })
}
