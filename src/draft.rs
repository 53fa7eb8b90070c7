//! Draft identification and the closed-world keyword vocabularies.
//!
//! Drafts share one validator; what differs is captured here as data (which
//! keywords exist, for which instance type) plus a handful of semantic
//! switches (boolean vs numeric exclusive bounds, tuple `items` vs
//! `prefixItems`, conditionals).
use std::fmt;
use std::str::FromStr;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaErrorKind};
use crate::ir::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Draft {
    #[serde(rename = "draft-04", alias = "draft4", alias = "4")]
    Draft04,
    #[serde(rename = "2019-09", alias = "draft2019-09")]
    September2019,
    #[serde(rename = "2020-12", alias = "draft2020-12")]
    December2020,
}

// ------------------------------ Vocabularies ------------------------------ //

const COMMON_04: &[&str] = &[
    "$schema", "id", "$ref", "definitions", "title", "description", "default",
    "enum", "type", "allOf", "anyOf", "oneOf", "not",
];

const COMMON_2019: &[&str] = &[
    "$schema", "$id", "$anchor", "$ref", "$recursiveRef", "$recursiveAnchor",
    "$vocabulary", "$defs", "definitions", "$comment", "title", "description",
    "default", "examples", "deprecated", "readOnly", "writeOnly", "const", "enum",
    "type", "allOf", "anyOf", "oneOf", "not", "if", "then", "else",
];

const COMMON_2020: &[&str] = &[
    "$schema", "$id", "$anchor", "$ref", "$dynamicRef", "$dynamicAnchor",
    "$vocabulary", "$defs", "definitions", "$comment", "title", "description",
    "default", "examples", "deprecated", "readOnly", "writeOnly", "const", "enum",
    "type", "allOf", "anyOf", "oneOf", "not", "if", "then", "else",
];

const STRING_04: &[&str] = &["minLength", "maxLength", "pattern", "format"];
const STRING_2019: &[&str] = &[
    "minLength", "maxLength", "pattern", "format", "contentEncoding", "contentMediaType",
];

const NUMBER: &[&str] = &[
    "multipleOf", "minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum",
];

const ARRAY_04: &[&str] = &["items", "additionalItems", "minItems", "maxItems", "uniqueItems"];
const ARRAY_2019: &[&str] = &[
    "items", "additionalItems", "contains", "minContains", "maxContains",
    "minItems", "maxItems", "uniqueItems", "unevaluatedItems",
];
const ARRAY_2020: &[&str] = &[
    "items", "prefixItems", "contains", "minContains", "maxContains",
    "minItems", "maxItems", "uniqueItems", "unevaluatedItems",
];

const OBJECT_04: &[&str] = &[
    "properties", "patternProperties", "additionalProperties", "required",
    "minProperties", "maxProperties", "dependencies",
];
const OBJECT_2019: &[&str] = &[
    "properties", "patternProperties", "additionalProperties", "required",
    "minProperties", "maxProperties", "dependentSchemas", "dependentRequired",
    "propertyNames", "unevaluatedProperties",
];

const NONE: &[&str] = &[];

impl Draft {
    pub const ALL: [Draft; 3] = [Draft::Draft04, Draft::September2019, Draft::December2020];

    /// Canonical `$schema` identifier emitted for this draft.
    pub fn uri(self) -> &'static str {
        match self {
            Draft::Draft04 => "http://json-schema.org/draft-04/schema#",
            Draft::September2019 => "https://json-schema.org/draft/2019-09/schema",
            Draft::December2020 => "https://json-schema.org/draft/2020-12/schema",
        }
    }

    /// Match a `$schema` value: scheme is normalised to https and a trailing
    /// `#` is ignored.
    pub fn from_uri(uri: &str) -> Option<Draft> {
        let wanted = normalize_uri(uri);
        Draft::ALL.into_iter().find(|d| normalize_uri(d.uri()) == wanted)
    }

    /// Draft declared by a raw document, or `fallback` when it declares none.
    pub fn detect(doc: &Value, fallback: Draft) -> Result<Draft, SchemaError> {
        match doc.as_object().and_then(|m| m.get("$schema")) {
            None => Ok(fallback),
            Some(Value::String(s)) => Draft::from_uri(s)
                .ok_or_else(|| SchemaError::new("#/$schema", SchemaErrorKind::UnknownDraft(s.clone()))),
            Some(_) => Err(SchemaError::invalid("#", "$schema", "a string")),
        }
    }

    // ---- semantic switches ----

    pub fn boolean_exclusive_bounds(self) -> bool { self == Draft::Draft04 }
    pub fn has_prefix_items(self) -> bool { self >= Draft::December2020 }
    pub fn has_conditionals(self) -> bool { self >= Draft::September2019 }
    pub fn allows_boolean_schemas(self) -> bool { self >= Draft::September2019 }
    pub fn id_keyword(self) -> &'static str {
        if self == Draft::Draft04 { "id" } else { "$id" }
    }
    pub fn defs_keyword(self) -> &'static str {
        if self == Draft::Draft04 { "definitions" } else { "$defs" }
    }

    // ---- keyword tables ----

    pub fn common_keywords(self) -> &'static [&'static str] {
        match self {
            Draft::Draft04 => COMMON_04,
            Draft::September2019 => COMMON_2019,
            Draft::December2020 => COMMON_2020,
        }
    }

    pub fn type_keywords(self, ty: Type) -> &'static [&'static str] {
        match (self, ty) {
            (Draft::Draft04, Type::String) => STRING_04,
            (_, Type::String) => STRING_2019,
            (_, Type::Number | Type::Integer) => NUMBER,
            (Draft::Draft04, Type::Array) => ARRAY_04,
            (Draft::September2019, Type::Array) => ARRAY_2019,
            (Draft::December2020, Type::Array) => ARRAY_2020,
            (Draft::Draft04, Type::Object) => OBJECT_04,
            (_, Type::Object) => OBJECT_2019,
            (_, Type::Boolean | Type::Null) => NONE,
        }
    }

    pub fn is_common(self, keyword: &str) -> bool {
        self.common_keywords().contains(&keyword)
    }

    pub fn applies_to(self, keyword: &str, ty: Type) -> bool {
        self.type_keywords(ty).contains(&keyword)
    }

    /// Instance types a type-specific keyword belongs to (empty if none).
    pub fn types_for_keyword(self, keyword: &str) -> Vec<Type> {
        Type::ALL.into_iter().filter(|t| self.applies_to(keyword, *t)).collect()
    }
}

fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim().trim_end_matches('#');
    match trimmed.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => trimmed.to_string(),
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Draft::Draft04 => "draft-04",
            Draft::September2019 => "2019-09",
            Draft::December2020 => "2020-12",
        })
    }
}

impl FromStr for Draft {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft-04" | "draft4" | "4" | "04" => Ok(Draft::Draft04),
            "2019-09" | "draft2019-09" => Ok(Draft::September2019),
            "2020-12" | "draft2020-12" => Ok(Draft::December2020),
            other => Draft::from_uri(other).ok_or_else(|| format!("unknown draft `{s}`")),
        }
    }
}

// ------------------------------ Process default ---------------------------- //

static DEFAULT_DRAFT: OnceCell<Draft> = OnceCell::new();

/// Fix the process-wide default draft. Settable once, before first use;
/// a rejected value is handed back.
pub fn set_default(draft: Draft) -> Result<(), Draft> {
    DEFAULT_DRAFT.set(draft)
}

/// Default draft for documents without `$schema`.
pub fn default_draft() -> Draft {
    *DEFAULT_DRAFT.get_or_init(|| Draft::December2020)
}

impl Default for Draft {
    fn default() -> Self { default_draft() }
}
