//! Error taxonomy.
//!
//! Four families, kept apart so callers never confuse "the instance is
//! invalid" with "the engine could not do its job":
//! - [`SchemaError`]: the schema document breaks its draft's grammar.
//! - [`ReferenceError`]: a `$ref` could not be tied to a schema.
//! - [`ValidationError`]: the instance does not conform (path + causes).
//! - [`UnsupportedFeature`]: a recognised keyword the engine does not evaluate.
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::path_de::PathError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ————————————————————————————————————————————————————————————————————————————
// PATHS
// ————————————————————————————————————————————————————————————————————————————

/// One breadcrumb: an object key / keyword name, or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self { PathSegment::Key(s.to_string()) }
}

impl From<&String> for PathSegment {
    fn from(s: &String) -> Self { PathSegment::Key(s.clone()) }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self { PathSegment::Key(s) }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self { PathSegment::Index(i) }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(&escape_token(k)),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Render a path as `#/a/0/b`.
pub fn pointer(path: &[PathSegment]) -> String {
    let mut out = String::from("#");
    for seg in path {
        out.push('/');
        out.push_str(&seg.to_string());
    }
    out
}

/// Extend a rendered pointer by one token.
pub fn push_token(base: &str, token: &str) -> String {
    format!("{base}/{}", escape_token(token))
}

pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

// ————————————————————————————————————————————————————————————————————————————
// INSTANCE FAILURES
// ————————————————————————————————————————————————————————————————————————————

/// The instance does not conform. `causes` carries every failed branch of a
/// `oneOf`/`anyOf` so the root cause stays visible.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {}", pointer(.path), .message)]
pub struct ValidationError {
    pub path: Vec<PathSegment>,
    pub message: String,
    pub causes: Vec<ValidationError>,
}

impl ValidationError {
    pub fn new(path: &[PathSegment], message: impl Into<String>) -> Self {
        Self { path: path.to_vec(), message: message.into(), causes: Vec::new() }
    }

    pub fn with_causes(mut self, causes: Vec<ValidationError>) -> Self {
        self.causes = causes;
        self
    }

    pub fn path(&self) -> &[PathSegment] { &self.path }

    pub fn pointer(&self) -> String { pointer(&self.path) }

    /// Multi-line rendering with nested causes indented beneath their parent.
    pub fn report(&self) -> String {
        let mut out = String::new();
        self.write_report(&mut out, 0);
        out
    }

    fn write_report(&self, out: &mut String, depth: usize) {
        if depth > 0 {
            out.push('\n');
        }
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.to_string());
        for cause in &self.causes {
            cause.write_report(out, depth + 1);
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA STRUCTURE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaErrorKind {
    #[error("unknown keyword(s) {}", .0.join(", "))]
    UnknownKeywords(Vec<String>),

    #[error("keyword(s) {} do not apply to type {types}", .keywords.join(", "))]
    Misplaced { keywords: Vec<String>, types: String },

    #[error("`{keyword}` must be {expected}")]
    InvalidValue { keyword: String, expected: &'static str },

    #[error("branch type {branch} is inconsistent with parent type {parent}")]
    InconsistentBranch { branch: String, parent: String },

    #[error("multiple types ({types}) cannot carry type-specific keyword(s) {}", .keywords.join(", "))]
    AmbiguousType { types: String, keywords: Vec<String> },

    #[error("unknown $schema `{0}`")]
    UnknownDraft(String),

    #[error("invalid regular expression `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("`{keyword}` requires a sibling `{sibling}`")]
    MissingSibling { keyword: &'static str, sibling: &'static str },

    #[error("a schema must be {0}")]
    NotASchema(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{pointer}: {kind}")]
pub struct SchemaError {
    pub pointer: String,
    pub kind: SchemaErrorKind,
}

impl SchemaError {
    pub fn new(pointer: impl Into<String>, kind: SchemaErrorKind) -> Self {
        Self { pointer: pointer.into(), kind }
    }

    pub fn invalid(pointer: &str, keyword: &str, expected: &'static str) -> Self {
        Self::new(
            push_token(pointer, keyword),
            SchemaErrorKind::InvalidValue { keyword: keyword.to_string(), expected },
        )
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REFERENCES & UNSUPPORTED KEYWORDS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("{pointer}: reference `{reference}` does not name a known definition")]
    Unresolved { reference: String, pointer: String },

    #[error("reference `{0}` loops back to itself without reaching a child instance")]
    Circular(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: `{}` is not supported ({})", pointer(.path), .keyword, .detail)]
pub struct UnsupportedFeature {
    pub path: Vec<PathSegment>,
    pub keyword: String,
    pub detail: String,
}

// ————————————————————————————————————————————————————————————————————————————
// TOP LEVEL
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeature),

    #[error("instance could not be serialised: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cannot read {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid configuration: {0}")]
    Config(#[from] PathError),
}

impl Error {
    /// The instance failure, if this is one.
    pub fn as_invalid(&self) -> Option<&ValidationError> {
        match self {
            Error::Invalid(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool { self.as_invalid().is_some() }
}
